//! Delegate votes and unvotes.
//!
//! Positive amounts lock tokens on a delegate, negative amounts release them
//! into the unlocking list at the current height.

use super::{ApplyContext, AssetHandler};
use crate::domain::errors::{TransactionError, TransactionResult};
use shared_types::codec::{Codec, FieldReader, FieldWriter};
use shared_types::entities::{Address, SentVote, TransactionId, Unlocking};
use shared_types::errors::CodecError;
use std::collections::HashSet;

pub const VOTE_ASSET_SCHEMA: &str = "/dpos/vote";
pub const VOTE_ENTRY_SCHEMA: &str = "/dpos/vote/item";

pub const MAX_VOTES_PER_TRANSACTION: usize = 20;
pub const MAX_VOTE: usize = 10;
pub const MAX_UNLOCKING: usize = 20;
/// Vote amounts move in whole multiples of this unit.
pub const VOTE_AMOUNT_UNIT: u64 = 1_000_000_000;

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteEntry {
    pub delegate_address: Address,
    /// Positive to vote, negative to unvote.
    pub amount: i64,
}

impl Codec for VoteEntry {
    const SCHEMA: &'static str = VOTE_ENTRY_SCHEMA;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_bytes(1, &self.delegate_address);
        w.write_u64(2, zigzag_encode(self.amount));
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            delegate_address: r.read_fixed(1, "delegateAddress")?,
            amount: zigzag_decode(r.read_u64(2, "amount")?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoteAsset {
    pub votes: Vec<VoteEntry>,
}

impl Codec for VoteAsset {
    const SCHEMA: &'static str = VOTE_ASSET_SCHEMA;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_repeated_objects(1, &self.votes);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            votes: r.read_repeated_objects(1, "votes")?,
        })
    }
}

impl VoteAsset {
    /// Unvotes first, then votes.
    fn ordered_votes(&self) -> Vec<&VoteEntry> {
        let mut votes: Vec<&VoteEntry> = self.votes.iter().collect();
        votes.sort_by_key(|vote| vote.amount > 0);
        votes
    }
}

fn add_sent_vote(votes: &mut Vec<SentVote>, delegate_address: Address, amount: u64) {
    match votes.binary_search_by(|vote| vote.delegate_address.cmp(&delegate_address)) {
        Ok(index) => votes[index].amount += amount,
        Err(index) => votes.insert(
            index,
            SentVote {
                delegate_address,
                amount,
            },
        ),
    }
}

/// Removes `amount` from the vote on `delegate_address`. Returns false if the
/// vote does not cover it.
fn remove_sent_vote(votes: &mut Vec<SentVote>, delegate_address: &Address, amount: u64) -> bool {
    let Some(index) = votes
        .iter()
        .position(|vote| &vote.delegate_address == delegate_address)
    else {
        return false;
    };
    if votes[index].amount < amount {
        return false;
    }
    votes[index].amount -= amount;
    if votes[index].amount == 0 {
        votes.remove(index);
    }
    true
}

impl AssetHandler for VoteAsset {
    const MODULE_ID: u32 = 5;
    const ASSET_ID: u32 = 1;
    const NAME: &'static str = "voteDelegate";

    fn validate_asset(&self, id: &TransactionId) -> Vec<TransactionError> {
        let mut errors = Vec::new();
        if self.votes.is_empty() || self.votes.len() > MAX_VOTES_PER_TRANSACTION {
            errors.push(
                TransactionError::new(id, ".asset.votes", "Invalid number of votes")
                    .with_values(self.votes.len(), MAX_VOTES_PER_TRANSACTION),
            );
        }
        let upvotes = self.votes.iter().filter(|v| v.amount > 0).count();
        let downvotes = self.votes.iter().filter(|v| v.amount < 0).count();
        if upvotes > MAX_VOTE || downvotes > MAX_VOTE {
            errors.push(TransactionError::new(
                id,
                ".asset.votes",
                format!("Upvote and downvote can only be up to {MAX_VOTE}"),
            ));
        }
        let mut seen = HashSet::new();
        for (index, vote) in self.votes.iter().enumerate() {
            if !seen.insert(vote.delegate_address) {
                errors.push(TransactionError::new(
                    id,
                    format!(".asset.votes.{index}.delegateAddress"),
                    "Delegate address must be unique",
                ));
            }
            if vote.amount == 0 || vote.amount.unsigned_abs() % VOTE_AMOUNT_UNIT != 0 {
                errors.push(
                    TransactionError::new(
                        id,
                        format!(".asset.votes.{index}.amount"),
                        "Amount should be a non-zero multiple of the vote unit",
                    )
                    .with_values(vote.amount, VOTE_AMOUNT_UNIT),
                );
            }
        }
        errors
    }

    fn apply_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        for vote in self.ordered_votes() {
            let amount = vote.amount.unsigned_abs();
            let delegate = ctx.get_account(&vote.delegate_address)?;
            if delegate.dpos.delegate.username.is_empty() {
                return Err(ctx.error(
                    ".asset.votes.delegateAddress",
                    "Voted delegate is not registered",
                ));
            }

            let mut sender = ctx.get_sender()?;
            if vote.amount > 0 {
                ctx.debit(&mut sender, amount, ".asset.votes.amount")?;
                add_sent_vote(&mut sender.dpos.sent_votes, vote.delegate_address, amount);
                if sender.dpos.sent_votes.len() > MAX_VOTE {
                    return Err(ctx.error(
                        ".asset.votes",
                        format!("Sender can only vote up to {MAX_VOTE}"),
                    ));
                }
            } else {
                if !remove_sent_vote(&mut sender.dpos.sent_votes, &vote.delegate_address, amount) {
                    return Err(ctx.error(
                        ".asset.votes.amount",
                        "Cannot unvote more than the voted amount",
                    ));
                }
                sender.dpos.unlocking.push(Unlocking {
                    delegate_address: vote.delegate_address,
                    amount,
                    unvote_height: ctx.height,
                });
                if sender.dpos.unlocking.len() > MAX_UNLOCKING {
                    return Err(ctx.error(
                        ".asset.votes",
                        format!("Cannot have more than {MAX_UNLOCKING} unlocking"),
                    ));
                }
            }
            ctx.set_account(sender)?;

            // re-read: the delegate may be the sender
            let mut delegate = ctx.get_account(&vote.delegate_address)?;
            let votes = &mut delegate.dpos.delegate.total_votes_received;
            *votes = if vote.amount > 0 {
                votes.saturating_add(amount)
            } else {
                votes.saturating_sub(amount)
            };
            ctx.set_account(delegate)?;
        }
        Ok(())
    }

    fn undo_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        for vote in self.ordered_votes().into_iter().rev() {
            let amount = vote.amount.unsigned_abs();
            let mut sender = ctx.get_sender()?;
            if vote.amount > 0 {
                if !remove_sent_vote(&mut sender.dpos.sent_votes, &vote.delegate_address, amount) {
                    return Err(ctx.error(".asset.votes.amount", "Vote to undo not found"));
                }
                ctx.credit(&mut sender, amount, ".asset.votes.amount")?;
            } else {
                let height = ctx.height;
                let Some(index) = sender.dpos.unlocking.iter().position(|unlock| {
                    unlock.delegate_address == vote.delegate_address
                        && unlock.amount == amount
                        && unlock.unvote_height == height
                }) else {
                    return Err(ctx.error(".asset.votes.amount", "Unlocking to undo not found"));
                };
                sender.dpos.unlocking.remove(index);
                add_sent_vote(&mut sender.dpos.sent_votes, vote.delegate_address, amount);
            }
            ctx.set_account(sender)?;

            let mut delegate = ctx.get_account(&vote.delegate_address)?;
            let votes = &mut delegate.dpos.delegate.total_votes_received;
            *votes = if vote.amount > 0 {
                votes.saturating_sub(amount)
            } else {
                votes.saturating_add(amount)
            };
            ctx.set_account(delegate)?;
        }
        Ok(())
    }
}
