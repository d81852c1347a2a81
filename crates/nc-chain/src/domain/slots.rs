//! Timestamp to slot mapping.
//!
//! Slot `n` covers `[genesis + n * interval, genesis + (n + 1) * interval)`.
//! Timestamps before genesis map to slot 0.

use crate::ports::TimeSource;
use std::sync::Arc;

#[derive(Clone)]
pub struct Slots {
    genesis_timestamp: u32,
    interval: u32,
    clock: Arc<dyn TimeSource>,
}

impl std::fmt::Debug for Slots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slots")
            .field("genesis_timestamp", &self.genesis_timestamp)
            .field("interval", &self.interval)
            .finish()
    }
}

impl Slots {
    pub fn new(genesis_timestamp: u32, interval: u32, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            genesis_timestamp,
            interval: interval.max(1),
            clock,
        }
    }

    pub fn block_time(&self) -> u32 {
        self.interval
    }

    pub fn time_now(&self) -> u32 {
        u32::try_from(self.clock.now()).unwrap_or(u32::MAX)
    }

    /// Seconds since genesis for `time` (defaults to now).
    pub fn get_epoch_time(&self, time: Option<u32>) -> u32 {
        time.unwrap_or_else(|| self.time_now())
            .saturating_sub(self.genesis_timestamp)
    }

    /// Slot of `time` (defaults to now).
    pub fn get_slot_number(&self, time: Option<u32>) -> u32 {
        self.get_epoch_time(time) / self.interval
    }

    /// Seconds since genesis at which `slot` starts.
    pub fn get_slot_time(&self, slot: u32) -> u32 {
        slot.saturating_mul(self.interval)
    }

    /// Unix timestamp at which `slot` starts.
    pub fn get_real_time(&self, slot: u32) -> u32 {
        self.get_slot_time(slot)
            .saturating_add(self.genesis_timestamp)
    }

    pub fn get_next_slot(&self) -> u32 {
        self.get_slot_number(None) + 1
    }

    /// Whether `time` falls inside `slot`.
    pub fn is_within_timeslot(&self, slot: u32, time: Option<u32>) -> bool {
        self.get_slot_number(time) == slot
    }
}
