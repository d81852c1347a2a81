//! Sliding window of recent block headers.
//!
//! Headers are held in ascending height order and must be contiguous. Adding
//! beyond `max_cached_items` drops the oldest header; removing below
//! `min_cached_items` flags the cache for a refill from storage.

use crate::domain::errors::DataAccessError;
use shared_types::entities::{BlockHeader, BlockId};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct BlockHeaderCache {
    items: VecDeque<BlockHeader>,
    ids: VecDeque<BlockId>,
    min_cached_items: usize,
    max_cached_items: usize,
    needs_refill: bool,
}

impl BlockHeaderCache {
    pub fn new(min_cached_items: usize, max_cached_items: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(max_cached_items),
            ids: VecDeque::with_capacity(max_cached_items),
            min_cached_items,
            max_cached_items,
            needs_refill: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_cached_items(&self) -> usize {
        self.max_cached_items
    }

    pub fn needs_refill(&self) -> bool {
        self.needs_refill
    }

    pub fn first(&self) -> Option<&BlockHeader> {
        self.items.front()
    }

    pub fn last(&self) -> Option<&BlockHeader> {
        self.items.back()
    }

    /// Appends the next header. The height must follow the current tip.
    pub fn add(&mut self, header: BlockHeader) -> Result<(), DataAccessError> {
        if let Some(last) = self.items.back() {
            if header.height != last.height + 1 {
                return Err(DataAccessError::HeaderCache(format!(
                    "expected height {}, got {}",
                    last.height + 1,
                    header.height
                )));
            }
        }
        self.ids.push_back(header.id());
        self.items.push_back(header);
        if self.items.len() > self.max_cached_items {
            self.items.pop_front();
            self.ids.pop_front();
        }
        Ok(())
    }

    /// Removes the tip header if its id matches.
    pub fn remove(&mut self, id: &BlockId) -> Result<BlockHeader, DataAccessError> {
        if self.ids.back() != Some(id) {
            return Err(DataAccessError::HeaderCache(
                "only the tip header can be removed".to_string(),
            ));
        }
        self.ids.pop_back();
        let header = self
            .items
            .pop_back()
            .ok_or_else(|| DataAccessError::HeaderCache("cache is empty".to_string()))?;
        if self.items.len() < self.min_cached_items {
            self.needs_refill = true;
        }
        Ok(header)
    }

    /// Replaces the contents with `headers` (any order).
    pub fn refill(&mut self, mut headers: Vec<BlockHeader>) -> Result<(), DataAccessError> {
        headers.sort_by_key(|h| h.height);
        self.items.clear();
        self.ids.clear();
        self.needs_refill = false;
        for header in headers {
            self.add(header)?;
        }
        Ok(())
    }

    pub fn get_by_id(&self, id: &BlockId) -> Option<&BlockHeader> {
        self.ids
            .iter()
            .position(|candidate| candidate == id)
            .and_then(|index| self.items.get(index))
    }

    pub fn get_by_ids(&self, ids: &[BlockId]) -> Vec<BlockHeader> {
        ids.iter()
            .filter_map(|id| self.get_by_id(id).cloned())
            .collect()
    }

    pub fn get_by_height(&self, height: u32) -> Option<&BlockHeader> {
        let first = self.items.front()?.height;
        let index = height.checked_sub(first)? as usize;
        self.items.get(index)
    }

    /// Headers in `[from, to]`, newest first, or `None` if the range is not
    /// fully cached.
    pub fn get_by_height_between(&self, from: u32, to: u32) -> Option<Vec<BlockHeader>> {
        let first = self.items.front()?.height;
        let last = self.items.back()?.height;
        if from > to || from < first || to > last {
            return None;
        }
        let start = (from - first) as usize;
        let end = (to - first) as usize;
        Some(self.items.range(start..=end).rev().cloned().collect())
    }

    /// Headers newest first.
    pub fn items_desc(&self) -> Vec<BlockHeader> {
        self.items.iter().rev().cloned().collect()
    }
}
