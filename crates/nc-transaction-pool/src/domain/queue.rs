//! Ordered queue with an id index.
//!
//! The front holds the newest entry. Scans that take work from the queue
//! (`peek_until`, `dequeue_until`) start at the back, the oldest entry, and
//! halt at the first entry the predicate rejects:
//!
//! ```text
//! front (newest)                      back (oldest)
//!   [t4] [t3] [t2] [t1]   peek_until(p) ◀── scans t1, t2, stops at t3
//! ```

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Entries carry their own key.
pub trait Keyed {
    type Key: Copy + Eq + Hash;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Clone)]
pub struct Queue<T: Keyed> {
    order: VecDeque<T::Key>,
    index: HashMap<T::Key, T>,
}

impl<T: Keyed> Default for Queue<T> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> Queue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn exists(&self, key: &T::Key) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.index.get(key)
    }

    /// Adds `item` as the newest entry. An entry with the same key is replaced.
    pub fn enqueue_one(&mut self, item: T) {
        let key = item.key();
        if self.index.insert(key, item).is_some() {
            self.order.retain(|k| *k != key);
        }
        self.order.push_front(key);
    }

    /// Adds `items` at the front, keeping their relative order: `items[0]`
    /// ends up newest.
    pub fn enqueue_many(&mut self, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        for item in items.into_iter().rev() {
            self.enqueue_one(item);
        }
    }

    /// Oldest-first prefix of entries accepted by `predicate`.
    pub fn peek_until<P>(&self, mut predicate: P) -> Vec<&T>
    where
        P: FnMut(&T) -> bool,
    {
        let mut taken = Vec::new();
        for key in self.order.iter().rev() {
            let Some(item) = self.index.get(key) else {
                continue;
            };
            if !predicate(item) {
                break;
            }
            taken.push(item);
        }
        taken
    }

    /// Removes and returns the prefix [`peek_until`](Self::peek_until) would return.
    pub fn dequeue_until<P>(&mut self, mut predicate: P) -> Vec<T>
    where
        P: FnMut(&T) -> bool,
    {
        let mut taken = Vec::new();
        while let Some(key) = self.order.back().copied() {
            let accepted = self.index.get(&key).is_some_and(&mut predicate);
            if !accepted {
                break;
            }
            self.order.pop_back();
            if let Some(item) = self.index.remove(&key) {
                taken.push(item);
            }
        }
        taken
    }

    /// Removes every entry matching `predicate`, oldest first. Survivors keep
    /// their order.
    pub fn remove_for<P>(&mut self, mut predicate: P) -> Vec<T>
    where
        P: FnMut(&T) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.order.len());
        while let Some(key) = self.order.pop_back() {
            let matches = self.index.get(&key).is_some_and(&mut predicate);
            if matches {
                if let Some(item) = self.index.remove(&key) {
                    removed.push(item);
                }
            } else {
                kept.push_front(key);
            }
        }
        self.order = kept;
        removed
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let item = self.index.remove(key)?;
        self.order.retain(|k| k != key);
        Some(item)
    }

    pub fn size_by<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        self.index.values().filter(|item| predicate(item)).count()
    }

    /// Entries matching `predicate`, newest first.
    pub fn filter<P>(&self, mut predicate: P) -> Vec<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().filter(|item| predicate(item)).collect()
    }

    /// Newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.order.iter().filter_map(|key| self.index.get(key))
    }

    pub fn get_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        self.index.get_mut(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
        weight: u32,
    }

    impl Keyed for Item {
        type Key = u32;

        fn key(&self) -> u32 {
            self.id
        }
    }

    fn item(id: u32, weight: u32) -> Item {
        Item { id, weight }
    }

    /// Queue holding `t1..t3` with `t1` oldest.
    fn queue() -> Queue<Item> {
        let mut queue = Queue::new();
        queue.enqueue_one(item(1, 1));
        queue.enqueue_one(item(2, 1));
        queue.enqueue_one(item(3, 5));
        queue
    }

    fn ids<'a>(items: impl IntoIterator<Item = &'a Item>) -> Vec<u32> {
        items.into_iter().map(|i| i.id).collect()
    }

    // ===== SCANS =====

    #[test]
    fn test_peek_until_stops_at_first_rejection() {
        let mut queue = queue();
        queue.enqueue_one(item(4, 1));

        let light = |i: &Item| i.weight < 5;
        assert_eq!(ids(queue.peek_until(light)), vec![1, 2]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_dequeue_until_removes_prefix() {
        let mut queue = queue();
        let taken = queue.dequeue_until(|i| i.weight < 5);
        assert_eq!(ids(&taken), vec![1, 2]);
        assert_eq!(ids(queue.iter()), vec![3]);
        assert!(!queue.exists(&1));
    }

    #[test]
    fn test_peek_until_with_limit() {
        let queue = queue();
        let mut remaining = 2;
        let limited = queue.peek_until(|_| {
            if remaining == 0 {
                return false;
            }
            remaining -= 1;
            true
        });
        assert_eq!(ids(limited), vec![1, 2]);
    }

    // ===== FILTERS =====

    #[test]
    fn test_remove_for_filters_whole_queue() {
        let mut queue = queue();
        queue.enqueue_one(item(4, 1));
        let removed = queue.remove_for(|i| i.id % 2 == 0);
        assert_eq!(ids(&removed), vec![2, 4]);
        assert_eq!(ids(queue.iter()), vec![3, 1]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_size_by_counts_without_removing() {
        let queue = queue();
        assert_eq!(queue.size_by(|i| i.weight == 1), 2);
        assert_eq!(queue.len(), 3);
    }

    // ===== ORDERING =====

    #[test]
    fn test_enqueue_many_keeps_order() {
        let mut queue = Queue::new();
        queue.enqueue_one(item(1, 0));
        queue.enqueue_many(vec![item(2, 0), item(3, 0)]);
        // newest first
        assert_eq!(ids(queue.iter()), vec![2, 3, 1]);
        assert_eq!(ids(queue.peek_until(|_| true)), vec![1, 3, 2]);
    }

    #[test]
    fn test_enqueue_same_key_replaces() {
        let mut queue = queue();
        queue.enqueue_one(item(1, 9));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.get(&1).map(|i| i.weight), Some(9));
        assert_eq!(ids(queue.iter()), vec![1, 3, 2]);
    }

    #[test]
    fn test_remove_by_key() {
        let mut queue = queue();
        assert_eq!(queue.remove(&2), Some(item(2, 1)));
        assert_eq!(queue.remove(&2), None);
        assert_eq!(ids(queue.iter()), vec![3, 1]);
    }
}
