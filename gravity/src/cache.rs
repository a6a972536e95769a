//! Copy-on-write storage overlay
//!
//! Writes land in an in-memory change set layered over a parent store. Reads
//! and range scans see the change set merged with the parent. The change set is
//! either committed to the parent or dropped, which gives handlers and event
//! application all-or-nothing semantics.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::ops::Bound;

use cosmwasm_std::{Order, Record, Storage};

pub struct CacheStorage<'a> {
    parent: &'a dyn Storage,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

/// Pending writes of a [`CacheStorage`]; `None` marks a removal
pub type ChangeSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

impl<'a> CacheStorage<'a> {
    pub fn new(parent: &'a dyn Storage) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    pub fn into_changes(self) -> ChangeSet {
        self.writes
    }
}

/// Write a change set into `storage`
pub fn commit(storage: &mut dyn Storage, changes: ChangeSet) {
    for (key, value) in changes {
        match value {
            Some(value) => storage.set(&key, &value),
            None => storage.remove(&key),
        }
    }
}

impl Storage for CacheStorage<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(value) => value.clone(),
            None => self.parent.get(key),
        }
    }

    fn range<'b>(
        &'b self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Box<dyn Iterator<Item = Record> + 'b> {
        if let (Some(s), Some(e)) = (start, end) {
            if s >= e {
                return Box::new(std::iter::empty());
            }
        }

        let lower = start.map_or(Bound::Unbounded, |s| Bound::Included(s.to_vec()));
        let upper = end.map_or(Bound::Unbounded, |e| Bound::Excluded(e.to_vec()));
        let writes = self.writes.range((lower, upper));
        let writes: PendingWrites<'b> = match order {
            Order::Ascending => Box::new(writes),
            Order::Descending => Box::new(writes.rev()),
        };
        Box::new(MergedRange {
            parent: self.parent.range(start, end, order).peekable(),
            writes: writes.peekable(),
            order,
        })
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn remove(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }
}

type PendingWrites<'b> = Box<dyn Iterator<Item = (&'b Vec<u8>, &'b Option<Vec<u8>>)> + 'b>;

/// Parent records and pending writes walked in lockstep, both in `order`.
/// On equal keys the write wins; removals are skipped.
struct MergedRange<'b> {
    parent: Peekable<Box<dyn Iterator<Item = Record> + 'b>>,
    writes: Peekable<PendingWrites<'b>>,
    order: Order,
}

impl Iterator for MergedRange<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            let next = match (self.parent.peek(), self.writes.peek()) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((parent_key, _)), Some((write_key, _))) => {
                    let ordering = parent_key.as_slice().cmp(write_key.as_slice());
                    match self.order {
                        Order::Ascending => ordering,
                        Order::Descending => ordering.reverse(),
                    }
                }
            };
            if next == Ordering::Less {
                return self.parent.next();
            }
            if next == Ordering::Equal {
                self.parent.next();
            }
            if let Some((key, Some(value))) = self.writes.next() {
                return Some((key.clone(), value.clone()));
            }
        }
    }
}
