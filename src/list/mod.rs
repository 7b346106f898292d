//! List value type: an ordered byte-string sequence over the segmented
//! list. The segmented form is the only representation, so there is no
//! encoding transition here — just command-shaped operations.

use crate::config::Config;
use crate::seglist::SegList;

/// Which end of the list an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Head,
    Tail,
}

pub struct List {
    inner: SegList,
}

impl List {
    /// Fill factor and compression depth are captured from the live
    /// configuration at creation time.
    pub fn new(config: &Config) -> Self {
        List { inner: SegList::new(config.list_fill, config.list_compress_depth) }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn push(&mut self, end: End, value: &[u8]) {
        match end {
            End::Head => self.inner.push_head(value),
            End::Tail => self.inner.push_tail(value),
        }
    }

    pub fn pop(&mut self, end: End) -> Option<Vec<u8>> {
        match end {
            End::Head => self.inner.pop_head(|v| v.to_bytes()),
            End::Tail => self.inner.pop_tail(|v| v.to_bytes()),
        }
    }

    /// Entry at `index`; negative indices count from the tail.
    pub fn index(&mut self, index: i64) -> Option<Vec<u8>> {
        self.inner.get(index, |v| v.to_bytes())
    }

    /// Overwrite the entry at `index`. False when out of range.
    pub fn set(&mut self, index: i64, value: &[u8]) -> bool {
        match self.inner.cursor(index) {
            Some(cur) => {
                self.inner.replace(&cur, value);
                true
            }
            None => false,
        }
    }

    /// Entries in [start, stop], both ends normalised the command way:
    /// negative counts from the tail, out-of-range clamps, an inverted
    /// range is empty.
    pub fn range(&mut self, start: i64, stop: i64) -> Vec<Vec<u8>> {
        let Some((start, stop)) = self.normalise(start, stop) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(stop - start + 1);
        let mut cur = self.inner.cursor(start as i64);
        for _ in start..=stop {
            let Some(c) = cur else { break };
            out.push(self.inner.read(&c, |v| v.to_bytes()));
            cur = self.inner.advance(c, true);
        }
        out
    }

    /// Keep only [start, stop]; an inverted range empties the list.
    pub fn trim(&mut self, start: i64, stop: i64) {
        let Some((start, stop)) = self.normalise(start, stop) else {
            self.inner.delete_range(0, self.inner.len());
            return;
        };
        let len = self.inner.len();
        self.inner.delete_range(stop + 1, len - stop - 1);
        self.inner.delete_range(0, start);
    }

    /// Remove up to `count` entries equal to `needle`: count > 0 scans
    /// head→tail, count < 0 scans tail→head, count = 0 removes all.
    /// Returns the number removed.
    pub fn remove_matching(&mut self, count: i64, needle: &[u8]) -> usize {
        let forward = count >= 0;
        let limit = count.unsigned_abs() as usize;
        let mut removed = 0;

        let mut cur = self.inner.cursor(if forward { 0 } else { -1 });
        while let Some(c) = cur {
            if self.inner.entry_eq(&c, needle) {
                cur = self.inner.remove(c, forward);
                removed += 1;
                if limit != 0 && removed == limit {
                    break;
                }
            } else {
                cur = self.inner.advance(c, forward);
            }
        }
        removed
    }

    /// Insert `value` next to the first entry equal to `pivot`, scanning
    /// head→tail. Returns the new length, or None when the pivot is
    /// absent.
    pub fn insert_near(&mut self, before: bool, pivot: &[u8], value: &[u8]) -> Option<usize> {
        let mut cur = self.inner.cursor(0);
        while let Some(c) = cur {
            if self.inner.entry_eq(&c, pivot) {
                if before {
                    self.inner.insert_before(&c, value);
                } else {
                    self.inner.insert_after(&c, value);
                }
                return Some(self.inner.len());
            }
            cur = self.inner.advance(c, true);
        }
        None
    }

    /// Move the tail entry to the head (the same-key RPOPLPUSH shape).
    pub fn rotate(&mut self) {
        self.inner.rotate();
    }

    /// All entries, head to tail.
    pub fn to_vec(&mut self) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len());
        self.inner.for_each(|v| out.push(v.to_bytes()));
        out
    }

    /// Command-style index normalisation against the current length.
    fn normalise(&self, start: i64, stop: i64) -> Option<(usize, usize)> {
        let len = self.inner.len() as i64;
        if len == 0 {
            return None;
        }
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop };
        if start > stop || start >= len || stop < 0 {
            return None;
        }
        Some((start as usize, stop.min(len - 1) as usize))
    }
}
