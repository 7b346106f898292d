//! Sorted-set value type: a packed (member, score) sequence while small,
//! a skip list + member map dual index once past the thresholds.

use std::rc::Rc;

use ordered_float::NotNan;
use tracing::debug;

use crate::config::Config;
use crate::dict::{Xxh3Map, new_map};
use crate::error::{Error, Result};
use crate::num::{format_double, parse_float};
use crate::packed::{PackedSeq, PackedValue};
use crate::set::Set;
use crate::skiplist::{LexRange, ScoreRange, SkipList};

/// The dual index. The skip list orders (score, member); the map answers
/// member → score point lookups. Both reference one shared member
/// allocation. Invariant: identical contents, removal goes map first.
#[derive(Debug, PartialEq)]
pub struct Indexed {
    list: SkipList,
    map: Xxh3Map<Rc<[u8]>, NotNan<f64>>,
}

#[derive(Debug, PartialEq)]
pub enum SortedSet {
    Packed(PackedSeq),
    Indexed(Indexed),
}

/// `ZADD` modifiers that the value layer cares about. CH only changes the
/// reply and stays in the command layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddFlags {
    pub nx: bool,
    pub xx: bool,
    pub incr: bool,
}

/// What an add did, carrying the score now stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddOutcome {
    Added(f64),
    Updated(f64),
    /// Member existed with exactly this score; nothing changed.
    Unchanged(f64),
    /// NX/XX stopped the operation.
    Skipped,
}

/// Aggregation mode for union/intersection stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
}

impl Aggregate {
    pub fn parse(bytes: &[u8]) -> Result<Aggregate> {
        match bytes.to_ascii_lowercase().as_slice() {
            b"sum" => Ok(Aggregate::Sum),
            b"min" => Ok(Aggregate::Min),
            b"max" => Ok(Aggregate::Max),
            _ => Err(Error::Syntax),
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            // Opposing infinities sum to NaN; the result is defined as 0.
            Aggregate::Sum => {
                let s = a + b;
                if s.is_nan() { 0.0 } else { s }
            }
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        }
    }
}

/// One source of a union/intersection: a sorted set, or a plain set whose
/// members all score 1.0.
pub enum ZSource<'a> {
    Sorted(&'a SortedSet),
    Plain(&'a Set),
}

impl ZSource<'_> {
    pub fn len(&self) -> usize {
        match self {
            ZSource::Sorted(z) => z.len(),
            ZSource::Plain(s) => s.len(),
        }
    }

    fn score_of(&self, member: &[u8]) -> Option<f64> {
        match self {
            ZSource::Sorted(z) => z.score_of(member),
            ZSource::Plain(s) => s.contains(member).then_some(1.0),
        }
    }

    fn for_each(&self, mut f: impl FnMut(&[u8], f64)) {
        match self {
            ZSource::Sorted(z) => z.for_each(&mut f),
            ZSource::Plain(s) => {
                for member in s.iter() {
                    f(member, 1.0);
                }
            }
        }
    }
}

fn nn(score: f64) -> NotNan<f64> {
    NotNan::new(score).unwrap_or_else(|_| panic!("NaN score reached the sorted set"))
}

fn weighted(score: f64, weight: f64) -> f64 {
    let w = score * weight;
    if w.is_nan() { 0.0 } else { w }
}

impl Default for SortedSet {
    fn default() -> Self {
        SortedSet::Packed(PackedSeq::new())
    }
}

impl SortedSet {
    /// New empty set, packed unless the configuration or the first
    /// member's size rules it out.
    pub fn new(config: &Config, first_member_len: usize) -> Self {
        if config.zset_max_packed_entries == 0
            || first_member_len > config.zset_max_packed_value_bytes
        {
            SortedSet::Indexed(Indexed { list: SkipList::new(), map: new_map() })
        } else {
            SortedSet::Packed(PackedSeq::new())
        }
    }

    pub fn is_packed(&self) -> bool {
        matches!(self, SortedSet::Packed(_))
    }

    pub fn len(&self) -> usize {
        match self {
            SortedSet::Packed(seq) => seq.len() / 2,
            SortedSet::Indexed(ix) => ix.map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn score_of(&self, member: &[u8]) -> Option<f64> {
        match self {
            SortedSet::Packed(seq) => {
                let (_, spos) = packed_find(seq, member)?;
                Some(packed_score(seq, spos))
            }
            SortedSet::Indexed(ix) => ix.map.get(member).map(|s| **s),
        }
    }

    /// Add or update one member under the given flags. `score` is the
    /// increment when `flags.incr` is set, the absolute score otherwise.
    pub fn add(
        &mut self,
        config: &Config,
        member: &[u8],
        score: f64,
        flags: AddFlags,
    ) -> Result<AddOutcome> {
        match self.score_of(member) {
            Some(current) => {
                if flags.nx {
                    return Ok(AddOutcome::Skipped);
                }
                let target = if flags.incr {
                    let t = current + score;
                    if t.is_nan() {
                        return Err(Error::NanScore);
                    }
                    t
                } else {
                    score
                };
                if target == current {
                    return Ok(AddOutcome::Unchanged(current));
                }
                self.update(member, current, target);
                Ok(AddOutcome::Updated(target))
            }
            None => {
                if flags.xx {
                    return Ok(AddOutcome::Skipped);
                }
                self.insert_new(config, member, score);
                Ok(AddOutcome::Added(score))
            }
        }
    }

    /// Delete one member. Returns true when it existed.
    pub fn delete(&mut self, member: &[u8]) -> bool {
        match self {
            SortedSet::Packed(seq) => match packed_find(seq, member) {
                Some((fpos, _)) => {
                    seq.delete(fpos); // member
                    seq.delete(fpos); // score, shifted into place
                    true
                }
                None => false,
            },
            SortedSet::Indexed(ix) => match ix.map.remove(member) {
                Some(score) => {
                    let released = ix.list.delete(*score, member);
                    debug_assert!(released.is_some(), "dual index out of sync");
                    true
                }
                None => false,
            },
        }
    }

    /// 0-based rank; `rev` counts from the highest score.
    pub fn rank_of(&self, member: &[u8], rev: bool) -> Option<usize> {
        match self {
            SortedSet::Packed(seq) => {
                let mut rank = 0;
                let mut pair = packed_first_pair(seq);
                while let Some((fpos, spos)) = pair {
                    if seq.entry_eq(fpos, member) {
                        return Some(if rev { self.len() - 1 - rank } else { rank });
                    }
                    rank += 1;
                    pair = packed_next_pair(seq, spos);
                }
                None
            }
            SortedSet::Indexed(ix) => {
                let score = **ix.map.get(member)?;
                let rank = ix.list.rank_of(score, member);
                debug_assert!(rank > 0, "dual index out of sync");
                Some(if rev { ix.list.len() - rank } else { rank - 1 })
            }
        }
    }

    /// Entries with 0-based ranks in [start, stop] (caller-normalised,
    /// start <= stop < len), in rank order; `rev` ranks from the top.
    pub fn range_by_rank(&self, start: usize, stop: usize, rev: bool) -> Vec<(Vec<u8>, f64)> {
        let len = self.len();
        let (lo, hi) = if rev {
            (len - 1 - stop, len - 1 - start)
        } else {
            (start, stop)
        };
        let mut out = self.collect_rank_window(lo, hi);
        if rev {
            out.reverse();
        }
        out
    }

    fn collect_rank_window(&self, lo: usize, hi: usize) -> Vec<(Vec<u8>, f64)> {
        let mut out = Vec::with_capacity(hi - lo + 1);
        match self {
            SortedSet::Packed(seq) => {
                let mut pair = seq
                    .index((lo * 2) as i64)
                    .map(|fpos| (fpos, seq.next_pos(fpos).expect("odd packed sorted set")));
                let mut rank = lo;
                while let Some((fpos, spos)) = pair {
                    if rank > hi {
                        break;
                    }
                    out.push((seq.get_bytes(fpos), packed_score(seq, spos)));
                    rank += 1;
                    pair = packed_next_pair(seq, spos);
                }
            }
            SortedSet::Indexed(ix) => {
                let mut node = ix.list.node_at_rank(lo + 1);
                let mut rank = lo;
                while let Some(idx) = node {
                    if rank > hi {
                        break;
                    }
                    out.push((ix.list.member_of(idx).to_vec(), ix.list.score_of(idx)));
                    rank += 1;
                    node = ix.list.next_of(idx);
                }
            }
        }
        out
    }

    /// Entries with scores inside `range`, in rank order (reversed when
    /// `rev`), after skipping `offset` and taking at most `count`.
    pub fn range_by_score(
        &self,
        range: &ScoreRange,
        rev: bool,
        offset: usize,
        count: Option<usize>,
    ) -> Vec<(Vec<u8>, f64)> {
        let mut out = Vec::new();
        let mut skipped = 0;
        self.walk_score_range(range, rev, |member, score| {
            if skipped < offset {
                skipped += 1;
                return true;
            }
            if count.is_some_and(|c| out.len() >= c) {
                return false;
            }
            out.push((member.to_vec(), score));
            count.is_none_or(|c| out.len() < c)
        });
        out
    }

    pub fn count_in_score_range(&self, range: &ScoreRange) -> usize {
        match self {
            SortedSet::Packed(_) => {
                let mut n = 0;
                self.walk_score_range(range, false, |_, _| {
                    n += 1;
                    true
                });
                n
            }
            SortedSet::Indexed(ix) => {
                let Some(first) = ix.list.first_in_range(range) else { return 0 };
                let last = ix.list.last_in_range(range).expect("range probe disagrees");
                let first_rank =
                    ix.list.rank_of(ix.list.score_of(first), ix.list.member_of(first));
                let last_rank = ix.list.rank_of(ix.list.score_of(last), ix.list.member_of(last));
                last_rank - first_rank + 1
            }
        }
    }

    /// Entries with members inside the lex range. Assumes the caller
    /// honours the all-scores-equal precondition.
    pub fn range_by_lex(
        &self,
        range: &LexRange,
        rev: bool,
        offset: usize,
        count: Option<usize>,
    ) -> Vec<(Vec<u8>, f64)> {
        let mut out = Vec::new();
        let mut skipped = 0;
        self.walk_lex_range(range, rev, |member, score| {
            if skipped < offset {
                skipped += 1;
                return true;
            }
            if count.is_some_and(|c| out.len() >= c) {
                return false;
            }
            out.push((member.to_vec(), score));
            count.is_none_or(|c| out.len() < c)
        });
        out
    }

    pub fn count_in_lex_range(&self, range: &LexRange) -> usize {
        match self {
            SortedSet::Packed(_) => {
                let mut n = 0;
                self.walk_lex_range(range, false, |_, _| {
                    n += 1;
                    true
                });
                n
            }
            SortedSet::Indexed(ix) => {
                let Some(first) = ix.list.first_in_lex(range) else { return 0 };
                let last = ix.list.last_in_lex(range).expect("lex probe disagrees");
                let first_rank =
                    ix.list.rank_of(ix.list.score_of(first), ix.list.member_of(first));
                let last_rank = ix.list.rank_of(ix.list.score_of(last), ix.list.member_of(last));
                last_rank - first_rank + 1
            }
        }
    }

    /// Pop up to `count` entries from the low (`min`) or high end, in pop
    /// order.
    pub fn pop_extreme(&mut self, min: bool, count: usize) -> Vec<(Vec<u8>, f64)> {
        let count = count.min(self.len());
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            match self {
                SortedSet::Packed(seq) => {
                    let (fpos, spos) = if min {
                        let f = seq.head().expect("pop on empty sorted set");
                        (f, seq.next_pos(f).expect("odd packed sorted set"))
                    } else {
                        let s = seq.tail().expect("pop on empty sorted set");
                        (seq.prev_pos(s).expect("odd packed sorted set"), s)
                    };
                    out.push((seq.get_bytes(fpos), packed_score(seq, spos)));
                    seq.delete(fpos);
                    seq.delete(fpos);
                }
                SortedSet::Indexed(ix) => {
                    let idx = if min { ix.list.first() } else { ix.list.last() }
                        .expect("pop on empty sorted set");
                    let member = ix.list.member_rc(idx);
                    let score = ix.list.score_of(idx);
                    ix.map.remove(&member);
                    ix.list.delete(score, &member);
                    out.push((member.to_vec(), score));
                }
            }
        }
        out
    }

    /// Remove entries with 0-based ranks in [start, stop].
    pub fn remove_range_by_rank(&mut self, start: usize, stop: usize) -> usize {
        match self {
            SortedSet::Packed(seq) => {
                let n = stop - start + 1;
                seq.delete_range((start * 2) as i64, n * 2) / 2
            }
            SortedSet::Indexed(ix) => {
                let map = &mut ix.map;
                ix.list.delete_range_by_rank(start + 1, stop + 1, |member, _| {
                    map.remove(&**member);
                })
            }
        }
    }

    pub fn remove_range_by_score(&mut self, range: &ScoreRange) -> usize {
        match self {
            SortedSet::Packed(seq) => {
                let mut removed = 0;
                let mut pair = packed_first_pair(seq);
                while let Some((fpos, spos)) = pair {
                    let score = packed_score(seq, spos);
                    if !range.below_max(score) {
                        break;
                    }
                    if range.above_min(score) {
                        seq.delete(fpos);
                        seq.delete(fpos);
                        removed += 1;
                        pair = packed_pair_at(seq, fpos);
                    } else {
                        pair = packed_next_pair(seq, spos);
                    }
                }
                removed
            }
            SortedSet::Indexed(ix) => {
                let map = &mut ix.map;
                ix.list.delete_range_by_score(range, |member, _| {
                    map.remove(&**member);
                })
            }
        }
    }

    pub fn remove_range_by_lex(&mut self, range: &LexRange) -> usize {
        match self {
            SortedSet::Packed(seq) => {
                let mut removed = 0;
                let mut pair = packed_first_pair(seq);
                while let Some((fpos, spos)) = pair {
                    let member = seq.get_bytes(fpos);
                    if !range.below_max(&member) {
                        break;
                    }
                    if range.above_min(&member) {
                        seq.delete(fpos);
                        seq.delete(fpos);
                        removed += 1;
                        pair = packed_pair_at(seq, fpos);
                    } else {
                        pair = packed_next_pair(seq, spos);
                    }
                }
                removed
            }
            SortedSet::Indexed(ix) => {
                let map = &mut ix.map;
                ix.list.delete_range_by_lex(range, |member, _| {
                    map.remove(&**member);
                })
            }
        }
    }

    /// All entries in (score, member) order.
    pub fn entries(&self) -> Vec<(Vec<u8>, f64)> {
        let mut out = Vec::with_capacity(self.len());
        self.for_each(&mut |member, score| out.push((member.to_vec(), score)));
        out
    }

    fn for_each(&self, f: &mut dyn FnMut(&[u8], f64)) {
        match self {
            SortedSet::Packed(seq) => {
                let mut pair = packed_first_pair(seq);
                while let Some((fpos, spos)) = pair {
                    f(&seq.get_bytes(fpos), packed_score(seq, spos));
                    pair = packed_next_pair(seq, spos);
                }
            }
            SortedSet::Indexed(ix) => {
                let mut node = ix.list.first();
                while let Some(idx) = node {
                    f(ix.list.member_of(idx), ix.list.score_of(idx));
                    node = ix.list.next_of(idx);
                }
            }
        }
    }

    // ---- walking helpers ----

    /// Call `visit` for each entry in the score range, in rank order
    /// (reversed when `rev`), until it returns false.
    fn walk_score_range(
        &self,
        range: &ScoreRange,
        rev: bool,
        mut visit: impl FnMut(&[u8], f64) -> bool,
    ) {
        match self {
            SortedSet::Packed(seq) => {
                if rev {
                    // The tail scan mirrors `last_in_range`: walk back
                    // until the score drops below the max bound.
                    let mut pair = packed_last_pair(seq);
                    while let Some((fpos, spos)) = pair {
                        let score = packed_score(seq, spos);
                        if range.below_max(score) {
                            if !range.above_min(score) {
                                break;
                            }
                            if !visit(&seq.get_bytes(fpos), score) {
                                break;
                            }
                        }
                        pair = packed_prev_pair(seq, fpos);
                    }
                } else {
                    let mut pair = packed_first_pair(seq);
                    while let Some((fpos, spos)) = pair {
                        let score = packed_score(seq, spos);
                        if range.above_min(score) {
                            if !range.below_max(score) {
                                break;
                            }
                            if !visit(&seq.get_bytes(fpos), score) {
                                break;
                            }
                        }
                        pair = packed_next_pair(seq, spos);
                    }
                }
            }
            SortedSet::Indexed(ix) => {
                let mut node = if rev {
                    ix.list.last_in_range(range)
                } else {
                    ix.list.first_in_range(range)
                };
                while let Some(idx) = node {
                    let score = ix.list.score_of(idx);
                    if !range.contains(score) {
                        break;
                    }
                    if !visit(ix.list.member_of(idx), score) {
                        break;
                    }
                    node = if rev { ix.list.prev_of(idx) } else { ix.list.next_of(idx) };
                }
            }
        }
    }

    fn walk_lex_range(
        &self,
        range: &LexRange,
        rev: bool,
        mut visit: impl FnMut(&[u8], f64) -> bool,
    ) {
        match self {
            SortedSet::Packed(seq) => {
                if rev {
                    let mut pair = packed_last_pair(seq);
                    while let Some((fpos, spos)) = pair {
                        let member = seq.get_bytes(fpos);
                        if range.below_max(&member) {
                            if !range.above_min(&member) {
                                break;
                            }
                            if !visit(&member, packed_score(seq, spos)) {
                                break;
                            }
                        }
                        pair = packed_prev_pair(seq, fpos);
                    }
                } else {
                    let mut pair = packed_first_pair(seq);
                    while let Some((fpos, spos)) = pair {
                        let member = seq.get_bytes(fpos);
                        if range.above_min(&member) {
                            if !range.below_max(&member) {
                                break;
                            }
                            if !visit(&member, packed_score(seq, spos)) {
                                break;
                            }
                        }
                        pair = packed_next_pair(seq, spos);
                    }
                }
            }
            SortedSet::Indexed(ix) => {
                let mut node = if rev {
                    ix.list.last_in_lex(range)
                } else {
                    ix.list.first_in_lex(range)
                };
                while let Some(idx) = node {
                    let member = ix.list.member_of(idx);
                    if !range.contains(member) {
                        break;
                    }
                    if !visit(member, ix.list.score_of(idx)) {
                        break;
                    }
                    node = if rev { ix.list.prev_of(idx) } else { ix.list.next_of(idx) };
                }
            }
        }
    }

    // ---- mutation internals ----

    fn insert_new(&mut self, config: &Config, member: &[u8], score: f64) {
        match self {
            SortedSet::Packed(seq) => {
                packed_insert(seq, member, score);
                if seq.len() / 2 > config.zset_max_packed_entries
                    || member.len() > config.zset_max_packed_value_bytes
                {
                    self.convert_to_indexed();
                }
            }
            SortedSet::Indexed(ix) => {
                let shared: Rc<[u8]> = Rc::from(member);
                ix.map.insert(Rc::clone(&shared), nn(score));
                ix.list.insert(nn(score), shared);
            }
        }
    }

    fn update(&mut self, member: &[u8], old_score: f64, new_score: f64) {
        match self {
            SortedSet::Packed(seq) => {
                let (fpos, _) = packed_find(seq, member).expect("update of absent member");
                seq.delete(fpos);
                seq.delete(fpos);
                packed_insert(seq, member, new_score);
            }
            SortedSet::Indexed(ix) => {
                let slot = ix.map.get_mut(member).expect("update of absent member");
                *slot = nn(new_score);
                ix.list.update_score(old_score, member, nn(new_score));
            }
        }
    }

    /// One-shot packed → indexed conversion.
    fn convert_to_indexed(&mut self) {
        let SortedSet::Packed(seq) = self else {
            panic!("sorted set: conversion from indexed form happens only via bulk builds")
        };
        let mut ix = Indexed { list: SkipList::new(), map: new_map() };
        ix.map.reserve(seq.len() / 2);
        let mut pair = packed_first_pair(seq);
        while let Some((fpos, spos)) = pair {
            let member: Rc<[u8]> = Rc::from(&seq.get_bytes(fpos)[..]);
            let score = packed_score(seq, spos);
            if ix.map.insert(Rc::clone(&member), nn(score)).is_some() {
                panic!("sorted set packed form contains a duplicate member");
            }
            ix.list.insert(nn(score), member);
            pair = packed_next_pair(seq, spos);
        }
        debug!(members = ix.map.len(), "sorted set converted to indexed encoding");
        *self = SortedSet::Indexed(ix);
    }

    /// Build a set from aggregated (member, score) pairs, picking the
    /// destination encoding by the thresholds. This is the one place an
    /// indexed source can yield a packed result.
    pub fn from_pairs(config: &Config, mut pairs: Vec<(Vec<u8>, f64)>) -> SortedSet {
        pairs.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let fits_packed = pairs.len() <= config.zset_max_packed_entries
            && pairs.iter().all(|(m, _)| m.len() <= config.zset_max_packed_value_bytes);

        if fits_packed {
            let mut seq = PackedSeq::new();
            for (member, score) in &pairs {
                seq.push_tail(member);
                seq.push_tail(&format_double(*score));
            }
            SortedSet::Packed(seq)
        } else {
            let mut ix = Indexed { list: SkipList::new(), map: new_map() };
            ix.map.reserve(pairs.len());
            for (member, score) in pairs {
                let shared: Rc<[u8]> = Rc::from(&member[..]);
                if ix.map.insert(Rc::clone(&shared), nn(score)).is_some() {
                    panic!("bulk build produced a duplicate member");
                }
                ix.list.insert(nn(score), shared);
            }
            SortedSet::Indexed(ix)
        }
    }
}

/// Union of weighted sources: every member, scores aggregated.
pub fn union(sources: &[(ZSource<'_>, f64)], agg: Aggregate) -> Vec<(Vec<u8>, f64)> {
    let mut acc: Xxh3Map<Vec<u8>, f64> = new_map();
    for (source, weight) in sources {
        source.for_each(|member, score| {
            let score = weighted(score, *weight);
            acc.entry(member.to_vec())
                .and_modify(|slot| *slot = agg.apply(*slot, score))
                .or_insert(score);
        });
    }
    acc.into_iter().collect()
}

/// Intersection of weighted sources: iterates the smallest source and
/// probes the others, in ascending-cardinality order. A source appearing
/// twice intersects with itself trivially — membership probes do not care
/// about identity.
pub fn intersect(sources: &[(ZSource<'_>, f64)], agg: Aggregate) -> Vec<(Vec<u8>, f64)> {
    if sources.is_empty() || sources.iter().any(|(s, _)| s.len() == 0) {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..sources.len()).collect();
    order.sort_by_key(|&i| sources[i].0.len());

    let (smallest, smallest_weight) = &sources[order[0]];
    let mut out = Vec::new();
    smallest.for_each(|member, score| {
        let mut agg_score = weighted(score, *smallest_weight);
        for &i in &order[1..] {
            let (source, weight) = &sources[i];
            let Some(other) = source.score_of(member) else { return };
            agg_score = agg.apply(agg_score, weighted(other, *weight));
        }
        out.push((member.to_vec(), agg_score));
    });
    out
}

// ---- packed-form helpers ----
//
// The packed layout interleaves member and score entries, ordered by
// (score, member). A "pair" is (member position, score position).

fn packed_first_pair(seq: &PackedSeq) -> Option<(usize, usize)> {
    let fpos = seq.head()?;
    Some((fpos, seq.next_pos(fpos).expect("odd packed sorted set")))
}

fn packed_last_pair(seq: &PackedSeq) -> Option<(usize, usize)> {
    let spos = seq.tail()?;
    Some((seq.prev_pos(spos).expect("odd packed sorted set"), spos))
}

fn packed_next_pair(seq: &PackedSeq, spos: usize) -> Option<(usize, usize)> {
    let fpos = seq.next_pos(spos)?;
    Some((fpos, seq.next_pos(fpos).expect("odd packed sorted set")))
}

fn packed_prev_pair(seq: &PackedSeq, fpos: usize) -> Option<(usize, usize)> {
    let spos = seq.prev_pos(fpos)?;
    Some((seq.prev_pos(spos).expect("odd packed sorted set"), spos))
}

/// Pair starting at a known member position (used after deletions shift
/// the successor into place). None when `fpos` is past the end.
fn packed_pair_at(seq: &PackedSeq, fpos: usize) -> Option<(usize, usize)> {
    if fpos >= seq.bytes_len() - 1 || seq.len() == 0 {
        return None;
    }
    // fpos addresses a member entry iff anything remains at it.
    let spos = seq.next_pos(fpos).expect("odd packed sorted set");
    Some((fpos, spos))
}

fn packed_score(seq: &PackedSeq, spos: usize) -> f64 {
    match seq.get(spos) {
        PackedValue::Int(i) => i as f64,
        PackedValue::Bytes(b) => parse_float(b)
            .unwrap_or_else(|_| panic!("corrupted packed sorted set: unparsable score")),
    }
}

fn packed_find(seq: &PackedSeq, member: &[u8]) -> Option<(usize, usize)> {
    let head = seq.head()?;
    let fpos = seq.find_from(head, member, 1)?;
    Some((fpos, seq.next_pos(fpos).expect("odd packed sorted set")))
}

/// Ordered insert: before the first pair that sorts after (score, member).
fn packed_insert(seq: &mut PackedSeq, member: &[u8], score: f64) {
    let mut pair = packed_first_pair(seq);
    while let Some((fpos, spos)) = pair {
        let existing_score = packed_score(seq, spos);
        let after = existing_score > score
            || (existing_score == score && seq.get_bytes(fpos)[..] > *member);
        if after {
            seq.insert_before(fpos, member);
            let spos = seq
                .next_pos(fpos)
                .expect("entry inserted before another has a successor");
            seq.insert_before(spos, &format_double(score));
            return;
        }
        pair = packed_next_pair(seq, spos);
    }
    seq.push_tail(member);
    seq.push_tail(&format_double(score));
}
