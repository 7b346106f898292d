//! Span-carrying skip list: the ordered half of the sorted-set dual index.

use std::rc::Rc;

use ordered_float::NotNan;

use crate::error::{Error, Result};
use crate::num::parse_float;

/// Maximum height of a node.
pub const MAX_LEVEL: usize = 32;

/// The chance of adding another level.
const P: f64 = 0.25;

/// Arena slot index. Links are indices, not pointers: no unsafe, stable
/// across arena growth, and freed slots are recycled through a free list.
type NodeIdx = u32;

/// One forward link at one level.
///
/// `span` counts the level-0 steps this link covers (1 at level 0), which
/// is what makes rank queries O(log n): summing spans along the search
/// path yields the rank directly.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
struct Lane {
    forward: Option<NodeIdx>,
    span: usize,
}

#[derive(Debug, PartialEq)]
struct Node {
    score: NotNan<f64>,
    member: Rc<[u8]>,
    /// Level-0 back link, for tail-first iteration.
    backward: Option<NodeIdx>,
    /// 1..=MAX_LEVEL lanes; the node participates in levels 0..lanes.len().
    lanes: Vec<Lane>,
}

/// Probabilistic ordered structure over (score, member) pairs.
///
/// Total order is (score ascending, member byte-lex ascending). NaN never
/// enters: scores are `NotNan` at the type level. The head is a sentinel
/// lane array, not a node; `level` tracks the highest occupied level.
///
/// ```text
/// Level 2:  HEAD ────────────────► (2.0,"b") ─────────────► NIL
/// Level 1:  HEAD ──► (1.0,"a") ──► (2.0,"b") ─────────────► NIL
/// Level 0:  HEAD ──► (1.0,"a") ──► (2.0,"b") ──► (2.0,"c") ► NIL
/// ```
#[derive(Debug, PartialEq)]
pub struct SkipList {
    arena: Vec<Option<Node>>,
    free: Vec<NodeIdx>,
    head: [Lane; MAX_LEVEL],
    tail: Option<NodeIdx>,
    level: usize,
    len: usize,
}

/// Score range with optional exclusive bounds, as parsed from
/// `ZRANGEBYSCORE`-family arguments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
    pub min_exclusive: bool,
    pub max_exclusive: bool,
}

impl ScoreRange {
    /// Parse a (min, max) bound pair. A bound is a float with an optional
    /// `(` prefix marking it exclusive; `-inf` / `+inf` / `inf` accepted.
    pub fn parse(min: &[u8], max: &[u8]) -> Result<ScoreRange> {
        let (min, min_exclusive) = Self::parse_bound(min)?;
        let (max, max_exclusive) = Self::parse_bound(max)?;
        Ok(ScoreRange { min, max, min_exclusive, max_exclusive })
    }

    fn parse_bound(bytes: &[u8]) -> Result<(f64, bool)> {
        let (body, exclusive) = match bytes.first() {
            Some(b'(') => (&bytes[1..], true),
            _ => (bytes, false),
        };
        let value = parse_float(body).map_err(|_| Error::NotAScoreRange)?;
        Ok((value, exclusive))
    }

    /// Whole-range membership test for a single score.
    pub fn contains(&self, score: f64) -> bool {
        self.above_min(score) && self.below_max(score)
    }

    pub fn above_min(&self, score: f64) -> bool {
        if self.min_exclusive { score > self.min } else { score >= self.min }
    }

    pub fn below_max(&self, score: f64) -> bool {
        if self.max_exclusive { score < self.max } else { score <= self.max }
    }

    /// True when no score can satisfy the range.
    pub fn is_vacuous(&self) -> bool {
        self.min > self.max
            || (self.min == self.max && (self.min_exclusive || self.max_exclusive))
    }
}

/// One end of a lexicographic range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexBound {
    NegInf,
    PosInf,
    Inclusive(Vec<u8>),
    Exclusive(Vec<u8>),
}

/// Lexicographic member range, as parsed from `ZRANGEBYLEX`-family
/// arguments: `-` / `+` sentinels, `[item` inclusive, `(item` exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexRange {
    pub min: LexBound,
    pub max: LexBound,
}

impl LexRange {
    pub fn parse(min: &[u8], max: &[u8]) -> Result<LexRange> {
        Ok(LexRange { min: Self::parse_bound(min)?, max: Self::parse_bound(max)? })
    }

    fn parse_bound(bytes: &[u8]) -> Result<LexBound> {
        match bytes {
            b"-" => Ok(LexBound::NegInf),
            b"+" => Ok(LexBound::PosInf),
            _ => match bytes.first() {
                Some(b'[') => Ok(LexBound::Inclusive(bytes[1..].to_vec())),
                Some(b'(') => Ok(LexBound::Exclusive(bytes[1..].to_vec())),
                _ => Err(Error::NotALexRange),
            },
        }
    }

    pub fn above_min(&self, member: &[u8]) -> bool {
        match &self.min {
            LexBound::NegInf => true,
            LexBound::PosInf => false,
            LexBound::Inclusive(m) => member >= &m[..],
            LexBound::Exclusive(m) => member > &m[..],
        }
    }

    pub fn below_max(&self, member: &[u8]) -> bool {
        match &self.max {
            LexBound::NegInf => false,
            LexBound::PosInf => true,
            LexBound::Inclusive(m) => member <= &m[..],
            LexBound::Exclusive(m) => member < &m[..],
        }
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.above_min(member) && self.below_max(member)
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkipList {
    pub fn new() -> Self {
        SkipList {
            arena: Vec::new(),
            free: Vec::new(),
            head: [Lane::default(); MAX_LEVEL],
            tail: None,
            level: 1,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First node in order.
    pub fn first(&self) -> Option<NodeIdx> {
        self.head[0].forward
    }

    /// Last node in order.
    pub fn last(&self) -> Option<NodeIdx> {
        self.tail
    }

    pub fn score_of(&self, idx: NodeIdx) -> f64 {
        *self.node(idx).score
    }

    pub fn member_of(&self, idx: NodeIdx) -> &[u8] {
        &self.node(idx).member
    }

    /// The member's shared allocation, for handing to the companion map.
    pub fn member_rc(&self, idx: NodeIdx) -> Rc<[u8]> {
        Rc::clone(&self.node(idx).member)
    }

    pub fn next_of(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.node(idx).lanes[0].forward
    }

    pub fn prev_of(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.node(idx).backward
    }

    /// Insert a (score, member) pair. The caller guarantees, via the
    /// companion map, that the member is not already present.
    pub fn insert(&mut self, score: NotNan<f64>, member: Rc<[u8]>) -> NodeIdx {
        let mut update: [Option<NodeIdx>; MAX_LEVEL] = [None; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];

        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            while let Some(nxt) = self.lane(x, i).forward {
                if self.precedes(nxt, *score, &member) {
                    rank[i] += self.lane(x, i).span;
                    x = Some(nxt);
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let height = random_level();
        if height > self.level {
            for i in self.level..height {
                rank[i] = 0;
                update[i] = None;
                self.head[i].span = self.len;
            }
            self.level = height;
        }

        let idx = self.alloc(score, member, height);
        for i in 0..height {
            let pred = self.lane(update[i], i);
            let (pred_forward, pred_span) = (pred.forward, pred.span);
            let walked = rank[0] - rank[i];

            let lane = &mut self.node_mut(idx).lanes[i];
            lane.forward = pred_forward;
            lane.span = pred_span - walked;

            let pred = self.lane_mut(update[i], i);
            pred.forward = Some(idx);
            pred.span = walked + 1;
        }
        for i in height..self.level {
            self.lane_mut(update[i], i).span += 1;
        }

        self.node_mut(idx).backward = update[0];
        match self.node(idx).lanes[0].forward {
            Some(nxt) => self.node_mut(nxt).backward = Some(idx),
            None => self.tail = Some(idx),
        }
        self.len += 1;
        idx
    }

    /// Delete the node carrying exactly (score, member). Returns the
    /// released member allocation, or `None` without mutating when the
    /// pair is absent.
    pub fn delete(&mut self, score: f64, member: &[u8]) -> Option<Rc<[u8]>> {
        let update = self.predecessors(score, member);
        let x = self.lane(update[0], 0).forward?;
        {
            let n = self.node(x);
            if *n.score != score || &*n.member != member {
                return None;
            }
        }
        Some(self.unlink(x, &update).1)
    }

    /// Change a member's score, keeping its allocation. Mutates in place
    /// when the new score leaves the node between its neighbours,
    /// otherwise unlinks and reinserts.
    pub fn update_score(&mut self, old_score: f64, member: &[u8], new_score: NotNan<f64>) {
        let update = self.predecessors(old_score, member);
        let x = self.lane(update[0], 0).forward.unwrap_or_else(|| {
            panic!("skiplist: update_score on absent member")
        });
        {
            let n = self.node(x);
            assert!(
                *n.score == old_score && &*n.member == member,
                "skiplist: update_score on absent member"
            );
        }

        let fits_before = match self.node(x).backward {
            None => true,
            Some(b) => *self.node(b).score < *new_score,
        };
        let fits_after = match self.node(x).lanes[0].forward {
            None => true,
            Some(f) => *self.node(f).score > *new_score,
        };
        if fits_before && fits_after {
            self.node_mut(x).score = new_score;
            return;
        }

        let (_, member) = self.unlink(x, &update);
        self.insert(new_score, member);
    }

    /// 1-based rank of (score, member); 0 when absent.
    pub fn rank_of(&self, score: f64, member: &[u8]) -> usize {
        let mut rank = 0usize;
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                let n = self.node(nxt);
                if (*n.score, &*n.member) <= (score, member) {
                    rank += self.lane(x, i).span;
                    x = Some(nxt);
                } else {
                    break;
                }
            }
            if let Some(xi) = x {
                if &*self.node(xi).member == member {
                    return rank;
                }
            }
        }
        0
    }

    /// Node at 1-based rank `r`.
    pub fn node_at_rank(&self, r: usize) -> Option<NodeIdx> {
        if r == 0 || r > self.len {
            return None;
        }
        let mut traversed = 0usize;
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                if traversed + self.lane(x, i).span <= r {
                    traversed += self.lane(x, i).span;
                    x = Some(nxt);
                } else {
                    break;
                }
            }
            if traversed == r {
                return x;
            }
        }
        None
    }

    /// Whether any node falls inside the score range. Probes the ends
    /// first, so a disjoint range rejects in O(1).
    pub fn is_in_range(&self, range: &ScoreRange) -> bool {
        if range.is_vacuous() {
            return false;
        }
        let Some(tail) = self.tail else { return false };
        if !range.above_min(*self.node(tail).score) {
            return false;
        }
        let first = self.head[0].forward.unwrap();
        range.below_max(*self.node(first).score)
    }

    /// First node with score inside the range.
    pub fn first_in_range(&self, range: &ScoreRange) -> Option<NodeIdx> {
        if !self.is_in_range(range) {
            return None;
        }
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                if !range.above_min(*self.node(nxt).score) {
                    x = Some(nxt);
                } else {
                    break;
                }
            }
        }
        let first = self.lane(x, 0).forward.unwrap();
        range.below_max(*self.node(first).score).then_some(first)
    }

    /// Last node with score inside the range.
    pub fn last_in_range(&self, range: &ScoreRange) -> Option<NodeIdx> {
        if !self.is_in_range(range) {
            return None;
        }
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                if range.below_max(*self.node(nxt).score) {
                    x = Some(nxt);
                } else {
                    break;
                }
            }
        }
        let last = x.unwrap_or_else(|| panic!("skiplist: range probe passed but walk found nothing"));
        range.above_min(*self.node(last).score).then_some(last)
    }

    /// Whether any node falls inside the lex range.
    pub fn is_in_lex_range(&self, range: &LexRange) -> bool {
        // A vacuous lex range: min above max.
        match (&range.min, &range.max) {
            (LexBound::PosInf, _) | (_, LexBound::NegInf) => return false,
            (LexBound::Inclusive(a) | LexBound::Exclusive(a),
             LexBound::Inclusive(b) | LexBound::Exclusive(b)) => {
                if a > b
                    || (a == b
                        && (matches!(range.min, LexBound::Exclusive(_))
                            || matches!(range.max, LexBound::Exclusive(_))))
                {
                    return false;
                }
            }
            _ => {}
        }
        let Some(tail) = self.tail else { return false };
        if !range.above_min(&self.node(tail).member) {
            return false;
        }
        let first = self.head[0].forward.unwrap();
        range.below_max(&self.node(first).member)
    }

    pub fn first_in_lex(&self, range: &LexRange) -> Option<NodeIdx> {
        if !self.is_in_lex_range(range) {
            return None;
        }
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                if !range.above_min(&self.node(nxt).member) {
                    x = Some(nxt);
                } else {
                    break;
                }
            }
        }
        let first = self.lane(x, 0).forward.unwrap();
        range.below_max(&self.node(first).member).then_some(first)
    }

    pub fn last_in_lex(&self, range: &LexRange) -> Option<NodeIdx> {
        if !self.is_in_lex_range(range) {
            return None;
        }
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                if range.below_max(&self.node(nxt).member) {
                    x = Some(nxt);
                } else {
                    break;
                }
            }
        }
        let last = x.unwrap_or_else(|| panic!("skiplist: lex probe passed but walk found nothing"));
        range.above_min(&self.node(last).member).then_some(last)
    }

    /// Delete every node with score in the range, reporting each
    /// (member, score) to `released` before the node is unlinked — the
    /// owner drops its map entry there, keeping the map-first ordering.
    pub fn delete_range_by_score<F>(&mut self, range: &ScoreRange, mut released: F) -> usize
    where
        F: FnMut(&Rc<[u8]>, f64),
    {
        let mut update: [Option<NodeIdx>; MAX_LEVEL] = [None; MAX_LEVEL];
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                if !range.above_min(*self.node(nxt).score) {
                    x = Some(nxt);
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let mut removed = 0;
        let mut cur = self.lane(update[0], 0).forward;
        while let Some(idx) = cur {
            if !range.below_max(*self.node(idx).score) {
                break;
            }
            cur = self.node(idx).lanes[0].forward;
            let (score, member) = (*self.node(idx).score, self.member_rc(idx));
            released(&member, score);
            self.unlink(idx, &update);
            removed += 1;
        }
        removed
    }

    /// Delete every node with member in the lex range.
    pub fn delete_range_by_lex<F>(&mut self, range: &LexRange, mut released: F) -> usize
    where
        F: FnMut(&Rc<[u8]>, f64),
    {
        let mut update: [Option<NodeIdx>; MAX_LEVEL] = [None; MAX_LEVEL];
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                if !range.above_min(&self.node(nxt).member) {
                    x = Some(nxt);
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let mut removed = 0;
        let mut cur = self.lane(update[0], 0).forward;
        while let Some(idx) = cur {
            if !range.below_max(&self.node(idx).member) {
                break;
            }
            cur = self.node(idx).lanes[0].forward;
            let (score, member) = (*self.node(idx).score, self.member_rc(idx));
            released(&member, score);
            self.unlink(idx, &update);
            removed += 1;
        }
        removed
    }

    /// Delete nodes with 1-based rank in [start, end], both inclusive.
    pub fn delete_range_by_rank<F>(&mut self, start: usize, end: usize, mut released: F) -> usize
    where
        F: FnMut(&Rc<[u8]>, f64),
    {
        let mut update: [Option<NodeIdx>; MAX_LEVEL] = [None; MAX_LEVEL];
        let mut traversed = 0usize;
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                if traversed + self.lane(x, i).span < start {
                    traversed += self.lane(x, i).span;
                    x = Some(nxt);
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let mut removed = 0;
        let mut rank = traversed + 1;
        let mut cur = self.lane(update[0], 0).forward;
        while let Some(idx) = cur {
            if rank > end {
                break;
            }
            cur = self.node(idx).lanes[0].forward;
            let (score, member) = (*self.node(idx).score, self.member_rc(idx));
            released(&member, score);
            self.unlink(idx, &update);
            removed += 1;
            rank += 1;
        }
        removed
    }

    // ---- internals ----

    fn node(&self, idx: NodeIdx) -> &Node {
        match &self.arena[idx as usize] {
            Some(n) => n,
            None => panic!("skiplist: vacant arena slot {idx}"),
        }
    }

    fn node_mut(&mut self, idx: NodeIdx) -> &mut Node {
        match &mut self.arena[idx as usize] {
            Some(n) => n,
            None => panic!("skiplist: vacant arena slot {idx}"),
        }
    }

    /// Lane `i` of node `idx`, or of the head sentinel when `idx` is None.
    fn lane(&self, idx: Option<NodeIdx>, i: usize) -> &Lane {
        match idx {
            Some(n) => &self.node(n).lanes[i],
            None => &self.head[i],
        }
    }

    fn lane_mut(&mut self, idx: Option<NodeIdx>, i: usize) -> &mut Lane {
        match idx {
            Some(n) => &mut self.node_mut(n).lanes[i],
            None => &mut self.head[i],
        }
    }

    /// True when node `idx` orders strictly before (score, member).
    fn precedes(&self, idx: NodeIdx, score: f64, member: &[u8]) -> bool {
        let n = self.node(idx);
        (*n.score, &*n.member) < (score, member)
    }

    /// Rightmost predecessor at every level for the exact pair.
    fn predecessors(&self, score: f64, member: &[u8]) -> [Option<NodeIdx>; MAX_LEVEL] {
        let mut update: [Option<NodeIdx>; MAX_LEVEL] = [None; MAX_LEVEL];
        let mut x: Option<NodeIdx> = None;
        for i in (0..self.level).rev() {
            while let Some(nxt) = self.lane(x, i).forward {
                if self.precedes(nxt, score, member) {
                    x = Some(nxt);
                } else {
                    break;
                }
            }
            update[i] = x;
        }
        update
    }

    /// Unlink `x` given its per-level predecessors; spans at levels the
    /// node does not reach shrink by one, levels it does reach absorb its
    /// span. Returns the released (score, member).
    fn unlink(&mut self, x: NodeIdx, update: &[Option<NodeIdx>; MAX_LEVEL]) -> (f64, Rc<[u8]>) {
        let height = self.node(x).lanes.len();
        for i in 0..self.level {
            if i < height && self.lane(update[i], i).forward == Some(x) {
                let (x_forward, x_span) = {
                    let l = &self.node(x).lanes[i];
                    (l.forward, l.span)
                };
                let pred = self.lane_mut(update[i], i);
                pred.span += x_span;
                pred.span -= 1;
                pred.forward = x_forward;
            } else {
                self.lane_mut(update[i], i).span -= 1;
            }
        }

        let backward = self.node(x).backward;
        match self.node(x).lanes[0].forward {
            Some(nxt) => self.node_mut(nxt).backward = backward,
            None => self.tail = backward,
        }

        while self.level > 1 && self.head[self.level - 1].forward.is_none() {
            self.level -= 1;
        }
        self.len -= 1;

        let node = self.arena[x as usize]
            .take()
            .unwrap_or_else(|| panic!("skiplist: double unlink of slot {x}"));
        self.free.push(x);
        (*node.score, node.member)
    }

    fn alloc(&mut self, score: NotNan<f64>, member: Rc<[u8]>, height: usize) -> NodeIdx {
        let node = Node {
            score,
            member,
            backward: None,
            lanes: vec![Lane::default(); height],
        };
        match self.free.pop() {
            Some(idx) => {
                self.arena[idx as usize] = Some(node);
                idx
            }
            None => {
                self.arena.push(Some(node));
                (self.arena.len() - 1) as NodeIdx
            }
        }
    }

    /// Level-0 rank of node `idx`, for debug validation of spans.
    #[cfg(test)]
    fn rank_by_walk(&self, idx: NodeIdx) -> usize {
        let mut rank = 1;
        let mut cur = self.head[0].forward;
        while let Some(c) = cur {
            if c == idx {
                return rank;
            }
            rank += 1;
            cur = self.node(c).lanes[0].forward;
        }
        panic!("node not reachable at level 0");
    }
}

/// Geometric level sampling: Pr[level >= k] = P^(k-1), capped.
fn random_level() -> usize {
    let mut level = 1;
    while level < MAX_LEVEL && rand::random::<f64>() < P {
        level += 1;
    }
    level
}
