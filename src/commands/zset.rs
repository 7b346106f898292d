//! Sorted-set command handlers.

use crate::blocking::WaitKind;
use crate::db::{ClientId, EventClass};
use crate::error::{Error, Result};
use crate::num::{format_double, parse_float, parse_int};
use crate::reply::Reply;
use crate::server::{Outcome, Server};
use crate::skiplist::{LexRange, ScoreRange};
use crate::value::Value;
use crate::zset::{Aggregate, AddFlags, AddOutcome, SortedSet, ZSource, intersect, union};

use super::{arity, normalise_range, parse_index, parse_timeout_ms, reply};

fn flat_entries(entries: Vec<(Vec<u8>, f64)>, withscores: bool) -> Reply {
    let mut out = Vec::with_capacity(entries.len() * if withscores { 2 } else { 1 });
    for (member, score) in entries {
        out.push(Reply::Bulk(member));
        if withscores {
            out.push(Reply::Double(score));
        }
    }
    Reply::Array(out)
}

pub(super) fn zadd(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() >= 4)?;
    let key = &argv[1];

    let mut flags = AddFlags::default();
    let mut ch = false;
    let mut i = 2;
    while i < argv.len() {
        match argv[i].to_ascii_lowercase().as_slice() {
            b"nx" => flags.nx = true,
            b"xx" => flags.xx = true,
            b"ch" => ch = true,
            b"incr" => flags.incr = true,
            _ => break,
        }
        i += 1;
    }
    if flags.nx && flags.xx {
        return Err(Error::NxAndXx);
    }
    let rest = &argv[i..];
    arity(!rest.is_empty() && rest.len() % 2 == 0)?;

    // Every score parses before anything mutates.
    let mut pairs: Vec<(f64, &[u8])> = Vec::with_capacity(rest.len() / 2);
    for pair in rest.chunks_exact(2) {
        pairs.push((parse_float(&pair[0])?, pair[1].as_slice()));
    }
    if flags.incr && pairs.len() > 1 {
        return Err(Error::IncrSinglePair);
    }

    let existed = server.db.zset_read(key)?.is_some();
    if !existed {
        if flags.xx {
            return reply(if flags.incr { Reply::Null } else { Reply::Int(0) });
        }
        let fresh = SortedSet::new(&server.config, pairs[0].1.len());
        server.db.add(key.to_vec(), Value::SortedSet(fresh));
    }

    let config = server.config.clone();
    let zset = server.db.zset_write(key)?.expect("sorted set just created");
    let mut added = 0i64;
    let mut changed = 0i64;
    let mut incr_score = None;
    let mut failure = None;
    for &(score, member) in &pairs {
        match zset.add(&config, member, score, flags) {
            Ok(AddOutcome::Added(s)) => {
                added += 1;
                incr_score = Some(s);
            }
            Ok(AddOutcome::Updated(s)) => {
                changed += 1;
                incr_score = Some(s);
            }
            Ok(AddOutcome::Unchanged(s)) => incr_score = Some(s),
            Ok(AddOutcome::Skipped) => incr_score = None,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    if let Some(e) = failure {
        if !existed {
            server.delete_if_empty(key);
        }
        return Err(e);
    }

    if added + changed > 0 {
        server.db.signal_modified(key);
        server.db.notify_event(EventClass::SortedSet, "zadd", key);
        server.db.signal_ready(key);
        server.propagate(argv.to_vec());
    }
    if flags.incr {
        reply(incr_score.map_or(Reply::Null, Reply::Double))
    } else {
        reply(Reply::Int(if ch { added + changed } else { added }))
    }
}

pub(super) fn zincrby(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let delta = parse_float(&argv[2])?;
    let key = &argv[1];
    let member = &argv[3];

    if server.db.zset_read(key)?.is_none() {
        let fresh = SortedSet::new(&server.config, member.len());
        server.db.add(key.to_vec(), Value::SortedSet(fresh));
    }
    let config = server.config.clone();
    let zset = server.db.zset_write(key)?.expect("sorted set just created");
    let flags = AddFlags { incr: true, ..AddFlags::default() };
    let score = match zset.add(&config, member, delta, flags)? {
        AddOutcome::Added(s) | AddOutcome::Updated(s) | AddOutcome::Unchanged(s) => s,
        AddOutcome::Skipped => unreachable!("no NX/XX flag set"),
    };
    server.db.signal_modified(key);
    server.db.notify_event(EventClass::SortedSet, "zincr", key);
    server.db.signal_ready(key);
    server.propagate(argv.to_vec());
    reply(Reply::Double(score))
}

pub(super) fn zrem(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() >= 3)?;
    let key = &argv[1];
    let Some(zset) = server.db.zset_write(key)? else {
        return reply(Reply::Int(0));
    };
    let mut removed = 0;
    for member in &argv[2..] {
        if zset.delete(member) {
            removed += 1;
        }
    }
    if removed > 0 {
        server.db.signal_modified(key);
        server.db.notify_event(EventClass::SortedSet, "zrem", key);
        server.propagate(argv.to_vec());
        server.delete_if_empty(key);
    }
    reply(Reply::Int(removed))
}

pub(super) fn zcard(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 2)?;
    let len = server.db.zset_read(&argv[1])?.map_or(0, SortedSet::len);
    reply(Reply::Int(len as i64))
}

pub(super) fn zscore(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 3)?;
    let score = server
        .db
        .zset_read(&argv[1])?
        .and_then(|z| z.score_of(&argv[2]));
    reply(score.map_or(Reply::Null, Reply::Double))
}

pub(super) fn zrank(server: &mut Server, argv: &[Vec<u8>], rev: bool) -> Result<Outcome> {
    arity(argv.len() == 3)?;
    let rank = server
        .db
        .zset_read(&argv[1])?
        .and_then(|z| z.rank_of(&argv[2], rev));
    reply(rank.map_or(Reply::Null, |r| Reply::Int(r as i64)))
}

pub(super) fn zrange(server: &mut Server, argv: &[Vec<u8>], rev: bool) -> Result<Outcome> {
    arity(argv.len() == 4 || argv.len() == 5)?;
    let withscores = match argv.get(4) {
        None => false,
        Some(opt) if opt.eq_ignore_ascii_case(b"withscores") => true,
        Some(_) => return Err(Error::Syntax),
    };
    let start = parse_index(&argv[2])?;
    let stop = parse_index(&argv[3])?;

    let Some(zset) = server.db.zset_read(&argv[1])? else {
        return reply(Reply::Array(Vec::new()));
    };
    let Some((start, stop)) = normalise_range(start, stop, zset.len()) else {
        return reply(Reply::Array(Vec::new()));
    };
    reply(flat_entries(zset.range_by_rank(start, stop, rev), withscores))
}

/// Shared option tail of the by-score/by-lex ranges:
/// [WITHSCORES] [LIMIT offset count].
struct RangeOptions {
    withscores: bool,
    offset: i64,
    count: Option<usize>,
}

fn parse_range_options(args: &[Vec<u8>], allow_scores: bool) -> Result<RangeOptions> {
    let mut opts = RangeOptions { withscores: false, offset: 0, count: None };
    let mut i = 0;
    while i < args.len() {
        let token = args[i].to_ascii_lowercase();
        match token.as_slice() {
            b"withscores" if allow_scores => {
                opts.withscores = true;
                i += 1;
            }
            b"limit" if args.len() - i >= 3 => {
                opts.offset = parse_int(&args[i + 1])?;
                let count = parse_int(&args[i + 2])?;
                opts.count = if count < 0 { None } else { Some(count as usize) };
                i += 3;
            }
            _ => return Err(Error::Syntax),
        }
    }
    Ok(opts)
}

pub(super) fn zrangebyscore(
    server: &mut Server,
    argv: &[Vec<u8>],
    rev: bool,
) -> Result<Outcome> {
    arity(argv.len() >= 4)?;
    let (min, max) = if rev { (&argv[3], &argv[2]) } else { (&argv[2], &argv[3]) };
    let range = ScoreRange::parse(min, max)?;
    let opts = parse_range_options(&argv[4..], true)?;

    let Some(zset) = server.db.zset_read(&argv[1])? else {
        return reply(Reply::Array(Vec::new()));
    };
    if opts.offset < 0 {
        return reply(Reply::Array(Vec::new()));
    }
    let entries = zset.range_by_score(&range, rev, opts.offset as usize, opts.count);
    reply(flat_entries(entries, opts.withscores))
}

pub(super) fn zrangebylex(server: &mut Server, argv: &[Vec<u8>], rev: bool) -> Result<Outcome> {
    arity(argv.len() >= 4)?;
    let (min, max) = if rev { (&argv[3], &argv[2]) } else { (&argv[2], &argv[3]) };
    let range = LexRange::parse(min, max)?;
    let opts = parse_range_options(&argv[4..], false)?;

    let Some(zset) = server.db.zset_read(&argv[1])? else {
        return reply(Reply::Array(Vec::new()));
    };
    if opts.offset < 0 {
        return reply(Reply::Array(Vec::new()));
    }
    let entries = zset.range_by_lex(&range, rev, opts.offset as usize, opts.count);
    reply(flat_entries(entries, false))
}

pub(super) fn zcount(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let range = ScoreRange::parse(&argv[2], &argv[3])?;
    let count = server
        .db
        .zset_read(&argv[1])?
        .map_or(0, |z| z.count_in_score_range(&range));
    reply(Reply::Int(count as i64))
}

pub(super) fn zlexcount(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let range = LexRange::parse(&argv[2], &argv[3])?;
    let count = server
        .db
        .zset_read(&argv[1])?
        .map_or(0, |z| z.count_in_lex_range(&range));
    reply(Reply::Int(count as i64))
}

pub(super) fn zremrangebyrank(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let start = parse_index(&argv[2])?;
    let stop = parse_index(&argv[3])?;
    let key = &argv[1];
    let Some(zset) = server.db.zset_write(key)? else {
        return reply(Reply::Int(0));
    };
    let Some((start, stop)) = normalise_range(start, stop, zset.len()) else {
        return reply(Reply::Int(0));
    };
    let removed = zset.remove_range_by_rank(start, stop);
    server.db.signal_modified(key);
    server.db.notify_event(EventClass::SortedSet, "zremrangebyrank", key);
    server.propagate(argv.to_vec());
    server.delete_if_empty(key);
    reply(Reply::Int(removed as i64))
}

pub(super) fn zremrangebyscore(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let range = ScoreRange::parse(&argv[2], &argv[3])?;
    let key = &argv[1];
    let Some(zset) = server.db.zset_write(key)? else {
        return reply(Reply::Int(0));
    };
    let removed = zset.remove_range_by_score(&range);
    if removed > 0 {
        server.db.signal_modified(key);
        server.db.notify_event(EventClass::SortedSet, "zremrangebyscore", key);
        server.propagate(argv.to_vec());
        server.delete_if_empty(key);
    }
    reply(Reply::Int(removed as i64))
}

pub(super) fn zremrangebylex(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let range = LexRange::parse(&argv[2], &argv[3])?;
    let key = &argv[1];
    let Some(zset) = server.db.zset_write(key)? else {
        return reply(Reply::Int(0));
    };
    let removed = zset.remove_range_by_lex(&range);
    if removed > 0 {
        server.db.signal_modified(key);
        server.db.notify_event(EventClass::SortedSet, "zremrangebylex", key);
        server.propagate(argv.to_vec());
        server.delete_if_empty(key);
    }
    reply(Reply::Int(removed as i64))
}

pub(super) fn zpop(server: &mut Server, argv: &[Vec<u8>], min: bool) -> Result<Outcome> {
    arity(argv.len() == 2 || argv.len() == 3)?;
    let count = match argv.get(2) {
        Some(raw) => {
            let n = parse_int(raw)?;
            if n < 0 {
                return Err(Error::IndexOutOfRange);
            }
            n as usize
        }
        None => 1,
    };
    let key = &argv[1];
    let Some(zset) = server.db.zset_write(key)? else {
        return reply(Reply::Array(Vec::new()));
    };
    let popped = zset.pop_extreme(min, count);
    if !popped.is_empty() {
        server.db.signal_modified(key);
        server.db.notify_event(
            EventClass::SortedSet,
            if min { "zpopmin" } else { "zpopmax" },
            key,
        );
        server.propagate(argv.to_vec());
        server.delete_if_empty(key);
    }
    reply(flat_entries(popped, true))
}

pub(super) fn blocking_zpop(
    server: &mut Server,
    client: ClientId,
    argv: &[Vec<u8>],
    min: bool,
) -> Result<Outcome> {
    arity(argv.len() >= 3)?;
    let deadline = parse_timeout_ms(&argv[argv.len() - 1])?
        .map(|ms| server.now_ms() + ms);
    let keys: Vec<Vec<u8>> = argv[1..argv.len() - 1].to_vec();

    for key in &keys {
        let Some(zset) = server.db.zset_write(key)? else { continue };
        let (member, score) = zset
            .pop_extreme(min, 1)
            .into_iter()
            .next()
            .expect("keyspace held an empty sorted set");
        let (event, effective): (_, &[u8]) =
            if min { ("zpopmin", b"zpopmin") } else { ("zpopmax", b"zpopmax") };
        server.db.signal_modified(key);
        server.db.notify_event(EventClass::SortedSet, event, key);
        server.propagate(vec![effective.to_vec(), key.clone()]);
        server.delete_if_empty(key);
        return reply(Reply::Array(vec![
            Reply::bulk(key.clone()),
            Reply::Bulk(member),
            Reply::Double(score),
        ]));
    }

    if server.in_multi(client) {
        return reply(Reply::NullArray);
    }
    server.blocking.register(
        &mut server.db,
        client,
        keys,
        WaitKind::ZSetPop { min },
        None,
        deadline,
    );
    Ok(Outcome::Blocked)
}

pub(super) fn union_inter_store(
    server: &mut Server,
    argv: &[Vec<u8>],
    is_union: bool,
) -> Result<Outcome> {
    arity(argv.len() >= 4)?;
    let dest = &argv[1];
    let numkeys = parse_int(&argv[2])?;
    if numkeys <= 0 {
        return Err(Error::Syntax);
    }
    let numkeys = numkeys as usize;
    arity(argv.len() >= 3 + numkeys)?;
    let keys = &argv[3..3 + numkeys];

    let mut weights = vec![1.0f64; numkeys];
    let mut aggregate = Aggregate::Sum;
    let mut i = 3 + numkeys;
    while i < argv.len() {
        match argv[i].to_ascii_lowercase().as_slice() {
            b"weights" if argv.len() - i > numkeys => {
                for (w, raw) in weights.iter_mut().zip(&argv[i + 1..i + 1 + numkeys]) {
                    *w = parse_float(raw)?;
                }
                i += 1 + numkeys;
            }
            b"aggregate" if argv.len() - i >= 2 => {
                aggregate = Aggregate::parse(&argv[i + 1])?;
                i += 2;
            }
            _ => return Err(Error::Syntax),
        }
    }

    let config = server.config.clone();
    let (count, built) = {
        // Wrong-typed sources abort before the destination is touched.
        let mut sources: Vec<Option<(ZSource<'_>, f64)>> = Vec::with_capacity(numkeys);
        for (key, weight) in keys.iter().zip(&weights) {
            let entry = match server.db.lookup_read(key) {
                None => None,
                Some(Value::SortedSet(z)) => Some((ZSource::Sorted(z), *weight)),
                Some(Value::Set(s)) => Some((ZSource::Plain(s), *weight)),
                Some(_) => return Err(Error::WrongType),
            };
            sources.push(entry);
        }
        let pairs = if is_union {
            let present: Vec<(ZSource<'_>, f64)> = sources.into_iter().flatten().collect();
            union(&present, aggregate)
        } else if sources.iter().any(Option::is_none) {
            // A missing key intersects everything away.
            Vec::new()
        } else {
            let present: Vec<(ZSource<'_>, f64)> = sources.into_iter().flatten().collect();
            intersect(&present, aggregate)
        };
        let count = pairs.len();
        let built = (count > 0).then(|| SortedSet::from_pairs(&config, pairs));
        (count, built)
    };

    match built {
        Some(value) => {
            server.db.add(dest.to_vec(), Value::SortedSet(value));
            server.db.signal_modified(dest);
            server.db.notify_event(
                EventClass::SortedSet,
                if is_union { "zunionstore" } else { "zinterstore" },
                dest,
            );
            server.propagate(argv.to_vec());
        }
        None => {
            if server.db.remove(dest).is_some() {
                server.db.signal_modified(dest);
                server.db.notify_event(EventClass::Generic, "del", dest);
                server.propagate(argv.to_vec());
            }
        }
    }
    reply(Reply::Int(count as i64))
}

/// Single-sweep scan, as with HSCAN: the cursor engine is external.
pub(super) fn zscan(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 3)?;
    parse_int(&argv[2])?;
    let mut items = Vec::new();
    if let Some(z) = server.db.zset_read(&argv[1])? {
        for (member, score) in z.entries() {
            items.push(Reply::Bulk(member));
            items.push(Reply::Bulk(format_double(score)));
        }
    }
    reply(Reply::Array(vec![Reply::bulk(&b"0"[..]), Reply::Array(items)]))
}
