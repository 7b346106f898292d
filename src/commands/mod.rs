//! Command surface: name dispatch plus the per-type handler modules.
//! Handlers parse arguments fully before touching the keyspace, mutate
//! through the typed value APIs, and record replication/propagation
//! records in their effective form.

mod hash;
mod list;
mod zset;

use crate::db::ClientId;
use crate::error::{Error, Result};
use crate::list::End;
use crate::num::{parse_float, parse_int};
use crate::reply::Reply;
use crate::server::{Outcome, Server};

pub(crate) fn dispatch(
    server: &mut Server,
    client: ClientId,
    argv: &[Vec<u8>],
) -> Result<Outcome> {
    if argv.is_empty() {
        return Err(Error::Syntax);
    }
    let name = argv[0].to_ascii_lowercase();
    match name.as_slice() {
        // Hash
        b"hset" => hash::hset(server, argv),
        b"hmset" => hash::hmset(server, argv),
        b"hsetnx" => hash::hsetnx(server, argv),
        b"hget" => hash::hget(server, argv),
        b"hmget" => hash::hmget(server, argv),
        b"hgetall" => hash::hgetall(server, argv),
        b"hkeys" => hash::hkeys(server, argv),
        b"hvals" => hash::hvals(server, argv),
        b"hdel" => hash::hdel(server, argv),
        b"hlen" => hash::hlen(server, argv),
        b"hexists" => hash::hexists(server, argv),
        b"hstrlen" => hash::hstrlen(server, argv),
        b"hincrby" => hash::hincrby(server, argv),
        b"hincrbyfloat" => hash::hincrbyfloat(server, argv),
        b"hscan" => hash::hscan(server, argv),

        // List
        b"lpush" => list::push(server, argv, End::Head, true),
        b"rpush" => list::push(server, argv, End::Tail, true),
        b"lpushx" => list::push(server, argv, End::Head, false),
        b"rpushx" => list::push(server, argv, End::Tail, false),
        b"lpop" => list::pop(server, argv, End::Head),
        b"rpop" => list::pop(server, argv, End::Tail),
        b"llen" => list::llen(server, argv),
        b"lindex" => list::lindex(server, argv),
        b"lset" => list::lset(server, argv),
        b"lrange" => list::lrange(server, argv),
        b"ltrim" => list::ltrim(server, argv),
        b"lrem" => list::lrem(server, argv),
        b"linsert" => list::linsert(server, argv),
        b"rpoplpush" => list::rpoplpush(server, argv),
        b"blpop" => list::blocking_pop(server, client, argv, End::Head),
        b"brpop" => list::blocking_pop(server, client, argv, End::Tail),
        b"brpoplpush" => list::brpoplpush(server, client, argv),

        // Sorted set
        b"zadd" => zset::zadd(server, argv),
        b"zincrby" => zset::zincrby(server, argv),
        b"zrem" => zset::zrem(server, argv),
        b"zcard" => zset::zcard(server, argv),
        b"zscore" => zset::zscore(server, argv),
        b"zrank" => zset::zrank(server, argv, false),
        b"zrevrank" => zset::zrank(server, argv, true),
        b"zrange" => zset::zrange(server, argv, false),
        b"zrevrange" => zset::zrange(server, argv, true),
        b"zrangebyscore" => zset::zrangebyscore(server, argv, false),
        b"zrevrangebyscore" => zset::zrangebyscore(server, argv, true),
        b"zrangebylex" => zset::zrangebylex(server, argv, false),
        b"zrevrangebylex" => zset::zrangebylex(server, argv, true),
        b"zcount" => zset::zcount(server, argv),
        b"zlexcount" => zset::zlexcount(server, argv),
        b"zremrangebyrank" => zset::zremrangebyrank(server, argv),
        b"zremrangebyscore" => zset::zremrangebyscore(server, argv),
        b"zremrangebylex" => zset::zremrangebylex(server, argv),
        b"zunionstore" => zset::union_inter_store(server, argv, true),
        b"zinterstore" => zset::union_inter_store(server, argv, false),
        b"zpopmin" => zset::zpop(server, argv, true),
        b"zpopmax" => zset::zpop(server, argv, false),
        b"bzpopmin" => zset::blocking_zpop(server, client, argv, true),
        b"bzpopmax" => zset::blocking_zpop(server, client, argv, false),
        b"zscan" => zset::zscan(server, argv),

        _ => Err(Error::Syntax),
    }
}

pub(crate) fn reply(r: Reply) -> Result<Outcome> {
    Ok(Outcome::Reply(r))
}

/// Arity guard: malformed shapes are syntax errors before any mutation.
pub(crate) fn arity(ok: bool) -> Result<()> {
    if ok { Ok(()) } else { Err(Error::Syntax) }
}

pub(crate) fn parse_index(bytes: &[u8]) -> Result<i64> {
    parse_int(bytes)
}

/// Normalise a (start, stop) rank window against a length: negative
/// counts from the end, out-of-range clamps, inverted windows are empty.
pub(crate) fn normalise_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
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

/// Parse a blocking timeout in (possibly fractional) seconds into a
/// relative millisecond delay; zero means wait forever.
pub(crate) fn parse_timeout_ms(bytes: &[u8]) -> Result<Option<u64>> {
    let seconds = parse_float(bytes).map_err(|_| Error::InvalidTimeout)?;
    if seconds < 0.0 {
        return Err(Error::NegativeTimeout);
    }
    if !seconds.is_finite() || seconds > (u64::MAX / 1000) as f64 {
        return Err(Error::InvalidTimeout);
    }
    let ms = (seconds * 1000.0) as u64;
    Ok(if ms == 0 { None } else { Some(ms) })
}
