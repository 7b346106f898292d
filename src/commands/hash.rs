//! Hash command handlers.

use crate::db::EventClass;
use crate::error::Result;
use crate::hash::Hash;
use crate::num::{parse_float, parse_int};
use crate::reply::Reply;
use crate::server::{Outcome, Server};
use crate::value::Value;

use super::{arity, reply};

/// Get-or-create the hash at `key`. Creation happens only after argument
/// parsing succeeded, so parse errors never leave an empty value behind.
fn write_handle<'a>(server: &'a mut Server, key: &[u8]) -> Result<&'a mut Hash> {
    if server.db.hash_write(key)?.is_none() {
        server.db.add(key.to_vec(), Value::Hash(Hash::new()));
    }
    Ok(server.db.hash_write(key)?.expect("hash just created"))
}

fn set_pairs(server: &mut Server, argv: &[Vec<u8>]) -> Result<i64> {
    let key = &argv[1];
    let config = server.config.clone();
    let hash = write_handle(server, key)?;
    let mut created = 0;
    for pair in argv[2..].chunks_exact(2) {
        if hash.set(&config, pair[0].clone(), pair[1].clone()) {
            created += 1;
        }
    }
    server.db.signal_modified(key);
    server.db.notify_event(EventClass::Hash, "hset", key);
    server.propagate(argv.to_vec());
    Ok(created)
}

pub(super) fn hset(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() >= 4 && argv.len() % 2 == 0)?;
    let created = set_pairs(server, argv)?;
    reply(Reply::Int(created))
}

pub(super) fn hmset(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() >= 4 && argv.len() % 2 == 0)?;
    set_pairs(server, argv)?;
    reply(Reply::ok())
}

pub(super) fn hsetnx(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let key = &argv[1];
    if server.db.hash_read(key)?.is_some_and(|h| h.exists(&argv[2])) {
        return reply(Reply::Int(0));
    }
    let config = server.config.clone();
    let hash = write_handle(server, key)?;
    hash.set_if_absent(&config, argv[2].clone(), argv[3].clone());
    server.db.signal_modified(key);
    server.db.notify_event(EventClass::Hash, "hset", key);
    server.propagate(argv.to_vec());
    reply(Reply::Int(1))
}

pub(super) fn hget(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 3)?;
    let value = server
        .db
        .hash_read(&argv[1])?
        .and_then(|h| h.get(&argv[2]));
    reply(value.map_or(Reply::Null, Reply::Bulk))
}

pub(super) fn hmget(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() >= 3)?;
    let hash = server.db.hash_read(&argv[1])?;
    let out = argv[2..]
        .iter()
        .map(|field| {
            hash.and_then(|h| h.get(field)).map_or(Reply::Null, Reply::Bulk)
        })
        .collect();
    reply(Reply::Array(out))
}

pub(super) fn hgetall(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 2)?;
    let mut out = Vec::new();
    if let Some(h) = server.db.hash_read(&argv[1])? {
        for (field, value) in h.entries() {
            out.push(Reply::Bulk(field));
            out.push(Reply::Bulk(value));
        }
    }
    reply(Reply::Array(out))
}

pub(super) fn hkeys(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 2)?;
    let out = match server.db.hash_read(&argv[1])? {
        Some(h) => h.entries().into_iter().map(|(f, _)| Reply::Bulk(f)).collect(),
        None => Vec::new(),
    };
    reply(Reply::Array(out))
}

pub(super) fn hvals(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 2)?;
    let out = match server.db.hash_read(&argv[1])? {
        Some(h) => h.entries().into_iter().map(|(_, v)| Reply::Bulk(v)).collect(),
        None => Vec::new(),
    };
    reply(Reply::Array(out))
}

pub(super) fn hdel(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() >= 3)?;
    let key = &argv[1];
    let Some(hash) = server.db.hash_write(key)? else {
        return reply(Reply::Int(0));
    };
    let mut removed = 0;
    for field in &argv[2..] {
        if hash.delete(field) {
            removed += 1;
        }
    }
    if removed > 0 {
        server.db.signal_modified(key);
        server.db.notify_event(EventClass::Hash, "hdel", key);
        server.propagate(argv.to_vec());
        server.delete_if_empty(key);
    }
    reply(Reply::Int(removed))
}

pub(super) fn hlen(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 2)?;
    let len = server.db.hash_read(&argv[1])?.map_or(0, Hash::len);
    reply(Reply::Int(len as i64))
}

pub(super) fn hexists(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 3)?;
    let exists = server
        .db
        .hash_read(&argv[1])?
        .is_some_and(|h| h.exists(&argv[2]));
    reply(Reply::Int(exists as i64))
}

pub(super) fn hstrlen(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 3)?;
    let len = server
        .db
        .hash_read(&argv[1])?
        .map_or(0, |h| h.strlen(&argv[2]));
    reply(Reply::Int(len as i64))
}

pub(super) fn hincrby(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let delta = parse_int(&argv[3])?;
    let key = &argv[1];
    let config = server.config.clone();
    let existed = server.db.hash_read(key)?.is_some();
    let hash = write_handle(server, key)?;
    match hash.incr_by(&config, &argv[2], delta) {
        Ok(updated) => {
            server.db.signal_modified(key);
            server.db.notify_event(EventClass::Hash, "hincrby", key);
            server.propagate(argv.to_vec());
            reply(Reply::Int(updated))
        }
        Err(e) => {
            // A freshly created container must not survive a failed
            // increment.
            if !existed {
                server.db.remove(key);
            }
            Err(e)
        }
    }
}

pub(super) fn hincrbyfloat(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let delta = parse_float(&argv[3])?;
    let key = &argv[1];
    let config = server.config.clone();
    let existed = server.db.hash_read(key)?.is_some();
    let hash = write_handle(server, key)?;
    match hash.incr_by_float(&config, &argv[2], delta) {
        Ok(stored) => {
            server.db.signal_modified(key);
            server.db.notify_event(EventClass::Hash, "hincrbyfloat", key);
            // Replicas replay the exact stored string, not the float
            // arithmetic, so they converge bit-for-bit.
            server.propagate(vec![
                b"hset".to_vec(),
                key.to_vec(),
                argv[2].clone(),
                stored.clone(),
            ]);
            reply(Reply::Bulk(stored))
        }
        Err(e) => {
            if !existed {
                server.db.remove(key);
            }
            Err(e)
        }
    }
}

/// Single-sweep scan: the cursor engine proper is external; every scan
/// here returns the full contents and a zero cursor.
pub(super) fn hscan(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 3)?;
    parse_int(&argv[2])?;
    let mut items = Vec::new();
    if let Some(h) = server.db.hash_read(&argv[1])? {
        for (field, value) in h.entries() {
            items.push(Reply::Bulk(field));
            items.push(Reply::Bulk(value));
        }
    }
    reply(Reply::Array(vec![Reply::bulk(&b"0"[..]), Reply::Array(items)]))
}
