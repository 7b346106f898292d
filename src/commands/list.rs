//! List command handlers, including the blocking pops.

use crate::blocking::WaitKind;
use crate::db::{ClientId, EventClass};
use crate::error::{Error, Result};
use crate::list::{End, List};
use crate::reply::Reply;
use crate::server::{Outcome, Server};
use crate::value::Value;

use super::{arity, parse_index, parse_timeout_ms, reply};

fn push_event(end: End) -> (&'static str, &'static [u8]) {
    match end {
        End::Head => ("lpush", b"lpush"),
        End::Tail => ("rpush", b"rpush"),
    }
}

fn pop_event(end: End) -> (&'static str, &'static [u8]) {
    match end {
        End::Head => ("lpop", b"lpop"),
        End::Tail => ("rpop", b"rpop"),
    }
}

pub(super) fn push(
    server: &mut Server,
    argv: &[Vec<u8>],
    end: End,
    create_missing: bool,
) -> Result<Outcome> {
    arity(argv.len() >= 3)?;
    let key = &argv[1];
    if server.db.list_write(key)?.is_none() {
        if !create_missing {
            return reply(Reply::Int(0));
        }
        let list = List::new(&server.config);
        server.db.add(key.to_vec(), Value::List(list));
    }
    let list = server.db.list_write(key)?.expect("list just created");
    for value in &argv[2..] {
        list.push(end, value);
    }
    let len = list.len();
    let (event, _) = push_event(end);
    server.db.signal_modified(key);
    server.db.notify_event(EventClass::List, event, key);
    server.db.signal_ready(key);
    server.propagate(argv.to_vec());
    reply(Reply::Int(len as i64))
}

pub(super) fn pop(server: &mut Server, argv: &[Vec<u8>], end: End) -> Result<Outcome> {
    arity(argv.len() == 2)?;
    let key = &argv[1];
    let Some(list) = server.db.list_write(key)? else {
        return reply(Reply::Null);
    };
    let value = list.pop(end).expect("keyspace held an empty list");
    let (event, _) = pop_event(end);
    server.db.signal_modified(key);
    server.db.notify_event(EventClass::List, event, key);
    server.propagate(argv.to_vec());
    server.delete_if_empty(key);
    reply(Reply::Bulk(value))
}

pub(super) fn llen(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 2)?;
    let len = server.db.list_write(&argv[1])?.map_or(0, |l| l.len());
    reply(Reply::Int(len as i64))
}

pub(super) fn lindex(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 3)?;
    let index = parse_index(&argv[2])?;
    let value = match server.db.list_write(&argv[1])? {
        Some(list) => list.index(index),
        None => None,
    };
    reply(value.map_or(Reply::Null, Reply::Bulk))
}

pub(super) fn lset(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let index = parse_index(&argv[2])?;
    let key = &argv[1];
    let Some(list) = server.db.list_write(key)? else {
        return Err(Error::NoSuchKey);
    };
    if !list.set(index, &argv[3]) {
        return Err(Error::IndexOutOfRange);
    }
    server.db.signal_modified(key);
    server.db.notify_event(EventClass::List, "lset", key);
    server.propagate(argv.to_vec());
    reply(Reply::ok())
}

pub(super) fn lrange(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let start = parse_index(&argv[2])?;
    let stop = parse_index(&argv[3])?;
    let out = match server.db.list_write(&argv[1])? {
        Some(list) => list.range(start, stop).into_iter().map(Reply::Bulk).collect(),
        None => Vec::new(),
    };
    reply(Reply::Array(out))
}

pub(super) fn ltrim(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let start = parse_index(&argv[2])?;
    let stop = parse_index(&argv[3])?;
    let key = &argv[1];
    let Some(list) = server.db.list_write(key)? else {
        return reply(Reply::ok());
    };
    list.trim(start, stop);
    server.db.signal_modified(key);
    server.db.notify_event(EventClass::List, "ltrim", key);
    server.propagate(argv.to_vec());
    server.delete_if_empty(key);
    reply(Reply::ok())
}

pub(super) fn lrem(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let count = parse_index(&argv[2])?;
    let key = &argv[1];
    let Some(list) = server.db.list_write(key)? else {
        return reply(Reply::Int(0));
    };
    let removed = list.remove_matching(count, &argv[3]);
    if removed > 0 {
        server.db.signal_modified(key);
        server.db.notify_event(EventClass::List, "lrem", key);
        server.propagate(argv.to_vec());
        server.delete_if_empty(key);
    }
    reply(Reply::Int(removed as i64))
}

pub(super) fn linsert(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 5)?;
    let before = match argv[2].to_ascii_lowercase().as_slice() {
        b"before" => true,
        b"after" => false,
        _ => return Err(Error::Syntax),
    };
    let key = &argv[1];
    let Some(list) = server.db.list_write(key)? else {
        return reply(Reply::Int(0));
    };
    match list.insert_near(before, &argv[3], &argv[4]) {
        Some(len) => {
            server.db.signal_modified(key);
            server.db.notify_event(EventClass::List, "linsert", key);
            server.propagate(argv.to_vec());
            reply(Reply::Int(len as i64))
        }
        None => reply(Reply::Int(-1)),
    }
}

pub(super) fn rpoplpush(server: &mut Server, argv: &[Vec<u8>]) -> Result<Outcome> {
    arity(argv.len() == 3)?;
    let (source, target) = (&argv[1], &argv[2]);

    if server.db.list_write(source)?.is_none() {
        return reply(Reply::Null);
    }
    // Destination type is vetted before anything is popped; the whole
    // command is all-or-nothing.
    if !matches!(server.db.lookup_read(target), None | Some(Value::List(_))) {
        return Err(Error::WrongType);
    }

    let value = if source == target {
        let list = server.db.list_write(source)?.expect("checked above");
        list.rotate();
        list.index(0).expect("keyspace held an empty list")
    } else {
        let list = server.db.list_write(source)?.expect("checked above");
        let value = list.pop(End::Tail).expect("keyspace held an empty list");
        if server.db.lookup_read(target).is_none() {
            let fresh = List::new(&server.config);
            server.db.add(target.to_vec(), Value::List(fresh));
        }
        match server.db.lookup_write(target) {
            Some(Value::List(l)) => l.push(End::Head, &value),
            _ => unreachable!("destination type vetted above"),
        }
        value
    };

    server.db.signal_modified(source);
    server.db.signal_modified(target);
    server.db.notify_event(EventClass::List, "rpop", source);
    server.db.notify_event(EventClass::List, "lpush", target);
    server.db.signal_ready(target);
    server.propagate(argv.to_vec());
    server.delete_if_empty(source);
    reply(Reply::Bulk(value))
}

/// BLPOP / BRPOP. Pops immediately from the first non-empty key; only
/// when every key is missing does the client suspend.
pub(super) fn blocking_pop(
    server: &mut Server,
    client: ClientId,
    argv: &[Vec<u8>],
    end: End,
) -> Result<Outcome> {
    arity(argv.len() >= 3)?;
    let deadline = parse_timeout_ms(&argv[argv.len() - 1])?
        .map(|ms| server.now_ms() + ms);
    let keys: Vec<Vec<u8>> = argv[1..argv.len() - 1].to_vec();

    for key in &keys {
        let Some(list) = server.db.list_write(key)? else { continue };
        let value = list.pop(end).expect("keyspace held an empty list");
        let (event, effective) = pop_event(end);
        server.db.signal_modified(key);
        server.db.notify_event(EventClass::List, event, key);
        // Replicates as the plain pop it effectively was.
        server.propagate(vec![effective.to_vec(), key.to_vec()]);
        server.delete_if_empty(key);
        return reply(Reply::Array(vec![
            Reply::bulk(key.clone()),
            Reply::Bulk(value),
        ]));
    }

    if server.in_multi(client) {
        return reply(Reply::NullArray);
    }
    server
        .blocking
        .register(&mut server.db, client, keys, WaitKind::ListPop(end), None, deadline);
    Ok(Outcome::Blocked)
}

pub(super) fn brpoplpush(
    server: &mut Server,
    client: ClientId,
    argv: &[Vec<u8>],
) -> Result<Outcome> {
    arity(argv.len() == 4)?;
    let deadline = parse_timeout_ms(&argv[3])?.map(|ms| server.now_ms() + ms);
    let (source, target) = (&argv[1], &argv[2]);

    if server.db.list_write(source)?.is_some() {
        // Source has elements: behave (and replicate) as RPOPLPUSH.
        let effective = vec![b"rpoplpush".to_vec(), source.clone(), target.clone()];
        return rpoplpush(server, &effective);
    }

    if server.in_multi(client) {
        return reply(Reply::NullArray);
    }
    server.blocking.register(
        &mut server.db,
        client,
        vec![source.clone()],
        WaitKind::ListPop(End::Tail),
        Some(target.clone()),
        deadline,
    );
    Ok(Outcome::Blocked)
}
