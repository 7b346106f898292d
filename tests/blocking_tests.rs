// Blocking-pop protocol tests: suspension, deterministic wakeup order,
// replication rewriting, timeouts, and cancellation.

use mem_engine::reply::Reply;
use mem_engine::{Config, Server};

fn argv(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

fn run(server: &mut Server, client: u64, parts: &[&str]) -> Reply {
    server.execute(client, argv(parts)).expect("command did not block")
}

fn block(server: &mut Server, client: u64, parts: &[&str]) {
    assert!(
        server.execute(client, argv(parts)).is_none(),
        "command should have blocked: {parts:?}"
    );
}

fn bulk(s: &str) -> Reply {
    Reply::Bulk(s.as_bytes().to_vec())
}

// =============================================================================
// Test 1: BLPOP is woken by RPUSH; the log shows the push then the
// effective LPOP
// =============================================================================
#[test]
fn blpop_wakes_on_push_and_rewrites_replication() {
    let mut server = Server::default();
    let a = server.connect();
    let b = server.connect();

    block(&mut server, a, &["BLPOP", "k", "0"]);

    // The pushing command returns only after the waiter was served.
    assert_eq!(run(&mut server, b, &["RPUSH", "k", "x", "y"]), Reply::Int(2));

    assert_eq!(
        server.take_replies(a),
        vec![Reply::Array(vec![bulk("k"), bulk("x")])]
    );
    assert_eq!(run(&mut server, b, &["LRANGE", "k", "0", "-1"]), Reply::Array(vec![bulk("y")]));

    let log = server.repl_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], argv(&["RPUSH", "k", "x", "y"]));
    assert_eq!(log[1], argv(&["lpop", "k"]));
}

// =============================================================================
// Test 2: waiters on one key are served in arrival order
// =============================================================================
#[test]
fn waiters_served_in_arrival_order() {
    let mut server = Server::default();
    let a = server.connect();
    let b = server.connect();
    let pusher = server.connect();

    block(&mut server, a, &["BLPOP", "k", "0"]);
    block(&mut server, b, &["BLPOP", "k", "0"]);

    run(&mut server, pusher, &["RPUSH", "k", "1", "2", "3"]);

    assert_eq!(server.take_replies(a), vec![Reply::Array(vec![bulk("k"), bulk("1")])]);
    assert_eq!(server.take_replies(b), vec![Reply::Array(vec![bulk("k"), bulk("2")])]);
    assert_eq!(run(&mut server, pusher, &["LRANGE", "k", "0", "-1"]), Reply::Array(vec![bulk("3")]));
}

// =============================================================================
// Test 3: cross-key wakeups go to the earliest arrival
// =============================================================================
#[test]
fn cross_key_order_is_by_arrival() {
    let mut server = Server::default();
    let a = server.connect();
    let b = server.connect();
    let pusher = server.connect();

    // a waits on k2 only; b waits on k1 and k2. a arrived first.
    block(&mut server, a, &["BLPOP", "k2", "0"]);
    block(&mut server, b, &["BLPOP", "k1", "k2", "0"]);

    // k2 serves the earlier arrival even though b listed it too; k1 then
    // serves b.
    run(&mut server, pusher, &["RPUSH", "k2", "v2"]);
    run(&mut server, pusher, &["RPUSH", "k1", "v1"]);

    assert_eq!(server.take_replies(a), vec![Reply::Array(vec![bulk("k2"), bulk("v2")])]);
    assert_eq!(server.take_replies(b), vec![Reply::Array(vec![bulk("k1"), bulk("v1")])]);
}

// =============================================================================
// Test 4: a waiter is removed from every key once served
// =============================================================================
#[test]
fn served_waiter_leaves_all_queues() {
    let mut server = Server::default();
    let a = server.connect();
    let pusher = server.connect();

    block(&mut server, a, &["BLPOP", "k1", "k2", "0"]);
    run(&mut server, pusher, &["RPUSH", "k1", "v"]);
    assert_eq!(server.take_replies(a), vec![Reply::Array(vec![bulk("k1"), bulk("v")])]);

    // Nothing left waiting on k2: the push stays put.
    run(&mut server, pusher, &["RPUSH", "k2", "w"]);
    assert_eq!(run(&mut server, pusher, &["LLEN", "k2"]), Reply::Int(1));
    assert!(server.take_replies(a).is_empty());
}

// =============================================================================
// Test 5: timeout delivers the null reply and deregisters
// =============================================================================
#[test]
fn timeout_sweep() {
    let mut server = Server::default();
    let a = server.connect();
    let pusher = server.connect();

    block(&mut server, a, &["BLPOP", "k", "1.5"]);
    server.tick(1000);
    assert!(server.take_replies(a).is_empty());
    server.tick(600);
    assert_eq!(server.take_replies(a), vec![Reply::NullArray]);

    // A later push finds no waiter.
    run(&mut server, pusher, &["RPUSH", "k", "v"]);
    assert_eq!(run(&mut server, pusher, &["LLEN", "k"]), Reply::Int(1));
}

// =============================================================================
// Test 6: blocking inside MULTI returns the timeout reply immediately
// =============================================================================
#[test]
fn multi_never_blocks() {
    let mut server = Server::default();
    let a = server.connect();
    server.set_in_multi(a, true);

    assert_eq!(run(&mut server, a, &["BLPOP", "k", "0"]), Reply::NullArray);
    assert_eq!(run(&mut server, a, &["BRPOPLPUSH", "k", "d", "0"]), Reply::NullArray);
    assert_eq!(run(&mut server, a, &["BZPOPMIN", "k", "0"]), Reply::NullArray);
}

// =============================================================================
// Test 7: disconnect scrubs the waiter from every queue
// =============================================================================
#[test]
fn disconnect_cancels_wait() {
    let mut server = Server::default();
    let a = server.connect();
    let b = server.connect();
    let pusher = server.connect();

    block(&mut server, a, &["BLPOP", "k", "0"]);
    block(&mut server, b, &["BLPOP", "k", "0"]);
    server.disconnect(a);

    run(&mut server, pusher, &["RPUSH", "k", "v"]);
    assert_eq!(server.take_replies(b), vec![Reply::Array(vec![bulk("k"), bulk("v")])]);
}

// =============================================================================
// Test 8: BRPOPLPUSH wake path pushes into the destination and
// replicates as RPOPLPUSH
// =============================================================================
#[test]
fn brpoplpush_wake_transfers() {
    let mut server = Server::default();
    let a = server.connect();
    let pusher = server.connect();

    block(&mut server, a, &["BRPOPLPUSH", "src", "dst", "0"]);
    run(&mut server, pusher, &["RPUSH", "src", "v"]);

    assert_eq!(server.take_replies(a), vec![bulk("v")]);
    assert_eq!(run(&mut server, pusher, &["LRANGE", "dst", "0", "-1"]), Reply::Array(vec![bulk("v")]));
    assert!(!server.db.contains(b"src"));

    let log = server.repl_log();
    assert_eq!(log[log.len() - 1], argv(&["rpoplpush", "src", "dst"]));
}

// =============================================================================
// Test 9: BRPOPLPUSH with a wrong-typed destination stays registered
// =============================================================================
#[test]
fn brpoplpush_wrong_dest_stays_registered() {
    let mut server = Server::default();
    let a = server.connect();
    let pusher = server.connect();

    run(&mut server, pusher, &["HSET", "dst", "f", "v"]);
    block(&mut server, a, &["BRPOPLPUSH", "src", "dst", "0"]);

    // Source fills but the destination is unusable: the waiter stays put
    // and the element stays in the source.
    run(&mut server, pusher, &["RPUSH", "src", "v"]);
    assert!(server.take_replies(a).is_empty());
    assert_eq!(run(&mut server, pusher, &["LLEN", "src"]), Reply::Int(1));

    // Clearing the destination and signalling again serves the waiter,
    // which tail-pops the newest element.
    run(&mut server, pusher, &["HDEL", "dst", "f"]);
    run(&mut server, pusher, &["RPUSH", "src", "w"]);
    assert_eq!(server.take_replies(a), vec![bulk("w")]);
    assert_eq!(run(&mut server, pusher, &["LRANGE", "dst", "0", "-1"]), Reply::Array(vec![bulk("w")]));
    assert_eq!(run(&mut server, pusher, &["LRANGE", "src", "0", "-1"]), Reply::Array(vec![bulk("v")]));
}

// =============================================================================
// Test 10: BRPOPLPUSH with source == destination rotates on wake
// =============================================================================
#[test]
fn brpoplpush_same_key_rotates() {
    let mut server = Server::default();
    let a = server.connect();
    let pusher = server.connect();

    block(&mut server, a, &["BRPOPLPUSH", "k", "k", "0"]);
    run(&mut server, pusher, &["RPUSH", "k", "v"]);
    assert_eq!(server.take_replies(a), vec![bulk("v")]);
    assert_eq!(run(&mut server, pusher, &["LRANGE", "k", "0", "-1"]), Reply::Array(vec![bulk("v")]));

    // Immediate (non-blocking) same-key case, multiple elements.
    run(&mut server, pusher, &["RPUSH", "k", "a", "b"]);
    assert_eq!(run(&mut server, pusher, &["BRPOPLPUSH", "k", "k", "0"]), bulk("b"));
    assert_eq!(
        run(&mut server, pusher, &["LRANGE", "k", "0", "-1"]),
        Reply::Array(vec![bulk("b"), bulk("v"), bulk("a")])
    );
}

// =============================================================================
// Test 11: BZPOPMIN / BZPOPMAX wake on ZADD
// =============================================================================
#[test]
fn bzpop_wakes_on_zadd() {
    let mut server = Server::default();
    let a = server.connect();
    let b = server.connect();
    let pusher = server.connect();

    block(&mut server, a, &["BZPOPMIN", "z", "0"]);
    block(&mut server, b, &["BZPOPMAX", "z", "0"]);

    run(&mut server, pusher, &["ZADD", "z", "1", "low", "9", "high"]);

    assert_eq!(
        server.take_replies(a),
        vec![Reply::Array(vec![bulk("z"), bulk("low"), Reply::Double(1.0)])]
    );
    assert_eq!(
        server.take_replies(b),
        vec![Reply::Array(vec![bulk("z"), bulk("high"), Reply::Double(9.0)])]
    );
    assert!(!server.db.contains(b"z"));

    let log = server.repl_log();
    assert_eq!(log[log.len() - 2], argv(&["zpopmin", "z"]));
    assert_eq!(log[log.len() - 1], argv(&["zpopmax", "z"]));
}

// =============================================================================
// Test 12: immediate BZPOPMIN pops without blocking and rewrites
// =============================================================================
#[test]
fn bzpop_immediate_path() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["ZADD", "z", "3", "m"]);
    assert_eq!(
        run(&mut server, c, &["BZPOPMIN", "z", "5"]),
        Reply::Array(vec![bulk("z"), bulk("m"), Reply::Double(3.0)])
    );
    let log = server.repl_log();
    assert_eq!(log[log.len() - 1], argv(&["zpopmin", "z"]));
}

// =============================================================================
// Test 13: negative and malformed timeouts are rejected up front
// =============================================================================
#[test]
fn timeout_argument_validation() {
    let mut server = Server::default();
    let c = server.connect();

    let r = run(&mut server, c, &["BLPOP", "k", "-1"]);
    assert!(matches!(r, Reply::Error(e) if e.contains("negative")));
    let r = run(&mut server, c, &["BLPOP", "k", "abc"]);
    assert!(matches!(r, Reply::Error(e) if e.contains("timeout is not a float")));
}

// =============================================================================
// Test 14: a second blocking wait on a fractional deadline is isolated
// =============================================================================
#[test]
fn fractional_deadlines_are_independent() {
    let mut config = Config::default();
    config.list_fill = 4;
    let mut server = Server::new(config);
    let a = server.connect();
    let b = server.connect();

    block(&mut server, a, &["BLPOP", "k", "0.2"]);
    block(&mut server, b, &["BLPOP", "k", "5"]);

    server.tick(300);
    assert_eq!(server.take_replies(a), vec![Reply::NullArray]);
    assert!(server.take_replies(b).is_empty());

    let pusher = server.connect();
    run(&mut server, pusher, &["RPUSH", "k", "v"]);
    assert_eq!(server.take_replies(b), vec![Reply::Array(vec![bulk("k"), bulk("v")])]);
}
