// Cross-cutting command-surface tests: dispatch, argument validation,
// keyspace events, and runtime reconfiguration.

use mem_engine::Server;
use mem_engine::db::EventClass;
use mem_engine::reply::Reply;
use mem_engine::value::Encoding;

fn argv(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

fn run(server: &mut Server, client: u64, parts: &[&str]) -> Reply {
    server.execute(client, argv(parts)).expect("command did not block")
}

// =============================================================================
// Test 1: command names dispatch case-insensitively; unknown names error
// =============================================================================
#[test]
fn dispatch_and_unknown_commands() {
    let mut server = Server::default();
    let c = server.connect();

    assert_eq!(run(&mut server, c, &["RpUsH", "l", "x"]), Reply::Int(1));
    assert_eq!(run(&mut server, c, &["llen", "l"]), Reply::Int(1));
    let r = run(&mut server, c, &["NOPE", "l"]);
    assert!(matches!(r, Reply::Error(_)));
}

// =============================================================================
// Test 2: parse errors precede mutation
// =============================================================================
#[test]
fn parse_errors_do_not_mutate() {
    let mut server = Server::default();
    let c = server.connect();

    // Second score is junk: nothing lands.
    let r = run(&mut server, c, &["ZADD", "s", "1", "a", "nope", "b"]);
    assert!(matches!(r, Reply::Error(e) if e.contains("not a valid float")));
    assert!(!server.db.contains(b"s"));

    let r = run(&mut server, c, &["ZADD", "s", "NX", "XX", "1", "a"]);
    assert!(matches!(r, Reply::Error(e) if e.contains("XX and NX")));
    let r = run(&mut server, c, &["ZADD", "s", "INCR", "1", "a", "2", "b"]);
    assert!(matches!(r, Reply::Error(e) if e.contains("single increment-element")));
    assert!(!server.db.contains(b"s"));

    let r = run(&mut server, c, &["LINSERT", "l", "SIDEWAYS", "a", "b"]);
    assert!(matches!(r, Reply::Error(e) if e.contains("syntax")));
}

// =============================================================================
// Test 3: NX / XX no-op properties
// =============================================================================
#[test]
fn zadd_nx_xx_noop() {
    let mut server = Server::default();
    let c = server.connect();

    // XX on an absent member is a no-op.
    run(&mut server, c, &["ZADD", "s", "1", "a"]);
    assert_eq!(run(&mut server, c, &["ZADD", "s", "XX", "5", "missing"]), Reply::Int(0));
    assert_eq!(run(&mut server, c, &["ZSCORE", "s", "missing"]), Reply::Null);

    // NX on a present member is a no-op.
    assert_eq!(run(&mut server, c, &["ZADD", "s", "NX", "5", "a"]), Reply::Int(0));
    assert_eq!(run(&mut server, c, &["ZSCORE", "s", "a"]), Reply::Double(1.0));

    // CH counts updates as changes.
    assert_eq!(run(&mut server, c, &["ZADD", "s", "CH", "2", "a", "3", "b"]), Reply::Int(2));
}

// =============================================================================
// Test 4: keyspace events fire in order, ending with del on emptying
// =============================================================================
#[test]
fn events_fire_in_order() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["RPUSH", "l", "a"]);
    run(&mut server, c, &["LPOP", "l"]);

    let names: Vec<(&str, EventClass)> = server
        .events()
        .iter()
        .map(|e| (e.name, e.class))
        .collect();
    assert_eq!(
        names,
        vec![
            ("rpush", EventClass::List),
            ("lpop", EventClass::List),
            ("del", EventClass::Generic),
        ]
    );
}

// =============================================================================
// Test 5: the dirty counter tracks effective mutations
// =============================================================================
#[test]
fn dirty_counter() {
    let mut server = Server::default();
    let c = server.connect();

    let before = server.db.dirty;
    run(&mut server, c, &["ZADD", "s", "1", "a"]);
    run(&mut server, c, &["ZSCORE", "s", "a"]);
    run(&mut server, c, &["ZADD", "s", "NX", "9", "a"]);
    let after = server.db.dirty;
    // One effective mutation: the first ZADD.
    assert_eq!(after - before, 1);
}

// =============================================================================
// Test 6: runtime config changes affect only newly created values
// =============================================================================
#[test]
fn config_changes_apply_to_new_values() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["ZADD", "old", "1", "a"]);
    assert_eq!(
        server.db.lookup_read(b"old").unwrap().encoding(),
        Encoding::Packed
    );

    server.config.zset_max_packed_entries = 0;
    run(&mut server, c, &["ZADD", "new", "1", "a"]);
    assert_eq!(
        server.db.lookup_read(b"new").unwrap().encoding(),
        Encoding::SkipListPlusHash
    );
    // The old value keeps its packed form until it crosses a threshold
    // itself; a single further insert now converts it.
    run(&mut server, c, &["ZADD", "old", "2", "b"]);
    assert_eq!(
        server.db.lookup_read(b"old").unwrap().encoding(),
        Encoding::SkipListPlusHash
    );
}

// =============================================================================
// Test 7: ZSCAN single sweep renders scores as strings
// =============================================================================
#[test]
fn zscan_shape() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["ZADD", "s", "1.5", "a", "2", "b"]);
    let Reply::Array(parts) = run(&mut server, c, &["ZSCAN", "s", "0"]) else {
        panic!("expected array");
    };
    assert_eq!(parts[0], Reply::Bulk(b"0".to_vec()));
    assert_eq!(
        parts[1],
        Reply::Array(vec![
            Reply::Bulk(b"a".to_vec()),
            Reply::Bulk(b"1.5".to_vec()),
            Reply::Bulk(b"b".to_vec()),
            Reply::Bulk(b"2".to_vec()),
        ])
    );
}

// =============================================================================
// Test 8: union with a plain-set source scores members at 1.0
// =============================================================================
#[test]
fn union_with_plain_set_source() {
    use mem_engine::set::Set;
    use mem_engine::value::Value;

    let mut server = Server::default();
    let c = server.connect();

    let mut s = Set::new();
    s.insert(b"a".to_vec());
    s.insert(b"b".to_vec());
    server.db.add(b"plain".to_vec(), Value::Set(s));

    run(&mut server, c, &["ZADD", "z", "5", "b"]);
    assert_eq!(
        run(&mut server, c, &["ZUNIONSTORE", "out", "2", "plain", "z"]),
        Reply::Int(2)
    );
    assert_eq!(run(&mut server, c, &["ZSCORE", "out", "a"]), Reply::Double(1.0));
    assert_eq!(run(&mut server, c, &["ZSCORE", "out", "b"]), Reply::Double(6.0));
}

// =============================================================================
// Test 9: an empty store result deletes the destination
// =============================================================================
#[test]
fn empty_store_result_deletes_destination() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["ZADD", "out", "1", "stale"]);
    run(&mut server, c, &["ZADD", "s1", "1", "a"]);
    // s2 missing: intersection is empty, the old destination goes away.
    assert_eq!(
        run(&mut server, c, &["ZINTERSTORE", "out", "2", "s1", "s2"]),
        Reply::Int(0)
    );
    assert!(!server.db.contains(b"out"));
}
