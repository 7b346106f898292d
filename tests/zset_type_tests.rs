// Sorted-set command tests: scenarios over the full server surface,
// covering both encodings and the transition between them.

use mem_engine::reply::Reply;
use mem_engine::{Config, Server};

fn argv(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

fn run(server: &mut Server, client: u64, parts: &[&str]) -> Reply {
    server.execute(client, argv(parts)).expect("command did not block")
}

fn bulk(s: &str) -> Reply {
    Reply::Bulk(s.as_bytes().to_vec())
}

// =============================================================================
// Test 1: ZADD / ZRANGE / ZRANGEBYSCORE basic scenario
// =============================================================================
#[test]
fn zadd_update_and_ranges() {
    let mut server = Server::default();
    let c = server.connect();

    assert_eq!(run(&mut server, c, &["ZADD", "s", "1", "a"]), Reply::Int(1));
    assert_eq!(run(&mut server, c, &["ZADD", "s", "2", "b"]), Reply::Int(1));
    // Update without CH replies 0.
    assert_eq!(run(&mut server, c, &["ZADD", "s", "2", "a"]), Reply::Int(0));

    assert_eq!(
        run(&mut server, c, &["ZRANGE", "s", "0", "-1", "WITHSCORES"]),
        Reply::Array(vec![
            bulk("a"),
            Reply::Double(2.0),
            bulk("b"),
            Reply::Double(2.0),
        ])
    );
    assert_eq!(
        run(&mut server, c, &["ZRANGEBYSCORE", "s", "2", "2"]),
        Reply::Array(vec![bulk("a"), bulk("b")])
    );
}

// =============================================================================
// Test 2: ZINTERSTORE with weights and SUM aggregation
// =============================================================================
#[test]
fn zinterstore_weights_sum() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["ZADD", "s1", "1", "a", "2", "b", "3", "c"]);
    run(&mut server, c, &["ZADD", "s2", "10", "b", "20", "c", "30", "d"]);
    assert_eq!(
        run(
            &mut server,
            c,
            &["ZINTERSTORE", "out", "2", "s1", "s2", "WEIGHTS", "1", "2", "AGGREGATE", "SUM"]
        ),
        Reply::Int(2)
    );
    assert_eq!(
        run(&mut server, c, &["ZRANGE", "out", "0", "-1", "WITHSCORES"]),
        Reply::Array(vec![
            bulk("b"),
            Reply::Double(22.0),
            bulk("c"),
            Reply::Double(43.0),
        ])
    );
}

// =============================================================================
// Test 3: ZADD INCR returns the new score; NX blocks it on existing members
// =============================================================================
#[test]
fn zadd_incr_and_nx() {
    let mut server = Server::default();
    let c = server.connect();

    assert_eq!(
        run(&mut server, c, &["ZADD", "s", "INCR", "1.5", "x"]),
        Reply::Double(1.5)
    );
    assert_eq!(
        run(&mut server, c, &["ZADD", "s", "INCR", "NX", "2", "x"]),
        Reply::Null
    );
    assert_eq!(run(&mut server, c, &["ZSCORE", "s", "x"]), Reply::Double(1.5));
}

// =============================================================================
// Test 4: ZUNIONSTORE accumulates every member
// =============================================================================
#[test]
fn zunionstore_accumulates() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["ZADD", "s1", "1", "a", "2", "b"]);
    run(&mut server, c, &["ZADD", "s2", "10", "b", "20", "c"]);
    assert_eq!(
        run(&mut server, c, &["ZUNIONSTORE", "out", "2", "s1", "s2"]),
        Reply::Int(3)
    );
    assert_eq!(
        run(&mut server, c, &["ZRANGE", "out", "0", "-1", "WITHSCORES"]),
        Reply::Array(vec![
            bulk("a"),
            Reply::Double(1.0),
            bulk("b"),
            Reply::Double(12.0),
            bulk("c"),
            Reply::Double(20.0),
        ])
    );

    // Wrong-typed source aborts with no destination mutation.
    run(&mut server, c, &["LPUSH", "alist", "x"]);
    let r = run(&mut server, c, &["ZUNIONSTORE", "out", "2", "s1", "alist"]);
    assert!(matches!(r, Reply::Error(e) if e.starts_with("WRONGTYPE")));
    assert_eq!(run(&mut server, c, &["ZCARD", "out"]), Reply::Int(3));
}

// =============================================================================
// Test 5: encoding converts exactly once and never reverts
// =============================================================================
#[test]
fn conversion_is_one_shot() {
    let mut config = Config::default();
    config.zset_max_packed_entries = 8;
    let mut server = Server::new(config);
    let c = server.connect();

    for i in 0..8 {
        run(&mut server, c, &["ZADD", "s", &i.to_string(), &format!("m{i}")]);
    }
    {
        let z = server.db.zset_read(b"s").unwrap().unwrap();
        assert!(z.is_packed());
    }
    run(&mut server, c, &["ZADD", "s", "8", "m8"]);
    {
        let z = server.db.zset_read(b"s").unwrap().unwrap();
        assert!(!z.is_packed());
    }
    // Shrinking below the threshold does not convert back.
    run(&mut server, c, &["ZREMRANGEBYRANK", "s", "0", "5"]);
    {
        let z = server.db.zset_read(b"s").unwrap().unwrap();
        assert!(!z.is_packed());
        assert_eq!(z.len(), 3);
    }
}

// =============================================================================
// Test 6: dual index agrees with itself after conversion (iteration order)
// =============================================================================
#[test]
fn packed_and_indexed_iterate_identically() {
    let mut config = Config::default();
    config.zset_max_packed_entries = 100;
    let mut server = Server::new(config);
    let c = server.connect();

    for i in 0..50 {
        let score = format!("{}", (i * 7 % 13) as f64 + 0.5);
        run(&mut server, c, &["ZADD", "s", &score, &format!("m{i:02}")]);
    }
    let packed_order = {
        let z = server.db.zset_read(b"s").unwrap().unwrap();
        assert!(z.is_packed());
        z.entries()
    };

    // Force the conversion by adding an oversized member, then remove it.
    let long_member = "x".repeat(100);
    run(&mut server, c, &["ZADD", "s", "999", &long_member]);
    run(&mut server, c, &["ZREM", "s", &long_member]);

    let indexed_order = {
        let z = server.db.zset_read(b"s").unwrap().unwrap();
        assert!(!z.is_packed());
        z.entries()
    };
    assert_eq!(packed_order, indexed_order);

    // Every member's score survives the conversion.
    for (member, score) in &packed_order {
        let m = String::from_utf8_lossy(member).into_owned();
        assert_eq!(
            run(&mut server, c, &["ZSCORE", "s", &m]),
            Reply::Double(*score)
        );
    }
}

// =============================================================================
// Test 7: rank queries and negative-index normalisation
// =============================================================================
#[test]
fn ranks_and_range_edges() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["ZADD", "s", "1", "a", "2", "b", "3", "c"]);
    assert_eq!(run(&mut server, c, &["ZRANK", "s", "a"]), Reply::Int(0));
    assert_eq!(run(&mut server, c, &["ZREVRANK", "s", "a"]), Reply::Int(2));
    assert_eq!(run(&mut server, c, &["ZRANK", "s", "zz"]), Reply::Null);

    // Out-of-range never errors, it yields empty.
    assert_eq!(run(&mut server, c, &["ZRANGE", "s", "5", "10"]), Reply::Array(vec![]));
    assert_eq!(run(&mut server, c, &["ZRANGE", "s", "2", "1"]), Reply::Array(vec![]));
    assert_eq!(
        run(&mut server, c, &["ZREVRANGE", "s", "0", "0"]),
        Reply::Array(vec![bulk("c")])
    );
    assert_eq!(
        run(&mut server, c, &["ZRANGE", "s", "-2", "-1"]),
        Reply::Array(vec![bulk("b"), bulk("c")])
    );
}

// =============================================================================
// Test 8: ZRANGEBYLEX with infinity sentinels
// =============================================================================
#[test]
fn lex_ranges_with_sentinels() {
    let mut server = Server::default();
    let c = server.connect();

    for m in ["alpha", "beta", "gamma", "delta"] {
        run(&mut server, c, &["ZADD", "s", "0", m]);
    }
    assert_eq!(
        run(&mut server, c, &["ZRANGEBYLEX", "s", "-", "+"]),
        Reply::Array(vec![bulk("alpha"), bulk("beta"), bulk("delta"), bulk("gamma")])
    );
    assert_eq!(run(&mut server, c, &["ZLEXCOUNT", "s", "-", "+"]), Reply::Int(4));
    assert_eq!(
        run(&mut server, c, &["ZRANGEBYLEX", "s", "(beta", "[delta"]),
        Reply::Array(vec![bulk("delta")])
    );
    assert_eq!(
        run(&mut server, c, &["ZREVRANGEBYLEX", "s", "+", "[beta"]),
        Reply::Array(vec![bulk("gamma"), bulk("delta"), bulk("beta")])
    );
    let r = run(&mut server, c, &["ZRANGEBYLEX", "s", "beta", "+"]);
    assert!(matches!(r, Reply::Error(e) if e.contains("not valid string range")));
}

// =============================================================================
// Test 9: ZPOPMIN / ZPOPMAX delete the key once emptied
// =============================================================================
#[test]
fn pops_remove_emptied_key() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["ZADD", "s", "1", "a", "2", "b"]);
    assert_eq!(
        run(&mut server, c, &["ZPOPMIN", "s"]),
        Reply::Array(vec![bulk("a"), Reply::Double(1.0)])
    );
    assert_eq!(
        run(&mut server, c, &["ZPOPMAX", "s", "5"]),
        Reply::Array(vec![bulk("b"), Reply::Double(2.0)])
    );
    assert!(!server.db.contains(b"s"));
}

// =============================================================================
// Test 10: ZINCRBY to NaN preserves the previous score
// =============================================================================
#[test]
fn nan_increment_is_rejected() {
    let mut server = Server::default();
    let c = server.connect();

    run(&mut server, c, &["ZADD", "s", "inf", "x"]);
    let r = run(&mut server, c, &["ZINCRBY", "s", "-inf", "x"]);
    assert!(matches!(r, Reply::Error(e) if e.contains("NaN")));
    assert_eq!(
        run(&mut server, c, &["ZSCORE", "s", "x"]),
        Reply::Double(f64::INFINITY)
    );
}

// =============================================================================
// Test 11: ZCOUNT over both encodings
// =============================================================================
#[test]
fn zcount_matches_range_length() {
    for packed in [true, false] {
        let mut config = Config::default();
        if !packed {
            config.zset_max_packed_entries = 0;
        }
        let mut server = Server::new(config);
        let c = server.connect();

        for i in 0..20 {
            run(&mut server, c, &["ZADD", "s", &i.to_string(), &format!("m{i}")]);
        }
        assert_eq!(run(&mut server, c, &["ZCOUNT", "s", "5", "14"]), Reply::Int(10));
        assert_eq!(run(&mut server, c, &["ZCOUNT", "s", "(5", "(14"]), Reply::Int(8));
        assert_eq!(run(&mut server, c, &["ZCOUNT", "s", "-inf", "+inf"]), Reply::Int(20));
        assert_eq!(run(&mut server, c, &["ZCOUNT", "s", "100", "200"]), Reply::Int(0));
    }
}

// =============================================================================
// Test 12: LIMIT offset/count on score ranges, both directions
// =============================================================================
#[test]
fn range_by_score_limits() {
    let mut server = Server::default();
    let c = server.connect();

    for i in 0..10 {
        run(&mut server, c, &["ZADD", "s", &i.to_string(), &format!("m{i}")]);
    }
    assert_eq!(
        run(&mut server, c, &["ZRANGEBYSCORE", "s", "0", "9", "LIMIT", "2", "3"]),
        Reply::Array(vec![bulk("m2"), bulk("m3"), bulk("m4")])
    );
    // Negative count means "to the end".
    assert_eq!(
        run(&mut server, c, &["ZRANGEBYSCORE", "s", "7", "+inf", "LIMIT", "1", "-1"]),
        Reply::Array(vec![bulk("m8"), bulk("m9")])
    );
    assert_eq!(
        run(&mut server, c, &["ZREVRANGEBYSCORE", "s", "9", "0", "LIMIT", "0", "2"]),
        Reply::Array(vec![bulk("m9"), bulk("m8")])
    );
}
