use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use mem_engine::packed::PackedSeq;
use mem_engine::{Config, Server};

fn bench_packed_push(c: &mut Criterion) {
    c.bench_function("packed_push_tail_128", |b| {
        b.iter(|| {
            let mut seq = PackedSeq::new();
            for i in 0..128 {
                seq.push_tail(black_box(format!("value-{i}").as_bytes()));
            }
            seq
        })
    });
}

fn bench_zadd(c: &mut Criterion) {
    c.bench_function("zadd_1000_indexed", |b| {
        b.iter(|| {
            let mut config = Config::default();
            config.zset_max_packed_entries = 0;
            let mut server = Server::new(config);
            let client = server.connect();
            for i in 0..1000 {
                let argv = vec![
                    b"zadd".to_vec(),
                    b"bench".to_vec(),
                    i.to_string().into_bytes(),
                    format!("member-{i}").into_bytes(),
                ];
                server.execute(client, argv);
            }
            server
        })
    });
}

fn bench_list_push_pop(c: &mut Criterion) {
    c.bench_function("rpush_lpop_1000", |b| {
        b.iter(|| {
            let mut server = Server::default();
            let client = server.connect();
            for i in 0..1000 {
                let argv = vec![b"rpush".to_vec(), b"l".to_vec(), i.to_string().into_bytes()];
                server.execute(client, argv);
            }
            for _ in 0..1000 {
                server.execute(client, vec![b"lpop".to_vec(), b"l".to_vec()]);
            }
            server
        })
    });
}

criterion_group!(benches, bench_packed_push, bench_zadd, bench_list_push_pop);
criterion_main!(benches);
