use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use striped_hashmap::StripedHashMap;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("striped_map_insert_10k", |b| {
        b.iter_batched(
            || StripedHashMap::<String, u64>::new(),
            |m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64).unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_visit_hit(c: &mut Criterion) {
    c.bench_function("striped_map_visit_hit", |b| {
        let m = StripedHashMap::new();
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        for (i, k) in keys.iter().cloned().enumerate() {
            m.insert(k, i as u64).unwrap();
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            let mut v = 0;
            m.cvisit(k.as_str(), |_, val| v = *val);
            black_box(v);
        })
    });
}

fn bench_visit_miss(c: &mut Criterion) {
    c.bench_function("striped_map_visit_miss", |b| {
        let m = StripedHashMap::new();
        for (i, x) in lcg(11).take(10_000).enumerate() {
            m.insert(key(x), i as u64).unwrap();
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = key(miss.next().unwrap());
            black_box(m.contains(k.as_str()));
        })
    });
}

fn bench_upsert(c: &mut Criterion) {
    c.bench_function("striped_map_upsert_hot_key", |b| {
        let m = StripedHashMap::<String, u64>::new();
        m.insert("hot".to_string(), 0).unwrap();
        b.iter(|| {
            m.insert_or_visit("hot".to_string(), 0, |_, v| *v = v.wrapping_add(1))
                .unwrap();
        })
    });
}

fn bench_bulk_visit(c: &mut Criterion) {
    c.bench_function("striped_map_bulk_visit_64", |b| {
        let m = StripedHashMap::new();
        let keys: Vec<_> = lcg(23).take(10_000).map(key).collect();
        for (i, k) in keys.iter().cloned().enumerate() {
            m.insert(k, i as u64).unwrap();
        }
        let batch: Vec<String> = keys.iter().take(64).cloned().collect();
        b.iter(|| {
            let mut sum = 0u64;
            m.bulk_cvisit(&batch, |_, v| sum += *v);
            black_box(sum);
        })
    });
}

// Contended throughput: fixed thread count hammering a shared map with
// a read-heavy mix. Measures whole rounds, not single ops.
fn bench_contended_mixed(c: &mut Criterion) {
    let threads = 4;
    let ops_per_thread = 10_000;
    c.bench_function("striped_map_contended_4t_mixed", |b| {
        b.iter_batched(
            || {
                let m = Arc::new(StripedHashMap::<u64, u64>::with_capacity(100_000));
                for x in lcg(3).take(50_000) {
                    let _ = m.insert(x % 65_536, x);
                }
                m
            },
            |m| {
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let m = Arc::clone(&m);
                        thread::spawn(move || {
                            for x in lcg(t as u64 + 1).take(ops_per_thread) {
                                let k = x % 65_536;
                                match x % 8 {
                                    0 => {
                                        let _ = m.insert_or_visit(k, x, |_, v| *v = x);
                                    }
                                    1 => {
                                        let _ = m.erase(&k);
                                    }
                                    _ => {
                                        let mut v = 0;
                                        m.cvisit(&k, |_, val| v = *val);
                                        black_box(v);
                                    }
                                }
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_visit_hit, bench_visit_miss, bench_upsert, bench_bulk_visit, bench_contended_mixed
}
criterion_main!(benches);
