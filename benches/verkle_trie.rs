//! Verkle trie benchmarks
//!
//! Measures root computation for fresh and incrementally updated tries, the
//! ordered bulk load, and proof collection over a lazily loaded trie.
//!
//! ```bash
//! cargo bench --bench verkle_trie
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;
use verkle_trie::{constant::committer, Key, MemStore, Trie, Value};

fn gen_entries(num: usize, rng: &mut StdRng) -> Vec<(Key, Value)> {
    (0..num).map(|_| (rng.gen(), rng.gen())).collect()
}

fn build(entries: &[(Key, Value)]) -> Trie {
    let mut trie = Trie::new();
    for (key, value) in entries {
        trie.insert(key, *value, None).unwrap();
    }
    trie
}

fn benchmark_commit(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);

    // Build the precomputed tables outside of the measurements
    let _ = committer();

    c.bench_function("verkle trie commit 10k KVs", |b| {
        b.iter_batched(
            || build(&gen_entries(10_000, &mut rng)),
            |mut trie| black_box(trie.commit()),
            BatchSize::LargeInput,
        );
    });

    c.bench_function("verkle trie sequential commit 10k KVs", |b| {
        b.iter_batched(
            || build(&gen_entries(10_000, &mut rng)).with_min_par_batch_size(usize::MAX),
            |mut trie| black_box(trie.commit()),
            BatchSize::LargeInput,
        );
    });

    // 1k writes on top of a committed 10k trie
    c.bench_function("verkle trie incremental commit 1k KVs", |b| {
        b.iter_batched(
            || {
                let mut trie = build(&gen_entries(10_000, &mut rng));
                trie.commit();
                (trie, gen_entries(1_000, &mut rng))
            },
            |(mut trie, updates)| {
                for (key, value) in &updates {
                    trie.insert(key, *value, None).unwrap();
                }
                black_box(trie.commit())
            },
            BatchSize::LargeInput,
        );
    });

    c.bench_function("verkle trie insert_ordered 10k KVs", |b| {
        b.iter_batched(
            || {
                let mut entries = gen_entries(10_000, &mut rng);
                entries.sort();
                entries
            },
            |entries| {
                let store = MemStore::new();
                let mut sink = |path: &[u8], bytes: Vec<u8>| store.put(path, bytes);
                let mut trie = Trie::new();
                for (key, value) in &entries {
                    trie.insert_ordered(key, *value, Some(&mut sink)).unwrap();
                }
                black_box(trie.flush(|path, bytes| store.put(path, bytes)).unwrap())
            },
            BatchSize::LargeInput,
        );
    });
}

fn benchmark_proofs(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let entries = gen_entries(10_000, &mut rng);
    let store = MemStore::new();
    build(&entries)
        .flush(|path, bytes| store.put(path, bytes))
        .unwrap();
    let keys: Vec<Key> = entries.iter().step_by(100).map(|(key, _)| *key).collect();

    c.bench_function("verkle trie proof items 100 keys, lazy", |b| {
        b.iter_batched(
            || Trie::from_resolver(&store).unwrap(),
            |mut trie| black_box(trie.get_proof_items(&keys, Some(&store)).unwrap()),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, benchmark_commit, benchmark_proofs);
criterion_main!(benches);
