use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use ceacf::AdaptiveCuckooFilter;

const FINGERPRINT_BITS: u32 = 10;
const MAX_KICKS: usize = 50;

fn random_keys(rng: &mut StdRng, count: usize) -> Vec<[u8; 8]> {
    (0..count).map(|_| rng.random::<u64>().to_le_bytes()).collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("adaptive_cuckoo_insert");
    let load_factors = [25usize, 50, 75];
    let bucket_counts = [1024usize, 4096];

    for &buckets in &bucket_counts {
        let capacity = 4 * buckets;
        for &load in &load_factors {
            let target = capacity * load / 100;
            let mut rng = StdRng::seed_from_u64(0xC0FFEEu64 ^ ((buckets as u64) << 32) ^ load as u64);
            let keys = random_keys(&mut rng, target);
            let bench_id = BenchmarkId::new(format!("b{buckets}"), format!("{load}pct"));

            group.bench_with_input(bench_id, &target, |b, &_target| {
                b.iter_batched(
                    || AdaptiveCuckooFilter::new(buckets, FINGERPRINT_BITS, MAX_KICKS).unwrap(),
                    |mut filter| {
                        for key in &keys {
                            filter.insert(key);
                        }
                        filter
                    },
                    BatchSize::LargeInput,
                );
            });
        }
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("adaptive_cuckoo_lookup");
    let bucket_counts = [1024usize, 4096];
    let probe_ratio = 10; // number of lookups relative to inserted keys

    for &buckets in &bucket_counts {
        let capacity = 4 * buckets;
        let target = capacity / 2;
        let mut rng = StdRng::seed_from_u64(0xFACEFEEDu64 ^ ((buckets as u64) << 32));
        let keys = random_keys(&mut rng, target);
        let probes: Vec<[u8; 8]> = (0..target * probe_ratio)
            .map(|i| {
                if i % probe_ratio == 0 {
                    keys[i / probe_ratio]
                } else {
                    rng.random::<u64>().to_le_bytes()
                }
            })
            .collect();
        let bench_id = BenchmarkId::from_parameter(format!("b{buckets}"));

        group.bench_with_input(bench_id, &target, |b, &_target| {
            b.iter_batched(
                || {
                    let mut filter =
                        AdaptiveCuckooFilter::new(buckets, FINGERPRINT_BITS, MAX_KICKS).unwrap();
                    for key in &keys {
                        filter.insert(key);
                    }
                    filter
                },
                |filter| {
                    for probe in &probes {
                        std::hint::black_box(filter.lookup(probe));
                    }
                    filter
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_estimate_cardinality(c: &mut Criterion) {
    let mut group = c.benchmark_group("adaptive_cuckoo_estimate_cardinality");
    let bucket_counts = [1024usize, 8192];

    for &buckets in &bucket_counts {
        let capacity = 4 * buckets;
        let mut rng = StdRng::seed_from_u64(0xBADC0DEu64 ^ buckets as u64);
        let keys = random_keys(&mut rng, capacity / 2);
        let mut filter = AdaptiveCuckooFilter::new(buckets, FINGERPRINT_BITS, MAX_KICKS).unwrap();
        for key in &keys {
            filter.insert(key);
        }
        let bench_id = BenchmarkId::from_parameter(format!("b{buckets}"));

        group.bench_with_input(bench_id, &filter.len(), |b, _| {
            b.iter(|| std::hint::black_box(filter.estimate_cardinality()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_lookup,
    bench_estimate_cardinality
);
criterion_main!(benches);
