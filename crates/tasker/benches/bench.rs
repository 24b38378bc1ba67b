use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};
use tasker::{
    AtomicTaskIdGenerator, CreateTaskRequest, IdGenerator, ListTasksRequest, LockTaskIdGenerator,
    MemoryStore, PageToken, PageTokenCodec, Status, TaskManager, TimeSource, WallClock,
    generator::Error,
};
use tokio::runtime::Builder;

struct FixedMockTime {
    millis: u64,
}

impl TimeSource for FixedMockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 4096;

/// Benchmarks a hot-path generator that never runs out of sequence.
fn bench_generator<G: IdGenerator>(
    c: &mut Criterion,
    group_name: &str,
    generator_factory: impl Fn() -> G,
) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = generator_factory();
                for _ in 0..TOTAL_IDS {
                    black_box(generator.try_next_id().unwrap());
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks generators on the wall clock, spinning while a millisecond is
/// exhausted.
fn bench_generator_yield<G: IdGenerator>(
    c: &mut Criterion,
    group_name: &str,
    generator_factory: impl Fn() -> G,
) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = generator_factory();
                for _ in 0..TOTAL_IDS {
                    loop {
                        match generator.try_next_id() {
                            Ok(id) => {
                                black_box(id);
                                break;
                            }
                            Err(Error::SequenceOverflow { .. }) => core::hint::spin_loop(),
                            Err(e) => panic!("{e}"),
                        }
                    }
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks one generator shared across threads.
fn bench_generator_contended<G: IdGenerator>(
    c: &mut Criterion,
    group_name: &str,
    generator_fn: impl Fn() -> G,
) {
    let mut group = c.benchmark_group(group_name);

    for thread_count in [1, 2, 4, 8] {
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(format!("elems/{TOTAL_IDS}/threads/{thread_count}"), |b| {
            b.iter_custom(|iters| {
                let start = Instant::now();

                for _ in 0..iters {
                    let generator = Arc::new(generator_fn());
                    let barrier = Arc::new(Barrier::new(thread_count + 1));
                    scope(|s| {
                        for _ in 0..thread_count {
                            let generator = Arc::clone(&generator);
                            let barrier = Arc::clone(&barrier);
                            s.spawn(move || {
                                barrier.wait();
                                for _ in 0..ids_per_thread {
                                    black_box(generator.try_next_id().unwrap());
                                }
                            });
                        }
                        barrier.wait();
                    });
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

fn benchmark_mock_sequential_lock(c: &mut Criterion) {
    bench_generator(c, "mock/sequential/lock", || {
        LockTaskIdGenerator::try_new(0, FixedMockTime { millis: 1 }).unwrap()
    });
}

fn benchmark_mock_sequential_atomic(c: &mut Criterion) {
    bench_generator(c, "mock/sequential/atomic", || {
        AtomicTaskIdGenerator::try_new(0, FixedMockTime { millis: 1 }).unwrap()
    });
}

fn benchmark_mock_contended_lock(c: &mut Criterion) {
    bench_generator_contended(c, "mock/contended/lock", || {
        LockTaskIdGenerator::try_new(0, FixedMockTime { millis: 1 }).unwrap()
    });
}

fn benchmark_mock_contended_atomic(c: &mut Criterion) {
    bench_generator_contended(c, "mock/contended/atomic", || {
        AtomicTaskIdGenerator::try_new(0, FixedMockTime { millis: 1 }).unwrap()
    });
}

fn benchmark_wall_sequential_lock(c: &mut Criterion) {
    bench_generator_yield(c, "wall/sequential/lock", || {
        LockTaskIdGenerator::try_new(0, WallClock::default()).unwrap()
    });
}

fn benchmark_wall_sequential_atomic(c: &mut Criterion) {
    bench_generator_yield(c, "wall/sequential/atomic", || {
        AtomicTaskIdGenerator::try_new(0, WallClock::default()).unwrap()
    });
}

fn benchmark_page_token(c: &mut Criterion) {
    let codec = PageTokenCodec::from_secret(b"bench");
    let token = PageToken::new("7123895123451904", 25);
    let encoded = codec.encode(&token);

    let mut group = c.benchmark_group("page_token");
    group.bench_function("encode", |b| b.iter(|| black_box(codec.encode(&token))));
    group.bench_function("decode", |b| {
        b.iter(|| black_box(codec.decode(&encoded).unwrap()))
    });
    group.finish();
}

fn benchmark_manager(c: &mut Criterion) {
    const TASKS: usize = 256;

    let rt = Builder::new_multi_thread()
        .enable_all()
        .worker_threads(1)
        .build()
        .unwrap();

    let mut group = c.benchmark_group("manager");
    group.throughput(Throughput::Elements(TASKS as u64));

    group.bench_function(format!("create/{TASKS}"), |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let start = Instant::now();
                for _ in 0..iters {
                    let manager = TaskManager::new(
                        Arc::new(MemoryStore::new()),
                        Arc::new(AtomicTaskIdGenerator::try_new(0, WallClock::default()).unwrap()),
                        PageTokenCodec::with_random_key(),
                    );
                    for _ in 0..TASKS {
                        let task = manager
                            .create(CreateTaskRequest {
                                name: "bench".to_string(),
                                status: Status::Todo as i32,
                            })
                            .await
                            .unwrap();
                        black_box(task);
                    }
                }
                start.elapsed()
            })
        });
    });

    group.bench_function(format!("list/{TASKS}"), |b| {
        let manager = TaskManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(AtomicTaskIdGenerator::try_new(0, WallClock::default()).unwrap()),
            PageTokenCodec::with_random_key(),
        );
        rt.block_on(async {
            for _ in 0..TASKS {
                manager
                    .create(CreateTaskRequest {
                        name: "bench".to_string(),
                        status: Status::Todo as i32,
                    })
                    .await
                    .unwrap();
            }
        });

        b.iter(|| {
            rt.block_on(async {
                let page = manager
                    .list(ListTasksRequest {
                        page_token: String::new(),
                        page_size: TASKS as i32,
                    })
                    .await
                    .unwrap();
                black_box(page)
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_mock_sequential_lock,
    benchmark_mock_sequential_atomic,
    benchmark_mock_contended_lock,
    benchmark_mock_contended_atomic,
    benchmark_wall_sequential_lock,
    benchmark_wall_sequential_atomic,
    benchmark_page_token,
    benchmark_manager,
);
criterion_main!(benches);
