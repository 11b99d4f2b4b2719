/*
Snapshot reads against a running tick loop. Several reader threads repeatedly copy
out the history and analytics while the runner appends every tick, measuring the
cost of the single telemetry lock under contention.
*/
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::{
    hint::black_box,
    sync::Arc,
    thread,
};

use adaptive_control_sim::runtime::runner::SimulationRunner;
use adaptive_control_sim::utils::{config::SimConfig, sink::NoopSink};

// Number of concurrent reader threads
const READER_COUNTS: &[usize] = &[1, 2, 4, 8];

// Reads each thread performs per iteration
const READS_PER_THREAD: usize = 200;

fn snapshot_contention_bench(c: &mut Criterion) {
    let mut cfg = SimConfig::default();
    cfg.dt = 0.001;
    cfg.agent.hidden = vec![32, 32];
    let runner = Arc::new(SimulationRunner::new(cfg, Arc::new(NoopSink)));
    if runner.start().is_err() {
        return;
    }
    // fill the history so every read copies max_points samples
    thread::sleep(std::time::Duration::from_millis(300));

    let mut group = c.benchmark_group("snapshot_contention");
    for &readers in READER_COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(readers), &readers, |b, &readers| {
            b.iter(|| {
                let handles: Vec<_> = (0..readers)
                    .map(|_| {
                        let r = Arc::clone(&runner);
                        thread::spawn(move || {
                            for _ in 0..READS_PER_THREAD {
                                black_box(r.get_history());
                                black_box(r.get_radar_metrics());
                                black_box(r.get_fft_data());
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    let _ = h.join();
                }
            })
        });
    }
    group.finish();

    runner.stop();
}

criterion_group!(benches, snapshot_contention_bench);
criterion_main!(benches);
