use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use adaptive_control_sim::control::hybrid::ControlMode;
use adaptive_control_sim::runtime::{analytics::DEFAULT_RADAR, runner::SimulationRunner};
use adaptive_control_sim::utils::{config::SimConfig, sink::NoopSink};

fn fast_config(max_points: usize) -> SimConfig {
    let mut cfg = SimConfig::default();
    cfg.dt = 0.002;
    cfg.max_points = max_points;
    cfg.agent.hidden = vec![16, 16];
    cfg.agent.seed = Some(5);
    cfg
}

#[test]
fn fresh_runner_reports_defaults() {
    let runner = SimulationRunner::new(fast_config(200), Arc::new(NoopSink));
    assert!(runner.get_history().is_empty());
    assert_eq!(runner.get_latest_metrics().position, 0.0);
    assert_eq!(runner.get_radar_metrics(), DEFAULT_RADAR);
    assert_eq!(runner.get_fft_data(), [0.0; 10]);
    assert!(!runner.is_running());
}

#[test]
fn channels_stay_aligned_under_concurrent_reads() {
    let runner = Arc::new(SimulationRunner::new(fast_config(50), Arc::new(NoopSink)));
    runner.start().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let r = Arc::clone(&runner);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0;
                while !done.load(Ordering::Relaxed) {
                    let snap = r.get_history();
                    let lengths = snap.channel_lengths();
                    assert!(lengths.iter().all(|&l| l == lengths[0]), "{:?}", lengths);
                    assert!(lengths[0] <= 50);
                    assert!(snap.time.windows(2).all(|w| w[0] <= w[1]));

                    let radar = r.get_radar_metrics();
                    assert!(radar.iter().all(|v| v.is_finite()));
                    assert!(r.get_fft_data().iter().all(|v| (0.0..=1.0).contains(v)));
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(400));
    done.store(true, Ordering::Relaxed);
    for h in readers {
        assert!(h.join().unwrap() > 0);
    }
    runner.stop();

    let snap = runner.get_history();
    assert_eq!(snap.len(), 50);
    assert!(runner.tick_stats().ticks >= 50);
}

#[test]
fn reset_clears_history_and_keeps_running() {
    let runner = SimulationRunner::new(fast_config(100), Arc::new(NoopSink));
    runner.start().unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(!runner.get_history().is_empty());

    runner.stop();
    runner.reset().unwrap();
    assert!(runner.get_history().is_empty());
    assert_eq!(runner.tick_stats().ticks, 0);
    assert!(!runner.is_running());

    runner.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    runner.reset().unwrap();
    assert!(runner.is_running());
    runner.stop();
    // history restarts from a fresh epoch after the reset
    let snap = runner.get_history();
    assert!(snap.time.first().map_or(true, |&t| t < 1.0));
}

#[test]
fn target_change_shows_up_in_telemetry() {
    let runner = SimulationRunner::new(fast_config(200), Arc::new(NoopSink));
    runner.set_target(-3.0);
    runner.start().unwrap();
    thread::sleep(Duration::from_millis(60));
    runner.stop();

    let snap = runner.get_history();
    assert!(!snap.is_empty());
    assert!(snap.target.iter().all(|&t| t == -3.0));
    for i in 0..snap.len() {
        assert_eq!(snap.error[i], snap.target[i] - snap.position[i]);
    }
    let latest = runner.get_latest_metrics();
    assert_eq!(latest.target, -3.0);
    assert_eq!(latest.position, *snap.position.last().unwrap());
}

#[test]
fn training_through_the_runner_fills_buffer() {
    let runner = SimulationRunner::new(fast_config(200), Arc::new(NoopSink));
    runner.set_mode(ControlMode::RlTrain);
    runner.start().unwrap();
    thread::sleep(Duration::from_millis(300));
    runner.stop();

    let ticks = runner.tick_stats().ticks as usize;
    assert_eq!(runner.replay_len(), ticks.min(10_000));
    if ticks > 64 {
        assert!(!runner.loss_history().is_empty());
    }
    assert_eq!(runner.training_steps() as usize, ticks);
}
