//! # Adaptive Control Simulation Entry Point
//!
//! Interactive driver for the hybrid PID/MPC + DDPG controller.
//!
//! ## Modes
//! - **Hybrid run:** adaptive PID/MPC blend with a setpoint step half-way through.
//! - **RL train → inference:** DDPG trains online, parameters are saved, then the
//!   frozen policy runs with exploration and learning disabled.
//! - **Backend comparison:** hybrid controller vs. the native engine, offline, same targets.
//!
//! ## Usage
//! `adaptive_control_sim [config.json]`: optional JSON config (see `SimConfig`).
//! `RUST_LOG=info` (or `debug` for per-tick logging).
//!
//! ## Outputs
//! - `data/logs/<run>_telemetry.csv`: one row per tick.
//! - `data/<run>_summary.csv`: per-channel min/max/mean/std plus tick counts.
//! - `data/agent_actor.json`, `data/agent_critic.json`: trained parameters.

use std::{
    env,
    fs::create_dir_all,
    io::{Write, stdin, stdout},
    sync::Arc,
    thread,
    time::Duration,
};

use log::{error, info, warn};

use adaptive_control_sim::{
    control::{engine::ControlEngine, hybrid::ControlMode, hybrid::HybridController, native::NativeEngine},
    runtime::runner::SimulationRunner,
    utils::{
        config::SimConfig,
        error::ControlResult,
        export::export_summary_csv,
        recorder::CsvRecorder,
        sink::{FanoutSink, LogSink, TelemetrySink},
    },
};

const DEFAULT_RUN_SECS: u64 = 10;
const AGENT_PREFIX: &str = "data/agent";
const STEP_TARGET: f64 = -2.0;
const COMPARISON_STEPS: usize = 400;

fn main() {
    env_logger::init();
    info!("=== ADAPTIVE CONTROL SIMULATION START ===");

    let config = load_config();

    loop {
        let choice = prompt_menu();
        let outcome = match choice.as_str() {
            "1" | "" => run_hybrid(&config, prompt_secs()),
            "2" => run_rl(&config, prompt_secs()),
            "3" => {
                compare_backends(&config);
                Ok(())
            }
            "4" => {
                println!("Exiting. Goodbye!");
                info!("=== ADAPTIVE CONTROL SIMULATION FINISHED ===");
                return;
            }
            other => {
                println!("Unrecognized option '{}', please try again.", other);
                Ok(())
            }
        };

        if let Err(e) = outcome {
            error!("Run failed: {}", e);
        }
        println!("\n Returning to menu...\n");
    }
}

fn load_config() -> SimConfig {
    match env::args().nth(1) {
        Some(path) => match SimConfig::load(&path) {
            Ok(cfg) => {
                info!("Loaded config from {}", path);
                cfg
            }
            Err(e) => {
                warn!("Config {} rejected ({}); using defaults", path, e);
                SimConfig::default()
            }
        },
        None => SimConfig::default(),
    }
}

fn prompt_menu() -> String {
    println!("\n┌─────────────────────────────────────────────┐");
    println!("│     SELECT CONTROL MODE                     │");
    println!("├─────────────────────────────────────────────┤");
    println!("│  1) Hybrid PID/MPC run                      │");
    println!("│  2) RL train, then inference                │");
    println!("│  3) Hybrid vs native backend                │");
    println!("│  4) Exit                                    │");
    println!("└─────────────────────────────────────────────┘");
    print!("Select [1/2/3/4] (default: 1): ");
    let _ = stdout().flush();

    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().to_string()
}

fn prompt_secs() -> u64 {
    print!("Run length per phase in seconds [default: {}]: ", DEFAULT_RUN_SECS);
    let _ = stdout().flush();
    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().parse::<u64>().unwrap_or(DEFAULT_RUN_SECS)
}

/// Runner with a log sink and a per-run CSV recorder.
fn build_runner(config: &SimConfig, run: &str) -> ControlResult<(SimulationRunner, Arc<CsvRecorder>)> {
    let recorder = Arc::new(CsvRecorder::create(format!("data/logs/{}_telemetry.csv", run))?);
    let sink = FanoutSink::default()
        .with(Arc::new(LogSink::default()))
        .with(recorder.clone() as Arc<dyn TelemetrySink>);
    Ok((SimulationRunner::new(config.clone(), Arc::new(sink)), recorder))
}

fn finish_run(runner: &SimulationRunner, recorder: &CsvRecorder, run: &str) -> ControlResult<()> {
    runner.stop();
    recorder.finish()?;

    let stats = runner.tick_stats();
    let latest = runner.get_latest_metrics();
    let radar = runner.get_radar_metrics();
    let spectrum = runner.get_fft_data();

    println!("\n[{}] ticks={} late={}", run, stats.ticks, stats.late_ticks);
    println!(
        "  position={:.3} target={:.2} error={:.3} u={:.2} loss={:.4}",
        latest.position, latest.target, latest.error, latest.control, latest.loss
    );
    println!(
        "  radar: stability={:.2} response={:.2} accuracy={:.2} efficiency={:.2} robustness={:.2}",
        radar[0], radar[1], radar[2], radar[3], radar[4]
    );
    println!("  error spectrum: {:.2?}", spectrum);

    export_summary_csv(&runner.get_history(), stats, format!("data/{}_summary.csv", run))
}

fn run_hybrid(config: &SimConfig, secs: u64) -> ControlResult<()> {
    let (runner, recorder) = build_runner(config, "hybrid")?;
    runner.set_mode(ControlMode::Hybrid);
    runner.start()?;

    info!("[Main] Hybrid run for {} s, target {:.2}", secs, runner.target());
    thread::sleep(Duration::from_millis(secs * 500));
    runner.set_target(STEP_TARGET);
    info!("[Main] Target stepped to {:.2}", STEP_TARGET);
    thread::sleep(Duration::from_millis(secs * 500));

    finish_run(&runner, &recorder, "hybrid")
}

fn run_rl(config: &SimConfig, secs: u64) -> ControlResult<()> {
    let (runner, recorder) = build_runner(config, "rl")?;
    create_dir_all("data").ok();

    if runner.load_agent(AGENT_PREFIX) {
        info!("[Main] Continuing from saved agent at {}", AGENT_PREFIX);
    }

    runner.set_mode(ControlMode::RlTrain);
    runner.start()?;
    info!("[Main] Training for {} s", secs);
    thread::sleep(Duration::from_secs(secs));

    let losses = runner.loss_history();
    let tail = &losses[losses.len().saturating_sub(50)..];
    let recent = if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };
    info!(
        "[Main] {} training steps, replay {} transitions, recent critic loss {:.4}",
        runner.training_steps(),
        runner.replay_len(),
        recent
    );

    if let Err(e) = runner.save_agent(AGENT_PREFIX) {
        warn!("[Main] Could not save agent: {}", e);
    }

    runner.reset()?;
    runner.set_mode(ControlMode::RlInference);
    info!("[Main] Inference for {} s", secs);
    thread::sleep(Duration::from_secs(secs));

    finish_run(&runner, &recorder, "rl")
}

/// Integrated absolute error of each backend over the same target profile.
fn compare_backends(config: &SimConfig) {
    let dt = config.dt;
    let mut engines: Vec<Box<dyn ControlEngine>> = vec![
        Box::new(HybridController::new(&config.controller, config.agent.clone())),
        Box::new(NativeEngine::new()),
    ];

    println!("\n{:<8} {:>12} {:>12}", "engine", "final_pos", "IAE");
    for engine in engines.iter_mut() {
        let c = &config.controller;
        engine.set_pid_gains(c.kp, c.ki, c.kd);
        let mut iae = 0.0;
        for k in 0..COMPARISON_STEPS {
            let target = if k < COMPARISON_STEPS / 2 {
                config.initial_target
            } else {
                STEP_TARGET
            };
            let out = engine.step(target, dt);
            iae += (target - out.position).abs() * dt;
        }
        println!("{:<8} {:>12.4} {:>12.4}", engine.name(), engine.position(), iae);
    }
}
