//! runner.rs
//! Fixed-rate background simulation runner.
//!
//! One tick thread per runner drives the `HybridController`:
//! - Knobs (target, gains, noise, mode, dt) are atomics read at the start of each tick.
//! - Telemetry is appended to every channel under one `parking_lot::Mutex`; readers
//!   only ever get owned copies.
//! - Release schedule accumulates `next_tick += dt` on a monotonic clock. A tick that
//!   finishes late skips the sleep without moving the baseline.
//! - `stop()` is cooperative and waits at most `join_timeout_ms` before abandoning
//!   the thread. Each worker has its own run flag, so an abandoned thread never sees
//!   a later `start()` and never touches history or counters after its stop.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use spin_sleep::{SpinSleeper, SpinStrategy};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::control::hybrid::{ControlMode, HybridController};
use crate::runtime::{
    analytics::{FFT_WINDOW, RADAR_WINDOW, SpectrumAnalyzer, SPECTRUM_BINS, radar_scores},
    history::{Channel, HistorySnapshot, LatestMetrics, TelemetryHistory, TelemetrySample},
    knobs::ControlKnobs,
};
use crate::utils::{
    config::SimConfig,
    error::{ControlError, ControlResult},
    sink::{LogSink, RunnerEvent, TelemetrySink},
};

/// Tick accounting since construction or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    pub ticks: u64,
    /// Ticks that ended after their scheduled release.
    pub late_ticks: u64,
}

#[derive(Default)]
struct TickCounters {
    ticks: AtomicU64,
    late: AtomicU64,
}

impl TickCounters {
    fn snapshot(&self) -> TickStats {
        TickStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            late_ticks: self.late.load(Ordering::Relaxed),
        }
    }

    fn clear(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.late.store(0, Ordering::Relaxed);
    }
}

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<()>,
    running: Arc<AtomicBool>,
}

/// Everything the tick thread owns a handle to.
struct TickContext {
    controller: Arc<Mutex<HybridController>>,
    history: Arc<Mutex<TelemetryHistory>>,
    knobs: Arc<ControlKnobs>,
    running: Arc<AtomicBool>,
    counters: Arc<TickCounters>,
    sink: Arc<dyn TelemetrySink>,
    spin_accuracy_ns: u32,
    pin_core: Option<usize>,
    done: Sender<()>,
}

pub struct SimulationRunner {
    config: SimConfig,
    controller: Arc<Mutex<HybridController>>,
    history: Arc<Mutex<TelemetryHistory>>,
    knobs: Arc<ControlKnobs>,
    counters: Arc<TickCounters>,
    sink: Arc<dyn TelemetrySink>,
    spectrum: SpectrumAnalyzer,
    worker: Mutex<Option<Worker>>,
}

impl Default for SimulationRunner {
    fn default() -> Self {
        Self::new(SimConfig::default(), Arc::new(LogSink::default()))
    }
}

impl SimulationRunner {
    pub fn new(config: SimConfig, sink: Arc<dyn TelemetrySink>) -> Self {
        let controller = HybridController::new(&config.controller, config.agent.clone());
        Self {
            controller: Arc::new(Mutex::new(controller)),
            history: Arc::new(Mutex::new(TelemetryHistory::new(config.max_points))),
            knobs: Arc::new(ControlKnobs::from_config(&config)),
            counters: Arc::new(TickCounters::default()),
            sink,
            spectrum: SpectrumAnalyzer::new(),
            worker: Mutex::new(None),
            config,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Launches the tick thread. No-op if already running.
    pub fn start(&self) -> ControlResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        let running = Arc::new(AtomicBool::new(true));

        self.history.lock().restart_clock();

        let (done_tx, done_rx) = bounded(1);
        let ctx = TickContext {
            controller: self.controller.clone(),
            history: self.history.clone(),
            knobs: self.knobs.clone(),
            running: running.clone(),
            counters: self.counters.clone(),
            sink: self.sink.clone(),
            spin_accuracy_ns: self.config.spin_accuracy_ns,
            pin_core: self.config.pin_core,
            done: done_tx,
        };

        let builder = thread::Builder::new().name("control-tick".into());
        let spawned = if self.config.realtime_priority {
            builder.spawn_with_priority(ThreadPriority::Max, move |prio| {
                if let Err(e) = prio {
                    warn!("[Runner] could not raise tick thread priority: {:?}", e);
                }
                tick_loop(ctx)
            })
        } else {
            builder.spawn(move || tick_loop(ctx))
        };

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                error!("[Runner] failed to spawn tick thread: {}", e);
                return Err(ControlError::Spawn(e));
            }
        };

        *worker = Some(Worker {
            handle,
            done: done_rx,
            running,
        });
        self.sink.on_event(&RunnerEvent::Started);
        Ok(())
    }

    /// Requests loop exit after the current tick and waits up to the join timeout.
    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        worker.running.store(false, Ordering::Release);

        let timeout = Duration::from_millis(self.config.join_timeout_ms);
        match worker.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    error!("[Runner] tick thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                self.sink.on_event(&RunnerEvent::JoinTimeout { timeout });
                // detached: it sees its own cleared flag once the current tick ends
                drop(worker.handle);
            }
        }

        self.sink.on_event(&RunnerEvent::Stopped {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
        });
    }

    /// Stops if running, clears controller state, history and tick counts, then
    /// restarts if it had been running. Learned agent state survives.
    pub fn reset(&self) -> ControlResult<()> {
        let was_running = self.is_running();
        self.stop();

        {
            let mut controller = self.controller.lock();
            let mut history = self.history.lock();
            controller.reset();
            history.clear();
            self.counters.clear();
        }
        self.sink.on_event(&RunnerEvent::Reset);

        if was_running {
            self.start()?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    // ========================================================================
    // Knobs: applied by the tick loop on its next tick
    // ========================================================================

    pub fn set_target(&self, value: f64) {
        if !value.is_finite() {
            warn!("[Runner] ignoring non-finite target {}", value);
            return;
        }
        self.knobs.set_target(value);
    }

    pub fn set_pid_gains(&self, kp: f64, ki: f64, kd: f64) {
        if ![kp, ki, kd].iter().all(|g| g.is_finite()) {
            warn!("[Runner] ignoring non-finite gains ({}, {}, {})", kp, ki, kd);
            return;
        }
        self.knobs.set_gains(kp, ki, kd);
    }

    pub fn set_noise(&self, level: f64) {
        if !(level.is_finite() && level >= 0.0) {
            warn!("[Runner] ignoring invalid noise level {}", level);
            return;
        }
        self.knobs.set_noise(level);
    }

    pub fn set_mode(&self, mode: ControlMode) {
        let from = self.knobs.swap_mode(mode);
        if from != mode {
            self.sink.on_event(&RunnerEvent::ModeChanged { from, to: mode });
        }
    }

    /// Changes the tick period and the dt handed to the controller.
    pub fn set_dt(&self, dt: f64) {
        if !(dt.is_finite() && dt > 0.0) {
            warn!("[Runner] ignoring invalid dt {}", dt);
            return;
        }
        self.knobs.set_dt(dt);
    }

    pub fn target(&self) -> f64 {
        self.knobs.target()
    }

    pub fn pid_gains(&self) -> (f64, f64, f64) {
        self.knobs.gains()
    }

    pub fn noise(&self) -> f64 {
        self.knobs.noise()
    }

    pub fn mode(&self) -> ControlMode {
        self.knobs.mode()
    }

    pub fn dt(&self) -> f64 {
        self.knobs.dt()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // ========================================================================
    // Snapshots (owned copies)
    // ========================================================================

    pub fn get_history(&self) -> HistorySnapshot {
        self.history.lock().snapshot()
    }

    pub fn get_latest_metrics(&self) -> LatestMetrics {
        self.history.lock().latest()
    }

    /// `[stability, response, accuracy, efficiency, robustness]`
    pub fn get_radar_metrics(&self) -> [f64; 5] {
        let (errors, velocities, controls) = {
            let h = self.history.lock();
            (
                h.tail(Channel::Error, RADAR_WINDOW),
                h.tail(Channel::Velocity, RADAR_WINDOW),
                h.tail(Channel::Control, RADAR_WINDOW),
            )
        };
        radar_scores(&errors, &velocities, &controls)
    }

    pub fn get_fft_data(&self) -> [f64; SPECTRUM_BINS] {
        let errors = self.history.lock().tail(Channel::Error, FFT_WINDOW);
        self.spectrum.error_spectrum(&errors)
    }

    pub fn tick_stats(&self) -> TickStats {
        self.counters.snapshot()
    }

    // ========================================================================
    // Agent access: these lock the controller, so they wait out a running tick
    // ========================================================================

    pub fn loss_history(&self) -> Vec<f64> {
        self.controller.lock().agent().loss_history().iter().copied().collect()
    }

    pub fn replay_len(&self) -> usize {
        self.controller.lock().agent().replay_buffer().size()
    }

    pub fn training_steps(&self) -> u64 {
        self.controller.lock().training_steps()
    }

    pub fn save_agent(&self, prefix: impl AsRef<Path>) -> ControlResult<()> {
        let prefix = prefix.as_ref();
        self.controller.lock().agent().save(prefix)?;
        self.sink.on_event(&RunnerEvent::AgentSaved {
            prefix: prefix.to_path_buf(),
        });
        Ok(())
    }

    /// Never fails loudly: on any problem the agent is left untouched and `false` returned.
    pub fn load_agent(&self, prefix: impl AsRef<Path>) -> bool {
        let prefix = prefix.as_ref();
        let loaded = self.controller.lock().agent_mut().load(prefix);
        let prefix = prefix.to_path_buf();
        let event = if loaded {
            RunnerEvent::AgentLoaded { prefix }
        } else {
            RunnerEvent::AgentLoadFailed { prefix }
        };
        self.sink.on_event(&event);
        loaded
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pin_current_thread(core: usize) {
    let core_ids = core_affinity::get_core_ids().unwrap_or_default();
    match core_ids.get(core) {
        Some(core_id) if core_affinity::set_for_current(*core_id) => {
            info!("[Runner] tick thread pinned to core {}", core)
        }
        Some(_) => warn!("[Runner] failed to pin tick thread to core {}", core),
        None => warn!("[Runner] core {} not among available cores", core),
    }
}

fn tick_loop(ctx: TickContext) {
    if let Some(core) = ctx.pin_core {
        pin_current_thread(core);
    }

    let sleeper = SpinSleeper::new(ctx.spin_accuracy_ns).with_spin_strategy(SpinStrategy::YieldThread);
    let mut next_tick = Instant::now();

    while ctx.running.load(Ordering::Acquire) {
        let knobs = ctx.knobs.read();
        let dt = knobs.dt;

        // ====================================================================
        // Control step
        // ====================================================================
        let mut sample = {
            let mut controller = ctx.controller.lock();
            if !ctx.running.load(Ordering::Acquire) {
                break;
            }
            controller.set_pid_gains(knobs.kp, knobs.ki, knobs.kd);
            controller.set_noise(knobs.noise);
            controller.set_mode(knobs.mode);

            let out = controller.step(knobs.target, dt);
            let error = knobs.target - out.position;
            let terms = controller.pid().breakdown(error, dt);

            TelemetrySample {
                time: 0.0,
                target: knobs.target,
                position: out.position,
                velocity: controller.plant().velocity(),
                control: out.control,
                alpha: out.alpha,
                error,
                p_term: terms.p_term,
                i_term: terms.i_term,
                d_term: terms.d_term,
                loss: out.loss,
            }
        };

        // ====================================================================
        // Telemetry: every channel advances together
        // ====================================================================
        let tick = {
            let mut history = ctx.history.lock();
            if !ctx.running.load(Ordering::Acquire) {
                break;
            }
            sample.time = history.elapsed_secs();
            history.push(&sample);
            ctx.counters.ticks.fetch_add(1, Ordering::Relaxed) + 1
        };
        ctx.sink.on_tick(&sample);

        // ====================================================================
        // Release schedule
        // ====================================================================
        next_tick += Duration::try_from_secs_f64(dt).unwrap_or(Duration::ZERO);
        let now = Instant::now();
        if now < next_tick {
            sleeper.sleep(next_tick - now);
        } else {
            ctx.counters.late.fetch_add(1, Ordering::Relaxed);
            ctx.sink.on_event(&RunnerEvent::DeadlineMiss {
                tick,
                lateness: now - next_tick,
            });
        }
    }

    let _ = ctx.done.send(());
}
