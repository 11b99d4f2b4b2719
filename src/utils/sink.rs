//! sink.rs
//! Injected telemetry/logging sinks for the simulation runner.
//!
//! Sinks are called on the tick thread and must not block it: no file I/O here,
//! anything heavier goes through a queue (see `CsvRecorder`).

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use log::{debug, info, warn};

use crate::control::hybrid::ControlMode;
use crate::runtime::history::TelemetrySample;

/// Lifecycle and scheduling events emitted by the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    Started,
    Stopped { ticks: u64 },
    Reset,
    ModeChanged { from: ControlMode, to: ControlMode },
    /// Tick finished after its scheduled release; the sleep was skipped.
    DeadlineMiss { tick: u64, lateness: Duration },
    /// Tick thread did not exit within the join window and was abandoned.
    JoinTimeout { timeout: Duration },
    AgentSaved { prefix: PathBuf },
    AgentLoaded { prefix: PathBuf },
    AgentLoadFailed { prefix: PathBuf },
}

pub trait TelemetrySink: Send + Sync {
    fn on_tick(&self, sample: &TelemetrySample);
    fn on_event(&self, event: &RunnerEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn on_tick(&self, _sample: &TelemetrySample) {}
    fn on_event(&self, _event: &RunnerEvent) {}
}

/// Structured `log` records.
///
/// Verbose: one debug line per tick. Otherwise one info line every `summary_every` ticks.
pub struct LogSink {
    verbose: bool,
    summary_every: u64,
    ticks: AtomicU64,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(false, 20)
    }
}

impl LogSink {
    pub fn new(verbose: bool, summary_every: u64) -> Self {
        Self {
            verbose,
            summary_every: summary_every.max(1),
            ticks: AtomicU64::new(0),
        }
    }
}

impl TelemetrySink for LogSink {
    fn on_tick(&self, s: &TelemetrySample) {
        let n = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        if self.verbose {
            debug!(
                "[Tick {}] t={:.2}s pos={:.3} tgt={:.2} u={:.2} alpha={:.2} P={:.2} I={:.2} D={:.2} loss={:.4}",
                n, s.time, s.position, s.target, s.control, s.alpha, s.p_term, s.i_term, s.d_term, s.loss
            );
        } else if n % self.summary_every == 0 {
            info!(
                "[Tick {}] t={:.2}s pos={:.3} err={:.3} u={:.2} loss={:.4}",
                n, s.time, s.position, s.error, s.control, s.loss
            );
        }
    }

    fn on_event(&self, event: &RunnerEvent) {
        match event {
            RunnerEvent::Started => info!("[Runner] tick loop started"),
            RunnerEvent::Stopped { ticks } => info!("[Runner] tick loop stopped after {} ticks", ticks),
            RunnerEvent::Reset => info!("[Runner] controller and history reset"),
            RunnerEvent::ModeChanged { from, to } => info!("[Runner] mode {} -> {}", from, to),
            RunnerEvent::DeadlineMiss { tick, lateness } => {
                debug!("[Runner] tick {} late by {:?}", tick, lateness)
            }
            RunnerEvent::JoinTimeout { timeout } => {
                warn!("[Runner] tick thread did not stop within {:?}; abandoned", timeout)
            }
            RunnerEvent::AgentSaved { prefix } => info!("[Agent] saved to {:?}", prefix),
            RunnerEvent::AgentLoaded { prefix } => info!("[Agent] loaded from {:?}", prefix),
            RunnerEvent::AgentLoadFailed { prefix } => {
                warn!("[Agent] load from {:?} failed; parameters unchanged", prefix)
            }
        }
    }
}

/// Forwards to every inner sink in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl TelemetrySink for FanoutSink {
    fn on_tick(&self, sample: &TelemetrySample) {
        for sink in &self.sinks {
            sink.on_tick(sample);
        }
    }

    fn on_event(&self, event: &RunnerEvent) {
        for sink in &self.sinks {
            sink.on_event(event);
        }
    }
}
