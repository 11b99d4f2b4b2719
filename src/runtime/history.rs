//! history.rs
//! Bounded telemetry ring buffers, one per channel, index-aligned.
//!
//! A sample is appended to every channel in one call, so as long as the history is
//! only touched under one lock, readers always see channels of equal length.

use std::{collections::VecDeque, time::Instant};

use serde::Serialize;

/// One tick of telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub time: f64,
    pub target: f64,
    pub position: f64,
    pub velocity: f64,
    pub control: f64,
    pub alpha: f64,
    pub error: f64,
    pub p_term: f64,
    pub i_term: f64,
    pub d_term: f64,
    pub loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Time,
    Target,
    Position,
    Velocity,
    Control,
    Alpha,
    Error,
    PTerm,
    ITerm,
    DTerm,
    Loss,
}

/// Owned copy of every channel, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySnapshot {
    pub time: Vec<f64>,
    pub target: Vec<f64>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub control: Vec<f64>,
    pub alpha: Vec<f64>,
    pub error: Vec<f64>,
    pub p_term: Vec<f64>,
    pub i_term: Vec<f64>,
    pub d_term: Vec<f64>,
    pub loss: Vec<f64>,
}

impl HistorySnapshot {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Lengths of all eleven channels, in declaration order.
    pub fn channel_lengths(&self) -> [usize; 11] {
        [
            self.time.len(),
            self.target.len(),
            self.position.len(),
            self.velocity.len(),
            self.control.len(),
            self.alpha.len(),
            self.error.len(),
            self.p_term.len(),
            self.i_term.len(),
            self.d_term.len(),
            self.loss.len(),
        ]
    }
}

/// Most recent values for telemetry cards. All zero before the first tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatestMetrics {
    pub position: f64,
    pub target: f64,
    pub error: f64,
    pub velocity: f64,
    pub control: f64,
    pub loss: f64,
}

/// Appends value; removes oldest if at capacity (FIFO). A zero cap keeps nothing.
#[inline]
pub fn push_capped(buf: &mut VecDeque<f64>, val: f64, cap: usize) {
    if cap == 0 {
        return;
    }
    if buf.len() >= cap {
        buf.pop_front();
    }
    buf.push_back(val);
}

#[derive(Debug, Clone)]
pub struct TelemetryHistory {
    time: VecDeque<f64>,
    target: VecDeque<f64>,
    position: VecDeque<f64>,
    velocity: VecDeque<f64>,
    control: VecDeque<f64>,
    alpha: VecDeque<f64>,
    error: VecDeque<f64>,
    p_term: VecDeque<f64>,
    i_term: VecDeque<f64>,
    d_term: VecDeque<f64>,
    loss: VecDeque<f64>,
    capacity: usize,
    epoch: Instant,
}

impl TelemetryHistory {
    pub fn new(capacity: usize) -> Self {
        let ring = || VecDeque::with_capacity(capacity);
        Self {
            time: ring(),
            target: ring(),
            position: ring(),
            velocity: ring(),
            control: ring(),
            alpha: ring(),
            error: ring(),
            p_term: ring(),
            i_term: ring(),
            d_term: ring(),
            loss: ring(),
            capacity,
            epoch: Instant::now(),
        }
    }

    pub fn push(&mut self, s: &TelemetrySample) {
        let cap = self.capacity;
        push_capped(&mut self.time, s.time, cap);
        push_capped(&mut self.target, s.target, cap);
        push_capped(&mut self.position, s.position, cap);
        push_capped(&mut self.velocity, s.velocity, cap);
        push_capped(&mut self.control, s.control, cap);
        push_capped(&mut self.alpha, s.alpha, cap);
        push_capped(&mut self.error, s.error, cap);
        push_capped(&mut self.p_term, s.p_term, cap);
        push_capped(&mut self.i_term, s.i_term, cap);
        push_capped(&mut self.d_term, s.d_term, cap);
        push_capped(&mut self.loss, s.loss, cap);
    }

    /// Empties every channel and restarts the wall clock.
    pub fn clear(&mut self) {
        for buf in self.channels_mut() {
            buf.clear();
        }
        self.epoch = Instant::now();
    }

    /// Restarts the wall clock used for the `time` channel.
    pub fn restart_clock(&mut self) {
        self.epoch = Instant::now();
    }

    /// Seconds since the last clock restart.
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let copy = |buf: &VecDeque<f64>| buf.iter().copied().collect::<Vec<_>>();
        HistorySnapshot {
            time: copy(&self.time),
            target: copy(&self.target),
            position: copy(&self.position),
            velocity: copy(&self.velocity),
            control: copy(&self.control),
            alpha: copy(&self.alpha),
            error: copy(&self.error),
            p_term: copy(&self.p_term),
            i_term: copy(&self.i_term),
            d_term: copy(&self.d_term),
            loss: copy(&self.loss),
        }
    }

    pub fn latest(&self) -> LatestMetrics {
        let last = |buf: &VecDeque<f64>| buf.back().copied().unwrap_or(0.0);
        LatestMetrics {
            position: last(&self.position),
            target: last(&self.target),
            error: last(&self.error),
            velocity: last(&self.velocity),
            control: last(&self.control),
            loss: last(&self.loss),
        }
    }

    /// Copies the newest `n` values of one channel (fewer if not available), oldest first.
    pub fn tail(&self, channel: Channel, n: usize) -> Vec<f64> {
        let buf = self.channel(channel);
        let skip = buf.len().saturating_sub(n);
        buf.iter().skip(skip).copied().collect()
    }

    fn channel(&self, channel: Channel) -> &VecDeque<f64> {
        match channel {
            Channel::Time => &self.time,
            Channel::Target => &self.target,
            Channel::Position => &self.position,
            Channel::Velocity => &self.velocity,
            Channel::Control => &self.control,
            Channel::Alpha => &self.alpha,
            Channel::Error => &self.error,
            Channel::PTerm => &self.p_term,
            Channel::ITerm => &self.i_term,
            Channel::DTerm => &self.d_term,
            Channel::Loss => &self.loss,
        }
    }

    fn channels_mut(&mut self) -> [&mut VecDeque<f64>; 11] {
        [
            &mut self.time,
            &mut self.target,
            &mut self.position,
            &mut self.velocity,
            &mut self.control,
            &mut self.alpha,
            &mut self.error,
            &mut self.p_term,
            &mut self.i_term,
            &mut self.d_term,
            &mut self.loss,
        ]
    }
}
