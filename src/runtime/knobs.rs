//! knobs.rs
//! Lock-free single-word control inputs shared between callers and the tick loop.
//!
//! Each knob is one atomic word with relaxed ordering: the tick loop reads them at
//! the start of every tick, so a write becomes visible within one tick. The three
//! gains are separate words, so a tick may see a gain set mid-update.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use crate::control::hybrid::ControlMode;
use crate::utils::config::SimConfig;

#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Values read by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnobValues {
    pub target: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub noise: f64,
    pub mode: ControlMode,
    pub dt: f64,
}

#[derive(Debug)]
pub struct ControlKnobs {
    target: AtomicF64,
    kp: AtomicF64,
    ki: AtomicF64,
    kd: AtomicF64,
    noise: AtomicF64,
    mode: AtomicU8,
    dt: AtomicF64,
}

impl ControlKnobs {
    pub fn from_config(cfg: &SimConfig) -> Self {
        let c = &cfg.controller;
        Self {
            target: AtomicF64::new(cfg.initial_target),
            kp: AtomicF64::new(c.kp),
            ki: AtomicF64::new(c.ki),
            kd: AtomicF64::new(c.kd),
            noise: AtomicF64::new(c.noise_level),
            mode: AtomicU8::new(ControlMode::Hybrid.to_u8()),
            dt: AtomicF64::new(cfg.dt),
        }
    }

    pub fn read(&self) -> KnobValues {
        KnobValues {
            target: self.target.load(),
            kp: self.kp.load(),
            ki: self.ki.load(),
            kd: self.kd.load(),
            noise: self.noise.load(),
            mode: self.mode(),
            dt: self.dt.load(),
        }
    }

    pub fn target(&self) -> f64 {
        self.target.load()
    }

    pub fn set_target(&self, value: f64) {
        self.target.store(value);
    }

    pub fn gains(&self) -> (f64, f64, f64) {
        (self.kp.load(), self.ki.load(), self.kd.load())
    }

    pub fn set_gains(&self, kp: f64, ki: f64, kd: f64) {
        self.kp.store(kp);
        self.ki.store(ki);
        self.kd.store(kd);
    }

    pub fn noise(&self) -> f64 {
        self.noise.load()
    }

    pub fn set_noise(&self, level: f64) {
        self.noise.store(level);
    }

    pub fn mode(&self) -> ControlMode {
        ControlMode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    /// Returns the previous mode.
    pub fn swap_mode(&self, mode: ControlMode) -> ControlMode {
        ControlMode::from_u8(self.mode.swap(mode.to_u8(), Ordering::Relaxed))
    }

    pub fn dt(&self) -> f64 {
        self.dt.load()
    }

    pub fn set_dt(&self, dt: f64) {
        self.dt.store(dt);
    }
}
