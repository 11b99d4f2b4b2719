//! pid.rs
//! Classical PID feedback law with a clamped integral accumulator (anti-windup).
//!
//! The accumulator is clamped, not the output, so once the error changes sign the
//! integral unwinds at the normal rate instead of first burning off excess windup.

use serde::Serialize;

use crate::utils::config::ControllerConfig;

/// Per-term view of the PID state, reconstructed for telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PidBreakdown {
    pub p_term: f64,
    pub i_term: f64,
    pub d_term: f64,
}

#[derive(Debug, Clone)]
pub struct PidController {
    /// Gains are public: they can be changed at any time and apply on the next `compute`.
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    integral: f64,
    last_error: f64,
    integral_limit: f64,
}

impl Default for PidController {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

impl PidController {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            last_error: 0.0,
            integral_limit: 10.0,
        }
    }

    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self {
            integral_limit: cfg.integral_limit,
            ..Self::new(cfg.kp, cfg.ki, cfg.kd)
        }
    }

    /// One PID step. Returns `P + I + D`.
    ///
    /// The derivative is 0 when `dt <= 0`.
    pub fn compute(&mut self, error: f64, dt: f64) -> f64 {
        let p = self.kp * error;

        self.integral = (self.integral + error * dt).clamp(-self.integral_limit, self.integral_limit);
        let i = self.ki * self.integral;

        let derivative = if dt > 0.0 {
            (error - self.last_error) / dt
        } else {
            0.0
        };
        let d = self.kd * derivative;
        self.last_error = error;

        p + i + d
    }

    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }

    #[inline]
    pub fn integral(&self) -> f64 {
        self.integral
    }

    #[inline]
    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    /// Rebuilds the three terms from the current gains and accumulator for `error`.
    /// Read-only: nothing here feeds back into control.
    pub fn breakdown(&self, error: f64, dt: f64) -> PidBreakdown {
        let d_term = if dt > 0.0 {
            self.kd * (error - self.last_error) / dt
        } else {
            0.0
        };
        PidBreakdown {
            p_term: self.kp * error,
            i_term: self.ki * self.integral,
            d_term,
        }
    }
}
