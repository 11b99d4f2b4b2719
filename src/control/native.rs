//! native.rs
//! Alternate fixed-gain backend with the narrow init / gains / step / position
//! contract. Only used when selected explicitly; the runner never needs it.
//!
//! Its internal model differs from the hybrid path: the MPC assumes friction 0.1
//! and charges effort once per candidate, and the plant has no disturbance.

use crate::control::engine::{ControlEngine, StepOutput};
use crate::control::mpc::{GRID_POINTS, MpcController};

const HORIZON: usize = 10;
const MODEL_DT: f64 = 0.1;
const MODEL_FRICTION: f64 = 0.1;
const EFFORT_WEIGHT: f64 = 0.1;
const PLANT_DAMPING: f64 = 0.5;
const INTEGRAL_LIMIT: f64 = 10.0;
const OUTPUT_LIMIT: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct NativeEngine {
    position: f64,
    velocity: f64,
    integral_error: f64,
    last_error: f64,
    kp: f64,
    ki: f64,
    kd: f64,
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine {
    pub fn new() -> Self {
        Self {
            position: 0.0,
            velocity: 0.0,
            integral_error: 0.0,
            last_error: 0.0,
            kp: 2.0,
            ki: 0.5,
            kd: 0.1,
        }
    }

    /// Integral is clamped after the derivative is formed.
    fn compute_pid(&mut self, target: f64, dt: f64) -> f64 {
        let error = target - self.position;
        self.integral_error += error * dt;
        let derivative = if dt > 0.0 {
            (error - self.last_error) / dt
        } else {
            0.0
        };
        self.last_error = error;
        self.integral_error = self.integral_error.clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);

        self.kp * error + self.ki * self.integral_error + self.kd * derivative
    }

    fn compute_mpc(&self, target: f64) -> f64 {
        let mut best_u = 0.0;
        let mut min_cost = f64::INFINITY;
        for i in 0..GRID_POINTS {
            let u = MpcController::candidate(i);
            let (mut p, mut v) = (self.position, self.velocity);
            let mut cost = 0.0;
            for _ in 0..HORIZON {
                v += (u - MODEL_FRICTION * v) * MODEL_DT;
                p += v * MODEL_DT;
                cost += (target - p).powi(2);
            }
            cost += EFFORT_WEIGHT * u * u;
            if cost < min_cost {
                min_cost = cost;
                best_u = u;
            }
        }
        best_u
    }
}

impl ControlEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn step(&mut self, target: f64, dt: f64) -> StepOutput {
        let u_pid = self.compute_pid(target, dt);
        let u_mpc = self.compute_mpc(target);

        let alpha = ((target - self.position).abs() / 5.0).clamp(0.0, 1.0);
        let control = (alpha * u_pid + (1.0 - alpha) * u_mpc).clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT);

        self.velocity += (control - PLANT_DAMPING * self.velocity) * dt;
        self.position += self.velocity * dt;

        StepOutput {
            position: self.position,
            control,
            alpha,
            loss: 0.0,
        }
    }

    fn set_pid_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn reset(&mut self) {
        self.position = 0.0;
        self.velocity = 0.0;
        self.integral_error = 0.0;
        self.last_error = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::hybrid::HybridController;

    #[test]
    fn both_backends_drive_toward_target() {
        let mut engines: Vec<Box<dyn ControlEngine>> =
            vec![Box::new(NativeEngine::new()), Box::new(HybridController::default())];
        for engine in engines.iter_mut() {
            for _ in 0..400 {
                engine.step(3.0, 0.05);
            }
            assert!(
                (engine.position() - 3.0).abs() < 0.5,
                "{} ended at {}",
                engine.name(),
                engine.position()
            );
        }
    }

    #[test]
    fn reset_and_gains() {
        let mut engine = NativeEngine::new();
        engine.step(5.0, 0.05);
        assert!(engine.position() > 0.0);
        engine.reset();
        assert_eq!(engine.position(), 0.0);

        engine.set_pid_gains(0.0, 0.0, 0.0);
        // pure PID region with zero gains gives zero command
        let out = engine.step(50.0, 0.05);
        assert_eq!(out.alpha, 1.0);
        assert_eq!(out.control, 0.0);
    }

    #[test]
    fn zero_dt_is_finite() {
        let mut engine = NativeEngine::new();
        let out = engine.step(1.0, 0.0);
        assert!(out.control.is_finite());
        assert_eq!(out.position, 0.0);
    }
}
