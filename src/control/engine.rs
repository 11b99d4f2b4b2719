//! Step-level interface shared by every control backend.

use serde::Serialize;

/// Result of one control step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StepOutput {
    pub position: f64,
    pub control: f64,
    /// PID share of the blended command, in [0, 1]. 0 for pure RL.
    pub alpha: f64,
    /// Critic loss of the training update made during this step, else 0.
    pub loss: f64,
}

/// A plant plus its controller, advanced one tick at a time.
pub trait ControlEngine: Send {
    fn name(&self) -> &'static str;
    fn step(&mut self, target: f64, dt: f64) -> StepOutput;
    fn set_pid_gains(&mut self, kp: f64, ki: f64, kd: f64);
    fn position(&self) -> f64;
    fn reset(&mut self);
}
