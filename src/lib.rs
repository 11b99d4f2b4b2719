//! # Adaptive Control Simulation
//!
//! Real-time adaptive controller for a single-axis second-order plant. A classical
//! PID/MPC blend and a DDPG actor-critic policy share one plant; a background runner
//! ticks the controller at a fixed rate and serves bounded telemetry snapshots.
//!
//! ## Layout
//! - `control`: plant model, PID, brute-force MPC, `HybridController` and the
//!   step-level `ControlEngine` trait (with an alternate `NativeEngine`).
//! - `learning`: MLP networks with explicit backprop and Adam, replay buffer, DDPG agent.
//! - `runtime`: `SimulationRunner`, telemetry ring buffers, radar/spectrum analytics.
//! - `utils`: config, errors, telemetry sinks, CSV recorder and summary export.

pub mod control;
pub mod learning;
pub mod runtime;
pub mod utils;
