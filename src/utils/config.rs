//! Simulation, controller and agent configuration.
//!
//! Every field has a default so a partial JSON file is enough:
//! `{"dt": 0.02, "agent": {"hidden": [64, 64]}}` overrides only those values.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::utils::error::{ControlError, ControlResult};

/// Classical controller and plant settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Anti-windup bound on the integral accumulator.
    pub integral_limit: f64,
    /// Final actuator clamp, symmetric.
    pub output_limit: f64,
    pub mpc_horizon: usize,
    /// Internal prediction step of the MPC model (independent of the tick dt).
    pub mpc_dt: f64,
    pub noise_level: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.5,
            kd: 0.1,
            integral_limit: 10.0,
            output_limit: 10.0,
            mpc_horizon: 10,
            mpc_dt: 0.1,
            noise_level: 0.0,
        }
    }
}

/// DDPG hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DdpgConfig {
    /// Actor output bound: actions live in [-max_action, max_action].
    pub max_action: f64,
    /// Hidden layer widths shared by actor and critic.
    pub hidden: Vec<usize>,
    pub gamma: f64,
    pub tau: f64,
    pub lr_actor: f64,
    pub lr_critic: f64,
    pub batch_size: usize,
    pub buffer_capacity: usize,
    /// Exploration noise std used in training mode.
    pub train_noise: f64,
    /// Fixed seed for weight init, sampling and exploration. `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for DdpgConfig {
    fn default() -> Self {
        Self {
            max_action: 10.0,
            hidden: vec![400, 300],
            gamma: 0.99,
            tau: 0.005,
            lr_actor: 1e-4,
            lr_critic: 1e-3,
            batch_size: 64,
            buffer_capacity: 10_000,
            train_noise: 0.2,
            seed: None,
        }
    }
}

/// Top-level runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Nominal tick period in seconds.
    pub dt: f64,
    /// Capacity of every telemetry ring buffer.
    pub max_points: usize,
    pub initial_target: f64,
    /// SpinSleeper native accuracy; the last stretch of each sleep is spun.
    pub spin_accuracy_ns: u32,
    /// Spawn the tick thread with maximum OS priority (needs privileges on Linux).
    pub realtime_priority: bool,
    /// Pin the tick thread to this core index.
    pub pin_core: Option<usize>,
    pub join_timeout_ms: u64,
    pub controller: ControllerConfig,
    pub agent: DdpgConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 0.05,
            max_points: 200,
            initial_target: 5.0,
            spin_accuracy_ns: 100_000,
            realtime_priority: false,
            pin_core: None,
            join_timeout_ms: 1_000,
            controller: ControllerConfig::default(),
            agent: DdpgConfig::default(),
        }
    }
}

impl SimConfig {
    /// Reads a JSON config file and validates it.
    pub fn load(path: impl AsRef<Path>) -> ControlResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ControlError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: SimConfig = serde_json::from_str(&raw).map_err(|source| ControlError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ControlResult<()> {
        fn check(ok: bool, msg: &str) -> ControlResult<()> {
            if ok {
                Ok(())
            } else {
                Err(ControlError::InvalidConfig(msg.to_string()))
            }
        }

        let c = &self.controller;
        let a = &self.agent;
        check(self.dt.is_finite() && self.dt > 0.0, "dt must be finite and > 0")?;
        check(self.max_points > 0, "max_points must be > 0")?;
        check(self.initial_target.is_finite(), "initial_target must be finite")?;
        check(c.integral_limit > 0.0, "integral_limit must be > 0")?;
        check(c.output_limit > 0.0, "output_limit must be > 0")?;
        check(c.mpc_horizon > 0, "mpc_horizon must be > 0")?;
        check(c.mpc_dt.is_finite() && c.mpc_dt > 0.0, "mpc_dt must be finite and > 0")?;
        check(c.noise_level >= 0.0, "noise_level must be >= 0")?;
        check(a.hidden.iter().all(|&h| h > 0), "hidden widths must be > 0")?;
        check(a.max_action > 0.0, "max_action must be > 0")?;
        check(a.tau > 0.0 && a.tau <= 1.0, "tau must be in (0, 1]")?;
        check((0.0..=1.0).contains(&a.gamma), "gamma must be in [0, 1]")?;
        check(a.lr_actor > 0.0 && a.lr_critic > 0.0, "learning rates must be > 0")?;
        check(a.batch_size > 0, "batch_size must be > 0")?;
        check(
            a.buffer_capacity >= a.batch_size,
            "buffer_capacity must be >= batch_size",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"dt": 0.02, "agent": {{"hidden": [32, 16]}}}}"#).unwrap();

        let cfg = SimConfig::load(file.path()).unwrap();
        assert_eq!(cfg.dt, 0.02);
        assert_eq!(cfg.agent.hidden, vec![32, 16]);
        assert_eq!(cfg.agent.batch_size, 64);
        assert_eq!(cfg.controller.kp, 2.0);
        assert_eq!(cfg.max_points, 200);
    }

    #[test]
    fn rejects_bad_tau() {
        let mut cfg = SimConfig::default();
        cfg.agent.tau = 0.0;
        assert!(matches!(cfg.validate(), Err(ControlError::InvalidConfig(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SimConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ControlError::Io { .. }));
    }
}
