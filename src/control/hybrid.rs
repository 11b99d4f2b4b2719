//! hybrid.rs
//! Mode-dispatching controller: adaptive PID/MPC blend, or the DDPG policy.
//!
//! Modes only change through `set_mode`. A plant reset keeps everything the agent
//! has learned (parameters and replay buffer).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::control::{
    engine::{ControlEngine, StepOutput},
    mpc::MpcController,
    pid::PidController,
    plant::PlantModel,
};
use crate::learning::{ddpg::DdpgAgent, replay::Transition};
use crate::utils::config::{ControllerConfig, DdpgConfig};

/// Error magnitude at which the blend is all PID.
const BLEND_ERROR_SPAN: f64 = 5.0;
const EFFORT_PENALTY: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMode {
    #[default]
    Hybrid,
    RlTrain,
    RlInference,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Hybrid => "HYBRID",
            ControlMode::RlTrain => "RL_TRAIN",
            ControlMode::RlInference => "RL_INFERENCE",
        }
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        match self {
            ControlMode::Hybrid => 0,
            ControlMode::RlTrain => 1,
            ControlMode::RlInference => 2,
        }
    }

    /// Unknown codes fall back to `Hybrid`.
    #[inline]
    pub fn from_u8(code: u8) -> Self {
        match code {
            1 => ControlMode::RlTrain,
            2 => ControlMode::RlInference,
            _ => ControlMode::Hybrid,
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HYBRID" => Ok(ControlMode::Hybrid),
            "RL_TRAIN" => Ok(ControlMode::RlTrain),
            "RL_INFERENCE" => Ok(ControlMode::RlInference),
            other => Err(format!("unknown control mode '{}'", other)),
        }
    }
}

pub struct HybridController {
    pid: PidController,
    mpc: MpcController,
    plant: PlantModel,
    agent: DdpgAgent,
    mode: ControlMode,
    output_limit: f64,
    training_steps: u64,
}

impl Default for HybridController {
    fn default() -> Self {
        Self::new(&ControllerConfig::default(), DdpgConfig::default())
    }
}

impl HybridController {
    pub fn new(controller: &ControllerConfig, agent: DdpgConfig) -> Self {
        let mut plant = match agent.seed {
            Some(seed) => PlantModel::with_seed(seed.wrapping_add(1)),
            None => PlantModel::new(),
        };
        plant.set_noise(controller.noise_level);

        Self {
            pid: PidController::from_config(controller),
            mpc: MpcController::from_config(controller),
            plant,
            agent: DdpgAgent::new(agent),
            mode: ControlMode::Hybrid,
            output_limit: controller.output_limit,
            training_steps: 0,
        }
    }

    /// Executes one control step against `target` and advances the plant by `dt`.
    pub fn step(&mut self, target: f64, dt: f64) -> StepOutput {
        let error = target - self.plant.position();
        let state = self.observe(target);

        match self.mode {
            ControlMode::RlTrain | ControlMode::RlInference => {
                let training = self.mode == ControlMode::RlTrain;
                let noise = if training { self.agent.config().train_noise } else { 0.0 };
                let action = self.agent.select_action(&state, noise);
                let control = action[0];

                self.plant.update(control, dt);

                let loss = if training {
                    let reward = -(error * error + EFFORT_PENALTY * control * control);
                    let next_state = self.observe(target);
                    self.agent.remember(Transition {
                        state,
                        action,
                        reward,
                        next_state,
                        done: false,
                    });
                    self.training_steps += 1;
                    self.agent.train()
                } else {
                    0.0
                };

                StepOutput {
                    position: self.plant.position(),
                    control,
                    alpha: 0.0,
                    loss,
                }
            }
            ControlMode::Hybrid => {
                let u_pid = self.pid.compute(error, dt);
                let u_mpc = self
                    .mpc
                    .compute([self.plant.position(), self.plant.velocity()], target, dt);

                // large error favours PID, small error favours MPC
                let alpha = (error.abs() / BLEND_ERROR_SPAN).clamp(0.0, 1.0);
                let control = (alpha * u_pid + (1.0 - alpha) * u_mpc)
                    .clamp(-self.output_limit, self.output_limit);

                self.plant.update(control, dt);

                StepOutput {
                    position: self.plant.position(),
                    control,
                    alpha,
                    loss: 0.0,
                }
            }
        }
    }

    /// `[position, velocity, target, error]`
    fn observe(&self, target: f64) -> [f64; 4] {
        let position = self.plant.position();
        [position, self.plant.velocity(), target, target - position]
    }

    /// Resets PID and plant; the agent is left alone.
    pub fn reset(&mut self) {
        self.pid.reset();
        self.plant.reset();
    }

    pub fn set_pid_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.pid.set_gains(kp, ki, kd);
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        self.mode = mode;
    }

    pub fn set_noise(&mut self, level: f64) {
        self.plant.set_noise(level);
    }

    #[inline]
    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    #[inline]
    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    #[inline]
    pub fn plant(&self) -> &PlantModel {
        &self.plant
    }

    #[inline]
    pub fn agent(&self) -> &DdpgAgent {
        &self.agent
    }

    #[inline]
    pub fn agent_mut(&mut self) -> &mut DdpgAgent {
        &mut self.agent
    }

    #[inline]
    pub fn training_steps(&self) -> u64 {
        self.training_steps
    }
}

impl ControlEngine for HybridController {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn step(&mut self, target: f64, dt: f64) -> StepOutput {
        HybridController::step(self, target, dt)
    }

    fn set_pid_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        HybridController::set_pid_gains(self, kp, ki, kd);
    }

    fn position(&self) -> f64 {
        self.plant.position()
    }

    fn reset(&mut self) {
        HybridController::reset(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_agent() -> DdpgConfig {
        DdpgConfig {
            hidden: vec![16, 16],
            seed: Some(21),
            ..DdpgConfig::default()
        }
    }

    fn controller() -> HybridController {
        HybridController::new(&ControllerConfig::default(), quick_agent())
    }

    #[test]
    fn mode_round_trips_through_str_and_u8() {
        for mode in [ControlMode::Hybrid, ControlMode::RlTrain, ControlMode::RlInference] {
            assert_eq!(mode.as_str().parse::<ControlMode>().unwrap(), mode);
            assert_eq!(ControlMode::from_u8(mode.to_u8()), mode);
        }
        assert!("AUTO".parse::<ControlMode>().is_err());
    }

    #[test]
    fn hybrid_outputs_stay_bounded() {
        let mut ctrl = controller();
        for k in 0..300 {
            let target = if k % 50 < 25 { 40.0 } else { -3.0 };
            let out = ctrl.step(target, 0.05);
            assert!((0.0..=1.0).contains(&out.alpha));
            assert!((-10.0..=10.0).contains(&out.control));
            assert_eq!(out.loss, 0.0);
        }
    }

    #[test]
    fn alpha_saturates_and_vanishes() {
        let mut ctrl = controller();
        assert_eq!(ctrl.step(7.5, 0.05).alpha, 1.0);

        let mut at_rest = controller();
        let out = at_rest.step(0.0, 0.05);
        assert_eq!(out.alpha, 0.0);
        // zero error, zero velocity: the MPC picks 0 and the plant stays put
        assert_eq!(out.control, 0.0);
        assert_eq!(out.position, 0.0);
    }

    #[test]
    fn reset_keeps_agent_memory() {
        let mut ctrl = controller();
        ctrl.set_mode(ControlMode::RlTrain);
        for _ in 0..10 {
            ctrl.step(2.0, 0.05);
        }
        assert_eq!(ctrl.agent().replay_buffer().size(), 10);
        ctrl.reset();
        assert_eq!(ctrl.plant().position(), 0.0);
        assert_eq!(ctrl.pid().integral(), 0.0);
        assert_eq!(ctrl.agent().replay_buffer().size(), 10);
        assert_eq!(ctrl.mode(), ControlMode::RlTrain);
    }

    #[test]
    fn rl_train_records_reward_of_pre_step_error() {
        let mut ctrl = controller();
        ctrl.set_mode(ControlMode::RlTrain);
        let out = ctrl.step(3.0, 0.05);
        let tr = *ctrl.agent().replay_buffer().iter().next().unwrap();

        assert_eq!(tr.state, [0.0, 0.0, 3.0, 3.0]);
        assert_eq!(tr.action[0], out.control);
        assert!((tr.reward + (9.0 + 0.01 * out.control * out.control)).abs() < 1e-12);
        assert_eq!(tr.next_state[0], out.position);
        assert_eq!(tr.next_state[3], 3.0 - out.position);
        assert!(!tr.done);
        assert_eq!(out.alpha, 0.0);
        assert_eq!(ctrl.training_steps(), 1);
    }

    #[test]
    fn rl_inference_moves_plant_without_learning() {
        let mut ctrl = controller();
        ctrl.set_mode(ControlMode::RlInference);
        let a = ctrl.step(4.0, 0.05);
        let b = ctrl.step(4.0, 0.05);
        assert_eq!(ctrl.agent().replay_buffer().size(), 0);
        assert_eq!(a.loss, 0.0);
        assert_eq!(b.loss, 0.0);
        assert_ne!(ctrl.plant().velocity(), 0.0);
    }
}
