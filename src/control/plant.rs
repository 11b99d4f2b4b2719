//! plant.rs
//! Second-order damped plant: `x'' = u - 0.5 x' + w`, w ~ N(0, noise_level).
//! Integrated with semi-implicit Euler (velocity first, then position).

use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;

const DAMPING: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ControlState {
    pub position: f64,
    pub velocity: f64,
}

#[derive(Debug, Clone)]
pub struct PlantModel {
    state: ControlState,
    noise_level: f64,
    rng: StdRng,
}

impl Default for PlantModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PlantModel {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: ControlState::default(),
            noise_level: 0.0,
            rng,
        }
    }

    /// Advances the plant by one step of `dt` under `control_input`.
    pub fn update(&mut self, control_input: f64, dt: f64) {
        let disturbance = if self.noise_level > 0.0 {
            Normal::new(0.0, self.noise_level)
                .map(|n| n.sample(&mut self.rng))
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let acceleration = control_input - DAMPING * self.state.velocity + disturbance;
        self.state.velocity += acceleration * dt;
        self.state.position += self.state.velocity * dt;
    }

    pub fn reset(&mut self) {
        self.state = ControlState::default();
    }

    /// Applies to subsequent updates only.
    pub fn set_noise(&mut self, level: f64) {
        self.noise_level = level;
    }

    #[inline]
    pub fn noise_level(&self) -> f64 {
        self.noise_level
    }

    #[inline]
    pub fn state(&self) -> ControlState {
        self.state
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.state.position
    }

    #[inline]
    pub fn velocity(&self) -> f64 {
        self.state.velocity
    }
}
