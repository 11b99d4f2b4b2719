//! mpc.rs
//! Brute-force single-shooting predictive controller.
//!
//! Scores every candidate on a fixed grid over [-10, 10] by rolling a simplified
//! damped double-integrator forward `horizon` steps. Deterministic; no optimiser.

use crate::utils::config::ControllerConfig;

/// Number of grid candidates (step 0.5 over [-10, 10]).
pub const GRID_POINTS: usize = 41;
pub const U_MIN: f64 = -10.0;
pub const U_MAX: f64 = 10.0;

const DAMPING: f64 = 0.5;
const EFFORT_WEIGHT: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct MpcController {
    pub horizon: usize,
    /// Internal prediction step, fixed at construction.
    internal_dt: f64,
}

impl Default for MpcController {
    fn default() -> Self {
        Self::new(10, 0.1)
    }
}

impl MpcController {
    pub fn new(horizon: usize, internal_dt: f64) -> Self {
        Self {
            horizon,
            internal_dt,
        }
    }

    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self::new(cfg.mpc_horizon, cfg.mpc_dt)
    }

    #[inline]
    pub fn internal_dt(&self) -> f64 {
        self.internal_dt
    }

    /// The i-th grid candidate.
    #[inline]
    pub fn candidate(i: usize) -> f64 {
        U_MIN + (U_MAX - U_MIN) * i as f64 / (GRID_POINTS - 1) as f64
    }

    /// Picks the minimum-cost candidate for `state = [position, velocity]`.
    ///
    /// Ties keep the first candidate in ascending order. `_dt` is the caller's tick
    /// period; the prediction always uses the internal step.
    pub fn compute(&self, state: [f64; 2], target: f64, _dt: f64) -> f64 {
        let [position, velocity] = state;
        let mut best_u = 0.0;
        let mut min_cost = f64::INFINITY;

        for i in 0..GRID_POINTS {
            let u = Self::candidate(i);
            let cost = self.predict_cost(position, velocity, u, target);
            if cost < min_cost {
                min_cost = cost;
                best_u = u;
            }
        }
        best_u
    }

    /// Accumulated tracking + effort cost of holding `u` over the horizon.
    pub fn predict_cost(&self, position: f64, velocity: f64, u: f64, target: f64) -> f64 {
        let (mut p, mut v) = (position, velocity);
        let mut cost = 0.0;
        for _ in 0..self.horizon {
            let accel = u - DAMPING * v;
            v += accel * self.internal_dt;
            p += v * self.internal_dt;
            let err = target - p;
            cost += err * err + EFFORT_WEIGHT * u * u;
        }
        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_grid(u: f64) -> bool {
        (0..GRID_POINTS).any(|i| MpcController::candidate(i) == u)
    }

    #[test]
    fn grid_spans_range_in_half_steps() {
        assert_eq!(MpcController::candidate(0), -10.0);
        assert_eq!(MpcController::candidate(20), 0.0);
        assert_eq!(MpcController::candidate(40), 10.0);
        assert_eq!(MpcController::candidate(21) - MpcController::candidate(20), 0.5);
    }

    #[test]
    fn output_is_always_a_candidate() {
        let mpc = MpcController::default();
        for &(p, v, t) in &[(0.0, 0.0, 5.0), (3.0, -2.0, -4.0), (100.0, 0.0, -100.0), (1.2, 0.7, 1.3)] {
            let u = mpc.compute([p, v], t, 0.05);
            assert!(on_grid(u), "{u} not on grid");
            assert!((U_MIN..=U_MAX).contains(&u));
        }
    }

    #[test]
    fn at_rest_on_target_picks_true_minimum() {
        let mpc = MpcController::default();
        let u = mpc.compute([2.0, 0.0], 2.0, 0.05);

        let costs: Vec<f64> = (0..GRID_POINTS)
            .map(|i| mpc.predict_cost(2.0, 0.0, MpcController::candidate(i), 2.0))
            .collect();
        let min = costs.iter().cloned().fold(f64::INFINITY, f64::min);
        let first_min = costs.iter().position(|&c| c == min).unwrap();

        assert_eq!(u, MpcController::candidate(first_min));
        assert_eq!(u, 0.0);
    }

    #[test]
    fn saturates_toward_far_target() {
        let mpc = MpcController::default();
        assert_eq!(mpc.compute([0.0, 0.0], 1_000.0, 0.05), U_MAX);
        assert_eq!(mpc.compute([0.0, 0.0], -1_000.0, 0.05), U_MIN);
    }

    #[test]
    fn caller_dt_does_not_change_choice() {
        let mpc = MpcController::default();
        let a = mpc.compute([0.3, 0.1], 4.0, 0.01);
        let b = mpc.compute([0.3, 0.1], 4.0, 0.5);
        assert_eq!(a, b);
        assert_eq!(mpc.internal_dt(), 0.1);
    }
}
