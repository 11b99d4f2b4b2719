//! ddpg.rs
//! Deep Deterministic Policy Gradient agent.
//!
//! - Actor: state(4) → action(1), ReLU hidden layers, `max_action * tanh` output.
//! - Critic: [state, action](5) → Q, ReLU hidden layers, linear output.
//! - Target copies start as exact clones and only ever move by Polyak averaging.
//! - TD targets are computed from the target copies and treated as constants.

use std::{
    collections::VecDeque,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, trace, warn};
use ndarray::{Array2, s};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use crate::learning::{
    network::{Adam, Head, Mlp},
    replay::{ACTION_DIM, ReplayBuffer, STATE_DIM, Transition},
};
use crate::utils::{
    config::DdpgConfig,
    error::{ControlError, ControlResult},
};

/// Bound on the retained loss history.
pub const LOSS_HISTORY_CAP: usize = 10_000;

pub struct DdpgAgent {
    actor: Mlp,
    actor_target: Mlp,
    actor_opt: Adam,
    critic: Mlp,
    critic_target: Mlp,
    critic_opt: Adam,
    replay_buffer: ReplayBuffer,
    config: DdpgConfig,
    rng: StdRng,
    loss_history: VecDeque<f64>,
}

impl Default for DdpgAgent {
    fn default() -> Self {
        Self::new(DdpgConfig::default())
    }
}

impl DdpgAgent {
    pub fn new(config: DdpgConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let actor_sizes = layer_sizes(STATE_DIM, &config.hidden, ACTION_DIM);
        let critic_sizes = layer_sizes(STATE_DIM + ACTION_DIM, &config.hidden, 1);
        let actor = Mlp::new(&actor_sizes, Head::ScaledTanh(config.max_action), &mut rng);
        let critic = Mlp::new(&critic_sizes, Head::Identity, &mut rng);

        Self {
            actor_target: actor.clone(),
            actor_opt: Adam::new(&actor, config.lr_actor),
            actor,
            critic_target: critic.clone(),
            critic_opt: Adam::new(&critic, config.lr_critic),
            critic,
            replay_buffer: ReplayBuffer::new(config.buffer_capacity),
            config,
            rng,
            loss_history: VecDeque::new(),
        }
    }

    /// Deterministic actor output plus optional Gaussian exploration, clamped to
    /// `[-max_action, max_action]`. `noise_std == 0` is pure inference.
    pub fn select_action(&mut self, state: &[f64; STATE_DIM], noise_std: f64) -> [f64; ACTION_DIM] {
        let x = Array2::from_shape_fn((1, STATE_DIM), |(_, j)| state[j]);
        let out = self.actor.forward(&x);
        let max = self.config.max_action;

        let noise = if noise_std != 0.0 {
            Normal::new(0.0, noise_std.abs()).ok()
        } else {
            None
        };

        let mut action = [0.0; ACTION_DIM];
        for (k, a) in action.iter_mut().enumerate() {
            let mut v = out[[0, k]];
            if let Some(dist) = &noise {
                v += dist.sample(&mut self.rng);
            }
            *a = v.clamp(-max, max);
        }
        action
    }

    pub fn remember(&mut self, transition: Transition) {
        self.replay_buffer.add(transition);
    }

    /// One critic step, one actor step, then soft updates of both targets.
    ///
    /// Returns the critic loss, or exactly 0.0 without touching any parameter while
    /// the buffer holds fewer than `batch_size` transitions.
    pub fn train(&mut self) -> f64 {
        let batch_size = self.config.batch_size;
        if self.replay_buffer.size() < batch_size {
            return 0.0;
        }
        let batch = match self.replay_buffer.sample(batch_size, &mut self.rng) {
            Ok(batch) => batch,
            Err(e) => {
                debug!("[DDPG] skipping update: {}", e);
                return 0.0;
            }
        };

        let n = batch.len();
        let states = Array2::from_shape_fn((n, STATE_DIM), |(i, j)| batch[i].state[j]);
        let actions = Array2::from_shape_fn((n, ACTION_DIM), |(i, j)| batch[i].action[j]);
        let rewards = Array2::from_shape_fn((n, 1), |(i, _)| batch[i].reward);
        let next_states = Array2::from_shape_fn((n, STATE_DIM), |(i, j)| batch[i].next_state[j]);
        let not_done = Array2::from_shape_fn((n, 1), |(i, _)| if batch[i].done { 0.0 } else { 1.0 });

        // ====================================================================
        // TD target from the target networks (constant, no gradient)
        // ====================================================================
        let next_actions = self.actor_target.forward(&next_states);
        let q_next = self.critic_target.forward(&concat_columns(&next_states, &next_actions));
        let y = &rewards + &(&not_done * &q_next * self.config.gamma);

        // ====================================================================
        // Critic: minimise MSE(Q(s, a), y)
        // ====================================================================
        let critic_trace = self.critic.forward_traced(&concat_columns(&states, &actions));
        let diff = critic_trace.output() - &y;
        let critic_loss = diff.mapv(|d| d * d).mean().unwrap_or(0.0);
        let grad_q = diff * (2.0 / n as f64);
        let (critic_grads, _) = self.critic.backward(&critic_trace, &grad_q);
        self.critic_opt.step(&mut self.critic, &critic_grads);

        // ====================================================================
        // Actor: minimise -mean(Q(s, actor(s))), critic held fixed
        // ====================================================================
        let actor_trace = self.actor.forward_traced(&states);
        let policy_trace = self
            .critic
            .forward_traced(&concat_columns(&states, actor_trace.output()));
        let actor_loss = -policy_trace.output().mean().unwrap_or(0.0);
        let grad_policy_q = Array2::from_elem((n, 1), -1.0 / n as f64);
        let (_, grad_input) = self.critic.backward(&policy_trace, &grad_policy_q);
        let grad_action = grad_input.slice(s![.., STATE_DIM..]).to_owned();
        let (actor_grads, _) = self.actor.backward(&actor_trace, &grad_action);
        self.actor_opt.step(&mut self.actor, &actor_grads);

        // ====================================================================
        // Polyak averaging of the targets
        // ====================================================================
        let tau = self.config.tau;
        self.critic_target.soft_update_from(&self.critic, tau);
        self.actor_target.soft_update_from(&self.actor, tau);

        trace!(
            "[DDPG] critic_loss={:.6} actor_loss={:.6}",
            critic_loss, actor_loss
        );

        if self.loss_history.len() >= LOSS_HISTORY_CAP {
            self.loss_history.pop_front();
        }
        self.loss_history.push_back(critic_loss);
        critic_loss
    }

    /// Writes `<prefix>_actor.json` and `<prefix>_critic.json`.
    pub fn save(&self, prefix: impl AsRef<Path>) -> ControlResult<()> {
        let (actor_path, critic_path) = artifact_paths(prefix.as_ref());
        write_params(&actor_path, &self.actor)?;
        write_params(&critic_path, &self.critic)?;
        debug!("[DDPG] saved parameters to {:?} / {:?}", actor_path, critic_path);
        Ok(())
    }

    /// Restores actor and critic from `save` artifacts.
    ///
    /// Both artifacts are read and checked before anything is replaced, so any
    /// failure leaves the agent untouched. Returns `false` on failure.
    pub fn load(&mut self, prefix: impl AsRef<Path>) -> bool {
        match self.try_load(prefix) {
            Ok(()) => true,
            Err(e) => {
                warn!("[DDPG] load failed, keeping current parameters: {}", e);
                false
            }
        }
    }

    pub fn try_load(&mut self, prefix: impl AsRef<Path>) -> ControlResult<()> {
        let (actor_path, critic_path) = artifact_paths(prefix.as_ref());
        let actor = read_params(&actor_path)?;
        let critic = read_params(&critic_path)?;
        check_compatible("actor", &self.actor, &actor)?;
        check_compatible("critic", &self.critic, &critic)?;

        self.actor_target = actor.clone();
        self.critic_target = critic.clone();
        self.actor_opt = Adam::new(&actor, self.config.lr_actor);
        self.critic_opt = Adam::new(&critic, self.config.lr_critic);
        self.actor = actor;
        self.critic = critic;
        Ok(())
    }

    #[inline]
    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.replay_buffer
    }

    #[inline]
    pub fn loss_history(&self) -> &VecDeque<f64> {
        &self.loss_history
    }

    #[inline]
    pub fn config(&self) -> &DdpgConfig {
        &self.config
    }

    #[inline]
    pub fn actor(&self) -> &Mlp {
        &self.actor
    }

    #[inline]
    pub fn actor_target(&self) -> &Mlp {
        &self.actor_target
    }

    #[inline]
    pub fn critic(&self) -> &Mlp {
        &self.critic
    }

    #[inline]
    pub fn critic_target(&self) -> &Mlp {
        &self.critic_target
    }
}

fn layer_sizes(input: usize, hidden: &[usize], output: usize) -> Vec<usize> {
    let mut sizes = Vec::with_capacity(hidden.len() + 2);
    sizes.push(input);
    sizes.extend_from_slice(hidden);
    sizes.push(output);
    sizes
}

fn concat_columns(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let split = a.ncols();
    Array2::from_shape_fn((a.nrows(), split + b.ncols()), |(i, j)| {
        if j < split { a[[i, j]] } else { b[[i, j - split]] }
    })
}

fn artifact_paths(prefix: &Path) -> (PathBuf, PathBuf) {
    let base = prefix.as_os_str().to_string_lossy();
    (
        PathBuf::from(format!("{}_actor.json", base)),
        PathBuf::from(format!("{}_critic.json", base)),
    )
}

fn write_params(path: &Path, net: &Mlp) -> ControlResult<()> {
    let io_err = |source| ControlError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, net).map_err(|source| ControlError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)
}

fn read_params(path: &Path) -> ControlResult<Mlp> {
    let file = File::open(path).map_err(|source| ControlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ControlError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn check_compatible(artifact: &str, live: &Mlp, loaded: &Mlp) -> ControlResult<()> {
    let bias_ok = loaded
        .layers()
        .iter()
        .all(|l| l.bias.len() == l.weight.ncols());
    if live.shapes() != loaded.shapes() || live.head() != loaded.head() || !bias_ok {
        return Err(ControlError::ShapeMismatch {
            artifact: artifact.to_string(),
            expected: format!("{:?} {:?}", live.shapes(), live.head()),
            found: format!("{:?} {:?}", loaded.shapes(), loaded.head()),
        });
    }
    Ok(())
}
