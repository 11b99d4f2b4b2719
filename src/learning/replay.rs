//! Fixed-capacity FIFO experience store.
//!
//! Insertion past capacity evicts the oldest transition (ring buffer, no
//! access-based retention). Sampling is uniform without replacement inside one
//! call; separate calls are independent.

use std::collections::VecDeque;

use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};

use crate::utils::error::{ControlError, ControlResult};

pub const STATE_DIM: usize = 4;
pub const ACTION_DIM: usize = 1;

/// One environment step. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: [f64; STATE_DIM],
    pub action: [f64; ACTION_DIM],
    pub reward: f64,
    pub next_state: [f64; STATE_DIM],
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(1 << 16)),
            capacity,
        }
    }

    pub fn add(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draws `batch_size` distinct transitions.
    pub fn sample<R: Rng>(&self, batch_size: usize, rng: &mut R) -> ControlResult<Vec<Transition>> {
        if self.buffer.len() < batch_size {
            return Err(ControlError::InsufficientSamples {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }
        Ok(index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|i| self.buffer[i])
            .collect())
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn tr(tag: f64) -> Transition {
        Transition {
            state: [tag, 0.0, 0.0, 0.0],
            action: [0.0],
            reward: -tag,
            next_state: [tag + 1.0, 0.0, 0.0, 0.0],
            done: false,
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut buf = ReplayBuffer::new(5);
        for k in 0..12 {
            buf.add(tr(k as f64));
            assert!(buf.size() <= 5);
        }
        let tags: Vec<f64> = buf.iter().map(|t| t.state[0]).collect();
        assert_eq!(tags, vec![7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn sample_is_without_replacement() {
        let mut buf = ReplayBuffer::new(100);
        for k in 0..100 {
            buf.add(tr(k as f64));
        }
        let mut rng = StdRng::seed_from_u64(42);
        let batch = buf.sample(64, &mut rng).unwrap();
        assert_eq!(batch.len(), 64);

        let mut tags: Vec<i64> = batch.iter().map(|t| t.state[0] as i64).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), 64);
    }

    #[test]
    fn undersized_sample_is_an_error() {
        let mut buf = ReplayBuffer::new(10);
        buf.add(tr(0.0));
        let mut rng = StdRng::seed_from_u64(0);
        let err = buf.sample(2, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            ControlError::InsufficientSamples { requested: 2, available: 1 }
        ));
    }
}
