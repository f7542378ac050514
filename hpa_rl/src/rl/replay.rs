// src/rl/replay.rs
//
// Fixed-capacity experience ring with uniform sampling (with replacement).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{HpaError, Result};

use super::observation::StateVector;

pub const DEFAULT_REPLAY_CAPACITY: usize = 20_000;

/// One stored transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub state: StateVector,
    pub action: usize,
    pub reward: f64,
    pub next_state: StateVector,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    buffer: Vec<Experience>,
    capacity: usize,
    /// Next slot to overwrite once full.
    cursor: usize,
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_CAPACITY)
    }
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity.min(DEFAULT_REPLAY_CAPACITY)),
            capacity,
            cursor: 0,
        }
    }

    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(experience);
        } else {
            self.buffer[self.cursor] = experience;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// `batch_size` independent uniform draws from the occupied range.
    ///
    /// Empty buffer yields an empty batch.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<Experience>> {
        let mut batch = Vec::new();
        if self.buffer.is_empty() {
            return Ok(batch);
        }
        batch
            .try_reserve_exact(batch_size)
            .map_err(|e| HpaError::Allocation(format!("replay batch: {e}")))?;
        for _ in 0..batch_size {
            let i = rng.gen_range(0..self.buffer.len());
            batch.push(self.buffer[i].clone());
        }
        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.buffer.iter()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::observation::STATE_DIM;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn exp(tag: f64) -> Experience {
        Experience {
            state: [tag; STATE_DIM],
            action: 0,
            reward: tag,
            next_state: [tag; STATE_DIM],
            done: false,
        }
    }

    #[test]
    fn test_size_saturates_and_oldest_evicted() {
        let mut buf = ReplayBuffer::new(5);
        for i in 0..8 {
            buf.push(exp(i as f64));
            assert!(buf.len() <= 5);
        }
        assert_eq!(buf.len(), 5);

        let mut rewards: Vec<f64> = buf.iter().map(|e| e.reward).collect();
        rewards.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(rewards, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_sample_with_replacement_from_occupied() {
        let mut buf = ReplayBuffer::new(100);
        for i in 0..3 {
            buf.push(exp(i as f64));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let batch = buf.sample(64, &mut rng).unwrap();
        assert_eq!(batch.len(), 64);
        assert!(batch.iter().all(|e| e.reward < 3.0));
    }

    #[test]
    fn test_sample_empty() {
        let buf = ReplayBuffer::new(10);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(buf.sample(8, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buf = ReplayBuffer::new(4);
        buf.push(exp(1.0));
        buf.clear();
        assert!(buf.is_empty());
        buf.push(exp(2.0));
        assert_eq!(buf.len(), 1);
    }
}
