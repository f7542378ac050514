// src/rl/agent.rs
//
// Tabular Q-learning agent.
//
// - epsilon-greedy action selection over a hashed Q-table
// - replay-buffer minibatch updates
// - exploration schedule: per-update decay, explicit reset, bounded boost
// - binary save/load of the Q-table (see checkpoint.rs)
//
// The agent carries no environment state and is moved unchanged between
// curriculum stages.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HpaError, Result};

use super::action_encoding::ACTION_COUNT;
use super::checkpoint::{read_q_table, write_q_table, LoadReport};
use super::observation::StateVector;
use super::q_table::{ActionValues, QTable, INITIAL_CAPACITY};
use super::replay::{Experience, ReplayBuffer, DEFAULT_REPLAY_CAPACITY};
use super::state_key::StateKey;

/// Ceiling applied by an exploration boost.
pub const EPSILON_BOOST_CAP: f64 = 0.3;
pub const EPSILON_BOOST_FACTOR: f64 = 1.5;

/// Learning hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub learning_rate: f64,
    pub gamma: f64,
    pub epsilon_start: f64,
    pub epsilon_min: f64,
    pub epsilon_decay: f64,
    pub batch_size: usize,
    pub replay_capacity: usize,
    pub initial_table_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.0005,
            gamma: 0.98,
            epsilon_start: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.9995,
            batch_size: 128,
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            initial_table_capacity: INITIAL_CAPACITY,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(HpaError::validation("agent.learning_rate", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(HpaError::validation("agent.gamma", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.epsilon_start) {
            return Err(HpaError::validation("agent.epsilon_start", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.epsilon_min) {
            return Err(HpaError::validation("agent.epsilon_min", "must be in [0, 1]"));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return Err(HpaError::validation("agent.epsilon_decay", "must be in (0, 1]"));
        }
        if self.batch_size == 0 {
            return Err(HpaError::validation("agent.batch_size", "must be positive"));
        }
        if self.replay_capacity == 0 {
            return Err(HpaError::validation("agent.replay_capacity", "must be positive"));
        }
        Ok(())
    }
}

/// Exploration-rate transition requested between stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpsilonReset {
    /// Set epsilon to this value.
    To(f64),
    /// `min(epsilon * 1.5, 0.3)`.
    Boost,
}

impl From<f64> for EpsilonReset {
    /// Negative values are the boost sentinel.
    fn from(value: f64) -> Self {
        if value < 0.0 {
            EpsilonReset::Boost
        } else {
            EpsilonReset::To(value)
        }
    }
}

/// Statistics of one minibatch update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearnReport {
    pub sampled: usize,
    /// Transitions actually applied (skipped ones hit allocation failures).
    pub updated: usize,
    pub mean_abs_td_error: f64,
    pub epsilon: f64,
}

pub struct Agent {
    config: AgentConfig,
    q_table: QTable,
    memory: ReplayBuffer,
    epsilon: f64,
    learn_steps: u64,
    total_steps: u64,
    current_stage: usize,
}

impl Default for Agent {
    fn default() -> Self {
        Self::new(AgentConfig::default())
    }
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let q_table = QTable::try_with_capacity(config.initial_table_capacity)
            .unwrap_or_else(|| QTable::with_capacity(1));
        Self {
            q_table,
            memory: ReplayBuffer::new(config.replay_capacity),
            epsilon: config.epsilon_start,
            learn_steps: 0,
            total_steps: 0,
            current_stage: 0,
            config,
        }
    }

    /// Epsilon-greedy action for `state`.
    ///
    /// Greedy picks insert the state into the table if unseen and count
    /// towards `total_steps`; exploratory picks do neither.
    pub fn select_action<R: Rng + ?Sized>(&mut self, state: &StateVector, rng: &mut R) -> usize {
        if rng.gen::<f64>() < self.epsilon {
            return rng.gen_range(0..ACTION_COUNT);
        }

        let key = StateKey::from_state(state);
        let action = match self.q_table.get_or_create(&key) {
            Ok(values) => argmax(values),
            Err(e) => {
                warn!(error = %e, "q-table lookup failed; acting on zero values");
                0
            }
        };
        self.total_steps += 1;
        action
    }

    pub fn remember(
        &mut self,
        state: StateVector,
        action: usize,
        reward: f64,
        next_state: StateVector,
        done: bool,
    ) {
        self.memory.push(Experience {
            state,
            action,
            reward,
            next_state,
            done,
        });
    }

    /// One Q-learning minibatch update.
    ///
    /// Returns `None` without touching epsilon or counters while the replay
    /// buffer holds fewer than `batch_size` transitions, or if the batch
    /// could not be allocated.
    pub fn learn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<LearnReport> {
        let batch_size = self.config.batch_size;
        if self.memory.len() < batch_size {
            return None;
        }

        let batch = match self.memory.sample(batch_size, rng) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "skipping learning step");
                return None;
            }
        };

        let mut updated = 0;
        let mut td_abs_sum = 0.0;
        for exp in &batch {
            match self.update_transition(exp) {
                Ok(Some(td)) => {
                    updated += 1;
                    td_abs_sum += td.abs();
                }
                Ok(None) => {}
                Err(e) => debug!(error = %e, "transition skipped"),
            }
        }

        self.decay_epsilon();
        self.learn_steps += 1;

        Some(LearnReport {
            sampled: batch.len(),
            updated,
            mean_abs_td_error: if updated > 0 {
                td_abs_sum / updated as f64
            } else {
                0.0
            },
            epsilon: self.epsilon,
        })
    }

    /// Apply the TD update for one transition. Returns the TD error, or
    /// `None` for an out-of-range action.
    fn update_transition(&mut self, exp: &Experience) -> Result<Option<f64>> {
        let key = StateKey::from_state(&exp.state);
        let next_key = StateKey::from_state(&exp.next_state);

        let next_best = max_value(self.q_table.get_or_create(&next_key)?);
        let target = if exp.done {
            exp.reward
        } else {
            exp.reward + self.config.gamma * next_best
        };

        let values = self.q_table.get_or_create(&key)?;
        let Some(q) = values.get_mut(exp.action) else {
            return Ok(None);
        };
        let td = target - *q;
        *q += self.config.learning_rate * td;
        Ok(Some(td))
    }

    fn decay_epsilon(&mut self) {
        if self.epsilon > self.config.epsilon_min {
            self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        }
    }

    /// Set epsilon (clamped to [0, 1]), or boost it with a negative
    /// sentinel. Non-finite values leave epsilon unchanged.
    pub fn reset_epsilon(&mut self, reset: impl Into<EpsilonReset>) {
        self.epsilon = match reset.into() {
            EpsilonReset::To(value) if !value.is_finite() => {
                warn!(value, epsilon = self.epsilon, "ignoring non-finite epsilon reset");
                return;
            }
            EpsilonReset::To(value) => value.clamp(0.0, 1.0),
            EpsilonReset::Boost => (self.epsilon * EPSILON_BOOST_FACTOR).min(EPSILON_BOOST_CAP),
        };
    }

    /// Read-only action values for `state`.
    pub fn q_values(&self, state: &StateVector) -> Option<&ActionValues> {
        self.q_table.get(&StateKey::from_state(state))
    }

    pub fn save(&self, path: &Path) -> Result<usize> {
        write_q_table(&self.q_table, path)
    }

    /// Replace the Q-table with the contents of `path`.
    ///
    /// On error the current table is kept. A truncated file still replaces
    /// it; check `LoadReport::is_complete`.
    pub fn load(&mut self, path: &Path) -> Result<LoadReport> {
        let (table, report) = read_q_table(path)?;
        self.q_table = table;
        Ok(report)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn q_table_size(&self) -> usize {
        self.q_table.len()
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn learn_steps(&self) -> u64 {
        self.learn_steps
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn current_stage(&self) -> usize {
        self.current_stage
    }

    pub fn set_current_stage(&mut self, stage: usize) {
        self.current_stage = stage;
    }
}

/// Index of the largest value; ties go to the lowest index.
pub fn argmax(values: &ActionValues) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn max_value(values: &ActionValues) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}
