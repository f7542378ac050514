// src/rl/mod.rs
//
// Reinforcement-learning core: the HPA environment, the tabular agent and
// the curriculum driver that couples them.
//
// Key components:
// - HpaEnv: Gym-style stochastic HPA-axis simulator (reset, step)
// - LoadComponents: allostatic load model (reward = 5 - load)
// - Observation: versioned 12-feature state snapshot
// - ActionModifiers: ternary decoding of the 9 discrete actions
// - StateKey / QTable: discretised states and the hashed value store
// - ReplayBuffer: bounded experience memory
// - Agent: epsilon-greedy Q-learning with save/load
// - CurriculumRunner: stage sequencing, evaluation and progress reporting
// - RLTelemetry: JSONL episode/step records

pub mod action_encoding;
pub mod agent;
pub mod allostatic;
pub mod checkpoint;
pub mod domain_rand;
pub mod observation;
pub mod physiology;
pub mod q_table;
pub mod replay;
pub mod runner;
pub mod sim_env;
pub mod state_key;
pub mod telemetry;

// Re-exports for convenience
pub use action_encoding::{ActionModifiers, ACTION_COUNT, ACTION_VERSION, HOLD_ACTION};
pub use agent::{argmax, Agent, AgentConfig, EpsilonReset, LearnReport};
pub use allostatic::{allostatic_load, LoadComponents, REWARD_OFFSET};
pub use checkpoint::{read_q_table, write_q_table, LoadReport};
pub use domain_rand::{DomainRandConfig, DomainRandSample};
pub use observation::{Observation, StateVector, FEATURE_NAMES, OBS_VERSION, STATE_DIM};
pub use physiology::{DevelopmentalStage, HpaState, Physiology, StageParams};
pub use q_table::{ActionValues, QTable};
pub use replay::{Experience, ReplayBuffer};
pub use runner::{
    CurriculumReport, CurriculumRunner, EpisodeSummary, EvaluationSummary, StageReport,
    StageSummary,
};
pub use sim_env::{HpaEnv, HpaEnvConfig, StepInfo, StepResult, TerminationReason};
pub use state_key::StateKey;
pub use telemetry::{EpisodeMarker, EpisodeMarkerType, RLTelemetry, TickRecord};
