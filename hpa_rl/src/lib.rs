//! HPA-axis curriculum learning.
//!
//! A tabular Q-learning agent learns to regulate a simulated
//! hypothalamic-pituitary-adrenal stress loop (CRH -> ACTH -> cortisol with
//! MR/GR negative feedback). The same agent is trained through child,
//! adolescent and adult stages, carrying its value table between them.
//!
//! # Layout
//!
//! - **Environment** (`rl::sim_env`): stochastic hormone dynamics, gland and
//!   receptor adaptation, circadian/ultradian drive, random stressors. Each
//!   step returns `5 - allostatic_load` as reward.
//! - **Agent** (`rl::agent`): epsilon-greedy action selection over a hashed
//!   Q-table (`rl::q_table`) keyed by discretised observations
//!   (`rl::state_key`), minibatch updates from a replay buffer
//!   (`rl::replay`), binary persistence (`rl::checkpoint`).
//! - **Driver** (`rl::runner`): stage sequencing, greedy evaluation,
//!   progress output, run reports.
//!
//! Randomness is never global: every stochastic operation takes the
//! caller's `rand::Rng`, and the driver seeds a single `ChaCha8Rng`.
//!
//! The binaries (`src/main.rs`, `src/bin/hpa_eval.rs`) are thin CLI harnesses
//! around these components.

pub mod config;
pub mod error;
pub mod logging;
pub mod rl;

// --- Re-exports for ergonomic external use ---------------------------------

pub use config::{RunConfig, StageConfig};
pub use error::{HpaError, Result};
pub use logging::{EventSink, JsonlSink, NoopSink};
pub use rl::{
    Agent, AgentConfig, CurriculumRunner, DevelopmentalStage, EpsilonReset, HpaEnv, Observation,
    StepResult,
};
