// src/rl/telemetry.rs
//
// JSONL telemetry for training and evaluation episodes.
//
// Records written:
// - episode start/end markers (stage, score, load, termination reason)
// - optional per-step records: features, action, reward, load breakdown
//
// Every record carries obs_version/action_version so logs stay readable
// across schema changes. Write failures disable the sink.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::action_encoding::ACTION_VERSION;
use super::allostatic::LoadComponents;
use super::observation::{StateVector, OBS_VERSION};
use super::physiology::DevelopmentalStage;
use super::sim_env::{StepResult, TerminationReason};

pub const TELEMETRY_MODE_ENV: &str = "HPA_RL_TELEMETRY_MODE";
pub const TELEMETRY_PATH_ENV: &str = "HPA_RL_TELEMETRY_PATH";

/// Per-step record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickRecord {
    pub obs_version: u32,
    pub action_version: u32,
    pub episode_id: u64,
    pub stage: DevelopmentalStage,
    pub step: u64,
    /// Features the action was chosen from.
    pub features: StateVector,
    pub action: usize,
    pub reward: f64,
    pub allostatic_load: f64,
    pub load_components: Option<LoadComponents>,
    pub cortisol: f64,
    pub acth: f64,
    pub crh: f64,
    pub stress: f64,
    pub epsilon: f64,
}

impl TickRecord {
    pub fn new(
        episode_id: u64,
        stage: DevelopmentalStage,
        features: StateVector,
        action: usize,
        result: &StepResult,
        epsilon: f64,
    ) -> Self {
        Self {
            obs_version: OBS_VERSION,
            action_version: ACTION_VERSION,
            episode_id,
            stage,
            step: result.info.step,
            features,
            action,
            reward: result.reward,
            allostatic_load: result.info.allostatic_load,
            load_components: result.info.load_components,
            cortisol: result.info.cortisol,
            acth: result.info.acth,
            crh: result.info.crh,
            stress: result.info.stress,
            epsilon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeMarkerType {
    Start,
    End,
}

/// Episode boundary marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMarker {
    pub obs_version: u32,
    pub episode_id: u64,
    pub stage: DevelopmentalStage,
    pub marker_type: EpisodeMarkerType,
    /// True for greedy evaluation episodes.
    pub evaluation: bool,
    pub termination_reason: Option<TerminationReason>,
    pub score: Option<f64>,
    pub cumulative_load: Option<f64>,
    pub total_steps: Option<u64>,
}

/// Where telemetry goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    Off,
    Jsonl { path: PathBuf, ticks: bool },
}

/// RL telemetry sink.
///
/// Controlled by environment variables:
/// - HPA_RL_TELEMETRY_MODE: "off" (default) or "jsonl"
/// - HPA_RL_TELEMETRY_PATH: path to JSONL file
///
/// The file is opened (append) on the first record.
pub struct RLTelemetry {
    destination: Destination,
    writer: Option<BufWriter<File>>,
}

impl Default for RLTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl RLTelemetry {
    /// Disabled sink.
    pub fn new() -> Self {
        Self {
            destination: Destination::Off,
            writer: None,
        }
    }

    pub fn from_env() -> Self {
        let jsonl = env::var(TELEMETRY_MODE_ENV)
            .map(|mode| mode.eq_ignore_ascii_case("jsonl"))
            .unwrap_or(false);
        match (jsonl, env::var(TELEMETRY_PATH_ENV)) {
            (true, Ok(path)) => Self::enable(PathBuf::from(path)),
            (true, Err(_)) => {
                warn!(
                    "{TELEMETRY_MODE_ENV}=jsonl without {TELEMETRY_PATH_ENV}; telemetry off"
                );
                Self::new()
            }
            _ => Self::new(),
        }
    }

    /// Enable telemetry to `path`, per-step records included.
    pub fn enable(path: PathBuf) -> Self {
        Self {
            destination: Destination::Jsonl { path, ticks: true },
            writer: None,
        }
    }

    /// Keep episode markers, drop per-step records.
    pub fn episodes_only(mut self) -> Self {
        if let Destination::Jsonl { ticks, .. } = &mut self.destination {
            *ticks = false;
        }
        self
    }

    /// Serialize `record` as one line. Any failure turns the sink off.
    fn write_record<T: Serialize>(&mut self, record: &T) {
        let Destination::Jsonl { path, .. } = &self.destination else {
            return;
        };

        if self.writer.is_none() {
            let opened = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| OpenOptions::new().create(true).append(true).open(path));
            match opened {
                Ok(file) => self.writer = Some(BufWriter::new(file)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot open telemetry file; telemetry off");
                    self.destination = Destination::Off;
                    return;
                }
            }
        }

        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let written = serde_json::to_writer(&mut *writer, record)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = written {
            warn!(error = %e, "telemetry write failed; telemetry off");
            self.destination = Destination::Off;
            self.writer = None;
        }
    }

    pub fn log_episode_start(&mut self, episode_id: u64, stage: DevelopmentalStage, evaluation: bool) {
        if !self.is_enabled() {
            return;
        }
        self.write_record(&EpisodeMarker {
            obs_version: OBS_VERSION,
            episode_id,
            stage,
            marker_type: EpisodeMarkerType::Start,
            evaluation,
            termination_reason: None,
            score: None,
            cumulative_load: None,
            total_steps: None,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_episode_end(
        &mut self,
        episode_id: u64,
        stage: DevelopmentalStage,
        evaluation: bool,
        reason: Option<TerminationReason>,
        score: f64,
        cumulative_load: f64,
        total_steps: u64,
    ) {
        if !self.is_enabled() {
            return;
        }
        self.write_record(&EpisodeMarker {
            obs_version: OBS_VERSION,
            episode_id,
            stage,
            marker_type: EpisodeMarkerType::End,
            evaluation,
            termination_reason: reason,
            score: Some(score),
            cumulative_load: Some(cumulative_load),
            total_steps: Some(total_steps),
        });
    }

    pub fn log_tick(&mut self, record: &TickRecord) {
        if self.logs_ticks() {
            self.write_record(record);
        }
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!(error = %e, "telemetry flush failed");
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.destination, Destination::Jsonl { .. })
    }

    pub fn logs_ticks(&self) -> bool {
        matches!(self.destination, Destination::Jsonl { ticks: true, .. })
    }
}

impl Drop for RLTelemetry {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::sim_env::HpaEnv;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::tempdir;

    fn one_step() -> (StateVector, StepResult) {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut env = HpaEnv::new(0.1, DevelopmentalStage::Child);
        let features = env.reset(&mut rng).to_features();
        let result = env.step(4, &mut rng).unwrap();
        (features, result)
    }

    #[test]
    fn test_tick_record_creation() {
        let (features, result) = one_step();
        let record = TickRecord::new(3, DevelopmentalStage::Child, features, 4, &result, 0.5);
        assert_eq!(record.step, 1);
        assert_eq!(record.episode_id, 3);
        assert_eq!(record.obs_version, OBS_VERSION);
        assert_eq!(record.reward, result.reward);
        assert!(record.load_components.is_some());
    }

    #[test]
    fn test_episode_marker_serialization() {
        let marker = EpisodeMarker {
            obs_version: OBS_VERSION,
            episode_id: 42,
            stage: DevelopmentalStage::Adult,
            marker_type: EpisodeMarkerType::End,
            evaluation: true,
            termination_reason: Some(TerminationReason::MaxSteps),
            score: Some(500.0),
            cumulative_load: Some(1.5),
            total_steps: Some(2400),
        };

        let json = serde_json::to_string(&marker).unwrap();
        assert!(json.contains("\"stage\":\"adult\""));
        let parsed: EpisodeMarker = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.episode_id, 42);
        assert_eq!(parsed.marker_type, EpisodeMarkerType::End);
    }

    #[test]
    fn test_disabled_sink_writes_nothing() {
        let mut t = RLTelemetry::new();
        t.log_episode_start(0, DevelopmentalStage::Child, false);
        assert!(!t.is_enabled());
    }

    #[test]
    fn test_jsonl_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("telemetry.jsonl");
        let (features, result) = one_step();
        {
            let mut t = RLTelemetry::enable(path.clone());
            t.log_episode_start(1, DevelopmentalStage::Child, false);
            t.log_tick(&TickRecord::new(
                1,
                DevelopmentalStage::Child,
                features,
                4,
                &result,
                1.0,
            ));
            t.log_episode_end(
                1,
                DevelopmentalStage::Child,
                false,
                None,
                result.reward,
                result.info.cumulative_load,
                1,
            );
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn test_episodes_only_skips_ticks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let (features, result) = one_step();
        {
            let mut t = RLTelemetry::enable(path.clone()).episodes_only();
            assert!(!t.logs_ticks());
            t.log_tick(&TickRecord::new(
                0,
                DevelopmentalStage::Child,
                features,
                4,
                &result,
                1.0,
            ));
            t.log_episode_start(0, DevelopmentalStage::Child, false);
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
