// src/logging.rs
//
// Run-level event sinks.
// - EventSink: trait used by the curriculum runner
// - NoopSink:  discards all events
// - JsonlSink: one JSON object per line (episodes, stages, evaluations)
// - init_tracing: stderr diagnostics for the binaries

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{HpaError, Result};
use crate::rl::runner::{EpisodeSummary, EvaluationSummary, StageSummary};

/// Sink for curriculum progress events.
pub trait EventSink {
    fn log_episode(&mut self, episode: &EpisodeSummary);
    fn log_stage(&mut self, stage: &StageSummary);
    fn log_evaluation(&mut self, evaluation: &EvaluationSummary);
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn log_episode(&mut self, _episode: &EpisodeSummary) {}
    fn log_stage(&mut self, _stage: &StageSummary) {}
    fn log_evaluation(&mut self, _evaluation: &EvaluationSummary) {}
}

#[derive(Serialize)]
struct Event<'a, T: Serialize> {
    event: &'a str,
    #[serde(flatten)]
    payload: &'a T,
}

/// JSONL file sink. The first write error is logged and disables the sink.
pub struct JsonlSink {
    writer: Option<BufWriter<File>>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| HpaError::io(path, e))?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
        })
    }

    fn write<T: Serialize>(&mut self, event: &str, payload: &T) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let line = match serde_json::to_string(&Event { event, payload }) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, event, "failed to encode event");
                return;
            }
        };
        if let Err(e) = writeln!(writer, "{line}") {
            warn!(error = %e, "event sink write failed; disabling");
            self.writer = None;
        }
    }
}

impl JsonlSink {
    /// Flush buffered events. A failure is logged and disables the sink.
    fn flush(&mut self) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writer.flush() {
            warn!(error = %e, "event sink flush failed; disabling");
            self.writer = None;
        }
    }

    pub fn is_active(&self) -> bool {
        self.writer.is_some()
    }
}

impl EventSink for JsonlSink {
    fn log_episode(&mut self, episode: &EpisodeSummary) {
        self.write("episode", episode);
    }

    fn log_stage(&mut self, stage: &StageSummary) {
        self.write("stage", stage);
        self.flush();
    }

    fn log_evaluation(&mut self, evaluation: &EvaluationSummary) {
        self.write("evaluation", evaluation);
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        self.flush();
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn log_episode(&mut self, episode: &EpisodeSummary) {
        (**self).log_episode(episode)
    }

    fn log_stage(&mut self, stage: &StageSummary) {
        (**self).log_stage(stage)
    }

    fn log_evaluation(&mut self, evaluation: &EvaluationSummary) {
        (**self).log_evaluation(evaluation)
    }
}

/// Install the stderr tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` count picks warn/info/debug/trace.
pub fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::DevelopmentalStage;
    use tempfile::tempdir;

    fn stage_summary() -> StageSummary {
        StageSummary {
            name: "child".to_string(),
            stage: DevelopmentalStage::Child,
            episodes: 3,
            mean_score: 1.0,
            final_avg_score: 1.5,
            best_score: 2.0,
            epsilon_start: 1.0,
            epsilon_end: 0.9,
            q_table_size: 10,
            learn_steps: 5,
        }
    }

    #[test]
    fn test_jsonl_sink_tags_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        {
            let mut sink = JsonlSink::create(&path).unwrap();
            sink.log_stage(&stage_summary());
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(v["event"], "stage");
        assert_eq!(v["name"], "child");
        assert_eq!(v["learn_steps"], 5);
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let mut sink: Box<dyn EventSink> = Box::new(NoopSink);
        sink.log_stage(&stage_summary());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_flush_failure_disables_sink() {
        let mut sink = JsonlSink::create(Path::new("/dev/full")).unwrap();
        assert!(sink.is_active());
        sink.log_stage(&stage_summary());
        assert!(!sink.is_active());
        // Later events are dropped quietly.
        sink.log_stage(&stage_summary());
    }

    #[test]
    fn test_create_in_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("events.jsonl");
        assert!(matches!(JsonlSink::create(&path), Err(HpaError::Io { .. })));
    }
}
