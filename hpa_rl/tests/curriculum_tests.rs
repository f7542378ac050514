// tests/curriculum_tests.rs
//
// End-to-end curriculum runs from YAML configs.
//
// - A small three-stage run trains, evaluates and reports every stage
// - Same (config, seed) => identical reports
// - JSONL event and telemetry files carry one record per event
// - HPA_RL_* environment overrides apply on top of file values

use std::fs;
use std::sync::Mutex;

use hpa_rl::rl::RLTelemetry;
use hpa_rl::{CurriculumRunner, DevelopmentalStage, JsonlSink, NoopSink, RunConfig};
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

const SMALL_RUN: &str = r#"
version: hpa-curriculum-v1
time_step_hours: 1.0
test_episodes: 2
progress_every: 0
agent:
  batch_size: 16
  replay_capacity: 1000
  initial_table_capacity: 128
stages:
  - name: child
    stage: child
    episodes: 2
  - name: adolescent
    stage: adolescent
    episodes: 1
    epsilon_on_entry: 0.2
  - name: adult
    stage: adult
    episodes: 1
    epsilon_on_entry: -1.0
"#;

#[test]
fn test_small_curriculum_runs_all_stages() {
    let cfg = RunConfig::from_yaml_str(SMALL_RUN).unwrap();
    let mut runner = CurriculumRunner::new(cfg, 17, NoopSink).unwrap().quiet(true);
    let report = runner.run().unwrap();

    let stages: Vec<_> = report.stages.iter().map(|s| s.training.stage).collect();
    assert_eq!(
        stages,
        vec![
            DevelopmentalStage::Child,
            DevelopmentalStage::Adolescent,
            DevelopmentalStage::Adult
        ]
    );
    for s in &report.stages {
        assert_eq!(s.evaluation.episodes, 2);
        assert_eq!(s.evaluation.scores.len(), 2);
        assert!(s.evaluation.mean_score.is_finite());
    }

    assert_eq!(report.stages[1].training.epsilon_start, 0.2);
    let adult_start = report.stages[2].training.epsilon_start;
    let teen_end = report.stages[1].training.epsilon_end;
    assert!((adult_start - (teen_end * 1.5).min(0.3)).abs() < 1e-12);

    assert!(report.q_table_size > 0);
    assert_eq!(report.q_table_size, runner.agent().q_table_size());
    assert_eq!(runner.agent().current_stage(), 2);
}

#[test]
fn test_same_seed_same_report() {
    let run = |seed| {
        let cfg = RunConfig::from_yaml_str(SMALL_RUN).unwrap();
        let mut runner = CurriculumRunner::new(cfg, seed, NoopSink).unwrap().quiet(true);
        serde_json::to_string(&runner.run().unwrap()).unwrap()
    };
    assert_eq!(run(5), run(5));
    assert_ne!(run(5), run(6));
}

#[test]
fn test_event_and_telemetry_files() {
    let dir = tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let ticks = dir.path().join("ticks.jsonl");

    let mut cfg = RunConfig::from_yaml_str(SMALL_RUN).unwrap();
    cfg.stages.truncate(1);
    {
        let sink = JsonlSink::create(&events).unwrap();
        let mut runner = CurriculumRunner::new(cfg, 1, sink)
            .unwrap()
            .with_telemetry(RLTelemetry::enable(ticks.clone()))
            .quiet(true);
        runner.run().unwrap();
    }

    let kinds: Vec<String> = fs::read_to_string(&events)
        .unwrap()
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect();
    // 2 training episodes, stage summary, 2 evaluation episodes, evaluation summary.
    assert_eq!(
        kinds,
        vec!["episode", "episode", "stage", "episode", "episode", "evaluation"]
    );

    let tick_lines = fs::read_to_string(&ticks).unwrap();
    let records: Vec<serde_json::Value> = tick_lines
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    // Child episodes last 240 steps; 4 episodes plus start/end markers.
    assert_eq!(records.len(), 4 * 240 + 4 * 2);
    assert_eq!(records[0]["marker_type"], "Start");
}

#[test]
fn test_env_overrides_beat_file_values() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var("HPA_RL_TEST_EPISODES", "3");
    std::env::set_var("HPA_RL_EPISODE_SCALE", "2.0");
    std::env::set_var("HPA_RL_GAMMA", "not-a-number");

    let mut cfg = RunConfig::from_yaml_str(SMALL_RUN).unwrap();
    cfg.apply_env_overrides();

    std::env::remove_var("HPA_RL_TEST_EPISODES");
    std::env::remove_var("HPA_RL_EPISODE_SCALE");
    std::env::remove_var("HPA_RL_GAMMA");

    assert_eq!(cfg.test_episodes, 3);
    assert_eq!(
        cfg.stages.iter().map(|s| s.episodes).collect::<Vec<_>>(),
        vec![4, 2, 2]
    );
    // Unparseable values keep the file value.
    assert_eq!(cfg.agent.gamma, 0.98);
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = RunConfig::from_yaml_file(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, hpa_rl::HpaError::Io { .. }));
}
