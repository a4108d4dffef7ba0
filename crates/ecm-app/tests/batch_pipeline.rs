//! End-to-end batch runs over an in-memory dataset.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ecm_app::{
    BatchOptions, BatchProgressEvent, BatchRequest, BatchStage, CurveOrigin, interpolate_parameters,
    load_label_table, resolve_curve, run_batch, run_batch_with_progress,
};
use ecm_fit::{
    CancelToken, EvalError, EvalResult, Excitation, FitStatus, ModelEvaluator, Parameter,
    TheveninParameters,
};
use ecm_ocv::OcvCache;
use ecm_project::{InMemoryDataSource, PipelineConfig, RawCycles, TestKind};
use ecm_results::{ResultStore, csv_header};

const CAPACITY_AH: f64 = 4.85;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}_{nanos}"))
}

fn ocv(soc: f64) -> f64 {
    3.0 + 1.2 * soc
}

fn capacity_test() -> RawCycles {
    let n = 200;
    let capacity: Vec<f64> = (0..n)
        .map(|i| CAPACITY_AH * i as f64 / (n - 1) as f64)
        .collect();
    let voltage = capacity
        .iter()
        .map(|q| ocv(1.0 - q / CAPACITY_AH))
        .collect();
    RawCycles {
        voltage: vec![voltage],
        current: vec![vec![-0.5; n]],
        capacity: vec![capacity],
    }
}

/// Two 10 s discharge pulses at 2 A on a 1-RC cell, instrument sign convention.
fn pulse_cycle(soc0: f64) -> (Vec<f64>, Vec<f64>) {
    let (r0, r1, c1) = (0.01, 0.005, 400.0);
    let decay = (-1.0_f64 / (r1 * c1)).exp();
    let mut soc = soc0;
    let mut v1 = 0.0;
    let mut voltage = Vec::new();
    let mut current = Vec::new();
    for i in 0..250 {
        let on = (30..40).contains(&i) || (130..140).contains(&i);
        let amps = if on { 2.0 } else { 0.0 };
        v1 = decay * v1 + amps * r1 * (1.0 - decay);
        voltage.push(ocv(soc) - amps * r0 - v1);
        current.push(-amps);
        soc -= amps / (CAPACITY_AH * 3600.0);
    }
    (voltage, current)
}

fn pulse_test() -> RawCycles {
    let (v0, i0) = pulse_cycle(0.8);
    RawCycles {
        voltage: vec![v0, vec![3.9; 50]],
        current: vec![i0, vec![0.0; 50]],
        capacity: vec![vec![0.0; 250], vec![0.0; 50]],
    }
}

fn config(labels: &[&str]) -> PipelineConfig {
    let mut config = PipelineConfig::new(
        "synthetic",
        "unused.json",
        labels.iter().map(|l| l.to_string()).collect(),
    );
    config.ocv.degree = 5;
    config.detection.min_distance = 50;
    config.extraction.window_size = 40;
    config.fit.rc_pairs = 1;
    config.fit.max_iterations = 6;
    config.fit.max_unchanged_iterations = 6;
    config.fit.swarm_size = 6;
    config.jobs.cycles = Some(vec![0, 1, 5]);
    config.jobs.threads = Some(2);
    config
}

fn source() -> InMemoryDataSource {
    InMemoryDataSource::new()
        .with("G1", TestKind::Capacity, capacity_test())
        .with("G1", TestKind::PulsePower, pulse_test())
        .with("W3", TestKind::PulsePower, pulse_test())
}

fn request<'a>(
    config: &'a PipelineConfig,
    source: &'a InMemoryDataSource,
    dir: &Path,
) -> BatchRequest<'a> {
    BatchRequest {
        config,
        source,
        output_dir: dir.to_path_buf(),
        options: BatchOptions::default(),
        cancel: CancelToken::new(),
        evaluator: None,
        optimizer: None,
    }
}

#[test]
fn batch_fits_every_detected_pulse_and_skips_bad_cycles() {
    let dir = unique_temp_dir("ecm_app_batch");
    let config = config(&["G1"]);
    let source = source();
    let request = BatchRequest {
        config: &config,
        source: &source,
        output_dir: dir.clone(),
        options: BatchOptions {
            use_cache: false,
            ..BatchOptions::default()
        },
        cancel: CancelToken::new(),
        evaluator: None,
        optimizer: None,
    };

    let mut events: Vec<BatchProgressEvent> = Vec::new();
    let response = run_batch_with_progress(&request, Some(&mut |e: BatchProgressEvent| events.push(e)))
        .expect("batch should complete");

    assert!(!response.loaded_from_cache);
    let pulses: Vec<usize> = response.rows.iter().map(|r| r.pulse_number).collect();
    assert_eq!(pulses, vec![0, 1]);
    assert!(response.rows.iter().all(|r| r.cycle == 0 && r.r0.is_some()));
    assert!(response.rows.iter().all(|r| r.r2.is_none()));
    assert!((response.rows[0].current - 2.0).abs() < 1e-12);

    let summary = response.manifest.summary;
    assert_eq!(summary.succeeded + summary.warnings, 2);
    assert_eq!(summary.cycles_skipped, 2, "flat cycle and missing cycle");
    assert!(response
        .manifest
        .skipped_cycles
        .iter()
        .any(|c| c.cycle == 1 && c.reason.contains("No pulses")));

    let last_fit = events
        .iter()
        .filter(|e| e.stage == BatchStage::FittingPulses)
        .filter_map(|e| e.fit)
        .last()
        .expect("fit progress reported");
    assert_eq!((last_fit.done, last_fit.total), (2, 2));
    assert!(matches!(events.last().map(|e| &e.stage), Some(BatchStage::Completed)));

    let store = ResultStore::new(dir.clone()).unwrap();
    assert!(store.ocv_curve_path("G1").unwrap().exists());
    assert_eq!(load_label_table(&store, "G1").unwrap(), response.rows);
    let doc = store.load_pulse_doc("G1", 0, 1).unwrap();
    assert!(doc.status.has_parameters());
    assert_eq!(store.load_aggregate("G1", 0).unwrap().len(), 2);

    let mid_soc = (response.rows[0].soc + response.rows[1].soc) / 2.0;
    let at = interpolate_parameters(&store, "G1", Some(0), mid_soc).unwrap();
    let r0 = at[&Parameter::R0];
    assert!(r0.is_finite() && r0 > 0.0);
    assert!(!at.contains_key(&Parameter::R2));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn rerun_loads_from_cache() {
    let dir = unique_temp_dir("ecm_app_cache");
    let config = config(&["G1"]);
    let source = source();
    let mut request = BatchRequest {
        config: &config,
        source: &source,
        output_dir: dir.clone(),
        options: BatchOptions::default(),
        cancel: CancelToken::new(),
        evaluator: None,
        optimizer: None,
    };
    let first = run_batch(&request).expect("first run");
    let second = run_batch(&request).expect("second run");
    assert!(second.loaded_from_cache);
    assert_eq!(first.run_id, second.run_id);
    assert_eq!(first.rows, second.rows);

    request.options.use_cache = false;
    let third = run_batch(&request).expect("forced rerun");
    assert!(!third.loaded_from_cache);
    assert_eq!(third.rows.len(), first.rows.len(), "rerun replaces rows");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_label_aborts_the_batch() {
    let dir = unique_temp_dir("ecm_app_unknown");
    let config = config(&["G1", "X9"]);
    let source = source();
    let request = BatchRequest {
        config: &config,
        source: &source,
        output_dir: dir.clone(),
        options: BatchOptions::default(),
        cancel: CancelToken::new(),
        evaluator: None,
        optimizer: None,
    };
    match run_batch(&request) {
        Err(ecm_app::AppError::LabelNotFound { label, known }) => {
            assert_eq!(label, "X9");
            assert_eq!(known, vec!["G1".to_string(), "W3".to_string()]);
        }
        other => panic!("expected LabelNotFound, got {other:?}"),
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn label_without_capacity_test_fails_alone() {
    let dir = unique_temp_dir("ecm_app_label_failure");
    let config = config(&["W3", "G1"]);
    let source = source();
    let request = BatchRequest {
        config: &config,
        source: &source,
        output_dir: dir.clone(),
        options: BatchOptions::default(),
        cancel: CancelToken::new(),
        evaluator: None,
        optimizer: None,
    };
    let response = run_batch(&request).expect("batch should complete");
    assert_eq!(response.manifest.failed_labels.len(), 1);
    assert_eq!(response.manifest.failed_labels[0].battery_label, "W3");
    assert_eq!(response.manifest.summary.labels_failed, 1);
    assert!(response.rows.iter().all(|r| r.battery_label == "G1"));
    assert_eq!(response.rows.len(), 2);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cancelled_batch_marks_pulses_failed() {
    let dir = unique_temp_dir("ecm_app_cancel");
    let config = config(&["G1"]);
    let source = source();
    let cancel = CancelToken::new();
    cancel.cancel();
    let request = BatchRequest {
        config: &config,
        source: &source,
        output_dir: dir.clone(),
        options: BatchOptions::default(),
        cancel,
        evaluator: None,
        optimizer: None,
    };
    let response = run_batch(&request).expect("batch should complete");
    assert_eq!(response.rows.len(), 2, "failed pulses keep their rows");
    assert!(response.rows.iter().all(|r| !r.is_fitted()));
    assert!(response
        .manifest
        .pulses
        .iter()
        .all(|p| p.status == FitStatus::Failed && p.message.as_deref() == Some("cancelled")));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cancelled_run_is_not_served_from_cache() {
    let dir = unique_temp_dir("ecm_app_cancel_rerun");
    let config = config(&["G1"]);
    let source = source();
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut request = BatchRequest {
        config: &config,
        source: &source,
        output_dir: dir.clone(),
        options: BatchOptions::default(),
        cancel,
        evaluator: None,
        optimizer: None,
    };
    let cancelled = run_batch(&request).expect("cancelled batch completes");
    assert!(cancelled.manifest.partial);
    let store = ResultStore::new(dir.clone()).unwrap();
    assert!(!store.has_run(&cancelled.run_id));

    request.cancel = CancelToken::new();
    let fresh = run_batch(&request).expect("fresh run");
    assert_eq!(fresh.run_id, cancelled.run_id);
    assert!(!fresh.loaded_from_cache);
    assert!(!fresh.manifest.partial);
    assert_eq!(fresh.rows.len(), 2);
    assert!(fresh.rows.iter().all(|r| r.is_fitted()));

    let cached = run_batch(&request).expect("cached run");
    assert!(cached.loaded_from_cache);
    assert_eq!(cached.rows, fresh.rows);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cached_run_returns_its_own_rows() {
    let dir = unique_temp_dir("ecm_app_cache_rows");
    let source = source();
    let seed_a = config(&["G1"]);
    let mut seed_b = config(&["G1"]);
    seed_b.fit.seed = 7;

    let a = run_batch(&request(&seed_a, &source, &dir)).expect("run a");
    let b = run_batch(&request(&seed_b, &source, &dir)).expect("run b");
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(load_label_table(&ResultStore::new(dir.clone()).unwrap(), "G1").unwrap(), b.rows);

    let again = run_batch(&request(&seed_a, &source, &dir)).expect("run a again");
    assert!(again.loaded_from_cache);
    assert_eq!(again.rows, a.rows);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn saved_curve_is_refitted_when_data_or_settings_change() {
    let dir = unique_temp_dir("ecm_app_curve_key");
    let store = ResultStore::new(dir.clone()).unwrap();
    let mut config = config(&["G1"]);
    let source = source();
    let origin = |config: &PipelineConfig, source: &InMemoryDataSource| {
        resolve_curve(source, "G1", config, &store, &OcvCache::new())
            .unwrap()
            .origin
    };

    assert!(matches!(origin(&config, &source), CurveOrigin::Fitted { .. }));
    assert_eq!(origin(&config, &source), CurveOrigin::Stored);

    config.ocv.degree = 4;
    assert!(matches!(origin(&config, &source), CurveOrigin::Fitted { .. }));
    assert_eq!(origin(&config, &source), CurveOrigin::Stored);

    let mut shifted = capacity_test();
    for v in &mut shifted.voltage[0] {
        *v += 0.01;
    }
    let other = InMemoryDataSource::new().with("G1", TestKind::Capacity, shifted);
    assert!(matches!(origin(&config, &other), CurveOrigin::Fitted { .. }));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn label_table_keeps_its_model_order() {
    let dir = unique_temp_dir("ecm_app_order");
    let source = source();
    let mut two = config(&["G1"]);
    two.fit.rc_pairs = 2;
    let one = config(&["G1"]);

    let first = run_batch(&request(&two, &source, &dir)).expect("2-RC run");
    assert!(first.manifest.failed_labels.is_empty());
    let store = ResultStore::new(dir.clone()).unwrap();
    let path = store.label_table_path("G1").unwrap();
    let before = std::fs::read_to_string(&path).unwrap();
    assert_eq!(before.lines().next(), Some(csv_header(ecm_fit::RcPairs::Two).as_str()));

    let second = run_batch(&request(&one, &source, &dir)).expect("batch completes");
    assert_eq!(second.manifest.failed_labels.len(), 1);
    assert!(second.manifest.failed_labels[0].reason.contains("2-RC"));
    assert!(second.rows.is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    let _ = std::fs::remove_dir_all(&dir);
}

struct Diverging;

impl ModelEvaluator for Diverging {
    fn simulate(
        &self,
        _params: &TheveninParameters,
        _excitation: Excitation<'_>,
    ) -> EvalResult<Vec<f64>> {
        Err(EvalError::SimulationDiverged {
            reason: "always".to_string(),
        })
    }
}

#[test]
fn diverging_evaluator_fails_every_pulse() {
    let dir = unique_temp_dir("ecm_app_diverging");
    let config = config(&["G1"]);
    let source = source();
    let request = BatchRequest {
        config: &config,
        source: &source,
        output_dir: dir.clone(),
        options: BatchOptions::default(),
        cancel: CancelToken::new(),
        evaluator: Some(Arc::new(Diverging)),
        optimizer: None,
    };
    let response = run_batch(&request).expect("batch should complete");
    assert_eq!(response.rows.len(), 2);
    assert!(response.rows.iter().all(|r| !r.is_fitted()));
    assert_eq!(response.manifest.summary.failed, 2);
    assert!(response.manifest.pulses.iter().all(|p| {
        p.status == FitStatus::Failed
            && p.message.as_deref().is_some_and(|m| m.starts_with("no finite-cost candidate"))
    }));
    assert!(!response.manifest.partial, "failures alone leave the run complete");
    let _ = std::fs::remove_dir_all(&dir);
}
