use ecm_fit::{Parameter, PriorOverride};
use ecm_ocv::SocExtrapolation;
use ecm_project::{
    PipelineConfig, load_config, load_json, load_yaml, save_json, save_yaml, validate_config,
};

fn temp_path(name: &str) -> std::path::PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("{nanos}_{name}"))
}

#[test]
fn roundtrip_yaml_default_config() {
    let config = PipelineConfig::new("lgm50", "data/lgm50.json", vec!["G1".to_string()]);
    validate_config(&config).unwrap();

    let path = temp_path("ecm_project_roundtrip.yaml");
    save_yaml(&path, &config).unwrap();
    let loaded = load_yaml(&path).unwrap();
    assert_eq!(config, loaded);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn roundtrip_json_with_overrides() {
    let mut config = PipelineConfig::new("lgm50", "data/lgm50.json", vec!["W3".to_string()]);
    config.fit.rc_pairs = 1;
    config.soc.extrapolation = SocExtrapolation::Strict;
    config.fit.priors.insert(
        Parameter::C1,
        PriorOverride {
            mean: Some(800.0),
            upper: Some(4000.0),
            ..Default::default()
        },
    );

    let path = temp_path("ecm_project_roundtrip.json");
    save_json(&path, &config).unwrap();
    let loaded = load_json(&path).unwrap();
    assert_eq!(config, loaded);
    let by_extension = load_config(&path).unwrap();
    assert_eq!(config, by_extension);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn sparse_yaml_fills_defaults() {
    let yaml = r#"
version: 1
name: sparse
dataset: { path: data.json }
detection: { min_distance: 500 }
soc: { extrapolation: strict }
fit:
  rc_pairs: 1
  priors:
    r0: { mean: 0.002 }
jobs: { labels: [G1, V4] }
"#;
    let path = temp_path("ecm_project_sparse.yaml");
    std::fs::write(&path, yaml).unwrap();
    let config = load_yaml(&path).unwrap();
    assert_eq!(config.detection.min_distance, 500);
    assert_eq!(config.detection.current_threshold_a, 0.1);
    assert_eq!(config.extraction.window_size, 1000);
    assert_eq!(config.ocv.degree, 11);
    assert_eq!(config.fit.max_unchanged_iterations, 30);
    assert_eq!(config.fit.cell.capacity_ah, 4.85);
    assert_eq!(config.soc.extrapolation, SocExtrapolation::Strict);
    assert_eq!(config.fit.priors[&Parameter::R0].mean, Some(0.002));
    assert_eq!(config.jobs.labels, vec!["G1", "V4"]);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn invalid_file_is_rejected_on_load() {
    let yaml = r#"
version: 1
name: bad
dataset: { path: data.json }
fit: { rc_pairs: 4 }
jobs: { labels: [G1] }
"#;
    let path = temp_path("ecm_project_invalid.yaml");
    std::fs::write(&path, yaml).unwrap();
    assert!(load_yaml(&path).is_err());
    let _ = std::fs::remove_file(&path);
}
