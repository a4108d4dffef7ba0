//! Configuration loading, saving and dataset resolution.

use ecm_project::{JsonDataSource, PipelineConfig};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Load and validate a pipeline configuration (YAML, or JSON by extension).
pub fn load_config(path: &Path) -> AppResult<PipelineConfig> {
    if !path.exists() {
        return Err(AppError::ConfigRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    let config = ecm_project::load_config(path)?;
    tracing::debug!(path = %path.display(), name = %config.name, "configuration loaded");
    Ok(config)
}

pub fn save_config(path: &Path, config: &PipelineConfig) -> AppResult<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => ecm_project::save_json(path, config)?,
        _ => ecm_project::save_yaml(path, config)?,
    }
    Ok(())
}

/// Relative paths are taken from the directory holding the configuration.
pub fn resolve_dataset_path(config: &PipelineConfig, config_path: Option<&Path>) -> PathBuf {
    resolve(&config.dataset.path, config_path)
}

/// Relative output directories resolve like the dataset path.
pub fn resolve_output_dir(config: &PipelineConfig, config_path: Option<&Path>) -> PathBuf {
    resolve(&config.output.dir, config_path)
}

fn resolve(path: &Path, config_path: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config_path.and_then(Path::parent) {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

pub fn open_dataset(
    config: &PipelineConfig,
    config_path: Option<&Path>,
) -> AppResult<JsonDataSource> {
    let path = resolve_dataset_path(config, config_path);
    Ok(JsonDataSource::open(&path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_follow_the_config_file() {
        let config = PipelineConfig::new("t", "data/cells.json", vec!["G1".to_string()]);
        let resolved = resolve_dataset_path(&config, Some(Path::new("/proj/pipeline.yaml")));
        assert_eq!(resolved, PathBuf::from("/proj/data/cells.json"));
        assert_eq!(
            resolve_output_dir(&config, Some(Path::new("/proj/pipeline.yaml"))),
            PathBuf::from("/proj/out")
        );
        assert_eq!(
            resolve_dataset_path(&config, None),
            PathBuf::from("data/cells.json")
        );
    }

    #[test]
    fn missing_config_is_a_read_error() {
        let err = load_config(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, AppError::ConfigRead { .. }));
    }
}
