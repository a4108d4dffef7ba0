//! Configuration schema migration.

use crate::ProjectError;
use crate::schema::PipelineConfig;

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut config: PipelineConfig) -> Result<PipelineConfig, ProjectError> {
    while config.version < LATEST_VERSION {
        config = migrate_one_version(config)?;
    }
    Ok(config)
}

fn migrate_one_version(config: PipelineConfig) -> Result<PipelineConfig, ProjectError> {
    match config.version {
        0 => migrate_v0_to_v1(config),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// Version 0 files predate per-pulse timeouts.
fn migrate_v0_to_v1(mut config: PipelineConfig) -> Result<PipelineConfig, ProjectError> {
    config.fit.timeout_s = None;
    config.version = 1;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v0_gets_no_timeout() {
        let mut config = PipelineConfig::new("old", "data.json", vec!["G1".to_string()]);
        config.version = 0;
        let migrated = migrate_to_latest(config).unwrap();
        assert_eq!(migrated.version, LATEST_VERSION);
        assert_eq!(migrated.fit.timeout_s, None);
    }
}
