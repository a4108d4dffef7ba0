//! Per-label cache of fitted OCV curves.
//!
//! Curves are built once per battery label and then handed out as
//! `Arc<OcvCurve>`; holders never mutate them.

use crate::curve::OcvCurve;
use crate::error::OcvResult;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
pub struct OcvCache {
    curves: RwLock<HashMap<String, Arc<OcvCurve>>>,
}

impl OcvCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<Arc<OcvCurve>> {
        self.curves
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(label)
            .cloned()
    }

    /// Publish a curve for `label`, replacing any previous one.
    pub fn insert(&self, label: &str, curve: OcvCurve) -> Arc<OcvCurve> {
        let curve = Arc::new(curve);
        self.curves
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(label.to_string(), Arc::clone(&curve));
        curve
    }

    /// Return the cached curve for `label`, building it with `build` on a miss.
    ///
    /// A failed build leaves the cache untouched.
    pub fn get_or_try_insert_with<F>(&self, label: &str, build: F) -> OcvResult<Arc<OcvCurve>>
    where
        F: FnOnce() -> OcvResult<OcvCurve>,
    {
        if let Some(curve) = self.get(label) {
            return Ok(curve);
        }
        let curve = build()?;
        let mut guard = self
            .curves
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // another caller may have won the race while we were building
        let entry = guard
            .entry(label.to_string())
            .or_insert_with(|| Arc::new(curve));
        Ok(Arc::clone(entry))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .curves
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        labels.sort();
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcvError;

    fn curve() -> OcvCurve {
        OcvCurve::from_table(vec![0.0, 1.0], vec![3.0, 4.2]).unwrap()
    }

    #[test]
    fn builds_once_per_label() {
        let cache = OcvCache::new();
        let mut builds = 0;
        let a = cache
            .get_or_try_insert_with("G1", || {
                builds += 1;
                Ok(curve())
            })
            .unwrap();
        let b = cache
            .get_or_try_insert_with("G1", || {
                builds += 1;
                Ok(curve())
            })
            .unwrap();
        assert_eq!(builds, 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.labels(), vec!["G1".to_string()]);
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache = OcvCache::new();
        let err = cache.get_or_try_insert_with("W3", || {
            Err(OcvError::DataUnavailable {
                what: "test".to_string(),
            })
        });
        assert!(err.is_err());
        assert!(!cache.contains("W3"));
    }
}
