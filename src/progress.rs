//! JSON checkpoint for long batch runs, so an interrupted run can resume.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_PROGRESS_FILE: &str = "variant_detection_progress.json";
/// Items processed between checkpoint writes.
pub const BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
pub struct Progress<T> {
    #[serde(default)]
    pub processed_ids: BTreeSet<u64>,
    #[serde(default)]
    pub results: Vec<T>,
}

impl<T> Default for Progress<T> {
    fn default() -> Self {
        Self {
            processed_ids: BTreeSet::new(),
            results: Vec::new(),
        }
    }
}

impl<T: Serialize + DeserializeOwned> Progress<T> {
    /// Previous checkpoint, or an empty one when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading progress file {}", path.display()))?;
        let progress: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing progress file {}", path.display()))?;
        info!(
            file = %path.display(),
            processed = progress.processed_ids.len(),
            "resuming from checkpoint"
        );
        Ok(progress)
    }

    /// Write through a temporary file so the checkpoint is never half-written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("serializing progress")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
        debug!(file = %path.display(), processed = self.processed_ids.len(), "checkpoint saved");
        Ok(())
    }
}

impl<T> Progress<T> {
    pub fn is_processed(&self, id: u64) -> bool {
        self.processed_ids.contains(&id)
    }

    pub fn record(&mut self, id: u64, result: T) {
        self.processed_ids.insert(id);
        self.results.push(result);
    }

    /// Items whose id has not been processed yet, in input order.
    pub fn pending<'a, P>(&self, items: &'a [P], id_of: impl Fn(&P) -> u64) -> Vec<&'a P> {
        items.iter().filter(|p| !self.is_processed(id_of(p))).collect()
    }
}

/// Remove the checkpoint after a completed run. Missing files are fine.
pub fn clear(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(file = %path.display(), "checkpoint removed");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("removing {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Outcome {
        id: u64,
        ok: bool,
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let p: Progress<Outcome> = Progress::load(&dir.path().join("none.json")).unwrap();
        assert!(p.processed_ids.is_empty());
        assert!(p.results.is_empty());
    }

    #[test]
    fn save_load_and_resume_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_PROGRESS_FILE);

        let mut p = Progress::default();
        p.record(3, Outcome { id: 3, ok: true });
        p.record(1, Outcome { id: 1, ok: false });
        p.save(&path).unwrap();

        let mut loaded: Progress<Outcome> = Progress::load(&path).unwrap();
        assert_eq!(loaded.processed_ids.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(loaded.results.len(), 2);

        let items = [1u64, 2, 3, 4];
        let todo = loaded.pending(&items, |id| *id);
        assert_eq!(todo, vec![&2, &4]);

        loaded.record(2, Outcome { id: 2, ok: true });
        loaded.save(&path).unwrap();
        let again: Progress<Outcome> = Progress::load(&path).unwrap();
        assert!(again.processed_ids.is_superset(&loaded.processed_ids));
        assert!(!dir.path().join("variant_detection_progress.json.tmp").exists());

        clear(&path).unwrap();
        assert!(!path.exists());
        clear(&path).unwrap();
    }

    #[test]
    fn tolerates_missing_fields() {
        let p: Progress<Outcome> = serde_json::from_str(r#"{"processed_ids":[7]}"#).unwrap();
        assert!(p.is_processed(7));
        assert!(p.results.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Progress::<Outcome>::load(&path).is_err());
    }
}
