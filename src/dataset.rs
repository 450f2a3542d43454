//! The canonical institute set and the flattened view searches run over.
//!
//! A [`Dataset`] is immutable once built. [`DatasetStore`] publishes a new
//! `Arc<Dataset>` on every import or clear, so a search that already holds a
//! snapshot keeps reading a consistent one while an admin replaces the data.

use crate::error::{RankError, Result};
use crate::models::{CollegesData, FlattenedRecord, Institute};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    pub total_colleges: usize,
    pub total_branches: usize,
    pub data_entries: usize,
}

#[derive(Debug, Default)]
pub struct Dataset {
    data: CollegesData,
    records: Vec<FlattenedRecord>,
}

impl Dataset {
    pub fn new(institutes: Vec<Institute>) -> Self {
        let records = institutes
            .iter()
            .flat_map(|institute| {
                institute
                    .branches
                    .iter()
                    .map(move |branch| FlattenedRecord::new(institute, branch))
            })
            .collect();

        Self {
            data: CollegesData { institutes },
            records,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn institutes(&self) -> &[Institute] {
        &self.data.institutes
    }

    pub fn document(&self) -> &CollegesData {
        &self.data
    }

    pub fn records(&self) -> &[FlattenedRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.data.institutes.is_empty()
    }

    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            total_colleges: self.data.institutes.len(),
            total_branches: self
                .data
                .institutes
                .iter()
                .map(|institute| institute.branches.len())
                .sum(),
            data_entries: self.data.institutes.len(),
        }
    }

    /// Distinct branch names, sorted.
    pub fn branch_names(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| record.branch.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct college types, sorted.
    pub fn college_types(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| record.college_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub fn load_colleges_data(path: &Path) -> Result<CollegesData> {
    if !path.exists() {
        return Ok(CollegesData::default());
    }
    let content = fs::read_to_string(path)?;
    let data: CollegesData = serde_json::from_str(&content)?;
    Ok(data)
}

/// Writes next to the target and renames over it so a crash never leaves a
/// half-written data file behind.
pub fn save_colleges_data(path: &Path, data: &CollegesData) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(data)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

pub struct DatasetStore {
    path: PathBuf,
    current: RwLock<Arc<Dataset>>,
    writer: Mutex<()>,
}

impl DatasetStore {
    /// Loads the data file. A missing or unreadable file starts the store empty
    /// rather than failing, so searches keep working while an admin re-imports.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match load_colleges_data(&path) {
            Ok(data) => data,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load colleges data, starting empty");
                CollegesData::default()
            }
        };

        let dataset = Dataset::new(data.institutes);
        let stats = dataset.stats();
        info!(
            path = %path.display(),
            colleges = stats.total_colleges,
            branches = stats.total_branches,
            "loaded colleges data"
        );

        Self {
            path,
            current: RwLock::new(Arc::new(dataset)),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Result<Arc<Dataset>> {
        let guard = self
            .current
            .read()
            .map_err(|_| RankError::Internal("dataset lock poisoned".to_string()))?;
        Ok(Arc::clone(&guard))
    }

    /// Replaces the whole institute set. The new dataset is persisted before it
    /// is published; if persisting fails the previous dataset stays live.
    pub fn replace(&self, institutes: Vec<Institute>) -> Result<Arc<Dataset>> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| RankError::Internal("import lock poisoned".to_string()))?;

        let dataset = Arc::new(Dataset::new(institutes));
        debug!(records = dataset.records().len(), "built flattened records");

        if let Err(e) = save_colleges_data(&self.path, dataset.document()) {
            warn!(path = %self.path.display(), error = %e, "failed to persist colleges data, keeping previous dataset");
            return Err(e);
        }

        let mut current = self
            .current
            .write()
            .map_err(|_| RankError::Internal("dataset lock poisoned".to_string()))?;
        *current = Arc::clone(&dataset);

        let stats = dataset.stats();
        info!(
            colleges = stats.total_colleges,
            branches = stats.total_branches,
            "published new dataset"
        );
        Ok(dataset)
    }

    pub fn clear(&self) -> Result<()> {
        self.replace(Vec::new())?;
        info!("cleared all colleges data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Branch, CutoffCell};
    use std::collections::BTreeMap;

    fn institute(code: &str, college_type: &str, branches: &[&str]) -> Institute {
        Institute {
            inst_code: code.to_string(),
            name: format!("{} ENGINEERING COLLEGE", code),
            college_type: college_type.to_string(),
            branches: branches
                .iter()
                .map(|name| Branch {
                    branch_code: name.chars().take(3).collect(),
                    name: name.to_string(),
                    cutoffs: BTreeMap::from([("OC_BOYS".to_string(), CutoffCell::Rank(5000))]),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_flattening_one_row_per_branch() {
        let dataset = Dataset::new(vec![
            institute("AARM", "PVT", &["CSE", "ECE"]),
            institute("JNTH", "UNIV", &["CSE"]),
        ]);

        assert_eq!(dataset.records().len(), 3);
        assert_eq!(dataset.records()[0].inst_code, "AARM");
        assert_eq!(dataset.records()[1].branch, "ECE");
        assert_eq!(dataset.records()[2].college_type, "UNIV");

        let stats = dataset.stats();
        assert_eq!(stats.total_colleges, 2);
        assert_eq!(stats.total_branches, 3);
        assert_eq!(dataset.branch_names(), vec!["CSE", "ECE"]);
        assert_eq!(dataset.college_types(), vec!["PVT", "UNIV"]);
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path().join("colleges_data.json"));
        let snapshot = store.snapshot().unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.records().is_empty());
    }

    #[test]
    fn test_open_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colleges_data.json");
        fs::write(&path, "{ not json").unwrap();

        let store = DatasetStore::open(&path);
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_open_keeps_data_around_odd_cutoff_cells() {
        use crate::analyzer::{RankMatcher, SearchQuery};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colleges_data.json");

        for (cell, expected) in [("null", 1), ("true", 1), ("26588.0", 2), ("\"N/A\"", 1)] {
            let json = format!(
                r#"{{"institutes": [{{"inst_code": "AARM", "name": "AAR", "branches": [{{
                    "branch_code": "CSE", "name": "CSE",
                    "cutoffs": {{"OC_BOYS": 26588, "SC_GIRLS": {}}}
                }}]}}]}}"#,
                cell
            );
            fs::write(&path, json).unwrap();

            let store = DatasetStore::open(&path);
            let dataset = store.snapshot().unwrap();
            assert_eq!(dataset.records().len(), 1, "{cell}");

            let outcome = RankMatcher::new(dataset.records()).search(&SearchQuery::new(26000).unwrap());
            assert_eq!(outcome.count, expected, "{cell}");
            assert_eq!(outcome.results[0].cutoff_rank, 26588);
        }
    }

    #[test]
    fn test_replace_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colleges_data.json");

        let store = DatasetStore::open(&path);
        store
            .replace(vec![institute("AARM", "PVT", &["CSE", "ECE"])])
            .unwrap();
        assert_eq!(store.snapshot().unwrap().records().len(), 2);

        let reopened = DatasetStore::open(&path);
        assert_eq!(reopened.snapshot().unwrap().stats().total_branches, 2);
        assert!(!dir.path().join("colleges_data.json.tmp").exists());
    }

    #[test]
    fn test_old_snapshot_survives_replace() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path().join("colleges_data.json"));
        store.replace(vec![institute("AARM", "PVT", &["CSE"])]).unwrap();

        let before = store.snapshot().unwrap();
        store.clear().unwrap();

        assert_eq!(before.records().len(), 1);
        assert!(store.snapshot().unwrap().records().is_empty());
    }

    #[test]
    fn test_failed_persist_keeps_previous_dataset() {
        let dir = tempfile::tempdir().unwrap();
        // The data file path is a directory, so the rename fails.
        let path = dir.path().join("occupied");
        fs::create_dir_all(path.join("child")).unwrap();

        let store = DatasetStore::open(&path);
        let err = store
            .replace(vec![institute("AARM", "PVT", &["CSE"])])
            .unwrap_err();
        assert!(matches!(err, RankError::Io(_) | RankError::Json(_)));
        assert!(store.snapshot().unwrap().is_empty());
    }
}
