// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Flat JSON file store for classification state
//!
//! Three files live under the data directory:
//!
//! - `directories.json`: object mapping outfit directory name to its classified flag
//! - `pending.json`: array of outfit names checked out but not yet marked done
//! - `results.json`: array of submission records
//!
//! Every operation reads the whole file, mutates it in memory and writes it
//! back through a temporary file in the same directory, so readers never see
//! a half-written file. A JSON `null` is read as the empty collection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{ClassifierError, Result};

pub const DIRECTORIES_FILE: &str = "directories.json";
pub const PENDING_FILE: &str = "pending.json";
pub const RESULTS_FILE: &str = "results.json";

/// Outfit name -> classified flag, iterated in name order
pub type DirectoryRegistry = BTreeMap<String, bool>;

/// Outfit names currently checked out, in checkout order
pub type PendingList = Vec<String>;

/// A single classification as stored in `results.json`
///
/// Absent or `null` collections are stored as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub outfit: String,
    pub types: Option<HashMap<String, String>>,
    pub tags: Option<HashMap<String, Vec<String>>>,
    #[serde(rename = "weatherConfig")]
    pub weather_config: Option<Vec<String>>,
}

/// Classification progress counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub classified: usize,
    pub total: usize,
    pub pending: usize,
}

/// Handle to the data directory (thread-safe wrapper)
///
/// Clones share one lock, so read-modify-write cycles issued through the
/// same store never interleave. Other processes writing the files are not
/// coordinated with.
#[derive(Clone)]
pub struct DataStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DataStore {
    /// Open a store over an existing data directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Data directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn directories_path(&self) -> PathBuf {
        self.dir.join(DIRECTORIES_FILE)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.dir.join(PENDING_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE)
    }

    /// The guarded value is `()`, so a poisoned lock carries no broken state
    fn lock_files(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // === Whole-file access ===

    pub fn read_directories(&self) -> Result<DirectoryRegistry> {
        read_json(&self.directories_path())
    }

    pub fn write_directories(&self, directories: &DirectoryRegistry) -> Result<()> {
        write_json(&self.directories_path(), directories)
    }

    pub fn read_pending(&self) -> Result<PendingList> {
        read_json(&self.pending_path())
    }

    pub fn write_pending(&self, pending: &PendingList) -> Result<()> {
        write_json(&self.pending_path(), pending)
    }

    /// Results are kept as raw JSON so entries of any shape survive a rewrite
    pub fn read_results(&self) -> Result<Vec<serde_json::Value>> {
        read_json(&self.results_path())
    }

    pub fn write_results(&self, results: &[serde_json::Value]) -> Result<()> {
        write_json(&self.results_path(), &results)
    }

    // === Operations ===

    /// Check out the next unclassified, non-pending outfit
    ///
    /// Returns an empty string when nothing is left. The pending list is
    /// rewritten either way.
    pub fn next_outfit(&self) -> Result<String> {
        let _guard = self.lock_files();

        let directories = self.read_directories()?;
        let mut pending = self.read_pending()?;

        let next = directories
            .iter()
            .find(|(name, classified)| !**classified && !pending.contains(*name))
            .map(|(name, _)| name.clone())
            .unwrap_or_default();

        if !next.is_empty() {
            pending.push(next.clone());
        }

        self.write_pending(&pending)?;

        let classified = directories.values().filter(|c| **c).count();
        tracing::info!("Classified {} out of {} outfits", classified, directories.len());

        Ok(next)
    }

    /// Append a submission to the results list, returning the new length
    pub fn record_submission(&self, record: &SubmissionRecord) -> Result<usize> {
        let _guard = self.lock_files();

        let mut results = self.read_results()?;
        results.push(serde_json::to_value(record)?);
        self.write_results(&results)?;

        tracing::debug!("Recorded submission for {:?} ({} results)", record.outfit, results.len());
        Ok(results.len())
    }

    /// Flag an outfit as classified and drop it from the pending list
    ///
    /// The registry and the pending list are persisted one after the other;
    /// a failure in between leaves the pending list stale.
    pub fn mark_done(&self, outfit: &str) -> Result<()> {
        let _guard = self.lock_files();

        let mut directories = self.read_directories()?;
        if !directories.contains_key(outfit) {
            tracing::warn!("Marking unknown outfit {:?} as classified", outfit);
        }
        directories.insert(outfit.to_string(), true);
        self.write_directories(&directories)?;

        let mut pending = self.read_pending()?;
        pending.retain(|name| name != outfit);
        self.write_pending(&pending)?;

        Ok(())
    }

    /// Count classified, total and pending outfits
    pub fn progress(&self) -> Result<Progress> {
        let _guard = self.lock_files();

        let directories = self.read_directories()?;
        let pending = self.read_pending()?;

        Ok(Progress {
            classified: directories.values().filter(|c| **c).count(),
            total: directories.len(),
            pending: pending.len(),
        })
    }

    /// Replace the registry keys with `names`, keeping known flags
    pub fn sync_directories(&self, names: &[String], dry_run: bool) -> Result<SyncReport> {
        let _guard = self.lock_files();

        let existing = self.read_directories()?;
        let synced: DirectoryRegistry = names
            .iter()
            .map(|name| (name.clone(), existing.get(name).copied().unwrap_or(false)))
            .collect();

        let report = SyncReport {
            added: synced.keys().filter(|k| !existing.contains_key(*k)).cloned().collect(),
            removed: existing.keys().filter(|k| !synced.contains_key(*k)).cloned().collect(),
            total: synced.len(),
        };

        if !dry_run {
            self.write_directories(&synced)?;
        }

        Ok(report)
    }

    /// Create the data directory and any missing state files
    ///
    /// With `force`, existing files are reset to empty collections.
    pub fn initialize(&self, force: bool) -> Result<Vec<PathBuf>> {
        let _guard = self.lock_files();

        std::fs::create_dir_all(&self.dir)?;

        let mut created = Vec::new();
        if force || !self.directories_path().exists() {
            self.write_directories(&DirectoryRegistry::new())?;
            created.push(self.directories_path());
        }
        if force || !self.pending_path().exists() {
            self.write_pending(&PendingList::new())?;
            created.push(self.pending_path());
        }
        if force || !self.results_path().exists() {
            self.write_results(&[])?;
            created.push(self.results_path());
        }

        Ok(created)
    }
}

/// Outcome of a registry sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub total: usize,
}

pub(crate) fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let content = std::fs::read(path).map_err(|e| ClassifierError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let value: Option<T> = serde_json::from_slice(&content).map_err(|e| ClassifierError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(value.unwrap_or_default())
}

/// Replace `path` with the pretty-printed value via a sibling temp file
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)?;
    let write_error = |e: std::io::Error| ClassifierError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(&content).map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(write_error)?;
    }

    file.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded(directories: serde_json::Value, pending: serde_json::Value) -> (TempDir, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DIRECTORIES_FILE), directories.to_string()).unwrap();
        std::fs::write(dir.path().join(PENDING_FILE), pending.to_string()).unwrap();
        std::fs::write(dir.path().join(RESULTS_FILE), "[]").unwrap();
        let store = DataStore::new(dir.path());
        (dir, store)
    }

    fn sample_record(outfit: &str) -> SubmissionRecord {
        SubmissionRecord {
            outfit: outfit.to_string(),
            types: Some(HashMap::from([("top.jpg".to_string(), "shirt".to_string())])),
            tags: Some(HashMap::from([(
                "top.jpg".to_string(),
                vec!["casual".to_string(), "cotton".to_string()],
            )])),
            weather_config: Some(vec!["sunny | warm".to_string()]),
        }
    }

    #[test]
    fn test_next_outfit_picks_unclassified() {
        let (_dir, store) = seeded(json!({"A": false, "B": true}), json!([]));

        assert_eq!(store.next_outfit().unwrap(), "A");
        assert_eq!(store.read_pending().unwrap(), vec!["A".to_string()]);
        assert_eq!(store.read_directories().unwrap().get("A"), Some(&false));
    }

    #[test]
    fn test_next_outfit_skips_pending() {
        let (_dir, store) = seeded(json!({"A": false, "B": false, "C": true}), json!(["A"]));

        assert_eq!(store.next_outfit().unwrap(), "B");
        assert_eq!(store.read_pending().unwrap(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_next_outfit_exhausted() {
        let (_dir, store) = seeded(json!({"A": true, "B": false}), json!(["B"]));

        assert_eq!(store.next_outfit().unwrap(), "");
        assert_eq!(store.read_pending().unwrap(), vec!["B".to_string()]);
    }

    #[test]
    fn test_next_outfit_never_repeats() {
        let (_dir, store) = seeded(json!({"A": false, "B": false, "C": false}), json!([]));

        let mut picked = vec![
            store.next_outfit().unwrap(),
            store.next_outfit().unwrap(),
            store.next_outfit().unwrap(),
        ];
        assert_eq!(store.next_outfit().unwrap(), "");

        picked.sort();
        assert_eq!(picked, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_null_files_read_as_empty() {
        let (_dir, store) = seeded(json!({"A": false}), serde_json::Value::Null);
        std::fs::write(store.results_path(), "null").unwrap();

        assert!(store.read_pending().unwrap().is_empty());
        assert!(store.read_results().unwrap().is_empty());
        assert_eq!(store.next_outfit().unwrap(), "A");

        let raw = std::fs::read_to_string(store.pending_path()).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&raw).unwrap(), json!(["A"]));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path());

        assert!(matches!(store.next_outfit(), Err(ClassifierError::Read { .. })));
    }

    #[test]
    fn test_malformed_file_is_read_error() {
        let (_dir, store) = seeded(json!({"A": false}), json!([]));
        std::fs::write(store.directories_path(), "{\"A\": ").unwrap();

        assert!(matches!(store.next_outfit(), Err(ClassifierError::Read { .. })));
    }

    #[test]
    fn test_record_submission_appends_verbatim() {
        let (_dir, store) = seeded(json!({"A": false}), json!([]));
        std::fs::write(store.results_path(), r#"[{"legacy": true}]"#).unwrap();

        let record = sample_record("A");
        assert_eq!(store.record_submission(&record).unwrap(), 2);

        let results = store.read_results().unwrap();
        assert_eq!(results[0], json!({"legacy": true}));
        let stored: SubmissionRecord = serde_json::from_value(results[1].clone()).unwrap();
        assert_eq!(stored, record);
        assert_eq!(results[1]["weatherConfig"], json!(["sunny | warm"]));
    }

    #[test]
    fn test_record_submission_does_not_validate_outfit() {
        let (_dir, store) = seeded(json!({}), json!([]));

        store.record_submission(&sample_record("unknown")).unwrap();
        store.record_submission(&sample_record("unknown")).unwrap();
        assert_eq!(store.read_results().unwrap().len(), 2);
    }

    #[test]
    fn test_mark_done() {
        let (_dir, store) = seeded(json!({"A": false, "B": false}), json!(["A", "B"]));

        store.mark_done("A").unwrap();

        let directories = store.read_directories().unwrap();
        assert_eq!(directories.get("A"), Some(&true));
        assert_eq!(directories.get("B"), Some(&false));
        assert_eq!(store.read_pending().unwrap(), vec!["B".to_string()]);
    }

    #[test]
    fn test_mark_done_twice() {
        let (_dir, store) = seeded(json!({"A": false, "B": false}), json!(["A", "B"]));

        store.mark_done("A").unwrap();
        store.mark_done("A").unwrap();

        assert_eq!(store.read_directories().unwrap().get("A"), Some(&true));
        assert_eq!(store.read_pending().unwrap(), vec!["B".to_string()]);
    }

    #[test]
    fn test_mark_done_inserts_unknown() {
        let (_dir, store) = seeded(json!({"A": false}), json!([]));

        store.mark_done("Z").unwrap();
        assert_eq!(store.read_directories().unwrap().get("Z"), Some(&true));
    }

    #[test]
    fn test_mark_done_last_pending_writes_empty_array() {
        let (_dir, store) = seeded(json!({"A": false}), json!(["A"]));

        store.mark_done("A").unwrap();
        let raw = std::fs::read_to_string(store.pending_path()).unwrap();
        assert_eq!(raw.trim(), "[]");
    }

    #[test]
    fn test_progress() {
        let (_dir, store) = seeded(json!({"A": true, "B": false, "C": false}), json!(["B"]));

        assert_eq!(
            store.progress().unwrap(),
            Progress { classified: 1, total: 3, pending: 1 }
        );
    }

    #[test]
    fn test_sync_directories() {
        let (_dir, store) = seeded(json!({"A": true, "B": false, "gone": true}), json!([]));

        let names = vec!["A".to_string(), "B".to_string(), "new".to_string()];
        let report = store.sync_directories(&names, false).unwrap();

        assert_eq!(report.added, vec!["new".to_string()]);
        assert_eq!(report.removed, vec!["gone".to_string()]);
        assert_eq!(report.total, 3);

        let directories = store.read_directories().unwrap();
        assert_eq!(directories.get("A"), Some(&true));
        assert_eq!(directories.get("new"), Some(&false));
        assert!(!directories.contains_key("gone"));
    }

    #[test]
    fn test_sync_dry_run_leaves_file() {
        let (_dir, store) = seeded(json!({"A": true}), json!([]));

        let report = store.sync_directories(&["B".to_string()], true).unwrap();
        assert_eq!(report.added, vec!["B".to_string()]);
        assert!(store.read_directories().unwrap().contains_key("A"));
    }

    #[test]
    fn test_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path().join("data"));

        assert_eq!(store.initialize(false).unwrap().len(), 3);
        assert!(store.read_directories().unwrap().is_empty());

        store.mark_done("A").unwrap();
        assert!(store.initialize(false).unwrap().is_empty());
        assert_eq!(store.read_directories().unwrap().len(), 1);

        assert_eq!(store.initialize(true).unwrap().len(), 3);
        assert!(store.read_directories().unwrap().is_empty());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_next_outfit_logs_progress() {
        let (_dir, store) = seeded(json!({"A": false, "B": true}), json!([]));

        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let picked = tracing::subscriber::with_default(subscriber, || store.next_outfit().unwrap());
        assert_eq!(picked, "A");

        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("Classified 1 out of 2 outfits"), "logs: {}", logs);
    }

    #[test]
    fn test_record_submission_keeps_null_collections() {
        let (_dir, store) = seeded(json!({}), json!([]));

        let record = SubmissionRecord {
            outfit: "A".to_string(),
            types: None,
            tags: None,
            weather_config: None,
        };
        store.record_submission(&record).unwrap();

        assert_eq!(
            store.read_results().unwrap(),
            vec![json!({"outfit": "A", "types": null, "tags": null, "weatherConfig": null})]
        );
    }

    #[test]
    fn test_poisoned_lock_recovers() {
        let (_dir, store) = seeded(json!({"A": false}), json!([]));

        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.lock_files();
            panic!("worker died while holding the store lock");
        })
        .join();

        assert!(store.lock.is_poisoned());
        assert_eq!(store.next_outfit().unwrap(), "A");
    }

    #[test]
    fn test_writes_replace_file_without_leftovers() {
        let (dir, store) = seeded(json!({"A": false}), json!([]));

        store.next_outfit().unwrap();
        store.record_submission(&sample_record("A")).unwrap();
        store.mark_done("A").unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec![DIRECTORIES_FILE, PENDING_FILE, RESULTS_FILE]);
        assert_eq!(store.read_pending().unwrap(), Vec::<String>::new());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_swaps_in_new_inode() {
        use std::os::unix::fs::MetadataExt;
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = seeded(json!({"A": false}), json!([]));
        let before = std::fs::metadata(store.pending_path()).unwrap().ino();

        store.next_outfit().unwrap();

        let metadata = std::fs::metadata(store.pending_path()).unwrap();
        assert_ne!(metadata.ino(), before);
        assert_eq!(metadata.permissions().mode() & 0o777, 0o644);
    }
}
