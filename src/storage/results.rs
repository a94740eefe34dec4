//! JSON persistence of dispatch reports.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::responses::DispatchReport;
use crate::XfaasResult;

/// Subdirectory of the results directory holding reports.
const EXPERIMENTS_DIR: &str = "experiments";

/// Metadata written next to each report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMetadata {
    pub task_kind: String,
    pub task_id: String,
    pub saved_at: DateTime<Utc>,
    pub filename: String,
}

/// A report as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    pub metadata: StoredMetadata,
    pub report: DispatchReport,
}

/// Overview of the stored reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    /// Number of stored reports.
    pub total: usize,

    /// Reports per task kind.
    pub by_kind: BTreeMap<String, usize>,

    /// Most recent filename per task kind.
    pub latest: BTreeMap<String, String>,
}

/// Directory-backed store of dispatch reports.
///
/// Reports live in `<dir>/experiments/<kind>_<YYYYMMDD_HHMMSS>_<id prefix>.json`.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root results directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding the report files.
    pub fn experiments_dir(&self) -> PathBuf {
        self.dir.join(EXPERIMENTS_DIR)
    }

    /// Saves a report and returns the path written.
    ///
    /// Never overwrites an existing file: a name already taken gets a
    /// numeric suffix (`_2`, `_3`, ...).
    pub fn save(&self, report: &DispatchReport) -> XfaasResult<PathBuf> {
        let dir = self.experiments_dir();
        std::fs::create_dir_all(&dir)?;

        let (filename, mut file) = Self::create_unique(&dir, &Self::file_stem_for(report))?;
        let path = dir.join(&filename);

        let stored = StoredReport {
            metadata: StoredMetadata {
                task_kind: report.task_kind.clone(),
                task_id: report.task_id.clone(),
                saved_at: Utc::now(),
                filename,
            },
            report: report.clone(),
        };

        let json = serde_json::to_string_pretty(&stored)?;
        file.write_all(json.as_bytes())?;

        tracing::info!(
            path = %path.display(),
            task_id = %report.task_id,
            "Report saved"
        );

        Ok(path)
    }

    /// Reads one stored report.
    pub fn load(&self, path: &Path) -> XfaasResult<StoredReport> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Most recent report of a task kind.
    pub fn load_latest(&self, kind: &str) -> XfaasResult<Option<StoredReport>> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|stored| stored.metadata.task_kind == kind))
    }

    /// Stored reports, newest first.
    pub fn list(&self, limit: Option<usize>) -> XfaasResult<Vec<StoredReport>> {
        let mut all = self.load_all()?;
        if let Some(limit) = limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    /// Counts per kind and latest file per kind.
    pub fn summary(&self) -> XfaasResult<StoreSummary> {
        let mut summary = StoreSummary::default();

        for stored in self.load_all()? {
            summary.total += 1;
            let kind = stored.metadata.task_kind;
            *summary.by_kind.entry(kind.clone()).or_insert(0) += 1;
            // Newest first, so the first file seen per kind is the latest.
            summary.latest.entry(kind).or_insert(stored.metadata.filename);
        }

        Ok(summary)
    }

    /// All readable reports, newest first.
    ///
    /// Files that do not parse as stored reports are skipped.
    fn load_all(&self) -> XfaasResult<Vec<StoredReport>> {
        let dir = self.experiments_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match self.load(&path) {
                Ok(stored) => reports.push(stored),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable report");
                }
            }
        }

        reports.sort_by(|a, b| {
            b.metadata
                .saved_at
                .cmp(&a.metadata.saved_at)
                .then_with(|| b.metadata.filename.cmp(&a.metadata.filename))
        });

        Ok(reports)
    }

    fn file_stem_for(report: &DispatchReport) -> String {
        format!(
            "{}_{}_{}",
            sanitize(&report.task_kind),
            report.completed_at.format("%Y%m%d_%H%M%S"),
            sanitize(&report.task_id)
        )
    }

    /// Creates `<stem>.json`, or the first free `<stem>_<n>.json`.
    fn create_unique(dir: &Path, stem: &str) -> XfaasResult<(String, File)> {
        let mut attempt = 1u32;
        loop {
            let filename = if attempt == 1 {
                format!("{}.json", stem)
            } else {
                format!("{}_{}.json", stem, attempt)
            };

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dir.join(&filename))
            {
                Ok(file) => return Ok((filename, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Keeps filename-safe characters only.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{ConsensusEvaluator, ResultAggregator};
    use crate::types::requests::Task;
    use crate::types::responses::{Outcome, ProviderOutcome};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn report(kind: &str, id: &str) -> DispatchReport {
        let outcomes = vec![ProviderOutcome::new(
            "aws",
            Outcome::success(json!({"00": 500, "11": 524}), Duration::from_millis(40)),
        )];
        let verdict = ConsensusEvaluator::evaluate(&outcomes);
        ResultAggregator::aggregate(&Task::new(kind, 1024).with_id(id), outcomes, verdict)
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path());
        let original = report("bell_state", "0123456789abcdef");

        let path = store.save(&original).unwrap();
        assert!(path.starts_with(tmp.path().join("experiments")));

        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.starts_with("bell_state_"));
        assert!(filename.ends_with("_0123456789abcdef.json"));

        let stored = store.load(&path).unwrap();
        assert_eq!(stored.report, original);
        assert_eq!(stored.metadata.task_kind, "bell_state");
        assert_eq!(stored.metadata.filename, filename);
    }

    #[test]
    fn test_ids_sharing_a_prefix_are_kept_apart() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path());

        let first = report("bell_state", "experiment-1");
        let mut second = report("bell_state", "experiment-2");
        second.completed_at = first.completed_at;

        let a = store.save(&first).unwrap();
        let b = store.save(&second).unwrap();
        assert_ne!(a, b);

        let mut ids: Vec<String> = store
            .list(None)
            .unwrap()
            .into_iter()
            .map(|stored| stored.metadata.task_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["experiment-1", "experiment-2"]);
    }

    #[test]
    fn test_saving_twice_keeps_both_files() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path());
        let original = report("bell_state", "same");

        let a = store.save(&original).unwrap();
        let b = store.save(&original).unwrap();

        assert_ne!(a, b);
        assert!(b.to_str().unwrap().ends_with("_same_2.json"));
        assert_eq!(store.list(None).unwrap().len(), 2);
        assert_eq!(store.load(&a).unwrap().report, original);
    }

    #[test]
    fn test_stored_json_layout() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path());
        let path = store.save(&report("bell_state", "abc")).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["taskKind"], "bell_state");
        assert_eq!(value["metadata"]["taskId"], "abc");
        assert!(value["metadata"]["savedAt"].is_string());
        assert_eq!(value["report"]["taskId"], "abc");
    }

    #[test]
    fn test_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path().join("missing"));

        assert!(store.list(None).unwrap().is_empty());
        assert!(store.load_latest("bell_state").unwrap().is_none());
        assert_eq!(store.summary().unwrap().total, 0);
    }

    #[test]
    fn test_list_and_summary() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path());

        store.save(&report("bell_state", "first")).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        store.save(&report("ghz", "second")).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        store.save(&report("bell_state", "third")).unwrap();

        let listed = store.list(None).unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].metadata.task_id, "third");
        assert_eq!(store.list(Some(1)).unwrap().len(), 1);

        let latest = store.load_latest("bell_state").unwrap().unwrap();
        assert_eq!(latest.metadata.task_id, "third");

        let summary = store.summary().unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_kind["bell_state"], 2);
        assert_eq!(summary.by_kind["ghz"], 1);
        assert_eq!(summary.latest["bell_state"], latest.metadata.filename);
    }

    #[test]
    fn test_unreadable_files_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path());
        store.save(&report("bell_state", "ok")).unwrap();
        std::fs::write(store.experiments_dir().join("junk.json"), "not json").unwrap();

        assert_eq!(store.list(None).unwrap().len(), 1);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("bell state/1"), "bell-state-1");
        assert_eq!(sanitize("ghz_3-q"), "ghz_3-q");
    }
}
