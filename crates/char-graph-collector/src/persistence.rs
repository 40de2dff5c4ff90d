//! Snapshot files: schema, naming and lookup.
//!
//! ## File Structure
//!
//! ```text
//! out/
//! ├── checkpoint-20250101-120000-<fingerprint>.json   # written during a run
//! ├── checkpoint-20250101-120130-<fingerprint>.json
//! └── run-20250101-120300-<fingerprint>.json          # written when a run completes
//! ```
//!
//! The fingerprint suffix is the resumption key. The embedded timestamp,
//! compared as a string, decides which snapshot is the latest.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use char_graph_core::{DepthStatistic, GraphData, RunRecord, Totals, TrieAggregator};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{CollectorError, CollectorResult};
use crate::fingerprint::Fingerprint;

/// Output directory used when none is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "out";

/// Timestamp layout embedded in snapshot names and `meta.run_id`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

// =============================================================================
// Snapshot Schema
// =============================================================================

/// Provenance of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// `YYYYMMDD-HHMMSS` of the write.
    pub run_id: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub library: BTreeMap<String, String>,
    #[serde(default)]
    pub host: BTreeMap<String, String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SnapshotMeta {
    /// Metadata for a snapshot written at `now`.
    pub fn at(now: DateTime<Local>, kind: SnapshotKind) -> Self {
        let library = BTreeMap::from([(
            env!("CARGO_PKG_NAME").to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        )]);
        let host = BTreeMap::from([
            ("os".to_string(), std::env::consts::OS.to_string()),
            ("arch".to_string(), std::env::consts::ARCH.to_string()),
        ]);

        Self {
            run_id: now.format(TIMESTAMP_FORMAT).to_string(),
            created_at: Some(now.naive_local()),
            library,
            host,
            notes: match kind {
                SnapshotKind::Checkpoint => Some("Checkpoint".to_string()),
                SnapshotKind::Run => None,
            },
        }
    }
}

/// Parameters sent with every sampling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    pub max_output_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub store: bool,
}

/// Text normalization settings; recorded for downstream consumers only.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: BTreeMap<String, bool>,
}

/// Configuration of the collection that produced a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub model: String,
    pub prompt: String,
    /// Target number of samples.
    pub n: usize,
    pub concurrency: usize,
    pub request: RequestConfig,
    #[serde(default)]
    pub normalization: NormalizationConfig,
}

/// Aggregate statistics section.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsData {
    pub totals: Totals,
    #[serde(default)]
    pub depth_stats: Vec<DepthStatistic>,
    #[serde(default)]
    pub deviations: Option<Value>,
}

/// A persisted run or checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub config: SnapshotConfig,
    #[serde(default)]
    pub runs: Vec<RunRecord>,
    pub graph: GraphData,
    pub stats: StatsData,
}

impl Snapshot {
    /// Assemble a snapshot from the records collected so far and the
    /// aggregator fed with them. Record ids are renumbered `0..len`.
    pub fn assemble(
        meta: SnapshotMeta,
        config: SnapshotConfig,
        records: impl IntoIterator<Item = RunRecord>,
        aggregator: &TrieAggregator,
    ) -> Self {
        let runs: Vec<RunRecord> = records
            .into_iter()
            .enumerate()
            .map(|(id, record)| RunRecord { id, ..record })
            .collect();
        let totals = Totals::from_records(&runs);

        Self {
            meta,
            config,
            graph: aggregator.graph_data(),
            stats: StatsData {
                totals,
                depth_stats: aggregator.depth_statistics(),
                deviations: None,
            },
            runs,
        }
    }

    /// Records whose status is `ok`.
    pub fn ok_runs(&self) -> impl Iterator<Item = &RunRecord> {
        self.runs.iter().filter(|r| r.is_ok())
    }
}

// =============================================================================
// Snapshot Names
// =============================================================================

/// Whether a snapshot was written mid-run or at completion.
///
/// Ordered so that a completed run wins over a checkpoint with the same
/// timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SnapshotKind {
    Checkpoint,
    Run,
}

impl SnapshotKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            SnapshotKind::Checkpoint => "checkpoint",
            SnapshotKind::Run => "run",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "checkpoint" => Some(SnapshotKind::Checkpoint),
            "run" => Some(SnapshotKind::Run),
            _ => None,
        }
    }
}

/// Parsed `{run|checkpoint}-{YYYYMMDD}-{HHMMSS}-{fingerprint}.json` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    pub kind: SnapshotKind,
    /// `YYYYMMDD-HHMMSS`; zero padded, so string order is time order.
    pub timestamp: String,
    pub fingerprint: Fingerprint,
}

impl SnapshotName {
    pub fn new(kind: SnapshotKind, timestamp: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            kind,
            timestamp: timestamp.into(),
            fingerprint,
        }
    }

    /// Parse a file name; anything not following the convention yields `None`.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".json")?;
        let mut parts = stem.splitn(4, '-');
        let kind = SnapshotKind::from_prefix(parts.next()?)?;
        let date = parts.next()?;
        let time = parts.next()?;
        let fingerprint = parts.next()?;

        let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(date, 8) || !digits(time, 6) || fingerprint.is_empty() {
            return None;
        }

        Some(Self {
            kind,
            timestamp: format!("{date}-{time}"),
            fingerprint: Fingerprint::from_hex(fingerprint),
        })
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.json",
            self.kind.prefix(),
            self.timestamp,
            self.fingerprint
        )
    }
}

// =============================================================================
// Run Store
// =============================================================================

/// Reads and writes snapshots in one output directory.
#[derive(Debug, Clone)]
pub struct RunStore {
    /// Directory scanned for resumable snapshots.
    output_dir: PathBuf,

    /// Explicit destination overriding the naming convention.
    output_path: Option<PathBuf>,
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl RunStore {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            output_path: None,
        }
    }

    /// Write every snapshot (checkpoints included) to this exact path.
    pub fn with_output_path(mut self, path: Option<PathBuf>) -> Self {
        self.output_path = path;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Most recent run or checkpoint snapshot carrying `fingerprint`.
    pub fn find_latest(&self, fingerprint: &Fingerprint) -> CollectorResult<Option<PathBuf>> {
        if !self.output_dir.exists() {
            return Ok(None);
        }

        let latest = fs::read_dir(&self.output_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let name = SnapshotName::parse(file_name.to_str()?)?;
                (&name.fingerprint == fingerprint).then(|| (name, entry.path()))
            })
            .max_by(|(a, _), (b, _)| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.kind.cmp(&b.kind))
            })
            .map(|(_, path)| path);

        debug!(
            dir = %self.output_dir.display(),
            fingerprint = %fingerprint,
            found = latest.is_some(),
            "snapshot_lookup"
        );

        Ok(latest)
    }

    /// Read and validate a snapshot.
    pub fn load(&self, path: &Path) -> CollectorResult<Snapshot> {
        let snapshot = read_snapshot(path)?;

        info!(
            path = %path.display(),
            runs = snapshot.runs.len(),
            "Loaded snapshot"
        );

        Ok(snapshot)
    }

    /// Where a snapshot of `kind` written at `timestamp` goes.
    pub fn snapshot_path(
        &self,
        kind: SnapshotKind,
        timestamp: &str,
        fingerprint: &Fingerprint,
    ) -> PathBuf {
        match &self.output_path {
            Some(path) => path.clone(),
            None => self.output_dir.join(
                SnapshotName::new(kind, timestamp, fingerprint.clone()).file_name(),
            ),
        }
    }

    /// Write a snapshot, creating parent directories as needed.
    pub fn save(
        &self,
        snapshot: &Snapshot,
        kind: SnapshotKind,
        fingerprint: &Fingerprint,
    ) -> CollectorResult<PathBuf> {
        let path = self.snapshot_path(kind, &snapshot.meta.run_id, fingerprint);
        write_snapshot(snapshot, &path)?;

        info!(
            path = %path.display(),
            kind = kind.prefix(),
            runs = snapshot.runs.len(),
            "Saved snapshot"
        );

        Ok(path)
    }
}

/// Deserialize a snapshot from `path`; schema mismatches become
/// [`CollectorError::InvalidSnapshot`].
pub fn read_snapshot(path: &Path) -> CollectorResult<Snapshot> {
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| CollectorError::InvalidSnapshot {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize `snapshot` as pretty JSON to `path`.
pub fn write_snapshot(snapshot: &Snapshot, path: &Path) -> CollectorResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use char_graph_core::ErrorInfo;
    use tempfile::TempDir;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::from_hex(s)
    }

    fn config() -> SnapshotConfig {
        SnapshotConfig {
            model: "m".into(),
            prompt: "p".into(),
            n: 3,
            concurrency: 1,
            request: RequestConfig {
                max_output_tokens: 10,
                temperature: Some(1.0),
                top_p: None,
                seed: None,
                store: false,
            },
            normalization: NormalizationConfig::default(),
        }
    }

    fn snapshot(run_id: &str) -> Snapshot {
        let records = vec![
            RunRecord::ok(5, "ab", None, None),
            RunRecord::failed(9, ErrorInfo::new("transport", "x")),
        ];
        let mut aggregator = TrieAggregator::new();
        aggregator.load_from_runs(&records);
        let meta = SnapshotMeta {
            run_id: run_id.to_string(),
            ..SnapshotMeta::at(Local::now(), SnapshotKind::Run)
        };
        Snapshot::assemble(meta, config(), records, &aggregator)
    }

    #[test]
    fn test_name_round_trip() {
        let name = SnapshotName::parse("checkpoint-20250101-093000-abc123.json").unwrap();
        assert_eq!(name.kind, SnapshotKind::Checkpoint);
        assert_eq!(name.timestamp, "20250101-093000");
        assert_eq!(name.fingerprint, fp("abc123"));
        assert_eq!(name.file_name(), "checkpoint-20250101-093000-abc123.json");
    }

    #[test]
    fn test_name_rejects_foreign_files() {
        for name in [
            "notes.json",
            "run-2025-093000-abc.json",
            "run-20250101-093000-abc.txt",
            "backup-20250101-093000-abc.json",
            "run-20250101-093000-.json",
        ] {
            assert!(SnapshotName::parse(name).is_none(), "{name}");
        }
    }

    #[test]
    fn test_assemble_renumbers_and_counts() {
        let snap = snapshot("20250101-000000");
        let ids: Vec<usize> = snap.runs.iter().map(|r| r.id).collect();

        assert_eq!(ids, vec![0, 1]);
        assert_eq!(snap.stats.totals.ok, 1);
        assert_eq!(snap.stats.totals.error, 1);
        assert_eq!(snap.stats.totals.total_chars, 2);
        assert_eq!(snap.graph.edge_count(), 2);
        assert_eq!(snap.ok_runs().count(), 1);
    }

    #[test]
    fn test_find_latest_uses_embedded_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::new(dir.path());
        for name in [
            "run-20250101-090000-aaa.json",
            "checkpoint-20250102-080000-aaa.json",
            "run-20250301-000000-bbb.json",
            "unrelated.json",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }

        let latest = store.find_latest(&fp("aaa")).unwrap().unwrap();
        assert_eq!(
            latest.file_name().unwrap(),
            "checkpoint-20250102-080000-aaa.json"
        );
        assert!(store.find_latest(&fp("ccc")).unwrap().is_none());
    }

    #[test]
    fn test_find_latest_prefers_run_on_tie() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::new(dir.path());
        fs::write(dir.path().join("checkpoint-20250101-090000-aaa.json"), "{}").unwrap();
        fs::write(dir.path().join("run-20250101-090000-aaa.json"), "{}").unwrap();

        let latest = store.find_latest(&fp("aaa")).unwrap().unwrap();
        assert_eq!(latest.file_name().unwrap(), "run-20250101-090000-aaa.json");
    }

    #[test]
    fn test_find_latest_missing_dir() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::new(dir.path().join("nope"));
        assert!(store.find_latest(&fp("aaa")).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::new(dir.path().join("out"));
        let snap = snapshot("20250101-120000");

        let path = store.save(&snap, SnapshotKind::Run, &fp("abc")).unwrap();
        assert_eq!(path.file_name().unwrap(), "run-20250101-120000-abc.json");

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded, snap);
    }

    #[test]
    fn test_explicit_output_path_wins() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("custom/result.json");
        let store = RunStore::new(dir.path()).with_output_path(Some(target.clone()));

        let path = store
            .save(&snapshot("20250101-120000"), SnapshotKind::Checkpoint, &fp("abc"))
            .unwrap();
        assert_eq!(path, target);
        assert!(target.exists());
    }

    #[test]
    fn test_load_rejects_malformed_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run-20250101-120000-abc.json");
        fs::write(&path, r#"{"meta": {"run_id": "x"}}"#).unwrap();

        let err = RunStore::new(dir.path()).load(&path).unwrap_err();
        assert!(matches!(err, CollectorError::InvalidSnapshot { .. }));
    }
}
