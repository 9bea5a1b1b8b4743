// ============================================================
// Layer 6 — Run Tracker
// ============================================================
// Append-only experiment store on the local filesystem.
//
// Layout:
//   <root>/
//     <experiment_id>/            ← sequential integer, from 1
//       meta.json                 ← { experiment_id, name }
//       <run_id>/
//         meta.json               ← status, start / end time
//         params/<key>            ← one value per file, written once
//         metrics/<key>           ← one line per logged value:
//                                   "<timestamp_ms> <value> <step>"
//
// Experiment names are unique: starting a run under a name that
// already exists reuses that experiment's id.
//
// Why plain files?
//   - Trivial to inspect with `cat` and `tail`
//   - Metric files only ever grow, a crashed run keeps
//     everything it logged up to the crash
//   - The run scraper reads the same layout back
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::MetricsSink;

const META_FILE: &str = "meta.json";

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentMeta {
    pub experiment_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub experiment_id: u64,
    pub status: RunStatus,
    pub start_time_ms: i64,
    pub end_time_ms: Option<i64>,
}

/// Handle on one open run.
#[derive(Debug)]
pub struct RunTracker {
    run_dir: PathBuf,
    meta: RunMeta,
}

impl RunTracker {
    /// Open (or create) the experiment `name` under `root` and start a new run in it.
    pub fn start(root: &Path, name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            bail!("experiment name must not be empty");
        }
        fs::create_dir_all(root)
            .with_context(|| format!("Cannot create tracking root '{}'", root.display()))?;

        let experiment_id = match find_experiment(root, name)? {
            Some(id) => id,
            None => create_experiment(root, name)?,
        };

        let now = Utc::now();
        let base_id = now.format("%Y%m%dT%H%M%S%3f").to_string();
        let exp_dir = root.join(experiment_id.to_string());

        // Two runs started in the same millisecond get a suffix
        let mut run_id = base_id.clone();
        let mut suffix = 1;
        while exp_dir.join(&run_id).exists() {
            run_id = format!("{base_id}-{suffix}");
            suffix += 1;
        }

        let run_dir = exp_dir.join(&run_id);
        fs::create_dir_all(run_dir.join("params"))?;
        fs::create_dir_all(run_dir.join("metrics"))?;

        let tracker = Self {
            run_dir,
            meta: RunMeta {
                run_id,
                experiment_id,
                status: RunStatus::Running,
                start_time_ms: now.timestamp_millis(),
                end_time_ms: None,
            },
        };
        tracker.write_meta()?;

        tracing::info!(
            "Tracking run '{}' in experiment {} ('{}')",
            tracker.meta.run_id,
            experiment_id,
            name
        );
        Ok(tracker)
    }

    pub fn run_id(&self) -> &str {
        &self.meta.run_id
    }

    pub fn experiment_id(&self) -> u64 {
        self.meta.experiment_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Close the run with a final status.
    pub fn finish(mut self, status: RunStatus) -> Result<RunMeta> {
        self.meta.status = status;
        self.meta.end_time_ms = Some(Utc::now().timestamp_millis());
        self.write_meta()?;
        tracing::info!("Run '{}' finished: {:?}", self.meta.run_id, status);
        Ok(self.meta)
    }

    fn write_meta(&self) -> Result<()> {
        let path = self.run_dir.join(META_FILE);
        fs::write(&path, serde_json::to_string_pretty(&self.meta)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }
}

impl MetricsSink for RunTracker {
    /// Params are immutable: re-logging the same value is a no-op,
    /// a different value is an error.
    fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        let path = self.run_dir.join("params").join(key);
        if path.exists() {
            let existing = fs::read_to_string(&path)?;
            if existing != value {
                bail!("param '{key}' already logged as '{existing}', refusing '{value}'");
            }
            return Ok(());
        }
        fs::write(&path, value).with_context(|| format!("Cannot write param '{key}'"))?;
        tracing::debug!("param {} = {}", key, value);
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64, step: usize) -> Result<()> {
        check_key(key)?;
        let path = self.run_dir.join("metrics").join(key);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open metric file '{}'", path.display()))?;
        writeln!(f, "{} {} {}", Utc::now().timestamp_millis(), value, step)?;
        tracing::debug!("metric {} = {:.6} (step {})", key, value, step);
        Ok(())
    }
}

/// Keys become file names, so they must stay inside their directory.
fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
        bail!("invalid tracking key '{key}'");
    }
    Ok(())
}

// ─── Experiment Directory ─────────────────────────────────────────────────────
fn numeric_dirs(root: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) {
            out.push((id, entry.path()));
        }
    }
    out.sort_by_key(|(id, _)| *id);
    Ok(out)
}

fn find_experiment(root: &Path, name: &str) -> Result<Option<u64>> {
    for (id, dir) in numeric_dirs(root)? {
        let Ok(json) = fs::read_to_string(dir.join(META_FILE)) else {
            continue;
        };
        match serde_json::from_str::<ExperimentMeta>(&json) {
            Ok(meta) if meta.name == name => return Ok(Some(id)),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping experiment {} with bad meta.json: {}", id, e),
        }
    }
    Ok(None)
}

fn create_experiment(root: &Path, name: &str) -> Result<u64> {
    let id = numeric_dirs(root)?.last().map_or(1, |(id, _)| id + 1);
    let dir = root.join(id.to_string());
    fs::create_dir_all(&dir)?;
    let meta = ExperimentMeta { experiment_id: id, name: name.to_string() };
    fs::write(dir.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;
    tracing::info!("Created experiment {} ('{}')", id, name);
    Ok(id)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_ids_are_sequential_and_reused() {
        let root = tempfile::tempdir().unwrap();
        let a = RunTracker::start(root.path(), "baseline").unwrap();
        let b = RunTracker::start(root.path(), "augmented").unwrap();
        let c = RunTracker::start(root.path(), "baseline").unwrap();
        assert_eq!(a.experiment_id(), 1);
        assert_eq!(b.experiment_id(), 2);
        assert_eq!(c.experiment_id(), 1);
        assert_ne!(a.run_id(), c.run_id());
    }

    #[test]
    fn test_metrics_append_lines() {
        let root = tempfile::tempdir().unwrap();
        let mut run = RunTracker::start(root.path(), "exp").unwrap();
        run.log_metric("val_output_root_accuracy", 0.25, 1).unwrap();
        run.log_metric("val_output_root_accuracy", 0.5, 2).unwrap();

        let text = fs::read_to_string(run.run_dir().join("metrics/val_output_root_accuracy")).unwrap();
        let lines: Vec<Vec<&str>> = text.lines().map(|l| l.split(' ').collect()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1][1], "0.5");
        assert_eq!(lines[1][2], "2");
    }

    #[test]
    fn test_params_are_write_once() {
        let root = tempfile::tempdir().unwrap();
        let mut run = RunTracker::start(root.path(), "exp").unwrap();
        run.log_param("batch_size", "100").unwrap();
        run.log_param("batch_size", "100").unwrap();
        assert!(run.log_param("batch_size", "32").is_err());
    }

    #[test]
    fn test_key_cannot_escape_run_dir() {
        let root = tempfile::tempdir().unwrap();
        let mut run = RunTracker::start(root.path(), "exp").unwrap();
        assert!(run.log_metric("../loss", 1.0, 0).is_err());
        assert!(run.log_param("", "x").is_err());
    }

    #[test]
    fn test_finish_records_status() {
        let root = tempfile::tempdir().unwrap();
        let run = RunTracker::start(root.path(), "exp").unwrap();
        let dir = run.run_dir().to_path_buf();
        let meta = run.finish(RunStatus::Finished).unwrap();
        assert!(meta.end_time_ms.is_some());

        let saved: RunMeta = serde_json::from_str(&fs::read_to_string(dir.join(META_FILE)).unwrap()).unwrap();
        assert_eq!(saved.status, RunStatus::Finished);
    }
}
