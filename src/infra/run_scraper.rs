// ============================================================
// Layer 6 — Run Scraper
// ============================================================
// Collects the final accuracy of every tracked run.
//
// Walks a tracking root passed in as an explicit path (the
// process working directory is never touched), finds every
// `<experiment_id>/<run_id>/metrics` directory, and reads the
// last line of each metric file whose name ends in "accuracy".
//
// Output: experiment id → { metric name → final value }
//
// Directories are visited in sorted order. When an experiment
// has several runs, a later run's value overwrites an earlier
// one for the same metric.

use anyhow::{Context, Result};
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};
use walkdir::WalkDir;

/// Final accuracies per experiment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub experiments: BTreeMap<u64, BTreeMap<String, f64>>,
}

impl RunSummary {
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Union of metric names over all experiments, sorted.
    pub fn metric_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.experiments.values().flat_map(|m| m.keys()).collect();
        names.into_iter().cloned().collect()
    }

    /// One row per experiment, one column per metric; empty cell if absent.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let columns = self.metric_names();
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = vec!["experiment_number".to_string()];
        header.extend(columns.iter().cloned());
        csv.write_record(&header)?;

        for (id, metrics) in &self.experiments {
            let mut row = vec![id.to_string()];
            row.extend(
                columns
                    .iter()
                    .map(|c| metrics.get(c).map(|v| v.to_string()).unwrap_or_default()),
            );
            csv.write_record(&row)?;
        }
        csv.flush()?;
        Ok(())
    }
}

/// Scrape every run under `root`.
pub fn scrape_runs(root: &Path) -> Result<RunSummary> {
    let metrics_dir = Regex::new(r"^([0-9]+)/[^/]+/metrics$")?;
    let mut summary = RunSummary::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Cannot walk '{}'", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        let Some(caps) = metrics_dir.captures(&relative) else {
            continue;
        };
        let experiment: u64 = caps[1].parse()?;

        let mut files: Vec<_> = fs::read_dir(entry.path())?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .collect();
        files.sort_by_key(|e| e.file_name());

        for file in files {
            let name = file.file_name().to_string_lossy().into_owned();
            if !name.ends_with("accuracy") {
                continue;
            }
            match last_value(&file.path())? {
                Some(value) => {
                    summary.experiments.entry(experiment).or_default().insert(name, value);
                }
                None => tracing::warn!("No value in '{}'", file.path().display()),
            }
        }
    }

    tracing::info!("Scraped {} experiments from '{}'", summary.experiments.len(), root.display());
    Ok(summary)
}

/// Value field of the last non-empty "<timestamp> <value> <step>" line.
fn last_value(path: &Path) -> Result<Option<f64>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read metric file '{}'", path.display()))?;
    let Some(line) = text.lines().rev().find(|l| !l.trim().is_empty()) else {
        return Ok(None);
    };
    let value = line
        .split_whitespace()
        .nth(1)
        .with_context(|| format!("Malformed metric line '{line}' in '{}'", path.display()))?;
    Ok(Some(value.parse().with_context(|| {
        format!("Bad metric value '{value}' in '{}'", path.display())
    })?))
}
