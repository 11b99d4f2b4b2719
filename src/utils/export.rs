//! export.rs
//! End-of-run summary export: per-channel statistics of the retained telemetry.
//!
//! One row per channel: channel, count, min, max, mean, std_dev (population).
//! Tick accounting is appended as two extra rows (count only).

use std::{
    fs::create_dir_all,
    path::Path,
};

use log::info;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::runtime::{history::HistorySnapshot, runner::TickStats};
use crate::utils::error::{ControlError, ControlResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub channel: String,
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
}

impl SummaryRow {
    /// Statistics of `data`; empty channels get a count of 0 and blank fields.
    pub fn from_channel(channel: &str, data: &[f64]) -> Self {
        if data.is_empty() {
            return Self::count_only(channel, 0);
        }
        Self {
            channel: channel.to_string(),
            count: data.len() as u64,
            min: Some(Statistics::min(data)),
            max: Some(Statistics::max(data)),
            mean: Some(Statistics::mean(data)),
            std_dev: Some(Statistics::population_std_dev(data)),
        }
    }

    fn count_only(channel: &str, count: u64) -> Self {
        Self {
            channel: channel.to_string(),
            count,
            min: None,
            max: None,
            mean: None,
            std_dev: None,
        }
    }
}

/// Summary rows for the channels worth aggregating, plus tick accounting.
pub fn summarize(snapshot: &HistorySnapshot, stats: TickStats) -> Vec<SummaryRow> {
    vec![
        SummaryRow::from_channel("position", &snapshot.position),
        SummaryRow::from_channel("error", &snapshot.error),
        SummaryRow::from_channel("control", &snapshot.control),
        SummaryRow::from_channel("alpha", &snapshot.alpha),
        SummaryRow::from_channel("loss", &snapshot.loss),
        SummaryRow::count_only("ticks", stats.ticks),
        SummaryRow::count_only("late_ticks", stats.late_ticks),
    ]
}

/// Writes `summarize(snapshot, stats)` to `path` as CSV, creating parent directories.
pub fn export_summary_csv(
    snapshot: &HistorySnapshot,
    stats: TickStats,
    path: impl AsRef<Path>,
) -> ControlResult<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir).map_err(|source| ControlError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in summarize(snapshot, stats) {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| ControlError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("[Export] summary written to {:?}", path);
    Ok(())
}
