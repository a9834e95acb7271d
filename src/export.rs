//! Export hooks: write the current series to a file on demand.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::probe::ProbeFailure;
use crate::series::{SeriesStats, SeriesStore};

/// Prefix of generated export file names.
pub const EXPORT_FILE_PREFIX: &str = "ping_plot";

/// Extension of the default (image) export name.
pub const DEFAULT_EXPORT_EXTENSION: &str = "png";

/// Errors that can occur while exporting.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed to create or write the output file.
    #[error("export io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize the series.
    #[error("export serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Timestamped export file name: `ping_plot_YYYY-MM-DD_HH-MM-SS.<extension>`.
pub fn export_filename(now: DateTime<Local>, extension: &str) -> String {
    format!(
        "{EXPORT_FILE_PREFIX}_{}.{extension}",
        now.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Default export file name for an image export.
pub fn default_export_filename(now: DateTime<Local>) -> String {
    export_filename(now, DEFAULT_EXPORT_EXTENSION)
}

/// Serializes a series store to a file.
pub trait ExportHook {
    /// File extension this exporter produces, without the dot.
    fn extension(&self) -> &'static str;

    fn export(&self, store: &SeriesStore, path: &Path) -> Result<(), ExportError>;

    /// Timestamped path inside `dir` for an export made now.
    fn default_path(&self, dir: &Path) -> PathBuf {
        dir.join(export_filename(Local::now(), self.extension()))
    }
}

#[derive(Serialize)]
struct PointRecord {
    observed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<ProbeFailure>,
}

#[derive(Serialize)]
struct SeriesRecord<'a> {
    target: &'a str,
    stats: SeriesStats,
    points: Vec<PointRecord>,
}

/// Writes every series as pretty-printed JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExporter;

impl JsonExporter {
    fn records(store: &SeriesStore) -> Vec<SeriesRecord<'_>> {
        store
            .iter()
            .map(|(target, series)| SeriesRecord {
                target: target.as_str(),
                stats: series.stats(),
                points: series
                    .points()
                    .iter()
                    .map(|p| PointRecord {
                        observed_at: p.observed_at,
                        latency_ms: p.latency_ms(),
                        failure: p.outcome.err(),
                    })
                    .collect(),
            })
            .collect()
    }
}

impl ExportHook for JsonExporter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn export(&self, store: &SeriesStore, path: &Path) -> Result<(), ExportError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &Self::records(store))?;
        writer.flush()?;

        tracing::info!(
            path = %path.display(),
            series = store.len(),
            points = store.total_points(),
            "Series exported"
        );
        Ok(())
    }
}
