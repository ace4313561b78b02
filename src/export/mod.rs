use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ExportError;
use crate::storage::TrackerData;

pub mod csv;
pub mod json;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Weigh-in history, one row per entry
    Csv,
    /// Full tracker snapshot
    Json,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Result<Self, ExportError> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| Self::from_str(ext).ok())
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Write the tracker data to `output_path` in the given format
pub fn export<P: AsRef<Path>>(
    data: &TrackerData,
    format: ExportFormat,
    output_path: P,
    now: DateTime<Utc>,
) -> Result<(), ExportError> {
    let output_path = output_path.as_ref();

    match format {
        ExportFormat::Csv => csv::export_history(&data.weigh_ins, output_path)?,
        ExportFormat::Json => json::export_snapshot(data, now, output_path)?,
    }

    tracing::info!(
        format = format.extension(),
        entries = data.weigh_ins.len(),
        path = %output_path.display(),
        "Export written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_export_format_parsing() {
        assert_eq!(ExportFormat::from_str("CSV").unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_str("json").unwrap(), ExportFormat::Json);
        assert!(matches!(
            ExportFormat::from_str("pdf"),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_export_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(&PathBuf::from("history.csv")),
            Some(ExportFormat::Csv)
        );
        assert_eq!(ExportFormat::from_path(&PathBuf::from("notes.txt")), None);
        assert_eq!(ExportFormat::from_path(&PathBuf::from("snapshot")), None);
    }

    #[test]
    fn test_export_dispatch() {
        let now = Utc.with_ymd_and_hms(2024, 9, 22, 8, 0, 0).unwrap();
        let data = TrackerData::defaults(now);
        let dir = tempdir().unwrap();

        let csv_path = dir.path().join("history.csv");
        export(&data, ExportFormat::Csv, &csv_path, now).unwrap();
        assert!(csv_path.exists());

        let json_path = dir.path().join("snapshot.json");
        export(&data, ExportFormat::Json, &json_path, now).unwrap();
        assert!(std::fs::read_to_string(json_path).unwrap().contains("weightloss_phases"));
    }
}
