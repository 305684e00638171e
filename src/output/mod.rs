//! Output module for exporting harvested records
//!
//! This module handles:
//! - JSON export of the full record set
//! - CSV export through a fixed column table with RFC4180 quoting

pub mod csv;

use crate::record::MatchRecord;
use std::fmt;
use std::str::FromStr;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Conventional file extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown export format '{}' (expected csv or json)", other)),
        }
    }
}

/// Serializes records in the requested format
///
/// # Arguments
///
/// * `records` - The records to export, in job order
/// * `format` - CSV or JSON
///
/// # Returns
///
/// * `Ok(Vec<u8>)` - The encoded export
/// * `Err(serde_json::Error)` - A nested value could not be encoded
pub fn export_results(
    records: &[MatchRecord],
    format: ExportFormat,
) -> Result<Vec<u8>, serde_json::Error> {
    match format {
        ExportFormat::Json => serde_json::to_vec_pretty(records),
        ExportFormat::Csv => csv::render(records).map(String::into_bytes),
    }
}
