//! CSV export of projected medicine stock.
//!
//! The export is written to a temp file next to the target and renamed into
//! place, so an interrupted export never leaves a truncated CSV behind.

use crate::persist;
use crate::{ProcessedMedicine, Result};
use std::path::Path;

/// Column names, written even when there are no rows
const HEADERS: [&str; 7] = [
    "id",
    "name",
    "initial_stock",
    "current_stock",
    "end_date",
    "dosages",
    "low_stock",
];

/// A row in the CSV output
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CsvRow {
    pub id: String,
    pub name: String,
    pub initial_stock: u32,
    pub current_stock: f64,
    pub end_date: Option<String>,
    pub dosages: String,
    pub low_stock: bool,
}

impl CsvRow {
    fn new(medicine: &ProcessedMedicine, default_threshold: f64) -> Self {
        let dosages: Vec<String> = medicine
            .medicine
            .dosages
            .iter()
            .map(|d| format!("{}={}", d.time, d.amount))
            .collect();

        CsvRow {
            id: medicine.id().to_string(),
            name: medicine.name().to_string(),
            initial_stock: medicine.medicine.stock,
            current_stock: medicine.current_stock,
            end_date: medicine.end_date.map(|t| t.to_rfc3339()),
            dosages: dosages.join(";"),
            low_stock: medicine.is_low_stock(default_threshold),
        }
    }
}

/// Write one row per medicine to `path`, replacing any existing file
///
/// Returns the number of rows written.
pub fn write_projection_csv(
    path: &Path,
    processed: &[ProcessedMedicine],
    default_threshold: f64,
) -> Result<usize> {
    persist::write_atomic(path, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(HEADERS)?;
        for medicine in processed {
            writer.serialize(CsvRow::new(medicine, default_threshold))?;
        }
        writer.flush()?;
        Ok(())
    })?;

    tracing::info!("Exported {} medicines to {:?}", processed.len(), path);
    Ok(processed.len())
}
