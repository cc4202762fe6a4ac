use crate::error::{AppError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Default failure threshold - fail the load if more than 10% of rows are unusable
const DEFAULT_FAILURE_THRESHOLD: f64 = 0.10;

/// Nutrient baseline for one soil/crop combination.
///
/// Nitrogen/phosphorus/potassium are in kg/ha as reported by the soil survey.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SoilCropRecord {
    pub soil_type: String,
    pub crop_type: String,
    #[serde(rename = "available_n")]
    pub available_nitrogen: f64,
    #[serde(rename = "available_p")]
    pub available_phosphorus: f64,
    #[serde(rename = "exchangeable_k")]
    pub exchangeable_potassium: f64,
}

#[derive(Debug, Clone)]
pub struct LoadStats {
    pub rows_total: usize,
    pub rows_loaded: usize,
    pub rows_skipped: usize,
    pub duplicates_ignored: usize,
    pub failure_rate: f64,
}

impl LoadStats {
    fn new() -> Self {
        Self {
            rows_total: 0,
            rows_loaded: 0,
            rows_skipped: 0,
            duplicates_ignored: 0,
            failure_rate: 0.0,
        }
    }

    fn finalize(&mut self) {
        self.failure_rate = if self.rows_total > 0 {
            self.rows_skipped as f64 / self.rows_total as f64
        } else {
            0.0
        };
    }

    pub fn exceeds_threshold(&self, threshold: f64) -> bool {
        self.failure_rate > threshold
    }
}

/// In-memory index of soil/crop nutrient baselines.
///
/// Lookup is exact and case-sensitive on both fields. When the source data
/// carries duplicate (soil, crop) keys the first row in file order wins.
#[derive(Debug)]
pub struct SoilCropTable {
    index: HashMap<(String, String), SoilCropRecord>,
    soil_types: Vec<String>,
    crop_types: Vec<String>,
}

impl SoilCropTable {
    /// Load the reference table from a CSV file.
    ///
    /// Required columns: soil_type, crop_type, available_n, available_p,
    /// exchangeable_k. A load failure here is fatal at startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Table(format!(
                "Failed to read reference table '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let (table, stats) = Self::parse(&content)?;
        info!(
            "Loaded {} soil/crop baselines ({} rows skipped, {} duplicates ignored)",
            table.len(),
            stats.rows_skipped,
            stats.duplicates_ignored
        );
        Ok(table)
    }

    /// Parse CSV content and return the table with load statistics
    pub fn parse(content: &str) -> Result<(Self, LoadStats)> {
        Self::parse_with_threshold(content, DEFAULT_FAILURE_THRESHOLD)
    }

    /// Parse CSV content with a custom failure threshold
    pub fn parse_with_threshold(
        content: &str,
        failure_threshold: f64,
    ) -> Result<(Self, LoadStats)> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut index: HashMap<(String, String), SoilCropRecord> = HashMap::new();
        let mut soil_types = Vec::new();
        let mut crop_types = Vec::new();
        let mut stats = LoadStats::new();

        for (row_num, row) in reader.deserialize::<SoilCropRecord>().enumerate() {
            stats.rows_total += 1;

            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    stats.rows_skipped += 1;
                    warn!(
                        "Skipping reference table row {} (failure {}/{}): {}",
                        row_num + 2,
                        stats.rows_skipped,
                        stats.rows_total,
                        e
                    );
                    continue;
                }
            };

            let key = (record.soil_type.clone(), record.crop_type.clone());
            if index.contains_key(&key) {
                // First row in file order wins for duplicate keys
                stats.duplicates_ignored += 1;
                continue;
            }

            soil_types.push(record.soil_type.clone());
            crop_types.push(record.crop_type.clone());
            index.insert(key, record);
            stats.rows_loaded += 1;
        }

        stats.finalize();

        if stats.exceeds_threshold(failure_threshold) {
            return Err(AppError::Table(format!(
                "Row failure rate {:.1}% exceeds threshold {:.1}%: {} failures out of {} rows",
                stats.failure_rate * 100.0,
                failure_threshold * 100.0,
                stats.rows_skipped,
                stats.rows_total
            )));
        }

        if index.is_empty() {
            return Err(AppError::Table(
                "No usable rows in reference table".to_string(),
            ));
        }

        soil_types.sort();
        soil_types.dedup();
        crop_types.sort();
        crop_types.dedup();

        Ok((
            Self {
                index,
                soil_types,
                crop_types,
            },
            stats,
        ))
    }

    /// Exact-match lookup on soil and crop type, case-sensitive on both fields.
    pub fn lookup(&self, soil_type: &str, crop_type: &str) -> Option<&SoilCropRecord> {
        self.index
            .get(&(soil_type.to_string(), crop_type.to_string()))
    }

    /// Distinct soil types in the table, sorted.
    pub fn soil_types(&self) -> &[String] {
        &self.soil_types
    }

    /// Distinct crop types in the table, sorted.
    pub fn crop_types(&self) -> &[String] {
        &self.crop_types
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
