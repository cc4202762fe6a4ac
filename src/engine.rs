use crate::error::RecommendationError;
use crate::table::SoilCropTable;
use crate::weather::{Conditions, LocationSpec, WeatherProvider, WeatherReading};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Nutrient levels (kg/ha) below which an amendment is recommended.
const NITROGEN_THRESHOLD: f64 = 280.0;
const PHOSPHORUS_THRESHOLD: f64 = 10.0;
const POTASSIUM_THRESHOLD: f64 = 110.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fertilizer {
    #[serde(rename = "Urea")]
    Urea,
    #[serde(rename = "Single Super Phosphate")]
    SingleSuperPhosphate,
    #[serde(rename = "Muriate of Potash")]
    MuriateOfPotash,
}

impl Fertilizer {
    pub fn name(&self) -> &'static str {
        match self {
            Fertilizer::Urea => "Urea",
            Fertilizer::SingleSuperPhosphate => "Single Super Phosphate",
            Fertilizer::MuriateOfPotash => "Muriate of Potash",
        }
    }
}

impl fmt::Display for Fertilizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    pub soil_type: String,
    pub crop_type: String,
    pub land_size_m2: f64,
    pub fallow_years: u32,
    pub location: Option<LocationSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub soil_type: String,
    pub crop_type: String,
    /// Amendments in nitrogen, phosphorus, potassium check order.
    pub fertilizers: Vec<Fertilizer>,
    pub land_size_m2: f64,
    pub fallow_years: u32,
    pub weather: Conditions,
}

/// Synthetic conditions used when the caller supplies no location, so the
/// engine stays usable without network access. Note the fixed 50% moisture;
/// this is a preset reading, not one derived from the humidity formula.
pub fn default_conditions() -> Conditions {
    Conditions {
        temperature_c: 25.0,
        rainfall_mm_last_hour: 0.0,
        humidity_pct: 60.0,
        wind_speed_mps: 2.0,
        soil_temp_c: 23.0,
        soil_moisture_pct: 50.0,
        observed_at: Utc::now(),
    }
}

/// Combines a soil/crop baseline lookup with resolved weather into a
/// fertilizer recommendation.
pub struct RecommendationEngine {
    table: SoilCropTable,
    weather: WeatherProvider,
}

impl RecommendationEngine {
    pub fn new(table: SoilCropTable, weather: WeatherProvider) -> Self {
        Self { table, weather }
    }

    /// Produce a recommendation for one request.
    ///
    /// A weather failure is a request failure; no partial recommendation is
    /// returned. The engine performs no retries of its own.
    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> std::result::Result<Recommendation, RecommendationError> {
        let record = self
            .table
            .lookup(&request.soil_type, &request.crop_type)
            .ok_or_else(|| RecommendationError::NoData {
                soil_type: request.soil_type.clone(),
                crop_type: request.crop_type.clone(),
            })?;

        let reading = match &request.location {
            Some(location) => self.weather.fetch(location).await,
            None => {
                debug!("No location supplied, using preset conditions");
                WeatherReading::Ok(default_conditions())
            }
        };

        let conditions = match reading {
            WeatherReading::Ok(conditions) => conditions,
            WeatherReading::Error(e) => return Err(RecommendationError::WeatherFailed(e)),
        };

        let mut fertilizers = Vec::new();
        if record.available_nitrogen < NITROGEN_THRESHOLD {
            fertilizers.push(Fertilizer::Urea);
        }
        if record.available_phosphorus < PHOSPHORUS_THRESHOLD {
            fertilizers.push(Fertilizer::SingleSuperPhosphate);
        }
        if record.exchangeable_potassium < POTASSIUM_THRESHOLD {
            fertilizers.push(Fertilizer::MuriateOfPotash);
        }

        info!(
            "Recommendation for {}/{}: {} amendment(s)",
            request.soil_type,
            request.crop_type,
            fertilizers.len()
        );

        Ok(Recommendation {
            soil_type: request.soil_type.clone(),
            crop_type: request.crop_type.clone(),
            fertilizers,
            land_size_m2: request.land_size_m2,
            fallow_years: request.fallow_years,
            weather: conditions,
        })
    }
}
