use crate::engine::{Fertilizer, Recommendation};
use crate::weather::Conditions;
use std::fmt::Write;

// Rainfall bands (mm in the last hour), evaluated high to low.
const HEAVY_RAIN_MM: f64 = 10.0;
const LIGHT_RAIN_MM: f64 = 5.0;

// Wind bands (m/s), evaluated high to low.
const STRONG_WIND_MPS: f64 = 8.0;
const BREEZY_WIND_MPS: f64 = 5.0;

const COLD_SOIL_C: f64 = 15.0;
const HOT_SOIL_C: f64 = 30.0;
const WATERLOGGED_PCT: f64 = 85.0;
const DRY_SOIL_PCT: f64 = 40.0;

const LONG_FALLOW_YEARS: u32 = 2;

/// Categorized guidance lines derived from a recommendation.
///
/// Composition is pure and total; empty categories get their fallback line at
/// render time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Advisory {
    pub weather: Vec<String>,
    pub soil: Vec<String>,
    pub fertilizer: Vec<String>,
    pub special: Vec<String>,
}

impl Advisory {
    pub fn compose(rec: &Recommendation) -> Self {
        let conditions = &rec.weather;
        let mut advisory = Advisory::default();

        // Exactly one rainfall line fires
        if conditions.rainfall_mm_last_hour > HEAVY_RAIN_MM {
            advisory
                .weather
                .push("Heavy rain warning! Avoid all field work today.".to_string());
        } else if conditions.rainfall_mm_last_hour > LIGHT_RAIN_MM {
            advisory
                .weather
                .push("Rain expected. Delay fertilizer application.".to_string());
        } else {
            advisory
                .weather
                .push("Dry conditions. Water crops if needed.".to_string());
        }

        if conditions.wind_speed_mps > STRONG_WIND_MPS {
            advisory
                .weather
                .push("Strong winds! No spraying today.".to_string());
        } else if conditions.wind_speed_mps > BREEZY_WIND_MPS {
            advisory
                .weather
                .push("Breezy conditions. Spray carefully.".to_string());
        }

        if conditions.soil_temp_c < COLD_SOIL_C {
            advisory
                .soil
                .push("Cold soil. Delay planting warm-season crops.".to_string());
        } else if conditions.soil_temp_c > HOT_SOIL_C {
            advisory
                .soil
                .push("Hot soil. Water deeply in early morning.".to_string());
        }

        if conditions.soil_moisture_pct > WATERLOGGED_PCT {
            advisory
                .soil
                .push("Waterlogged soil. Improve drainage.".to_string());
        } else if conditions.soil_moisture_pct < DRY_SOIL_PCT {
            advisory.soil.push("Dry soil. Irrigate soon.".to_string());
        }

        for fertilizer in &rec.fertilizers {
            advisory.fertilizer.push(match fertilizer {
                Fertilizer::Urea => "Apply Urea (140 kg/acre for nitrogen).".to_string(),
                Fertilizer::SingleSuperPhosphate => {
                    "Apply Single Super Phosphate (50 kg/acre for phosphorus).".to_string()
                }
                Fertilizer::MuriateOfPotash => {
                    "Apply Muriate of Potash (40 kg/acre for potassium).".to_string()
                }
            });
        }

        if rec.fallow_years >= LONG_FALLOW_YEARS {
            advisory
                .special
                .push("Long fallow period! Plant green manure crops.".to_string());
        }

        advisory
    }
}

/// Render the farmer-facing advisory text for a recommendation.
pub fn render(rec: &Recommendation) -> String {
    let advisory = Advisory::compose(rec);
    let mut out = String::new();

    let _ = writeln!(out, "FARMER ADVISORY");
    let _ = writeln!(out, "===============");
    let _ = writeln!(
        out,
        "Field: {:.0} m2 | Fallow: {} year(s)",
        rec.land_size_m2, rec.fallow_years
    );
    let _ = writeln!(
        out,
        "Soil temp: {:.1} C | Soil moisture: {:.0}%",
        rec.weather.soil_temp_c, rec.weather.soil_moisture_pct
    );

    let _ = writeln!(out, "\nWeather alerts:");
    for line in &advisory.weather {
        let _ = writeln!(out, "- {}", line);
    }

    let _ = writeln!(out, "\nSoil care:");
    if advisory.soil.is_empty() {
        let _ = writeln!(out, "- Soil conditions normal.");
    } else {
        for line in &advisory.soil {
            let _ = writeln!(out, "- {}", line);
        }
    }

    let _ = writeln!(out, "\nFertilizer plan:");
    if advisory.fertilizer.is_empty() {
        let _ = writeln!(out, "- No fertilizers needed now.");
    } else {
        for line in &advisory.fertilizer {
            let _ = writeln!(out, "- {}", line);
        }
    }

    let _ = writeln!(out, "\nSpecial notes:");
    if advisory.special.is_empty() {
        let _ = writeln!(out, "- No critical issues detected.");
    } else {
        for line in &advisory.special {
            let _ = writeln!(out, "- {}", line);
        }
    }

    out
}

/// Render the current-conditions report shown alongside the advisory.
pub fn render_conditions(conditions: &Conditions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CURRENT CONDITIONS");
    let _ = writeln!(out, "==================");
    let _ = writeln!(out, "Temperature:   {:.1} C", conditions.temperature_c);
    let _ = writeln!(
        out,
        "Rainfall:      {:.1} mm (last hour)",
        conditions.rainfall_mm_last_hour
    );
    let _ = writeln!(out, "Humidity:      {:.0}%", conditions.humidity_pct);
    let _ = writeln!(out, "Wind:          {:.1} m/s", conditions.wind_speed_mps);
    let _ = writeln!(out, "Soil temp:     {:.1} C", conditions.soil_temp_c);
    let _ = writeln!(out, "Soil moisture: {:.0}%", conditions.soil_moisture_pct);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Fertilizer;
    use chrono::{TimeZone, Utc};

    fn conditions(rainfall: f64, wind: f64, soil_temp: f64, soil_moisture: f64) -> Conditions {
        Conditions {
            temperature_c: soil_temp + 2.0,
            rainfall_mm_last_hour: rainfall,
            humidity_pct: 60.0,
            wind_speed_mps: wind,
            soil_temp_c: soil_temp,
            soil_moisture_pct: soil_moisture,
            observed_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn recommendation(
        fertilizers: Vec<Fertilizer>,
        fallow_years: u32,
        weather: Conditions,
    ) -> Recommendation {
        Recommendation {
            soil_type: "Loamy".to_string(),
            crop_type: "Wheat".to_string(),
            fertilizers,
            land_size_m2: 5000.0,
            fallow_years,
            weather,
        }
    }

    #[test]
    fn test_exactly_one_rainfall_line_fires() {
        for rainfall in [0.0, 2.5, 5.0, 5.1, 9.9, 10.0, 10.1, 45.0] {
            let rec = recommendation(vec![], 0, conditions(rainfall, 1.0, 23.0, 50.0));
            let advisory = Advisory::compose(&rec);
            let rain_lines = advisory
                .weather
                .iter()
                .filter(|line| {
                    line.contains("Heavy rain")
                        || line.contains("Rain expected")
                        || line.contains("Dry conditions")
                })
                .count();
            assert_eq!(rain_lines, 1, "rainfall={}", rainfall);
        }
    }

    #[test]
    fn test_rainfall_band_boundaries() {
        let advisory = |mm| {
            Advisory::compose(&recommendation(vec![], 0, conditions(mm, 1.0, 23.0, 50.0)))
                .weather
                .remove(0)
        };
        // 5 mm and 10 mm sit in the lower band; the upper bands are exclusive
        assert!(advisory(5.0).contains("Dry conditions"));
        assert!(advisory(5.1).contains("Rain expected"));
        assert!(advisory(10.0).contains("Rain expected"));
        assert!(advisory(10.1).contains("Heavy rain"));
    }

    #[test]
    fn test_wind_band_boundaries() {
        let wind_lines = |mps| {
            let rec = recommendation(vec![], 0, conditions(0.0, mps, 23.0, 50.0));
            Advisory::compose(&rec)
                .weather
                .into_iter()
                .filter(|line| line.contains("wind") || line.contains("Breezy"))
                .collect::<Vec<_>>()
        };
        assert!(wind_lines(5.0).is_empty());
        assert!(wind_lines(5.5)[0].contains("Breezy"));
        assert!(wind_lines(8.0)[0].contains("Breezy"));
        assert!(wind_lines(8.5)[0].contains("Strong winds"));
    }

    #[test]
    fn test_soil_lines_for_extremes() {
        let rec = recommendation(vec![], 0, conditions(0.0, 1.0, 12.0, 90.0));
        let advisory = Advisory::compose(&rec);
        assert_eq!(advisory.soil.len(), 2);
        assert!(advisory.soil[0].contains("Cold soil"));
        assert!(advisory.soil[1].contains("Waterlogged"));

        let rec = recommendation(vec![], 0, conditions(0.0, 1.0, 32.0, 30.0));
        let advisory = Advisory::compose(&rec);
        assert!(advisory.soil[0].contains("Hot soil"));
        assert!(advisory.soil[1].contains("Irrigate soon"));
    }

    #[test]
    fn test_normal_soil_renders_fallback_line() {
        let rec = recommendation(vec![], 0, conditions(0.0, 1.0, 23.0, 50.0));
        assert!(Advisory::compose(&rec).soil.is_empty());
        assert!(render(&rec).contains("Soil conditions normal."));
    }

    #[test]
    fn test_fertilizer_lines_follow_recommendation_order() {
        let rec = recommendation(
            vec![
                Fertilizer::Urea,
                Fertilizer::SingleSuperPhosphate,
                Fertilizer::MuriateOfPotash,
            ],
            0,
            conditions(0.0, 1.0, 23.0, 50.0),
        );
        let advisory = Advisory::compose(&rec);
        assert!(advisory.fertilizer[0].contains("Urea"));
        assert!(advisory.fertilizer[1].contains("Single Super Phosphate"));
        assert!(advisory.fertilizer[2].contains("Muriate of Potash"));
    }

    #[test]
    fn test_empty_fertilizer_plan_renders_fallback_line() {
        let rec = recommendation(vec![], 0, conditions(0.0, 1.0, 23.0, 50.0));
        assert!(render(&rec).contains("No fertilizers needed now."));
    }

    #[test]
    fn test_long_fallow_note() {
        let rec = recommendation(vec![], 3, conditions(0.0, 1.0, 23.0, 50.0));
        let advisory = Advisory::compose(&rec);
        assert_eq!(advisory.special.len(), 1);
        assert!(advisory.special[0].contains("green manure"));

        let rec = recommendation(vec![], 2, conditions(0.0, 1.0, 23.0, 50.0));
        assert!(!Advisory::compose(&rec).special.is_empty());
    }

    #[test]
    fn test_short_fallow_renders_no_critical_issues() {
        let rec = recommendation(vec![], 0, conditions(0.0, 1.0, 23.0, 50.0));
        assert!(Advisory::compose(&rec).special.is_empty());
        assert!(render(&rec).contains("No critical issues detected."));
    }

    #[test]
    fn test_render_includes_field_summary() {
        let rec = recommendation(vec![], 1, conditions(0.0, 1.0, 23.0, 50.0));
        let text = render(&rec);
        assert!(text.contains("Field: 5000 m2 | Fallow: 1 year(s)"));
        assert!(text.contains("Soil temp: 23.0 C | Soil moisture: 50%"));
    }

    #[test]
    fn test_render_conditions_reports_all_fields() {
        let text = render_conditions(&conditions(1.2, 3.4, 23.0, 50.0));
        assert!(text.contains("Temperature:   25.0 C"));
        assert!(text.contains("Rainfall:      1.2 mm"));
        assert!(text.contains("Humidity:      60%"));
        assert!(text.contains("Wind:          3.4 m/s"));
        assert!(text.contains("Soil temp:     23.0 C"));
        assert!(text.contains("Soil moisture: 50%"));
    }
}
