use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// Environment variable holding the weather backend credential.
///
/// Read directly from the process environment rather than the YAML file so the
/// key never has to be written to disk. Absence is not fatal at startup; every
/// weather fetch then fails fast instead.
pub const WEATHER_API_KEY_VAR: &str = "WEATHER_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub weather: WeatherConfig,
    pub table: TableConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(
        default = "default_cache_capacity",
        deserialize_with = "deserialize_capacity"
    )]
    pub cache_capacity: usize,
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_cache_capacity() -> usize {
    100
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            cache_capacity: default_cache_capacity(),
            api_key: None,
        }
    }
}

/// Custom deserializer that handles cache_capacity as both number and string
///
/// Accepts:
/// - `cache_capacity: 100` (number)
/// - `cache_capacity: "100"` (string that parses to number)
/// - `cache_capacity: ${CACHE_CAPACITY}` (env var substituted to either)
fn deserialize_capacity<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CapacityValue {
        Number(usize),
        String(String),
    }

    match CapacityValue::deserialize(deserializer)? {
        CapacityValue::Number(n) => Ok(n),
        CapacityValue::String(s) => s
            .parse::<usize>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid cache capacity: '{}'", s))),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    pub path: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        // Substitute environment variables
        let expanded = expand_env_vars(&content)?;

        let mut config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.weather.api_key = std::env::var(WEATHER_API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty());

        if config.weather.api_key.is_none() {
            tracing::warn!(
                "{} is not set; weather lookups will fail until it is configured",
                WEATHER_API_KEY_VAR
            );
        }

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Valid backend URL format and scheme
    /// - Positive timeout and cache capacity
    /// - Non-empty table path
    fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.weather.base_url).map_err(|e| {
            AppError::Config(format!(
                "Invalid weather base_url '{}': {}",
                self.weather.base_url, e
            ))
        })?;

        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(AppError::Config(format!(
                "Weather base_url must use HTTP(S), got: {}",
                parsed.scheme()
            )));
        }

        if parsed.scheme() == "http" {
            tracing::warn!(
                "Weather base_url '{}' uses plain HTTP; the credential is sent unencrypted",
                self.weather.base_url
            );
        }

        if self.weather.timeout_seconds == 0 {
            return Err(AppError::Config(
                "Weather timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.weather.cache_capacity == 0 {
            return Err(AppError::Config(
                "Weather cache_capacity must be at least 1".to_string(),
            ));
        }

        if self.table.path.is_empty() {
            return Err(AppError::Config(
                "Reference table path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").unwrap();

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root (copy .env.example)\n\
             2. Set the missing variable{}: export {}=<value>\n\
             3. Or set {} in your environment before running",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_config_defaults() {
        let yaml = "{}";
        let config: WeatherConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.base_url, "https://api.openweathermap.org/data/2.5");
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.cache_capacity, 100);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_capacity_deserialize_from_number() {
        let yaml = "cache_capacity: 25";
        let config: WeatherConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cache_capacity, 25);
    }

    #[test]
    fn test_capacity_deserialize_from_string() {
        let yaml = r#"cache_capacity: "25""#;
        let config: WeatherConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cache_capacity, 25);
    }

    #[test]
    fn test_capacity_deserialize_invalid_string() {
        let yaml = r#"cache_capacity: "not_a_number""#;
        let result: std::result::Result<WeatherConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Invalid cache capacity") || err_msg.contains("not_a_number"));
    }

    #[test]
    fn test_expand_env_vars_replaces_known_variable() {
        std::env::set_var("FARM_ADVISOR_TEST_TABLE", "data/test.csv");
        let expanded = expand_env_vars("path: ${FARM_ADVISOR_TEST_TABLE}").unwrap();
        assert_eq!(expanded, "path: data/test.csv");
        std::env::remove_var("FARM_ADVISOR_TEST_TABLE");
    }

    #[test]
    fn test_expand_env_vars_reports_missing_variable() {
        let result = expand_env_vars("path: ${FARM_ADVISOR_TEST_UNSET_VAR}");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("FARM_ADVISOR_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = Config {
            weather: WeatherConfig {
                base_url: "ftp://weather.example.com".to_string(),
                ..WeatherConfig::default()
            },
            table: TableConfig {
                path: "data/soil_crop.csv".to_string(),
            },
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("HTTP(S)"));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = Config {
            weather: WeatherConfig {
                cache_capacity: 0,
                ..WeatherConfig::default()
            },
            table: TableConfig {
                path: "data/soil_crop.csv".to_string(),
            },
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_table_path() {
        let config = Config {
            weather: WeatherConfig::default(),
            table: TableConfig {
                path: String::new(),
            },
        };
        assert!(config.validate().is_err());
    }
}
