use crate::config::WeatherConfig;
use crate::error::{Result, WeatherError};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Where to resolve current weather for: a coordinate pair or a place name.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSpec {
    Coordinates { lat: f64, lon: f64 },
    Place(String),
}

impl LocationSpec {
    /// Stable memoization key. Coordinates are formatted to four decimal
    /// places (~11 m) so repeated GPS fixes of the same spot share an entry.
    pub fn cache_key(&self) -> String {
        match self {
            LocationSpec::Coordinates { lat, lon } => format!("lat={:.4},lon={:.4}", lat, lon),
            LocationSpec::Place(name) => format!("q={}", name),
        }
    }
}

impl fmt::Display for LocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationSpec::Coordinates { lat, lon } => write!(f, "({:.4}, {:.4})", lat, lon),
            LocationSpec::Place(name) => write!(f, "{}", name),
        }
    }
}

/// Normalized current conditions with derived topsoil proxies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conditions {
    pub temperature_c: f64,
    pub rainfall_mm_last_hour: f64,
    pub humidity_pct: f64,
    pub wind_speed_mps: f64,
    pub soil_temp_c: f64,
    pub soil_moisture_pct: f64,
    pub observed_at: DateTime<Utc>,
}

impl Conditions {
    /// Build conditions from raw backend fields, deriving the soil proxies.
    pub fn from_observed(
        temperature_c: f64,
        rainfall_mm_last_hour: f64,
        humidity_pct: f64,
        wind_speed_mps: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            temperature_c,
            rainfall_mm_last_hour,
            humidity_pct,
            wind_speed_mps,
            soil_temp_c: soil_temp_estimate(temperature_c),
            soil_moisture_pct: soil_moisture_estimate(humidity_pct),
            observed_at,
        }
    }
}

/// Topsoil runs roughly 2 degrees C below air temperature, floored at 10.
pub fn soil_temp_estimate(temperature_c: f64) -> f64 {
    (temperature_c - 2.0).max(10.0)
}

/// Near-surface moisture tracks humidity with a +10 point offset, capped at 100.
pub fn soil_moisture_estimate(humidity_pct: f64) -> f64 {
    (humidity_pct + 10.0).min(100.0)
}

/// Outcome of a weather lookup. Failures are values, not propagated errors;
/// both variants are cached.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherReading {
    Ok(Conditions),
    Error(WeatherError),
}

impl WeatherReading {
    pub fn conditions(&self) -> Option<&Conditions> {
        match self {
            WeatherReading::Ok(conditions) => Some(conditions),
            WeatherReading::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&WeatherError> {
        match self {
            WeatherReading::Ok(_) => None,
            WeatherReading::Error(e) => Some(e),
        }
    }
}

// Wire shapes for the current-weather endpoint. Only the fields the advisory
// needs are decoded; everything else in the payload is ignored.

#[derive(Debug, Deserialize)]
struct CurrentWeatherBody {
    main: MainFields,
    wind: WindFields,
    #[serde(default)]
    rain: Option<RainFields>,
    #[serde(default)]
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MainFields {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct WindFields {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct RainFields {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Bounded memoization of weather readings keyed by location.
///
/// Eviction is least-recently-used; a `get` refreshes recency. Error readings
/// are kept alongside successful ones so a failing key does not hammer the
/// backend until it ages out of the cache.
#[derive(Debug)]
pub struct ReadingCache {
    capacity: usize,
    entries: HashMap<String, WeatherReading>,
    recency: VecDeque<String>,
}

impl ReadingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<WeatherReading> {
        let reading = self.entries.get(key)?.clone();
        self.touch(key);
        Some(reading)
    }

    pub fn insert(&mut self, key: String, reading: WeatherReading) {
        if self.entries.insert(key.clone(), reading).is_some() {
            self.touch(&key);
            return;
        }

        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.recency.pop_front() {
                debug!("Evicting least-recently-used weather entry '{}'", oldest);
                self.entries.remove(&oldest);
            }
        }
        self.recency.push_back(key);
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
            self.recency.push_back(key.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

/// Client for the current-weather backend with per-location memoization.
pub struct WeatherProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    cache: Mutex<ReadingCache>,
}

impl WeatherProvider {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("farm-advisor/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(ReadingCache::new(config.cache_capacity)),
        })
    }

    /// Fetch current conditions for a location.
    ///
    /// Never fails at the signature level: credential, backend, and transport
    /// problems all come back as `WeatherReading::Error`. A cached reading for
    /// the same location key skips the backend entirely.
    pub async fn fetch(&self, location: &LocationSpec) -> WeatherReading {
        let key = location.cache_key();

        if let Some(reading) = self.cache.lock().unwrap().get(&key) {
            debug!("Weather cache hit for {}", location);
            return reading;
        }

        let reading = match self.fetch_uncached(location).await {
            Ok(conditions) => WeatherReading::Ok(conditions),
            Err(e) => {
                warn!("Weather lookup for {} failed: {}", location, e);
                WeatherReading::Error(e)
            }
        };

        self.cache.lock().unwrap().insert(key, reading.clone());
        reading
    }

    async fn fetch_uncached(
        &self,
        location: &LocationSpec,
    ) -> std::result::Result<Conditions, WeatherError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(WeatherError::CredentialMissing)?;

        debug!("Fetching current weather for {}", location);

        let url = format!("{}/weather", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("appid", api_key), ("units", "metric")]);

        request = match location {
            LocationSpec::Coordinates { lat, lon } => {
                request.query(&[("lat", lat.to_string()), ("lon", lon.to_string())])
            }
            LocationSpec::Place(name) => request.query(&[("q", name.clone())]),
        };

        let response = request
            .send()
            .await
            .map_err(|e| WeatherError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<BackendErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(WeatherError::Backend {
                code: status.as_u16(),
                message,
            });
        }

        let body: CurrentWeatherBody = response
            .json()
            .await
            .map_err(|e| WeatherError::Transport(format!("invalid backend response: {}", e)))?;

        let observed_at = body
            .dt
            .and_then(|dt| Utc.timestamp_opt(dt, 0).single())
            .unwrap_or_else(Utc::now);
        let rainfall = body
            .rain
            .and_then(|rain| rain.one_hour)
            .unwrap_or(0.0);

        Ok(Conditions::from_observed(
            body.main.temp,
            rainfall,
            body.main.humidity,
            body.wind.speed,
            observed_at,
        ))
    }
}
