use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reference table error: {0}")]
    Table(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure modes of a weather lookup.
///
/// Carried as data inside a `WeatherReading` rather than propagated, so a
/// backend outage never aborts the caller. Cloneable because cached readings
/// are handed out by value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeatherError {
    #[error("weather credential not configured")]
    CredentialMissing,

    #[error("weather backend error {code}: {message}")]
    Backend { code: u16, message: String },

    #[error("weather transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecommendationError {
    #[error("no reference data for soil '{soil_type}' with crop '{crop_type}'")]
    NoData { soil_type: String, crop_type: String },

    #[error("weather lookup failed: {0}")]
    WeatherFailed(WeatherError),
}
