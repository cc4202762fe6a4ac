use clap::{Parser, Subcommand};
use farm_advisor::advisory;
use farm_advisor::config::Config;
use farm_advisor::engine::{RecommendationEngine, RecommendationRequest};
use farm_advisor::table::SoilCropTable;
use farm_advisor::weather::{LocationSpec, WeatherProvider};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "farm-advisor",
    version,
    about = "Fertilizer and field-work advisories from soil baselines and live weather"
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true, default_value = "config/config.yaml")]
    config: std::path::PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce a fertilizer recommendation and advisory for a field
    Advise {
        /// Soil type, matched exactly against the reference table
        #[arg(long)]
        soil: String,

        /// Crop type, matched exactly against the reference table
        #[arg(long)]
        crop: String,

        /// Land size in square meters
        #[arg(long, default_value_t = 5000.0)]
        land_size: f64,

        /// Consecutive years the land was left unplanted
        #[arg(long, default_value_t = 1)]
        fallow_years: u32,

        /// Latitude of the field (with --lon; takes precedence over --place)
        #[arg(long, requires = "lon")]
        lat: Option<f64>,

        /// Longitude of the field (with --lat)
        #[arg(long, requires = "lat")]
        lon: Option<f64>,

        /// Place name to resolve weather for (city or region)
        #[arg(long)]
        place: Option<String>,

        /// Print the structured recommendation as JSON instead of the advisory
        #[arg(long)]
        json: bool,
    },

    /// List soil and crop types available in the reference table
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,farm_advisor=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {}\n\n\
             Make sure:\n\
             1. {} exists\n\
             2. Required environment variables are set (check .env.example)\n\
             3. Create a .env file if needed",
            e,
            cli.config.display()
        )
    })?;

    let table = SoilCropTable::load(&config.table.path)?;
    info!(
        "Reference table ready: {} soil/crop baselines from {}",
        table.len(),
        config.table.path
    );

    match cli.command {
        Command::List => {
            println!("Soil types:");
            for soil in table.soil_types() {
                println!("  {}", soil);
            }
            println!("Crop types:");
            for crop in table.crop_types() {
                println!("  {}", crop);
            }
        }
        Command::Advise {
            soil,
            crop,
            land_size,
            fallow_years,
            lat,
            lon,
            place,
            json,
        } => {
            let provider = WeatherProvider::new(&config.weather)?;
            let engine = RecommendationEngine::new(table, provider);

            // Coordinates win over a place name when both are given
            let location = match (lat, lon, place) {
                (Some(lat), Some(lon), _) => Some(LocationSpec::Coordinates { lat, lon }),
                (_, _, Some(place)) => Some(LocationSpec::Place(place)),
                _ => None,
            };

            let request = RecommendationRequest {
                soil_type: soil,
                crop_type: crop,
                land_size_m2: land_size,
                fallow_years,
                location,
            };

            match engine.recommend(&request).await {
                Ok(recommendation) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&recommendation)?);
                    } else {
                        println!("{}", advisory::render_conditions(&recommendation.weather));
                        println!("{}", advisory::render(&recommendation));
                    }
                }
                Err(e) => {
                    eprintln!("No advisory produced: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
