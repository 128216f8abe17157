use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use skycast_core::Config;
use skycast_weather::http::build_client;
use skycast_weather::{
    GeocodingProvider, IconStore, ImageCache, InputMode, JsonFileStore, LastLocationStore,
    LocationAction, LocationSource, PermissionState, PresentationState, StaticLocationSource,
    WeatherOrchestrator, WeatherProvider, US_STATES,
};

/// Current conditions by city, zip code or device location.
///
/// With no flags, shows the weather for the last location that was looked up.
#[derive(Debug, Parser)]
#[command(name = "skycast", version)]
struct Cli {
    /// City name, used with --state
    #[arg(long, conflicts_with_all = ["zip", "current"])]
    city: Option<String>,

    /// Two-letter state code, used with --city
    #[arg(long, value_parser = parse_state, conflicts_with_all = ["zip", "current"])]
    state: Option<String>,

    /// US zip code
    #[arg(long, conflicts_with = "current")]
    zip: Option<String>,

    /// Use the device location from the [location] config section
    #[arg(long)]
    current: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    skycast_core::init()?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let validation = config.validate();
    for warning in &validation.warnings {
        tracing::warn!("Config {}: {}", warning.field, warning.message);
    }
    if !validation.is_valid() {
        anyhow::bail!("Invalid configuration:\n{}", validation.error_summary());
    }

    let client = build_client(config.weather.request_timeout_secs.map(Duration::from_secs))?;
    let location = Arc::new(StaticLocationSource::from_config(&config.location));
    let orchestrator = WeatherOrchestrator::new(
        Arc::new(GeocodingProvider::new(
            client.clone(),
            &config.weather.api_base_url,
            &config.weather.api_key,
            &config.weather.country_code,
        )),
        Arc::new(WeatherProvider::new(
            client.clone(),
            &config.weather.api_base_url,
            &config.weather.api_key,
        )),
        LastLocationStore::new(Arc::new(JsonFileStore::new(
            config.storage.last_location_path(),
        ))),
        location.clone(),
    );

    if let Some(zip) = cli.zip {
        orchestrator.set_input_mode(InputMode::PostalCode);
        orchestrator.set_postal_code(zip);
        orchestrator.submit().await;
    } else if cli.city.is_some() || cli.state.is_some() {
        orchestrator.set_input_mode(InputMode::CityState);
        orchestrator.set_city(cli.city.unwrap_or_default());
        orchestrator.set_region(cli.state.unwrap_or_default());
        orchestrator.submit().await;
    } else if cli.current {
        use_current_location(&orchestrator, location.as_ref()).await;
    } else {
        orchestrator.restore_last_session().await;
    }

    let state = orchestrator.state();

    if state.location_permission_denied {
        println!("Location access is turned off.");
        println!("Set [location] enabled/latitude/longitude in your config, or use --city/--zip.");
        return Ok(ExitCode::FAILURE);
    }

    if !state.error_message.is_empty() {
        eprintln!("{}", state.error_message);
        return Ok(ExitCode::FAILURE);
    }

    if state.current_reading.is_none() {
        println!("Nothing to show yet. Try --city <CITY> --state <ST>, --zip <CODE> or --current.");
        return Ok(ExitCode::SUCCESS);
    }

    render(&state, &config, client).await;
    Ok(ExitCode::SUCCESS)
}

/// Accepts any code from the state picker, in either case.
fn parse_state(value: &str) -> Result<String, String> {
    let code = value.to_uppercase();
    if US_STATES.contains(&code.as_str()) {
        Ok(code)
    } else {
        Err(format!("unknown state code '{}'", value))
    }
}

/// "City & State: Austin, TX" when a form lookup produced the reading.
fn search_heading(state: &PresentationState) -> Option<String> {
    let descriptor = state.descriptor().ok()?;
    Some(format!("{}: {}", state.input_mode.label(), descriptor))
}

/// Run the current-location flow. A permission prompt resolves in-process
/// here, so its answer is fed back the way a platform callback would be.
async fn use_current_location(orchestrator: &WeatherOrchestrator, location: &StaticLocationSource) {
    let asked = location.permission() == PermissionState::Undetermined;
    orchestrator.use_current_location().await;
    if !asked {
        return;
    }

    let action = orchestrator.handle_permission_change(location.permission());
    if action == LocationAction::StartUpdates {
        if let Some(fix) = location.last_known() {
            orchestrator.handle_location_update(fix);
        }
    }
    orchestrator.use_current_location().await;
}

async fn render(state: &PresentationState, config: &Config, client: reqwest::Client) {
    let Some(reading) = &state.current_reading else {
        return;
    };

    if let Some(heading) = search_heading(state) {
        println!("{}", heading);
    }
    println!("{} ({})", reading.condition_title, reading.description);
    println!("  Temperature: {}", reading.temperature_display());
    println!("  Feels like:  {}", reading.feels_like_display());
    println!("  Low / High:  {} / {}", reading.low_display(), reading.high_display());
    println!("  Humidity:    {}", reading.humidity_display());

    let Some(url) = state.icon_url(&config.weather.image_base_url) else {
        return;
    };

    match open_icon_store(&config.storage.icon_cache_path()) {
        Ok(store) => {
            let cache = ImageCache::new(client, store);
            match cache.load_image(&url).await {
                Ok(bytes) => println!("  Icon:        {} ({} bytes)", url, bytes.len()),
                Err(e) => println!("  Icon:        {} (unavailable: {})", url, e),
            }
        }
        Err(e) => {
            tracing::warn!("Icon cache unavailable: {}", e);
            println!("  Icon:        {}", url);
        }
    }
}

fn open_icon_store(path: &Path) -> Result<IconStore> {
    match IconStore::open(path) {
        Ok(store) => Ok(store),
        Err(e) => {
            tracing::warn!(
                "Cannot open icon cache at {}, using memory: {}",
                path.display(),
                e
            );
            Ok(IconStore::in_memory()?)
        }
    }
}
