use anyhow::{Context, Result};
use fuelwatch_core::{AppError, Config, WeatherError};
use fuelwatch_intel::SiteAdvisory;
use fuelwatch_weather::{ForecastService, GeoCoordinate};

const USAGE: &str = "usage: fuelwatch <latitude> <longitude> [days]
       fuelwatch --search <place>";

#[tokio::main]
async fn main() -> Result<()> {
    fuelwatch_core::init()?;

    let (config, _) = Config::load_validated()?;
    let service =
        ForecastService::new(&config.weather.to_engine_settings()).map_err(AppError::from)?;

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("--search") {
        let query = args[1..].join(" ");
        anyhow::ensure!(!query.is_empty(), USAGE);

        let found = service
            .search_location(&query)
            .await
            .ok_or_else(|| AppError::Weather(WeatherError::LocationNotFound(query.clone())))?;
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    let (coordinate, days) = parse_args(&args)?;
    tracing::info!(
        "Building advisory for ({}, {}) over {} days",
        coordinate.latitude,
        coordinate.longitude,
        days
    );

    let (forecast, observations) = tokio::join!(
        service.get_forecast(coordinate, days),
        service.get_observations(coordinate)
    );
    let forecast = forecast.ok_or(AppError::Weather(WeatherError::ForecastUnavailable))?;

    let advisory = SiteAdvisory::build(&forecast, &config.site.to_profile());

    let report = serde_json::json!({
        "source": forecast.source,
        "timezone": forecast.timezone,
        "days": forecast.daily.len(),
        "observations": observations,
        "advisory": advisory,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn parse_args(args: &[String]) -> Result<(GeoCoordinate, u32)> {
    let [lat, lon, rest @ ..] = args else {
        anyhow::bail!(USAGE);
    };

    let latitude: f64 = lat.parse().context("latitude must be a number")?;
    let longitude: f64 = lon.parse().context("longitude must be a number")?;
    let days: u32 = match rest.first() {
        Some(days) => days.parse().context("days must be a whole number")?,
        None => 7,
    };

    let coordinate = GeoCoordinate::new(latitude, longitude);
    if !coordinate.is_valid() {
        return Err(AppError::Weather(WeatherError::InvalidCoordinate {
            latitude,
            longitude,
        })
        .into());
    }

    Ok((coordinate, days))
}
