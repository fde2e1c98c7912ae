// weather_exporter - Prometheus metrics exporter for weather forecasts
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use clap::Parser;
use prometheus_client::registry::Registry;
use reqwest::Client;
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::Level;
use weather_exporter::client::{ForecastClient, GeocodingClient};
use weather_exporter::config::Config;
use weather_exporter::http::RequestContext;
use weather_exporter::metrics::{ForecastMetrics, ValueStore};
use weather_exporter::poll::ForecastPoller;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9102);
const DEFAULT_REFRESH_SECS: u64 = 3600;
const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;
const DEFAULT_CONFIG_FILE: &str = "config.json";
const DEFAULT_METRICS_PATH: &str = "/metrics";
const DEFAULT_GEOCODE_URL: &str = "https://maps.googleapis.com/";
const DEFAULT_FORECAST_URL: &str = "https://api.darksky.net/";

#[derive(Debug, Parser)]
#[clap(name = "weather_exporter", version = clap::crate_version!())]
struct WeatherExporterApplication {
    /// Path to a JSON configuration file listing locations to watch, fields
    /// to export, and API keys for the geocoding and forecast services
    #[clap(long, default_value_t = DEFAULT_CONFIG_FILE.into())]
    config: String,

    /// Base URL for the geocoding API used to resolve location names
    #[clap(long, default_value_t = DEFAULT_GEOCODE_URL.into())]
    geocode_url: String,

    /// Base URL for the forecast API
    #[clap(long, default_value_t = DEFAULT_FORECAST_URL.into())]
    forecast_url: String,

    /// HTTP path to expose metrics on
    #[clap(long, default_value_t = DEFAULT_METRICS_PATH.into())]
    path: String,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Fetch weather for every configured location at this interval, in seconds.
    #[clap(long, default_value_t = DEFAULT_REFRESH_SECS)]
    refresh_secs: u64,

    /// Timeout for geocoding and forecast API requests, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    timeout_millis: u64,

    /// Address to bind to. By default, weather_exporter will bind to a public
    /// address since the purpose is to expose metrics to an external system
    /// (Prometheus or another agent for ingestion)
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = WeatherExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let config = Config::load(&opts.config).unwrap_or_else(|e| {
        tracing::error!(message = "unable to load configuration file", path = %opts.config, error = %e);
        process::exit(1)
    });

    let kinds = config.metric_kinds().unwrap_or_else(|e| {
        tracing::error!(message = "invalid metric configuration", error = %e);
        process::exit(1)
    });

    if !opts.path.starts_with('/') {
        tracing::error!(message = "metrics path must begin with '/'", path = %opts.path);
        process::exit(1)
    }

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let resolver = GeocodingClient::new(
        http_client.clone(),
        &opts.geocode_url,
        &config.google_maps_api_key,
    );
    let forecast = ForecastClient::new(
        http_client,
        &opts.forecast_url,
        &config.darksky_api_key,
        config.units,
    );

    let store = Arc::new(ValueStore::new());
    let metrics = ForecastMetrics::new(&kinds, Arc::clone(&store)).unwrap_or_else(|e| {
        tracing::error!(message = "unable to register metrics", error = %e);
        process::exit(1)
    });

    let mut registry = Registry::default();
    registry.register_collector(Box::new(metrics));

    let poller = ForecastPoller::new(
        resolver,
        forecast,
        Arc::clone(&store),
        kinds,
        config.locations.clone(),
        config.units,
        Duration::from_secs(opts.refresh_secs),
    );

    tracing::info!(
        message = "forecast polling started",
        locations = config.locations.len(),
        refresh_secs = opts.refresh_secs,
    );
    tokio::spawn(poller.run());

    let context = Arc::new(RequestContext::new(registry));
    let app = weather_exporter::http::app(&opts.path, context);

    let server = axum::Server::try_bind(&opts.bind).unwrap_or_else(|e| {
        tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
        process::exit(1)
    });

    tracing::info!(message = "server started", address = %opts.bind);
    server
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
