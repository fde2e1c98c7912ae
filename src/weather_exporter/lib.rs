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

//! Prometheus metrics exporter for weather forecasts
//!
//! ## Features
//!
//! `weather_exporter` periodically resolves a list of place names to coordinates using a
//! geocoding API, fetches the current weather for each of them from a forecast API, and emits
//! a configurable subset of the readings as Prometheus metrics. Forecasts are fetched on a
//! fixed interval in the background: scraping the exporter never waits on either upstream API.
//!
//! Supported fields, each exported as `weather_<field>` with `location`, `latitude`, and
//! `longitude` labels:
//!
//! * `weather_temperature{location=$NAME}` - Temperature.
//! * `weather_apparent_temperature{location=$NAME}` - Apparent ("feels like") temperature.
//! * `weather_wind_speed{location=$NAME}` - Wind speed.
//! * `weather_cloud_cover{location=$NAME}` - Fraction of sky covered by cloud (0-1).
//! * `weather_humidity{location=$NAME}` - Relative humidity (0-1).
//! * `weather_precip_intensity{location=$NAME}` - Precipitation intensity.
//!
//! Units follow the unit system configured with `units` (SI by default). Readings that come
//! back in any other unit system are discarded.
//!
//! ## Build
//!
//! `weather_exporter` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:56quarters/weather_exporter.git && cd weather_exporter
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! ### Configuration file
//!
//! The exporter is configured with a JSON file listing the locations to watch, the fields to
//! export, and API keys for the geocoding and forecast services.
//!
//! ```json
//! {
//!     "locations": ["Dublin", "Boston"],
//!     "metrics": ["temperature", "humidity", "wind_speed"],
//!     "units": "si",
//!     "google_maps_api_key": "...",
//!     "darksky_api_key": "..."
//! }
//! ```
//!
//! At least one location and one metric are required, and every metric must name one of the
//! supported fields above; anything else fails at startup.
//!
//! ```text
//! ./weather_exporter --config /etc/weather_exporter/config.json
//! ```
//!
//! ### Run
//!
//! You can run `weather_exporter` as a Systemd service using the
//! [provided unit file](ext/weather_exporter.service). This unit file assumes that you have
//! copied the resulting `weather_exporter` binary to `/usr/local/bin/weather_exporter` and
//! your configuration file to `/etc/weather_exporter/config.json`.
//!
//! ```text
//! sudo cp target/release/weather_exporter /usr/local/bin/weather_exporter
//! sudo cp ext/weather_exporter.service /etc/systemd/system/weather_exporter.service
//! sudo systemctl daemon-reload
//! sudo systemctl enable weather_exporter.service
//! sudo systemctl start weather_exporter.service
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9102` at `/metrics`. Once `weather_exporter`
//! is running, configure scrapes of it by your Prometheus server. Add the host running
//! `weather_exporter` as a target under the Prometheus `scrape_configs` section as described
//! by the example below.
//!
//! ```yaml
//! # Sample config for Prometheus.
//!
//! global:
//!   scrape_interval:     15s
//!   evaluation_interval: 15s
//!   external_labels:
//!     monitor: 'my_prom'
//!
//! scrape_configs:
//! - job_name: weather_exporter
//!   static_configs:
//!   - targets: ['example:9102']
//! ```
//!

pub mod client;
pub mod config;
pub mod http;
pub mod metrics;
pub mod poll;
