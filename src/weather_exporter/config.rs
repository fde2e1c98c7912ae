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

use crate::client::Units;
use crate::metrics::{MetricKind, MetricsError};
use serde::{Deserialize, Serialize};
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, io::Error),
    Parse(PathBuf, serde_json::Error),
    NoLocations,
    NoMetrics,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "unable to read {}: {}", path.display(), e),
            Self::Parse(path, e) => write!(f, "unable to parse {}: {}", path.display(), e),
            Self::NoLocations => write!(f, "at least one location is required"),
            Self::NoMetrics => write!(f, "at least one metric is required"),
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(_, e) => Some(e),
            Self::Parse(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Runtime configuration: the locations to watch, the forecast fields to
/// export for each of them, the unit system readings are expected in, and
/// credentials for the geocoding and forecast services.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(alias = "locations")]
    pub locations: Vec<String>,
    #[serde(alias = "metrics")]
    pub metrics: Vec<String>,
    #[serde(alias = "units", default)]
    pub units: Units,
    #[serde(alias = "google_maps_api_key")]
    pub google_maps_api_key: String,
    #[serde(alias = "darksky_api_key")]
    pub darksky_api_key: String,
}

impl Config {
    /// Load configuration from a JSON file, requiring at least one location
    /// and one metric.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ConfigError::Io(path.to_owned(), e))?;
        let config: Config =
            serde_json::from_slice(&bytes).map_err(|e| ConfigError::Parse(path.to_owned(), e))?;

        if config.locations.is_empty() {
            return Err(ConfigError::NoLocations);
        }

        if config.metrics.is_empty() {
            return Err(ConfigError::NoMetrics);
        }

        Ok(config)
    }

    /// Check every configured metric name against the supported field set.
    pub fn metric_kinds(&self) -> Result<Vec<MetricKind>, MetricsError> {
        self.metrics.iter().map(|m| MetricKind::from_name(m)).collect()
    }
}
