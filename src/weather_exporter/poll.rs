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

use crate::client::{ClientError, FetchForecast, ResolveLocation, Units};
use crate::metrics::{MetricKind, ValueStore};
use std::error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Level};

#[derive(Debug)]
pub enum RefreshError {
    Resolve(ClientError),
    Fetch(ClientError),
    UnitMismatch { expected: Units, actual: Units },
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(e) => write!(f, "unable to resolve location: {}", e),
            Self::Fetch(e) => write!(f, "unable to fetch forecast: {}", e),
            Self::UnitMismatch { expected, actual } => {
                write!(f, "units are not {}: got {}", expected, actual)
            }
        }
    }
}

impl error::Error for RefreshError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Resolve(e) => Some(e),
            Self::Fetch(e) => Some(e),
            _ => None,
        }
    }
}

/// Periodically refreshes the value store from the geocoding and forecast
/// services, one cycle per interval, for the life of the process.
///
/// Cycles run on a single task and never overlap. Within a cycle every
/// configured location is handled independently: a resolution or fetch
/// failure, or a reading in the wrong unit system, is logged and skips that
/// location until the next cycle, leaving its previous values in place.
/// Scrapes read the store directly and are never delayed by a cycle.
pub struct ForecastPoller<R, F> {
    resolver: R,
    client: F,
    store: Arc<ValueStore>,
    kinds: Vec<MetricKind>,
    locations: Vec<String>,
    units: Units,
    interval: Duration,
}

impl<R, F> ForecastPoller<R, F>
where
    R: ResolveLocation,
    F: FetchForecast,
{
    pub fn new(
        resolver: R,
        client: F,
        store: Arc<ValueStore>,
        kinds: Vec<MetricKind>,
        locations: Vec<String>,
        units: Units,
        interval: Duration,
    ) -> Self {
        ForecastPoller {
            resolver,
            client,
            store,
            kinds,
            locations,
            units,
            interval,
        }
    }

    /// Run refresh cycles forever: one immediately, then one per interval.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            let _ = interval.tick().await;
            self.refresh()
                .instrument(tracing::span!(Level::DEBUG, "weather_refresh"))
                .await;
        }
    }

    /// Run a single refresh cycle over every configured location.
    pub async fn refresh(&self) {
        for name in &self.locations {
            if let Err(e) = self.refresh_location(name).await {
                tracing::error!(message = "failed to refresh weather", location = %name, error = %e);
            }
        }
    }

    async fn refresh_location(&self, name: &str) -> Result<(), RefreshError> {
        let location = self.resolver.resolve(name).await.map_err(RefreshError::Resolve)?;
        let forecast = self
            .client
            .fetch(location.latitude, location.longitude)
            .await
            .map_err(RefreshError::Fetch)?;

        // A reading in the wrong unit system is discarded wholesale rather
        // than publishing values that don't mean what their names say.
        if forecast.flags.units != self.units {
            return Err(RefreshError::UnitMismatch {
                expected: self.units,
                actual: forecast.flags.units,
            });
        }

        for kind in &self.kinds {
            match kind.extract(&forecast.currently) {
                Some(value) => {
                    self.store
                        .set(*kind, &location.name, value, location.latitude, location.longitude);
                }
                None => {
                    tracing::warn!(
                        message = "field missing from forecast, skipping",
                        field = kind.field_name(),
                        location = %location.name,
                    );
                }
            }
        }

        tracing::info!(
            message = "fetched new forecast",
            location = %location.name,
            observed_at = forecast.currently.time,
        );

        Ok(())
    }
}
