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

use crate::client::DataPoint;
use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::metrics::MetricType;
use std::collections::{HashMap, HashSet};
use std::error;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

const LABEL_LOCATION: &str = "location";
const LABEL_LATITUDE: &str = "latitude";
const LABEL_LONGITUDE: &str = "longitude";

#[derive(Debug)]
pub enum MetricsError {
    UnsupportedField(String),
    Duplicate(&'static str),
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedField(name) => write!(f, "unsupported field {}", name),
            Self::Duplicate(name) => write!(f, "metric {} registered more than once", name),
        }
    }
}

impl error::Error for MetricsError {}

/// A forecast field that can be exported as a gauge.
///
/// The set of supported fields is closed: configured field names are checked
/// against it once at startup so a typo fails the process instead of being
/// discovered scrape by scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    Temperature,
    ApparentTemperature,
    WindSpeed,
    CloudCover,
    Humidity,
    PrecipIntensity,
}

impl MetricKind {
    pub fn from_name(name: &str) -> Result<Self, MetricsError> {
        match name {
            "temperature" => Ok(Self::Temperature),
            "apparent_temperature" => Ok(Self::ApparentTemperature),
            "wind_speed" => Ok(Self::WindSpeed),
            "cloud_cover" => Ok(Self::CloudCover),
            "humidity" => Ok(Self::Humidity),
            "precip_intensity" => Ok(Self::PrecipIntensity),
            _ => Err(MetricsError::UnsupportedField(name.to_owned())),
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::ApparentTemperature => "apparent_temperature",
            Self::WindSpeed => "wind_speed",
            Self::CloudCover => "cloud_cover",
            Self::Humidity => "humidity",
            Self::PrecipIntensity => "precip_intensity",
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            Self::Temperature => "weather_temperature",
            Self::ApparentTemperature => "weather_apparent_temperature",
            Self::WindSpeed => "weather_wind_speed",
            Self::CloudCover => "weather_cloud_cover",
            Self::Humidity => "weather_humidity",
            Self::PrecipIntensity => "weather_precip_intensity",
        }
    }

    pub fn help(&self) -> String {
        format!("Weather forecast - {}", self.field_name().replace('_', " "))
    }

    /// Read this field from a forecast reading. `None` means the reading
    /// didn't include the field, which fails only this metric.
    pub fn extract(&self, point: &DataPoint) -> Option<f64> {
        match self {
            Self::Temperature => point.temperature,
            Self::ApparentTemperature => point.apparent_temperature,
            Self::WindSpeed => point.wind_speed,
            Self::CloudCover => point.cloud_cover,
            Self::Humidity => point.humidity,
            Self::PrecipIntensity => point.precip_intensity,
        }
    }
}

/// The most recent successfully extracted value for one (metric, location)
/// pair, with the resolved coordinates it was observed at.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueEntry {
    pub metric: MetricKind,
    pub location: String,
    pub value: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub updated: SystemTime,
}

/// Latest-value store bridging the polling task and the scrape handlers.
///
/// The poller is the only writer; any number of scrape handlers read
/// concurrently via `snapshot()`. Entries are only ever overwritten, never
/// removed: a failed refresh leaves the previous value in place.
#[derive(Debug, Default)]
pub struct ValueStore {
    entries: RwLock<HashMap<(MetricKind, String), ValueEntry>>,
}

impl ValueStore {
    pub fn new() -> Self {
        ValueStore {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Overwrite the entry for `(metric, location)` with a new value.
    pub fn set(&self, metric: MetricKind, location: &str, value: f64, latitude: f64, longitude: f64) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            (metric, location.to_owned()),
            ValueEntry {
                metric,
                location: location.to_owned(),
                value,
                latitude,
                longitude,
                updated: SystemTime::now(),
            },
        );
    }

    /// Point-in-time copy of every entry, ordered by metric then location.
    pub fn snapshot(&self) -> Vec<ValueEntry> {
        let entries = self.entries.read().unwrap();
        let mut snapshot: Vec<ValueEntry> = entries.values().cloned().collect();
        snapshot.sort_by(|a, b| (a.metric, &a.location).cmp(&(b.metric, &b.location)));
        snapshot
    }
}

/// Exposes the contents of a `ValueStore` as Prometheus gauges.
///
/// One gauge per configured metric kind, named `weather_<field>`, with
/// `location`, `latitude`, and `longitude` labels per entry. Implemented as
/// a collector so each scrape encodes whatever the store holds at that
/// moment without touching any upstream service.
#[derive(Debug)]
pub struct ForecastMetrics {
    kinds: Vec<MetricKind>,
    store: Arc<ValueStore>,
}

impl ForecastMetrics {
    /// Create a new `ForecastMetrics` for the given metric kinds.
    ///
    /// Returns an error if the same kind is configured more than once.
    pub fn new(kinds: &[MetricKind], store: Arc<ValueStore>) -> Result<Self, MetricsError> {
        let mut seen = HashSet::new();
        for kind in kinds {
            if !seen.insert(*kind) {
                return Err(MetricsError::Duplicate(kind.metric_name()));
            }
        }

        Ok(ForecastMetrics {
            kinds: kinds.to_vec(),
            store,
        })
    }
}

impl Collector for ForecastMetrics {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        let snapshot = self.store.snapshot();

        for kind in &self.kinds {
            let help = kind.help();
            let mut metric_encoder =
                encoder.encode_descriptor(kind.metric_name(), &help, None, MetricType::Gauge)?;

            for entry in snapshot.iter().filter(|e| e.metric == *kind) {
                let labels = vec![
                    (LABEL_LOCATION.to_owned(), entry.location.clone()),
                    (LABEL_LATITUDE.to_owned(), format!("{:.6}", entry.latitude)),
                    (LABEL_LONGITUDE.to_owned(), format!("{:.6}", entry.longitude)),
                ];

                let gauge = ConstGauge::new(entry.value);
                gauge.encode(metric_encoder.encode_family(&labels)?)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ForecastMetrics, MetricKind, MetricsError, ValueStore};
    use crate::client::DataPoint;
    use prometheus_client::encoding::text::encode;
    use prometheus_client::registry::Registry;
    use std::sync::Arc;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(MetricKind::Temperature, MetricKind::from_name("temperature").unwrap());
        assert_eq!(
            MetricKind::ApparentTemperature,
            MetricKind::from_name("apparent_temperature").unwrap()
        );
        assert_eq!(MetricKind::PrecipIntensity, MetricKind::from_name("precip_intensity").unwrap());
    }

    #[test]
    fn test_kind_from_name_unsupported() {
        let res = MetricKind::from_name("bogus_field");
        assert!(
            matches!(res, Err(MetricsError::UnsupportedField(_))),
            "unexpected result: {:?}",
            res
        );
    }

    #[test]
    fn test_kind_extract() {
        let point = DataPoint {
            temperature: Some(12.3),
            humidity: Some(0.81),
            ..Default::default()
        };

        assert_eq!(Some(12.3), MetricKind::Temperature.extract(&point));
        assert_eq!(Some(0.81), MetricKind::Humidity.extract(&point));
        assert_eq!(None, MetricKind::WindSpeed.extract(&point));
    }

    #[test]
    fn test_store_set_and_snapshot() {
        let store = ValueStore::new();
        store.set(MetricKind::Humidity, "Dublin", 0.81, 53.35, -6.26);
        store.set(MetricKind::Temperature, "Dublin", 12.3, 53.35, -6.26);
        store.set(MetricKind::Temperature, "Boston", 8.2, 42.36, -71.06);

        let snapshot = store.snapshot();
        assert_eq!(3, snapshot.len());
        // ordered by metric then location
        assert_eq!("Boston", snapshot[0].location);
        assert_eq!(MetricKind::Temperature, snapshot[0].metric);
        assert_eq!("Dublin", snapshot[1].location);
        assert_eq!(MetricKind::Temperature, snapshot[1].metric);
        assert_eq!(MetricKind::Humidity, snapshot[2].metric);
    }

    #[test]
    fn test_store_set_overwrites() {
        let store = ValueStore::new();
        store.set(MetricKind::Temperature, "Dublin", 12.3, 53.35, -6.26);
        store.set(MetricKind::Temperature, "Dublin", 14.0, 53.35, -6.26);

        let snapshot = store.snapshot();
        assert_eq!(1, snapshot.len());
        assert_eq!(14.0, snapshot[0].value);
    }

    #[test]
    fn test_forecast_metrics_duplicate_kind() {
        let store = Arc::new(ValueStore::new());
        let res = ForecastMetrics::new(&[MetricKind::Temperature, MetricKind::Temperature], store);
        assert!(matches!(res, Err(MetricsError::Duplicate(_))), "unexpected result: {:?}", res);
    }

    #[test]
    fn test_collector_encode() {
        let store = Arc::new(ValueStore::new());
        store.set(MetricKind::Temperature, "Dublin", 12.3, 53.35, -6.26);

        let metrics = ForecastMetrics::new(&[MetricKind::Temperature], Arc::clone(&store)).unwrap();
        let mut registry = Registry::default();
        registry.register_collector(Box::new(metrics));

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();

        assert!(
            buffer.contains(
                r#"weather_temperature{location="Dublin",latitude="53.350000",longitude="-6.260000"} 12.3"#
            ),
            "unexpected encoding: {}",
            buffer
        );
    }

    #[test]
    fn test_collector_encode_empty_store() {
        let store = Arc::new(ValueStore::new());
        let metrics = ForecastMetrics::new(&[MetricKind::Temperature], store).unwrap();
        let mut registry = Registry::default();
        registry.register_collector(Box::new(metrics));

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();

        assert!(buffer.contains("# TYPE weather_temperature gauge"), "unexpected encoding: {}", buffer);
        assert!(!buffer.contains("weather_temperature{"), "unexpected encoding: {}", buffer);
    }
}
