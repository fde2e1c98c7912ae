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

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::error;
use std::fmt;

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    NoMatch(String),
    Unexpected(StatusCode, Url),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::NoMatch(name) => write!(f, "no location found for {}", name),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// A place name resolved to geographic coordinates, fixed for the duration
/// of a refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Resolve a human-readable place name to a `Location`.
#[async_trait]
pub trait ResolveLocation: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Location, ClientError>;
}

/// Fetch the current forecast reading for a set of coordinates.
#[async_trait]
pub trait FetchForecast: Send + Sync {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Forecast, ClientError>;
}

/// Client for a Google Maps style geocoding API.
#[derive(Debug)]
pub struct GeocodingClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl GeocodingClient {
    const USER_AGENT: &'static str =
        "Weather Prometheus Exporter (https://github.com/56quarters/weather_exporter)";
    const JSON_RESPONSE: &'static str = "application/json";

    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        GeocodingClient {
            client,
            // TODO(56quarters): Handle this better
            base_url: Url::parse(base_url).unwrap(),
            api_key: api_key.to_owned(),
        }
    }

    pub async fn geocode(&self, name: &str) -> Result<Location, ClientError> {
        let url = self.geocode_url(name);
        tracing::debug!(message = "making geocoding request", address = %name);

        let res = self.make_request(url).await?;
        let body = res.json::<GeocodeResponse>().await.map_err(ClientError::Internal)?;

        let result = match body.results.first() {
            Some(r) => r,
            None => return Err(ClientError::NoMatch(name.to_owned())),
        };

        // The first address component carries the most specific name the
        // geocoder matched; fall back to the query itself when absent.
        let display_name = result
            .address_components
            .first()
            .map(|c| c.long_name.clone())
            .unwrap_or_else(|| name.to_owned());

        Ok(Location {
            name: display_name,
            latitude: result.geometry.location.lat,
            longitude: result.geometry.location.lng,
        })
    }

    async fn make_request(&self, url: Url) -> Result<Response, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        if status == StatusCode::OK {
            Ok(res)
        } else {
            Err(ClientError::Unexpected(status, url))
        }
    }

    fn geocode_url(&self, address: &str) -> Url {
        let mut url = self.base_url.clone();
        {
            url.path_segments_mut()
                .map(|mut p| {
                    p.clear().push("maps").push("api").push("geocode").push("json");
                })
                .expect("unable to modify geocode URL path segments");
        }

        url.query_pairs_mut()
            .append_pair("address", address)
            .append_pair("key", &self.api_key);

        url
    }
}

#[async_trait]
impl ResolveLocation for GeocodingClient {
    async fn resolve(&self, name: &str) -> Result<Location, ClientError> {
        self.geocode(name).await
    }
}

/// Client for a Dark Sky style forecast API.
#[derive(Debug)]
pub struct ForecastClient {
    client: Client,
    base_url: Url,
    api_key: String,
    units: Units,
}

impl ForecastClient {
    const USER_AGENT: &'static str =
        "Weather Prometheus Exporter (https://github.com/56quarters/weather_exporter)";
    const JSON_RESPONSE: &'static str = "application/json";

    pub fn new(client: Client, base_url: &str, api_key: &str, units: Units) -> Self {
        ForecastClient {
            client,
            // TODO(56quarters): Handle this better
            base_url: Url::parse(base_url).unwrap(),
            api_key: api_key.to_owned(),
            units,
        }
    }

    pub async fn forecast(&self, latitude: f64, longitude: f64) -> Result<Forecast, ClientError> {
        let url = self.forecast_url(latitude, longitude);
        tracing::debug!(
            message = "making forecast request",
            latitude = latitude,
            longitude = longitude,
        );

        let res = self.make_request(url).await?;
        Ok(res.json::<Forecast>().await.map_err(ClientError::Internal)?)
    }

    async fn make_request(&self, url: Url) -> Result<Response, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        if status == StatusCode::OK {
            Ok(res)
        } else {
            Err(ClientError::Unexpected(status, url))
        }
    }

    fn forecast_url(&self, latitude: f64, longitude: f64) -> Url {
        let encoded_key = utf8_percent_encode(&self.api_key, NON_ALPHANUMERIC);
        let mut url = self.base_url.clone();
        {
            url.path_segments_mut()
                .map(|mut p| {
                    p.clear()
                        .push("forecast")
                        .push(&encoded_key.to_string())
                        .push(&format!("{},{}", latitude, longitude));
                })
                .expect("unable to modify forecast URL path segments");
        }

        url.query_pairs_mut()
            .append_pair("units", self.units.as_str())
            .append_pair("exclude", "minutely,hourly,daily,alerts");

        url
    }
}

#[async_trait]
impl FetchForecast for ForecastClient {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Forecast, ClientError> {
        self.forecast(latitude, longitude).await
    }
}

/// Unit system a forecast reading is expressed in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Si,
    Us,
    Ca,
    Uk2,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Si => "si",
            Self::Us => "us",
            Self::Ca => "ca",
            Self::Uk2 => "uk2",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GeocodeResponse {
    #[serde(alias = "status")]
    pub status: String,
    #[serde(alias = "results")]
    pub results: Vec<GeocodeResult>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GeocodeResult {
    #[serde(alias = "address_components")]
    pub address_components: Vec<AddressComponent>,
    #[serde(alias = "formatted_address")]
    pub formatted_address: Option<String>,
    #[serde(alias = "geometry")]
    pub geometry: Geometry,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AddressComponent {
    #[serde(alias = "long_name")]
    pub long_name: String,
    #[serde(alias = "short_name")]
    pub short_name: String,
    #[serde(alias = "types")]
    pub types: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Geometry {
    #[serde(alias = "location")]
    pub location: LatLng,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LatLng {
    #[serde(alias = "lat")]
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lng: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Forecast {
    #[serde(alias = "latitude")]
    pub latitude: f64,
    #[serde(alias = "longitude")]
    pub longitude: f64,
    #[serde(alias = "timezone")]
    pub timezone: Option<String>,
    #[serde(alias = "currently")]
    pub currently: DataPoint,
    #[serde(alias = "flags")]
    pub flags: Flags,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DataPoint {
    #[serde(alias = "time")]
    pub time: i64,
    #[serde(alias = "summary")]
    pub summary: Option<String>,
    #[serde(alias = "icon")]
    pub icon: Option<String>,
    #[serde(alias = "temperature")]
    pub temperature: Option<f64>,
    #[serde(alias = "apparentTemperature")]
    pub apparent_temperature: Option<f64>,
    #[serde(alias = "windSpeed")]
    pub wind_speed: Option<f64>,
    #[serde(alias = "cloudCover")]
    pub cloud_cover: Option<f64>,
    #[serde(alias = "humidity")]
    pub humidity: Option<f64>,
    #[serde(alias = "precipIntensity")]
    pub precip_intensity: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Flags {
    #[serde(alias = "units")]
    pub units: Units,
    #[serde(alias = "sources")]
    pub sources: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::{ClientError, ForecastClient, GeocodingClient, Units};
    use reqwest::Client;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GEOCODE_RESPONSE: &str = r#"{
        "status": "OK",
        "results": [
            {
                "address_components": [
                    {"long_name": "Dublin", "short_name": "Dublin", "types": ["locality"]},
                    {"long_name": "Ireland", "short_name": "IE", "types": ["country"]}
                ],
                "formatted_address": "Dublin, Ireland",
                "geometry": {"location": {"lat": 53.35, "lng": -6.26}}
            }
        ]
    }"#;

    const FORECAST_RESPONSE: &str = r#"{
        "latitude": 53.35,
        "longitude": -6.26,
        "timezone": "Europe/Dublin",
        "currently": {
            "time": 1650462000,
            "summary": "Overcast",
            "icon": "cloudy",
            "temperature": 12.3,
            "apparentTemperature": 11.1,
            "windSpeed": 5.4,
            "cloudCover": 0.92,
            "humidity": 0.81
        },
        "flags": {"units": "si"}
    }"#;

    #[tokio::test]
    async fn test_geocode_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .and(query_param("address", "Dublin"))
            .and(query_param("key", "geo-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(GEOCODE_RESPONSE, "application/json"))
            .mount(&server)
            .await;

        let client = GeocodingClient::new(Client::new(), &server.uri(), "geo-key");
        let location = client.geocode("Dublin").await.unwrap();

        assert_eq!("Dublin", location.name);
        assert_eq!(53.35, location.latitude);
        assert_eq!(-6.26, location.longitude);
    }

    #[tokio::test]
    async fn test_geocode_no_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"status": "ZERO_RESULTS", "results": []}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let client = GeocodingClient::new(Client::new(), &server.uri(), "geo-key");
        let res = client.geocode("Atlantis").await;

        assert!(matches!(res, Err(ClientError::NoMatch(_))), "unexpected result: {:?}", res);
    }

    #[tokio::test]
    async fn test_geocode_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GeocodingClient::new(Client::new(), &server.uri(), "geo-key");
        let res = client.geocode("Dublin").await;

        assert!(matches!(res, Err(ClientError::Unexpected(_, _))), "unexpected result: {:?}", res);
    }

    #[tokio::test]
    async fn test_forecast_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast/fc-key/53.35,-6.26"))
            .and(query_param("units", "si"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FORECAST_RESPONSE, "application/json"))
            .mount(&server)
            .await;

        let client = ForecastClient::new(Client::new(), &server.uri(), "fc-key", Units::Si);
        let forecast = client.forecast(53.35, -6.26).await.unwrap();

        assert_eq!(Units::Si, forecast.flags.units);
        assert_eq!(Some(12.3), forecast.currently.temperature);
        assert_eq!(Some(11.1), forecast.currently.apparent_temperature);
        assert_eq!(Some(5.4), forecast.currently.wind_speed);
        assert_eq!(None, forecast.currently.precip_intensity);
    }

    #[tokio::test]
    async fn test_forecast_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast/fc-key/53.35,-6.26"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = ForecastClient::new(Client::new(), &server.uri(), "fc-key", Units::Si);
        let res = client.forecast(53.35, -6.26).await;

        assert!(matches!(res, Err(ClientError::Unexpected(_, _))), "unexpected result: {:?}", res);
    }
}
