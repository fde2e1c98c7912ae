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

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// State shared with every request handler.
pub struct RequestContext {
    registry: Registry,
}

impl RequestContext {
    pub fn new(registry: Registry) -> Self {
        RequestContext { registry }
    }
}

/// Create a router serving text format metrics at the given path.
pub fn app(path: &str, context: Arc<RequestContext>) -> Router {
    Router::new()
        .route(path, get(text_metrics))
        .with_state(context)
        .layer(TraceLayer::new_for_http())
}

/// Encode the registry contents in text exposition format.
///
/// Serves whatever the value store currently holds, which is nothing until
/// the first refresh cycle completes. Never triggers an upstream fetch.
async fn text_metrics(State(context): State<Arc<RequestContext>>) -> Response {
    let mut buffer = String::new();

    match encode(&mut buffer, &context.registry) {
        Ok(()) => {
            tracing::debug!(
                message = "encoded prometheus metrics to text format",
                num_bytes = buffer.len(),
            );

            ([(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], buffer).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
