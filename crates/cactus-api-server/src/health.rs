//! Health check and its real-time watch channel

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

pub const HEALTH_CHECK_PATH: &str = "/api/v1/api-server/healthcheck";

/// Appended to the realtime channel path
pub const WATCH_HEALTH_CHECK_SUFFIX: &str = "/healthcheck/watch";

pub fn watch_health_check_path(realtime_channel_path: &str) -> String {
    format!(
        "{}{}",
        realtime_channel_path.trim_end_matches('/'),
        WATCH_HEALTH_CHECK_SUFFIX
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    pub success: bool,
    pub created_at: String,
    pub version: String,
}

impl HealthCheckResponse {
    pub fn now() -> Self {
        Self {
            success: true,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: crate::VERSION.to_string(),
        }
    }
}

/// GET /api/v1/api-server/healthcheck
pub async fn get_health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse::now())
}

/// GET {realtime channel}/healthcheck/watch
///
/// One health check immediately, then one per heartbeat until the client
/// disconnects.
pub async fn watch_health_check(
    heartbeat: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut ticker = tokio::time::interval(heartbeat);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let stream = stream::unfold(ticker, |mut ticker| async move {
        ticker.tick().await;
        let json = serde_json::to_string(&HealthCheckResponse::now()).unwrap_or_default();
        Some((Ok(Event::default().data(json)), ticker))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}
