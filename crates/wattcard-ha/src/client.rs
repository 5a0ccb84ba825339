// Copyright (c) 2026 SOLARE S.R.O.
//
// This file is part of WattCard.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use crate::errors::{HaError, HaResult};
use crate::types::{HaEntityState, HaStatisticsRow, StatisticsPeriodRequest};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use wattcard_core::{AggregationPeriod, DateRange};

/// Home Assistant REST API client
#[derive(Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HomeAssistantClient {
    /// Create a new HA client with custom configuration
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HaError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Create HA client using Supervisor API environment variables
    /// This is the standard method for HA addons
    pub fn from_supervisor() -> HaResult<Self> {
        let base_url = "http://supervisor/core";
        let token = std::env::var("SUPERVISOR_TOKEN").map_err(|_| {
            HaError::ConfigError(
                "SUPERVISOR_TOKEN environment variable not set. Are you running as an HA addon?"
                    .to_string(),
            )
        })?;

        info!("Initializing HA client using Supervisor API");
        Self::new(base_url, token)
    }

    /// Create HA client for development/testing with custom URL
    pub fn from_env() -> HaResult<Self> {
        let base_url =
            std::env::var("HA_BASE_URL").unwrap_or_else(|_| "http://localhost:8123".to_string());
        let token = std::env::var("HA_TOKEN").map_err(|_| {
            HaError::ConfigError("HA_TOKEN environment variable not set".to_string())
        })?;

        info!("Initializing HA client for development: {}", base_url);
        Self::new(base_url, token)
    }

    /// Create HA client from configuration values
    /// Falls back to environment variables if config values are not set
    pub fn from_config(ha_base_url: Option<String>, ha_token: Option<String>) -> HaResult<Self> {
        // Try config values first, then fall back to env vars
        let base_url = ha_base_url
            .or_else(|| std::env::var("HA_BASE_URL").ok())
            .unwrap_or_else(|| "http://localhost:8123".to_string());

        let token = ha_token
            .or_else(|| std::env::var("HA_TOKEN").ok())
            .ok_or_else(|| {
                HaError::ConfigError(
                    "HA token not found in config or HA_TOKEN environment variable".to_string(),
                )
            })?;

        info!("Initializing HA client from configuration: {}", base_url);
        Self::new(base_url, token)
    }

    /// Get the state of a specific entity
    pub async fn get_state(&self, entity_id: &str) -> HaResult<HaEntityState> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        debug!("🔍 [HA QUERY] Getting state for entity: {}", entity_id);
        debug!("   URL: {}", url);

        let response = self
            .retry_request(|| async { self.client.get(&url).bearer_auth(&self.token).send().await })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let state = response.json::<HaEntityState>().await?;
                debug!("✅ [HA RESULT] Entity: {} = '{}'", entity_id, state.state);
                trace!("   Attributes: {:?}", state.attributes);
                trace!("   Last updated: {}", state.last_updated);
                Ok(state)
            }
            StatusCode::NOT_FOUND => {
                warn!("⚠️ [HA RESULT] Entity not found: {}", entity_id);
                Err(HaError::EntityNotFound(entity_id.to_string()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!(
                    "❌ [HA ERROR] Authentication failed for entity: {}",
                    entity_id
                );
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [HA ERROR] Status {}: {}", status, error_text);
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Get all states (for discovery and the config suggestion)
    pub async fn get_all_states(&self) -> HaResult<Vec<HaEntityState>> {
        let url = format!("{}/api/states", self.base_url);
        debug!("Fetching all entity states");

        let response = self
            .retry_request(|| async { self.client.get(&url).bearer_auth(&self.token).send().await })
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<Vec<HaEntityState>>().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HaError::AuthenticationFailed),
            status => Err(HaError::ApiError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Query aggregated recorder statistics for one entity
    ///
    /// # Arguments
    /// * `entity_id` - Statistic id to query (e.g., "sensor.house_consumption")
    /// * `range` - Time range; an open-ended range omits `end_time`
    /// * `period` - Bucket size (hour, day or month)
    ///
    /// # Returns
    /// The bucket rows for the entity. A response without an entry for the
    /// entity is not an error: the recorder simply has no data for the range,
    /// and the result is empty.
    pub async fn statistics_during_period(
        &self,
        entity_id: &str,
        range: &DateRange,
        period: AggregationPeriod,
    ) -> HaResult<Vec<HaStatisticsRow>> {
        let url = format!("{}/api/recorder/statistics_during_period", self.base_url);
        let request = StatisticsPeriodRequest::change_for(entity_id, range, period);

        debug!(
            "📊 [HA STATS] Querying {} statistics for: {}",
            request.period, entity_id
        );
        debug!(
            "   Time range: {} to {}",
            request.start_time.to_rfc3339(),
            request
                .end_time
                .map_or_else(|| "now".to_string(), |end| end.to_rfc3339())
        );
        debug!("   URL: {}", url);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(&request)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let mut result = response
                    .json::<HashMap<String, Vec<HaStatisticsRow>>>()
                    .await?;
                let rows = result.remove(entity_id).unwrap_or_default();
                debug!(
                    "✅ [HA STATS] {} bucket(s) for {}",
                    rows.len(),
                    entity_id
                );
                Ok(rows)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!(
                    "❌ [HA STATS] Authentication failed for entity: {}",
                    entity_id
                );
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [HA STATS] Status {}: {}", status, error_text);
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Fire an event on the Home Assistant event bus
    ///
    /// # Arguments
    /// * `event_type` - Event type name (e.g., "wattcard_action")
    /// * `data` - JSON payload attached to the event
    pub async fn fire_event(&self, event_type: &str, data: Value) -> HaResult<()> {
        let url = format!("{}/api/events/{}", self.base_url, event_type);
        info!("📣 [HA EVENT] Firing: {}", event_type);
        debug!("   Data: {}", data);
        debug!("   URL: {}", url);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(&data)
                    .send()
                    .await
            })
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                info!("✅ [HA EVENT] Fired: {}", event_type);
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [HA EVENT] Authentication failed for: {}", event_type);
                Err(HaError::AuthenticationFailed)
            }
            _status => {
                let error_msg = response.text().await.unwrap_or_default();
                error!("❌ [HA EVENT] Failed: {} (status: {})", event_type, status);
                error!("   Error: {}", error_msg);
                Err(HaError::EventDispatchFailed {
                    event: event_type.to_string(),
                    reason: error_msg,
                })
            }
        }
    }

    /// Health check - ping HA API
    pub async fn ping(&self) -> HaResult<bool> {
        let url = format!("{}/api/", self.base_url);
        debug!("Performing health check");

        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => {
                let is_ok = response.status().is_success();
                if is_ok {
                    debug!("Health check passed");
                } else {
                    warn!("Health check failed: status {}", response.status());
                }
                Ok(is_ok)
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                Ok(false) // Don't error on health check failure
            }
        }
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> HaResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    return Err(HaError::HttpError(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                }
            }
        }
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_state_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states/sensor.house_consumption")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "entity_id": "sensor.house_consumption",
                    "state": "42.5",
                    "attributes": { "unit_of_measurement": "kWh" },
                    "last_changed": "2026-05-01T10:00:00Z",
                    "last_updated": "2026-05-01T10:00:00Z"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let state = client.get_state("sensor.house_consumption").await.unwrap();

        assert_eq!(state.entity_id, "sensor.house_consumption");
        assert_eq!(state.state, "42.5");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_state_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states/sensor.nonexistent")
            .match_header("authorization", "Bearer test_token")
            .with_status(404)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client.get_state("sensor.nonexistent").await;

        assert!(matches!(result, Err(HaError::EntityNotFound(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_state_unauthorized() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states/sensor.house_consumption")
            .with_status(401)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "bad_token").unwrap();
        let result = client.get_state("sensor.house_consumption").await;

        assert!(matches!(result, Err(HaError::AuthenticationFailed)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_statistics_during_period_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/recorder/statistics_during_period")
            .match_header("authorization", "Bearer test_token")
            .match_body(Matcher::Json(json!({
                "type": "recorder/statistics_during_period",
                "start_time": "2026-05-01T00:00:00Z",
                "end_time": "2026-05-08T00:00:00Z",
                "statistic_ids": ["sensor.house_consumption"],
                "period": "day",
                "types": ["change"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "sensor.house_consumption": [
                        { "start": 1_777_593_600_000u64, "end": 1_777_680_000_000u64, "change": 1.5 },
                        { "start": 1_777_680_000_000u64, "end": 1_777_766_400_000u64, "change": 2.5 }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 5, 8, 0, 0, 0).unwrap(),
        );
        let rows = client
            .statistics_during_period("sensor.house_consumption", &range, AggregationPeriod::Day)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].change, Some(1.5));
        assert_eq!(rows[1].change, Some(2.5));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_statistics_missing_entity_is_empty() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/recorder/statistics_during_period")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let range = DateRange::since(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());
        let rows = client
            .statistics_during_period("sensor.house_consumption", &range, AggregationPeriod::Hour)
            .await
            .unwrap();

        assert!(rows.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fire_event_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/events/wattcard_action")
            .match_header("authorization", "Bearer test_token")
            .match_body(Matcher::Json(json!({
                "action": "more-info",
                "entity_id": "sensor.house_consumption"
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client
            .fire_event(
                "wattcard_action",
                json!({ "action": "more-info", "entity_id": "sensor.house_consumption" }),
            )
            .await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fire_event_failure() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/events/wattcard_action")
            .with_status(500)
            .with_body("event bus unavailable")
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client.fire_event("wattcard_action", json!({})).await;

        assert!(matches!(
            result,
            Err(HaError::EventDispatchFailed { .. })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ping_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client.ping().await.unwrap();

        assert!(result);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retry_logic() {
        let mut server = Server::new_async().await;

        // Mock will fail twice then succeed - mockito handles multiple responses
        let mock = server
            .mock("GET", "/api/states/sensor.test")
            .with_status(200)
            .with_body(
                json!({
                    "entity_id": "sensor.test",
                    "state": "ok",
                    "attributes": {},
                    "last_changed": "2026-05-01T10:00:00Z",
                    "last_updated": "2026-05-01T10:00:00Z"
                })
                .to_string(),
            )
            .expect_at_least(1)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token")
            .unwrap()
            .with_retry_config(3, Duration::from_millis(10));

        let result = client.get_state("sensor.test").await;
        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_all_states() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {
                        "entity_id": "sensor.house_consumption",
                        "state": "42.5",
                        "attributes": { "device_class": "energy" },
                        "last_changed": "2026-05-01T10:00:00Z",
                        "last_updated": "2026-05-01T10:00:00Z"
                    },
                    {
                        "entity_id": "sun.sun",
                        "state": "above_horizon",
                        "attributes": {},
                        "last_changed": "2026-05-01T10:00:00Z",
                        "last_updated": "2026-05-01T10:00:00Z"
                    }
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let states = client.get_all_states().await.unwrap();

        assert_eq!(states.len(), 2);
        assert_eq!(states[0].entity_id, "sensor.house_consumption");
        mock.assert_async().await;
    }
}
