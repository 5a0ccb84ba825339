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

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::HomeAssistantClient;
use crate::errors::HaError;
use wattcard_core::{
    ActionDispatcher, ActionRequest, AggregationPeriod, DateRange, EntityState, EntityStateSource,
    StatisticsBucket, StatisticsSource,
};

/// Event type fired on the HA event bus for card actions.
pub const ACTION_EVENT_TYPE: &str = "wattcard_action";

/// Home Assistant adapter implementing EntityStateSource
pub struct HaStateAdapter {
    client: Arc<HomeAssistantClient>,
}

impl HaStateAdapter {
    /// Create a new HA state adapter
    pub fn new(client: Arc<HomeAssistantClient>) -> Self {
        Self { client }
    }

    /// Get reference to the underlying HA client
    pub fn client(&self) -> &Arc<HomeAssistantClient> {
        &self.client
    }
}

#[async_trait]
impl EntityStateSource for HaStateAdapter {
    async fn entity_state(&self, entity_id: &str) -> Result<Option<EntityState>> {
        debug!("🔍 [ADAPTER] Reading entity: {}", entity_id);
        match self.client.get_state(entity_id).await {
            Ok(state) => {
                debug!("✅ [ADAPTER] {} = '{}'", entity_id, state.state);
                Ok(Some(state.into()))
            }
            // an unknown id is a value, not an error; the card renders an
            // inline message for it
            Err(HaError::EntityNotFound(_)) => Ok(None),
            Err(error) => Err(anyhow::anyhow!(error))
                .with_context(|| format!("Failed to read entity: {}", entity_id)),
        }
    }

    async fn all_entity_states(&self) -> Result<Vec<EntityState>> {
        let states = self
            .client
            .get_all_states()
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to list entity states")?;

        info!("✅ [ADAPTER] Retrieved {} entity states", states.len());
        Ok(states.into_iter().map(Into::into).collect())
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.ping().await.map_err(|e| anyhow::anyhow!(e))
    }

    fn name(&self) -> &str {
        "HomeAssistant"
    }
}

/// Home Assistant recorder adapter implementing StatisticsSource
pub struct HaStatisticsAdapter {
    client: Arc<HomeAssistantClient>,
}

impl HaStatisticsAdapter {
    /// Create a new HA statistics adapter
    pub fn new(client: Arc<HomeAssistantClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatisticsSource for HaStatisticsAdapter {
    async fn change_statistics(
        &self,
        entity_id: &str,
        range: &DateRange,
        period: AggregationPeriod,
    ) -> Result<Vec<StatisticsBucket>> {
        info!(
            "📊 [ADAPTER] Querying {} change statistics for: {}",
            period.as_str(),
            entity_id
        );

        let rows = self
            .client
            .statistics_during_period(entity_id, range, period)
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Failed to query statistics for: {}", entity_id))?;

        let buckets: Vec<StatisticsBucket> = rows.into_iter().map(Into::into).collect();
        debug!("✅ [ADAPTER] {} bucket(s) for {}", buckets.len(), entity_id);
        Ok(buckets)
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.ping().await.map_err(|e| anyhow::anyhow!(e))
    }

    fn name(&self) -> &str {
        "HomeAssistantRecorder"
    }
}

/// Event-bus adapter implementing ActionDispatcher
///
/// Card actions become events on the HA event bus, where automations or a
/// frontend companion can react to them.
pub struct HaEventActionAdapter {
    client: Arc<HomeAssistantClient>,
    event_type: String,
}

impl HaEventActionAdapter {
    /// Create a new action adapter firing [`ACTION_EVENT_TYPE`] events
    pub fn new(client: Arc<HomeAssistantClient>) -> Self {
        Self::with_event_type(client, ACTION_EVENT_TYPE)
    }

    /// Create a new action adapter with a custom event type
    pub fn with_event_type(
        client: Arc<HomeAssistantClient>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            client,
            event_type: event_type.into(),
        }
    }
}

#[async_trait]
impl ActionDispatcher for HaEventActionAdapter {
    async fn dispatch(&self, request: &ActionRequest) -> Result<()> {
        info!(
            "📣 [ADAPTER] Raising {:?} for: {}",
            request.action, request.entity_id
        );

        let payload =
            serde_json::to_value(request).context("Failed to serialize action request")?;

        self.client
            .fire_event(&self.event_type, payload)
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Failed to fire {} event", self.event_type))?;

        info!("✅ [ADAPTER] Action event fired");
        Ok(())
    }

    fn name(&self) -> &str {
        "HomeAssistantEvents"
    }
}
