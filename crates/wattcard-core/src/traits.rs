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

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::granularity::AggregationPeriod;
use crate::types::{ActionRequest, DateRange, EntityState, StatisticsBucket};

/// Read-only access to the host's entity state store
#[async_trait]
pub trait EntityStateSource: Send + Sync {
    /// Current state of one entity, or `None` if the id is unknown to the
    /// host.
    async fn entity_state(&self, entity_id: &str) -> Result<Option<EntityState>>;

    /// All entity states known to the host.
    async fn all_entity_states(&self) -> Result<Vec<EntityState>>;

    /// Check if the data source is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the name of this data source for logging
    fn name(&self) -> &str;
}

/// Aggregated change statistics for a single entity
#[async_trait]
pub trait StatisticsSource: Send + Sync {
    /// Per-bucket `change` statistics for `entity_id` over `range`.
    ///
    /// A host response without an entry for the entity maps to an empty
    /// vector. That is common for future or out-of-data ranges and is not
    /// an error.
    async fn change_statistics(
        &self,
        entity_id: &str,
        range: &DateRange,
        period: AggregationPeriod,
    ) -> Result<Vec<StatisticsBucket>>;

    /// Check if the data source is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the name of this data source for logging
    fn name(&self) -> &str;
}

/// Raises card actions (tap, more-info) toward the host
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Raise `request` upward. Delivery is fire-and-forget from the card's
    /// point of view.
    async fn dispatch(&self, request: &ActionRequest) -> Result<()>;

    /// Get the name of this dispatcher for logging
    fn name(&self) -> &str;
}

/// Callback invoked with every published date range.
pub type RangeCallback = Arc<dyn Fn(&DateRange) + Send + Sync>;

/// Shared range-selection service published by a sibling component.
///
/// Subscribers receive every published range synchronously, in registration
/// order. Dropping the returned subscription unsubscribes.
pub trait RangeSelectionService: Send + Sync {
    fn subscribe(&self, callback: RangeCallback) -> RangeSubscription;
}

/// Unsubscribe capability returned by [`RangeSelectionService::subscribe`].
///
/// The registration is released when the subscription is dropped;
/// [`RangeSubscription::cancel`] makes the release explicit.
pub struct RangeSubscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl RangeSubscription {
    #[must_use]
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the underlying registration now.
    pub fn cancel(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for RangeSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for RangeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeSubscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
