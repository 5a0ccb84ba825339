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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Date range broadcast by the sibling range-selection component.
///
/// A missing `end` means "open-ended up to now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Open-ended range starting at `start`.
    #[must_use]
    pub fn since(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }
}

/// Current state of one host entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl EntityState {
    fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.attribute_str("unit_of_measurement")
    }

    #[must_use]
    pub fn friendly_name(&self) -> Option<&str> {
        self.attribute_str("friendly_name")
    }

    #[must_use]
    pub fn device_class(&self) -> Option<&str> {
        self.attribute_str("device_class")
    }
}

/// One aggregation bucket returned by a statistics query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticsBucket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Accumulated change within the bucket. Buckets without a change value
    /// are skipped when summing.
    #[serde(default)]
    pub change: Option<f64>,
}

impl StatisticsBucket {
    #[must_use]
    pub fn from_change(change: f64) -> Self {
        Self {
            start: None,
            end: None,
            change: Some(change),
        }
    }
}

/// Sum of `change` across buckets. An empty slice sums to zero, which is
/// how a response without data for the entity ends up displayed as 0.
#[must_use]
pub fn sum_change(buckets: &[StatisticsBucket]) -> f64 {
    buckets.iter().filter_map(|bucket| bucket.change).sum()
}

/// Lifecycle state of the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    Uninitialized,
    Ready,
    UnknownEntity,
    Tracking,
    Disposed,
}

/// Value the card currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayValue {
    /// No host data yet; the render passes through without content.
    Pending,
    /// The entity's raw state string, shown until the first statistics
    /// query resolves.
    Raw(String),
    /// Locale-formatted sum of per-bucket change values.
    Aggregate(String),
    /// Inline message shown when the configured entity does not exist.
    UnknownEntity(String),
}

impl DisplayValue {
    /// Text form rendered to the user. `Pending` renders empty.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Pending => "",
            Self::Raw(text) | Self::Aggregate(text) | Self::UnknownEntity(text) => text,
        }
    }
}

/// JSON projection of the card served over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub entity: String,
    pub name: String,
    pub units: String,
    pub state: CardState,
    pub value: String,
}

/// Action kinds the card can raise toward the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostAction {
    MoreInfo,
}

/// Request raised toward the host when the user taps the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: HostAction,
    pub entity_id: String,
}

impl ActionRequest {
    /// Ask the host to open the generic detail view for `entity_id`.
    #[must_use]
    pub fn more_info(entity_id: impl Into<String>) -> Self {
        Self {
            action: HostAction::MoreInfo,
            entity_id: entity_id.into(),
        }
    }
}
