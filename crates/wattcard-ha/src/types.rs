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
use wattcard_core::{AggregationPeriod, DateRange, EntityState, StatisticsBucket};

/// Command name of the recorder statistics endpoint.
pub const STATISTICS_REQUEST_TYPE: &str = "recorder/statistics_during_period";

/// The only statistic type the card ever asks for.
pub const CHANGE_STATISTIC: &str = "change";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaEntityState {
    pub entity_id: String,
    pub state: String,
    pub attributes: serde_json::Value,
    pub last_changed: String,
    pub last_updated: String,
}

impl From<HaEntityState> for EntityState {
    fn from(state: HaEntityState) -> Self {
        Self {
            entity_id: state.entity_id,
            state: state.state,
            attributes: state.attributes,
        }
    }
}

/// Request body for the recorder statistics endpoint.
///
/// Mirrors the websocket command of the same name: `end_time` is omitted for
/// open-ended ranges and `types` restricts the response to the statistic
/// kinds listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsPeriodRequest {
    #[serde(rename = "type")]
    pub request_type: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub statistic_ids: Vec<String>,
    pub period: String,
    pub types: Vec<String>,
}

impl StatisticsPeriodRequest {
    /// Request the per-bucket `change` statistic for one entity.
    #[must_use]
    pub fn change_for(entity_id: &str, range: &DateRange, period: AggregationPeriod) -> Self {
        Self {
            request_type: STATISTICS_REQUEST_TYPE.to_owned(),
            start_time: range.start,
            end_time: range.end,
            statistic_ids: vec![entity_id.to_owned()],
            period: period.as_str().to_owned(),
            types: vec![CHANGE_STATISTIC.to_owned()],
        }
    }
}

/// One row of a recorder statistics response. Timestamps arrive as epoch
/// milliseconds; rows may omit `change` when the recorder has no data for
/// the bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaStatisticsRow {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
}

impl From<HaStatisticsRow> for StatisticsBucket {
    fn from(row: HaStatisticsRow) -> Self {
        Self {
            start: row.start.and_then(millis_to_datetime),
            end: row.end.and_then(millis_to_datetime),
            change: row.change,
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "recorder timestamps are epoch milliseconds, well inside i64"
)]
fn millis_to_datetime(millis: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis as i64)
}
