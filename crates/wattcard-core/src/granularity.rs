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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::DateRange;

/// Time-bucket size used when querying historical change statistics.
///
/// Wide ranges are aggregated coarsely so a query never returns an excessive
/// number of per-hour buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationPeriod {
    Hour,
    Day,
    Month,
}

impl AggregationPeriod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Month => "month",
        }
    }

    /// Granularity for a whole-day span: above 35 days per month, above
    /// 2 days per day, anything shorter (including zero and negative spans)
    /// per hour.
    #[must_use]
    pub fn for_span_days(days: i64) -> Self {
        if days > 35 {
            Self::Month
        } else if days > 2 {
            Self::Day
        } else {
            Self::Hour
        }
    }

    /// Granularity for a date range. An open-ended range has no defined day
    /// span and falls back to hourly buckets.
    #[must_use]
    pub fn for_range(range: &DateRange) -> Self {
        match range.end {
            Some(end) => Self::for_span_days(whole_day_span(range.start, end)),
            None => Self::Hour,
        }
    }
}

impl fmt::Display for AggregationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-calendar-day span between two timestamps.
///
/// Both endpoints are reduced to their UTC calendar date before differencing,
/// so time-of-day never contributes: two instants on the same UTC day always
/// yield 0.
#[must_use]
pub fn whole_day_span(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end.date_naive() - start.date_naive()).num_days()
}
