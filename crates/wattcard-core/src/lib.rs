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

pub mod broker;
pub mod card;
pub mod config;
pub mod format;
pub mod granularity;
pub mod host;
pub mod traits;
pub mod types;

pub use broker::*;
pub use card::EntityValueCard;
pub use config::{CardConfig, CardConfigError};
pub use format::*;
pub use granularity::*;
pub use host::*;
pub use traits::{
    ActionDispatcher, EntityStateSource, RangeCallback, RangeSelectionService, RangeSubscription,
    StatisticsSource,
};
pub use types::*;
