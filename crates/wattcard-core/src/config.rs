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

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::EntityStateSource;

/// Errors rejecting a card configuration at setup time
#[derive(Debug, Error)]
pub enum CardConfigError {
    /// The required entity id is missing or empty
    #[error("Entity not set.")]
    EntityNotSet,

    /// The configuration object could not be read
    #[error("Invalid card configuration: {0}")]
    Invalid(String),
}

/// Configuration the host passes at setup time.
///
/// Recognized keys: `entity` (required, entity id), `name` (optional display
/// label) and `units` (optional override of the entity's own declared unit).
/// Unrecognized keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardConfig {
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl CardConfig {
    /// Build a configuration for `entity` with no display label or unit
    /// override.
    ///
    /// # Errors
    ///
    /// Returns `CardConfigError::EntityNotSet` if `entity` is empty.
    pub fn new(entity: impl Into<String>) -> Result<Self, CardConfigError> {
        let config = Self {
            entity: entity.into(),
            name: String::new(),
            units: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate the loosely-typed configuration object the host
    /// hands over.
    ///
    /// # Errors
    ///
    /// Returns `CardConfigError::Invalid` for a malformed object and
    /// `CardConfigError::EntityNotSet` when the entity id is missing or
    /// empty. Either way no card is constructed.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CardConfigError> {
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|error| CardConfigError::Invalid(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations without a usable entity id.
    ///
    /// # Errors
    ///
    /// Returns `CardConfigError::EntityNotSet` if the entity id is empty.
    pub fn validate(&self) -> Result<(), CardConfigError> {
        if self.entity.trim().is_empty() {
            return Err(CardConfigError::EntityNotSet);
        }
        Ok(())
    }

    /// Suggest a starting configuration: the first host entity declaring
    /// `device_class == "energy"`, if any, labeled with that entity's
    /// friendly name.
    ///
    /// # Errors
    ///
    /// Propagates the state source error when the host cannot be queried.
    pub async fn suggest(states: &Arc<dyn EntityStateSource>) -> anyhow::Result<Option<Self>> {
        let all = states.all_entity_states().await?;
        Ok(all
            .into_iter()
            .find(|entity| entity.device_class() == Some("energy"))
            .map(|entity| Self {
                name: entity.friendly_name().unwrap_or_default().to_owned(),
                entity: entity.entity_id,
                units: None,
            }))
    }
}
