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

//! Application configuration for the WattCard add-on.
//!
//! Resolved in order: Home Assistant add-on options (`/data/options.json`),
//! then `config.toml` / `config.json` in the working directory for
//! development, then defaults with environment variable overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use wattcard_core::{CardConfig, Locale};

/// Main application configuration - WattCard add-on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Entity ID the card tracks (e.g., "sensor.house_consumption")
    /// Left empty, the first energy sensor found in HA is used
    #[serde(default)]
    pub entity: String,

    /// Display label shown instead of the entity's friendly name
    #[serde(default)]
    pub name: String,

    /// Unit override (e.g., "kWh"); defaults to the entity's own
    /// unit_of_measurement attribute
    #[serde(default)]
    pub units: Option<String>,

    /// Display locale for formatted values
    /// Accepts both "locale" (config.toml) and "language" (HA addon options.json)
    #[serde(default = "default_locale", alias = "language")]
    pub locale: String,

    /// Seconds between render ticks; a tick retries a failed initialization
    /// Accepts both "refresh_interval_secs" and "update_interval_secs" (HA addon options.json)
    #[serde(default = "default_refresh_interval", alias = "update_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Home Assistant connection settings
    #[serde(default)]
    pub homeassistant: HomeAssistantConfig,

    /// Card API server settings
    #[serde(default)]
    pub web: WebConfig,
}

/// Home Assistant connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HomeAssistantConfig {
    /// Home Assistant base URL (optional, defaults to supervisor)
    /// Accepts both "base_url" (config.toml) and "ha_base_url" (HA addon options.json)
    #[serde(default, alias = "ha_base_url")]
    pub base_url: Option<String>,

    /// Home Assistant token (optional, uses SUPERVISOR_TOKEN if not set)
    /// Accepts both "token" (config.toml) and "ha_token" (HA addon options.json)
    #[serde(default, alias = "ha_token")]
    pub token: Option<String>,
}

/// Card API server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Serve the card API over HTTP
    pub enabled: bool,

    /// Port the card API listens on
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8099,
        }
    }
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_refresh_interval() -> u64 {
    30 // Ticks past a completed initialization are no-ops
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            entity: String::new(),
            name: String::new(),
            units: None,
            locale: default_locale(),
            refresh_interval_secs: default_refresh_interval(),
            homeassistant: HomeAssistantConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from HA addon options or config file
    pub fn load() -> Result<Self> {
        // Try HA addon options first (/data/options.json)
        if let Ok(options_str) = std::fs::read_to_string("/data/options.json") {
            let config: AppConfig =
                serde_json::from_str(&options_str).context("Failed to parse HA addon options")?;
            info!("✅ Loaded configuration from HA addon options");
            config.validate()?;
            return Ok(config);
        }

        // Try config.toml for development
        if let Ok(config_str) = std::fs::read_to_string("config.toml") {
            let config: AppConfig =
                toml::from_str(&config_str).context("Failed to parse config.toml")?;
            info!("✅ Loaded configuration from config.toml");
            config.validate()?;
            return Ok(config);
        }

        // Try config.json for development
        if let Ok(config_str) = std::fs::read_to_string("config.json") {
            let config: AppConfig =
                serde_json::from_str(&config_str).context("Failed to parse config.json")?;
            info!("✅ Loaded configuration from config.json");
            config.validate()?;
            return Ok(config);
        }

        // Fall back to defaults with environment variable overrides
        warn!("No configuration file found, using defaults with environment overrides");
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables (development/testing)
    fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(entity) = std::env::var("WATTCARD_ENTITY") {
            config.entity = entity;
        }

        if let Ok(locale) = std::env::var("WATTCARD_LOCALE") {
            config.locale = locale;
        }

        if let Ok(interval) = std::env::var("REFRESH_INTERVAL_SECS")
            && let Ok(secs) = interval.parse::<u64>()
        {
            config.refresh_interval_secs = secs;
        }

        if let Ok(port) = std::env::var("WATTCARD_PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.web.port = port;
        }

        // Override HA connection
        if let Ok(url) = std::env::var("HA_BASE_URL") {
            config.homeassistant.base_url = Some(url);
        }
        if let Ok(token) = std::env::var("HA_TOKEN") {
            config.homeassistant.token = Some(token);
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if Locale::from_code(&self.locale).is_err() {
            anyhow::bail!("Unsupported locale '{}' (supported: en, cs)", self.locale);
        }

        if self.refresh_interval_secs < 5 {
            anyhow::bail!("refresh_interval_secs must be at least 5 seconds");
        }
        if self.refresh_interval_secs > 3600 {
            warn!(
                "refresh_interval_secs is very high ({}s), consider reducing",
                self.refresh_interval_secs
            );
        }

        if self.entity.trim().is_empty() {
            warn!("No entity configured - the first energy sensor found in HA will be used");
        }

        Ok(())
    }

    /// Save current configuration to file
    ///
    /// Currently used in tests to verify serialization/deserialization
    #[allow(dead_code)]
    pub fn save(&self, path: &str) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        info!("Configuration saved to {}", path);
        Ok(())
    }

    /// Get refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Resolve the configured locale; `validate` has already rejected
    /// unsupported codes
    pub fn display_locale(&self) -> Locale {
        Locale::from_code(&self.locale).unwrap_or_default()
    }

    /// Card setup object from the flat add-on keys, if an entity is configured
    pub fn card_config(&self) -> Option<CardConfig> {
        if self.entity.trim().is_empty() {
            return None;
        }
        Some(CardConfig {
            entity: self.entity.clone(),
            name: self.name.clone(),
            units: self.units.clone(),
        })
    }
}
