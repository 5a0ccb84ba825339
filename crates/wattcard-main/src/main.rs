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

mod config;

use anyhow::Result;
use futures_timer::Delay;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use wattcard_core::{
    ActionDispatcher, CardConfig, EntityStateSource, EntityValueCard, HostContext,
    SharedRangeSelection, StatisticsSource,
};
use wattcard_ha::{HaEventActionAdapter, HaStateAdapter, HaStatisticsAdapter, HomeAssistantClient};

/// Version from workspace Cargo.toml, injected at compile time
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Handle command line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" => {
                println!("WattCard - Energy entity card backend for Home Assistant");
                println!("Version: {VERSION}");
                println!();
                println!("Usage: wattcard [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help    Print this help message");
                println!("  -v, --version Print version");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{VERSION}");
                return Ok(());
            }
            _ => {
                // Continue to normal execution for other args or no args
            }
        }
    }

    // Create tokio runtime for async HTTP operations
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    runtime.block_on(run())
}

async fn run() -> Result<()> {
    // Initialize tracing with env filter support
    // Respects RUST_LOG environment variable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = config::AppConfig::load()?;

    info!("⚡ Starting WattCard {VERSION}");
    info!("📋 Configuration Summary:");
    info!(
        "   Entity: {}",
        if config.entity.is_empty() {
            "(auto-detect)"
        } else {
            config.entity.as_str()
        }
    );
    if !config.name.is_empty() {
        info!("   Name: {}", config.name);
    }
    if let Some(units) = &config.units {
        info!("   Units override: {units}");
    }
    info!("   Locale: {}", config.display_locale().display_name());
    info!("   Refresh interval: {}s", config.refresh_interval_secs);
    info!(
        "   Card API: {}",
        if config.web.enabled {
            format!("port {}", config.web.port)
        } else {
            "disabled".to_string()
        }
    );

    // Initialize Home Assistant client
    let ha_client = if std::env::var("SUPERVISOR_TOKEN").is_ok() {
        info!("🏠 Initializing HA client using Supervisor API...");
        Arc::new(HomeAssistantClient::from_supervisor()?)
    } else {
        info!("🏠 Initializing HA client from configuration...");
        Arc::new(HomeAssistantClient::from_config(
            config.homeassistant.base_url.clone(),
            config.homeassistant.token.clone(),
        )?)
    };

    // Wire the host context from the HA adapters
    let states: Arc<dyn EntityStateSource> = Arc::new(HaStateAdapter::new(ha_client.clone()));
    info!("🔌 Entity state source: {}", states.name());

    let statistics: Arc<dyn StatisticsSource> =
        Arc::new(HaStatisticsAdapter::new(ha_client.clone()));
    info!("📊 Statistics source: {}", statistics.name());

    let actions: Arc<dyn ActionDispatcher> = Arc::new(HaEventActionAdapter::new(ha_client));
    info!("📣 Action dispatcher: {}", actions.name());

    let host = Arc::new(HostContext::new(states, statistics, actions));

    // Register the in-process range-selection service siblings publish into
    let selection = Arc::new(SharedRangeSelection::new());
    host.register_range_selection(selection.clone());

    // Resolve the card configuration, falling back to the first energy sensor
    let card_config = if let Some(card_config) = config.card_config() {
        card_config
    } else {
        info!("🔍 No entity configured, scanning for an energy sensor...");
        match CardConfig::suggest(host.states()).await? {
            Some(suggestion) => {
                info!("💡 Using suggested entity: {}", suggestion.entity);
                suggestion
            }
            None => anyhow::bail!(
                "Entity not set. Set the entity option or create an energy sensor in Home Assistant."
            ),
        }
    };

    let card = EntityValueCard::new(card_config, config.display_locale(), host.clone());

    // Spawn the card API on the tokio runtime
    if config.web.enabled {
        let card_for_server = card.clone();
        let host_for_server = host.clone();
        let selection_for_server = selection.clone();
        let port = config.web.port;
        tokio::spawn(async move {
            if let Err(e) = wattcard_web::start_web_server(
                card_for_server,
                host_for_server,
                selection_for_server,
                port,
            )
            .await
            {
                tracing::error!("❌ Card API failed: {}", e);
            }
        });
    }

    // Render ticks: retry a failed initialization until host data is present,
    // re-attach after a dispose
    let tick_card = card.clone();
    let interval = config.refresh_interval();
    tokio::spawn(async move {
        info!("🔁 Render tick started ({}s interval)", interval.as_secs());
        loop {
            tick_card.ensure_initialized().await;
            Delay::new(interval).await;
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("👋 Shutting down");
    card.dispose();

    Ok(())
}
