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
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::broker::{DateRangeBroker, DiscoveryOutcome};
use crate::config::CardConfig;
use crate::format::{Locale, format_number};
use crate::granularity::AggregationPeriod;
use crate::host::HostContext;
use crate::types::{ActionRequest, CardSnapshot, CardState, DateRange, DisplayValue, sum_change};

/// Card tracking one entity's accumulated value over the selected range.
///
/// Lifecycle: `Uninitialized` until host data is available, then either
/// `UnknownEntity` (terminal until re-attachment) or `Tracking`. While
/// tracking, every range change published by the sibling selection component
/// triggers one statistics query whose result replaces the displayed value.
pub struct EntityValueCard {
    config: CardConfig,
    locale: Locale,
    host: Arc<HostContext>,
    state: Mutex<CardState>,
    display: Mutex<DisplayValue>,
    units: Mutex<String>,
    broker: Mutex<Option<Arc<DateRangeBroker>>>,
    /// Monotonic tag for statistics queries; a response is applied only if
    /// no newer query has been issued since.
    query_seq: AtomicU64,
    init_gate: tokio::sync::Mutex<()>,
    /// Self-reference handed to broker listeners so they never keep the
    /// card alive.
    weak: Weak<Self>,
}

impl EntityValueCard {
    /// Create the card from an already validated configuration. No host I/O
    /// happens until the first render.
    #[must_use]
    pub fn new(config: CardConfig, locale: Locale, host: Arc<HostContext>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            config,
            locale,
            host,
            state: Mutex::new(CardState::Uninitialized),
            display: Mutex::new(DisplayValue::Pending),
            units: Mutex::new(String::new()),
            broker: Mutex::new(None),
            query_seq: AtomicU64::new(0),
            init_gate: tokio::sync::Mutex::new(()),
            weak: weak.clone(),
        })
    }

    /// Drive initialization. Called on every render; does nothing once the
    /// card has left `Uninitialized`. A disposed card re-enters
    /// `Uninitialized` first, so re-attachment runs init from scratch.
    ///
    /// A state source error keeps the card uninitialized and is retried on
    /// the next render. An entity unknown to the host is terminal: the card
    /// shows an inline message and init is not re-attempted.
    pub async fn ensure_initialized(&self) {
        let _gate = self.init_gate.lock().await;
        {
            let mut state = self.state.lock();
            match *state {
                CardState::Disposed => *state = CardState::Uninitialized,
                CardState::Uninitialized => {}
                CardState::Ready | CardState::UnknownEntity | CardState::Tracking => return,
            }
        }

        let entity_id = self.config.entity.clone();
        match self.host.states().entity_state(&entity_id).await {
            Err(error) => {
                // host data not available yet; retried on the next render
                debug!("Entity state for {} not available yet: {error:#}", entity_id);
            }
            Ok(None) => {
                *self.state.lock() = CardState::UnknownEntity;
                *self.display.lock() =
                    DisplayValue::UnknownEntity(format!("Unknown entity \"{entity_id}\""));
                warn!("⚠️ Unknown entity \"{}\"", entity_id);
            }
            Ok(Some(entity)) => {
                *self.state.lock() = CardState::Ready;
                *self.display.lock() = DisplayValue::Raw(entity.state.clone());
                let units = self
                    .config
                    .units
                    .clone()
                    .or_else(|| entity.unit_of_measurement().map(ToOwned::to_owned))
                    .unwrap_or_default();
                *self.units.lock() = units;

                self.attach_broker();
                *self.state.lock() = CardState::Tracking;
                debug!("✅ Card now tracking {}", entity_id);
            }
        }
    }

    /// Construct the broker and register the range listener.
    fn attach_broker(&self) {
        let broker = Arc::new(DateRangeBroker::create(Arc::clone(&self.host)));
        let weak = self.weak.clone();
        broker.on_change(move |range| {
            if let Some(card) = weak.upgrade() {
                card.spawn_query(*range);
            }
        });
        *self.broker.lock() = Some(broker);
    }

    /// Issue one statistics query for `range` without blocking the
    /// notification call.
    fn spawn_query(self: Arc<Self>, range: DateRange) {
        let seq = self.query_seq.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(async move {
            self.run_query(seq, range).await;
        });
    }

    async fn run_query(&self, seq: u64, range: DateRange) {
        let period = AggregationPeriod::for_range(&range);
        let result = self
            .host
            .statistics()
            .change_statistics(&self.config.entity, &range, period)
            .await;

        match result {
            Ok(buckets) => {
                let formatted = format_number(sum_change(&buckets), self.locale);
                if !self.apply_aggregate(seq, formatted) {
                    debug!(
                        "Discarding stale statistics response for {} (seq {seq})",
                        self.config.entity
                    );
                }
            }
            Err(error) => {
                warn!(
                    "❌ Statistics query for {} failed: {error:#}",
                    self.config.entity
                );
            }
        }
    }

    /// Store an aggregate for the query tagged `seq`, re-validating the tag
    /// and the card state in the same critical section as the store. Replies
    /// race newer queries and `dispose` on a multi-thread runtime; a reply
    /// that lost either race must be rejected at the store itself. Lock
    /// order is state before display, as in `snapshot`.
    fn apply_aggregate(&self, seq: u64, formatted: String) -> bool {
        let state = self.state.lock();
        let mut display = self.display.lock();
        if seq != self.query_seq.load(Ordering::SeqCst) || *state != CardState::Tracking {
            return false;
        }
        *display = DisplayValue::Aggregate(formatted);
        true
    }

    /// Ask the host to open the generic detail view for the configured
    /// entity.
    pub async fn tap(&self) -> anyhow::Result<()> {
        let request = ActionRequest::more_info(self.config.entity.clone());
        self.host.actions().dispatch(&request).await
    }

    /// Tear the card down: dispose the broker and stop applying responses.
    /// Idempotent. A later `ensure_initialized` re-runs init from scratch.
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if *state == CardState::Disposed {
                return;
            }
            *state = CardState::Disposed;
        }
        // invalidate in-flight query responses
        self.query_seq.fetch_add(1, Ordering::SeqCst);
        if let Some(broker) = self.broker.lock().take() {
            broker.dispose();
        }
        debug!("Card for {} disposed", self.config.entity);
    }

    /// Wait for the broker's discovery task to finish. `None` when no
    /// broker is attached or the outcome was already consumed.
    pub async fn await_range_discovery(&self) -> Option<DiscoveryOutcome> {
        let broker = self.broker.lock().clone();
        match broker {
            Some(broker) => broker.await_discovery().await,
            None => None,
        }
    }

    #[must_use]
    pub fn state(&self) -> CardState {
        *self.state.lock()
    }

    #[must_use]
    pub fn display_value(&self) -> DisplayValue {
        self.display.lock().clone()
    }

    #[must_use]
    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    /// JSON projection served over HTTP.
    #[must_use]
    pub fn snapshot(&self) -> CardSnapshot {
        CardSnapshot {
            entity: self.config.entity.clone(),
            name: self.config.name.clone(),
            units: self.units.lock().clone(),
            state: *self.state.lock(),
            value: self.display.lock().text().to_owned(),
        }
    }
}

impl fmt::Debug for EntityValueCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityValueCard")
            .field("entity", &self.config.entity)
            .field("state", &*self.state.lock())
            .finish()
    }
}
