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
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::traits::{
    ActionDispatcher, EntityStateSource, RangeCallback, RangeSelectionService, RangeSubscription,
    StatisticsSource,
};
use crate::types::DateRange;

/// Typed access to the host collaborators the card consumes.
///
/// The range-selection service is registered explicitly and read through an
/// accessor, so discovery polls injected state here instead of reading a
/// well-known global field. The selection component may register at any time
/// after the card was wired up.
pub struct HostContext {
    states: Arc<dyn EntityStateSource>,
    statistics: Arc<dyn StatisticsSource>,
    actions: Arc<dyn ActionDispatcher>,
    range_selection: RwLock<Option<Arc<dyn RangeSelectionService>>>,
}

impl HostContext {
    #[must_use]
    pub fn new(
        states: Arc<dyn EntityStateSource>,
        statistics: Arc<dyn StatisticsSource>,
        actions: Arc<dyn ActionDispatcher>,
    ) -> Self {
        Self {
            states,
            statistics,
            actions,
            range_selection: RwLock::new(None),
        }
    }

    /// The shared range-selection service, once a sibling component has
    /// registered one.
    #[must_use]
    pub fn range_selection(&self) -> Option<Arc<dyn RangeSelectionService>> {
        self.range_selection.read().clone()
    }

    /// Make `service` discoverable. A later registration replaces an
    /// earlier one; brokers already subscribed keep their subscription.
    pub fn register_range_selection(&self, service: Arc<dyn RangeSelectionService>) {
        *self.range_selection.write() = Some(service);
    }

    #[must_use]
    pub fn states(&self) -> &Arc<dyn EntityStateSource> {
        &self.states
    }

    #[must_use]
    pub fn statistics(&self) -> &Arc<dyn StatisticsSource> {
        &self.statistics
    }

    #[must_use]
    pub fn actions(&self) -> &Arc<dyn ActionDispatcher> {
        &self.actions
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("states", &self.states.name())
            .field("statistics", &self.statistics.name())
            .field("actions", &self.actions.name())
            .field("range_selection", &self.range_selection.read().is_some())
            .finish()
    }
}

/// In-process [`RangeSelectionService`].
///
/// Sibling components publish user-chosen ranges; subscribers receive them
/// synchronously, in registration order. Callbacks run outside the
/// subscriber lock, so a callback may subscribe or unsubscribe freely.
#[derive(Default)]
pub struct SharedRangeSelection {
    subscribers: Arc<Mutex<Vec<(u64, RangeCallback)>>>,
    next_id: AtomicU64,
}

impl SharedRangeSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `range` to every subscriber.
    pub fn publish(&self, range: &DateRange) {
        let subscribers: Vec<(u64, RangeCallback)> = self.subscribers.lock().clone();
        for (_, callback) in &subscribers {
            callback(range);
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl RangeSelectionService for SharedRangeSelection {
    fn subscribe(&self, callback: RangeCallback) -> RangeSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, callback));
        let subscribers = Arc::clone(&self.subscribers);
        RangeSubscription::new(move || {
            subscribers.lock().retain(|(subscriber, _)| *subscriber != id);
        })
    }
}

impl fmt::Debug for SharedRangeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRangeSelection")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_range() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn publish_reaches_subscribers_in_registration_order() {
        let selection = SharedRangeSelection::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut subscriptions = Vec::new();
        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            subscriptions.push(selection.subscribe(Arc::new(move |_range| {
                seen.lock().push(tag);
            })));
        }

        selection.publish(&sample_range());
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
        drop(subscriptions);
    }

    #[test]
    fn dropping_the_subscription_unsubscribes() {
        let selection = SharedRangeSelection::new();
        let seen = Arc::new(Mutex::new(0_u32));

        let seen_inner = Arc::clone(&seen);
        let subscription = selection.subscribe(Arc::new(move |_range| {
            *seen_inner.lock() += 1;
        }));
        assert_eq!(selection.subscriber_count(), 1);

        selection.publish(&sample_range());
        drop(subscription);
        assert_eq!(selection.subscriber_count(), 0);

        selection.publish(&sample_range());
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn cancel_releases_the_registration() {
        let selection = SharedRangeSelection::new();
        let subscription = selection.subscribe(Arc::new(|_range| {}));
        subscription.cancel();
        assert_eq!(selection.subscriber_count(), 0);
    }

    #[test]
    fn published_range_arrives_verbatim() {
        let selection = SharedRangeSelection::new();
        let received = Arc::new(Mutex::new(None));

        let received_inner = Arc::clone(&received);
        let _subscription = selection.subscribe(Arc::new(move |range: &DateRange| {
            *received_inner.lock() = Some(*range);
        }));

        let range = sample_range();
        selection.publish(&range);
        assert_eq!(*received.lock(), Some(range));
    }

    #[test]
    fn registration_replaces_previous_service() {
        struct Null;
        impl RangeSelectionService for Null {
            fn subscribe(&self, _callback: RangeCallback) -> RangeSubscription {
                RangeSubscription::new(|| {})
            }
        }
        #[async_trait::async_trait]
        impl EntityStateSource for Null {
            async fn entity_state(
                &self,
                _entity_id: &str,
            ) -> anyhow::Result<Option<crate::types::EntityState>> {
                Ok(None)
            }
            async fn all_entity_states(&self) -> anyhow::Result<Vec<crate::types::EntityState>> {
                Ok(Vec::new())
            }
            async fn health_check(&self) -> anyhow::Result<bool> {
                Ok(true)
            }
            fn name(&self) -> &str {
                "null"
            }
        }
        #[async_trait::async_trait]
        impl StatisticsSource for Null {
            async fn change_statistics(
                &self,
                _entity_id: &str,
                _range: &DateRange,
                _period: crate::granularity::AggregationPeriod,
            ) -> anyhow::Result<Vec<crate::types::StatisticsBucket>> {
                Ok(Vec::new())
            }
            async fn health_check(&self) -> anyhow::Result<bool> {
                Ok(true)
            }
            fn name(&self) -> &str {
                "null"
            }
        }
        #[async_trait::async_trait]
        impl ActionDispatcher for Null {
            async fn dispatch(&self, _request: &crate::types::ActionRequest) -> anyhow::Result<()> {
                Ok(())
            }
            fn name(&self) -> &str {
                "null"
            }
        }

        let host = HostContext::new(Arc::new(Null), Arc::new(Null), Arc::new(Null));
        assert!(host.range_selection().is_none());

        host.register_range_selection(Arc::new(SharedRangeSelection::new()));
        assert!(host.range_selection().is_some());

        host.register_range_selection(Arc::new(Null));
        assert!(host.range_selection().is_some());
    }
}
