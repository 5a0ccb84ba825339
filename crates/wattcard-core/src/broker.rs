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
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::host::HostContext;
use crate::traits::{RangeCallback, RangeSubscription};
use crate::types::DateRange;

/// How long discovery keeps polling before giving up.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between discovery polls.
pub const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal result of the discovery task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// The range-selection service was found and subscribed to.
    Found,
    /// The service never appeared within the timeout. The broker stays
    /// silent permanently; no listener is ever invoked.
    TimedOut,
}

/// Locates the shared range-selection service and relays its change events
/// to registered listeners.
///
/// The selection component and this card are instantiated independently with
/// no guaranteed order, so the broker polls the host context until the
/// service is registered or the timeout elapses. Discovery runs as a spawned
/// task that [`DateRangeBroker::dispose`] cancels.
pub struct DateRangeBroker {
    shared: Arc<BrokerShared>,
    discovery: Mutex<Option<JoinHandle<DiscoveryOutcome>>>,
}

#[derive(Default)]
struct BrokerShared {
    listeners: Mutex<Vec<RangeCallback>>,
    subscription: Mutex<Option<RangeSubscription>>,
    disposed: AtomicBool,
}

impl BrokerShared {
    /// Forward `range` to every listener, synchronously, in registration
    /// order. Listeners run outside the lock so a listener may register
    /// further listeners.
    fn fan_out(&self, range: &DateRange) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let listeners: Vec<RangeCallback> = self.listeners.lock().clone();
        for listener in &listeners {
            listener(range);
        }
    }

    /// Store a fresh subscription, taking it back if `dispose` ran
    /// concurrently. `dispose` may have emptied the slot before this store
    /// landed, so the release goes through the slot: whichever side sees the
    /// stored value takes and cancels it. Returns whether the subscription
    /// was kept.
    fn install_subscription(&self, subscription: RangeSubscription) -> bool {
        *self.subscription.lock() = Some(subscription);
        if self.disposed.load(Ordering::SeqCst) {
            if let Some(subscription) = self.subscription.lock().take() {
                subscription.cancel();
            }
            return false;
        }
        true
    }
}

impl DateRangeBroker {
    /// Construct the broker and immediately start discovery in the
    /// background. Never blocks the caller.
    #[must_use]
    pub fn create(host: Arc<HostContext>) -> Self {
        Self::with_timing(host, DISCOVERY_TIMEOUT, DISCOVERY_POLL_INTERVAL)
    }

    /// Variant of [`DateRangeBroker::create`] with custom discovery timing.
    #[must_use]
    pub fn with_timing(host: Arc<HostContext>, timeout: Duration, poll_interval: Duration) -> Self {
        let shared = Arc::new(BrokerShared::default());
        let task = tokio::spawn(discover(host, Arc::clone(&shared), timeout, poll_interval));
        Self {
            shared,
            discovery: Mutex::new(Some(task)),
        }
    }

    /// Register `listener` for future range changes. Listeners are invoked
    /// synchronously, in registration order.
    pub fn on_change(&self, listener: impl Fn(&DateRange) + Send + Sync + 'static) {
        self.shared.listeners.lock().push(Arc::new(listener));
    }

    /// Wait for discovery to finish. Returns `None` when discovery was
    /// cancelled by `dispose` or its outcome was already consumed.
    pub async fn await_discovery(&self) -> Option<DiscoveryOutcome> {
        let task = self.discovery.lock().take()?;
        task.await.ok()
    }

    /// Clear all listeners, release the subscription if one was
    /// established, and cancel a discovery still in flight. Idempotent.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.discovery.lock().take() {
            task.abort();
        }
        self.shared.listeners.lock().clear();
        if let Some(subscription) = self.shared.subscription.lock().take() {
            subscription.cancel();
        }
        debug!("Date range broker disposed");
    }
}

impl Drop for DateRangeBroker {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for DateRangeBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateRangeBroker")
            .field("listeners", &self.shared.listeners.lock().len())
            .field("subscribed", &self.shared.subscription.lock().is_some())
            .field("disposed", &self.shared.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Poll the host context until the range-selection service appears, then
/// subscribe once. Gives up after `timeout`.
async fn discover(
    host: Arc<HostContext>,
    shared: Arc<BrokerShared>,
    timeout: Duration,
    poll_interval: Duration,
) -> DiscoveryOutcome {
    let started = tokio::time::Instant::now();
    loop {
        if let Some(service) = host.range_selection() {
            let relay = Arc::clone(&shared);
            let callback: RangeCallback = Arc::new(move |range: &DateRange| relay.fan_out(range));
            if shared.install_subscription(service.subscribe(callback)) {
                debug!(
                    "Range selection service found after {:?}, subscribed",
                    started.elapsed()
                );
            }
            return DiscoveryOutcome::Found;
        }
        if started.elapsed() >= timeout {
            error!(
                "Unable to connect to the date range selector. Make sure a \
                 date-range-selection component is registered on this screen."
            );
            return DiscoveryOutcome::TimedOut;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::granularity::AggregationPeriod;
    use crate::host::SharedRangeSelection;
    use crate::traits::{
        ActionDispatcher, EntityStateSource, RangeSelectionService, StatisticsSource,
    };
    use crate::types::{ActionRequest, EntityState, StatisticsBucket};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct NullSource;

    #[async_trait]
    impl EntityStateSource for NullSource {
        async fn entity_state(&self, _entity_id: &str) -> Result<Option<EntityState>> {
            Ok(None)
        }
        async fn all_entity_states(&self) -> Result<Vec<EntityState>> {
            Ok(Vec::new())
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "null"
        }
    }

    #[async_trait]
    impl StatisticsSource for NullSource {
        async fn change_statistics(
            &self,
            _entity_id: &str,
            _range: &DateRange,
            _period: AggregationPeriod,
        ) -> Result<Vec<StatisticsBucket>> {
            Ok(Vec::new())
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "null"
        }
    }

    #[async_trait]
    impl ActionDispatcher for NullSource {
        async fn dispatch(&self, _request: &ActionRequest) -> Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "null"
        }
    }

    fn empty_host() -> Arc<HostContext> {
        Arc::new(HostContext::new(
            Arc::new(NullSource),
            Arc::new(NullSource),
            Arc::new(NullSource),
        ))
    }

    fn sample_range() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 5, 8, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_times_out_and_never_invokes_listeners() {
        let host = empty_host();
        let broker = DateRangeBroker::create(Arc::clone(&host));

        let invocations = Arc::new(Mutex::new(0_u32));
        let counter = Arc::clone(&invocations);
        broker.on_change(move |_range| {
            *counter.lock() += 1;
        });

        assert_eq!(
            broker.await_discovery().await,
            Some(DiscoveryOutcome::TimedOut)
        );

        // A service registered after the timeout is never picked up.
        let selection = Arc::new(SharedRangeSelection::new());
        host.register_range_selection(Arc::clone(&selection) as Arc<dyn RangeSelectionService>);
        selection.publish(&sample_range());
        assert_eq!(*invocations.lock(), 0);
        assert_eq!(selection.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_finds_a_service_registered_late() {
        let host = empty_host();
        let broker = DateRangeBroker::create(Arc::clone(&host));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        broker.on_change(move |range: &DateRange| {
            sink.lock().push(*range);
        });

        let selection = Arc::new(SharedRangeSelection::new());
        let registrar_host = Arc::clone(&host);
        let registrar_selection = Arc::clone(&selection);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(750)).await;
            registrar_host.register_range_selection(registrar_selection);
        });

        assert_eq!(
            broker.await_discovery().await,
            Some(DiscoveryOutcome::Found)
        );
        assert_eq!(selection.subscriber_count(), 1);

        let range = sample_range();
        selection.publish(&range);
        assert_eq!(*seen.lock(), vec![range]);
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_follows_registration_order() {
        let host = empty_host();
        let selection = Arc::new(SharedRangeSelection::new());
        host.register_range_selection(Arc::clone(&selection) as Arc<dyn RangeSelectionService>);

        let broker = DateRangeBroker::create(Arc::clone(&host));
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            broker.on_change(move |_range| {
                order.lock().push(tag);
            });
        }

        assert_eq!(
            broker.await_discovery().await,
            Some(DiscoveryOutcome::Found)
        );
        selection.publish(&sample_range());
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_after_subscription_silences_listeners() {
        let host = empty_host();
        let selection = Arc::new(SharedRangeSelection::new());
        host.register_range_selection(Arc::clone(&selection) as Arc<dyn RangeSelectionService>);

        let broker = DateRangeBroker::create(Arc::clone(&host));
        let invocations = Arc::new(Mutex::new(0_u32));
        let counter = Arc::clone(&invocations);
        broker.on_change(move |_range| {
            *counter.lock() += 1;
        });

        assert_eq!(
            broker.await_discovery().await,
            Some(DiscoveryOutcome::Found)
        );
        selection.publish(&sample_range());
        assert_eq!(*invocations.lock(), 1);

        broker.dispose();
        assert_eq!(selection.subscriber_count(), 0);
        selection.publish(&sample_range());
        assert_eq!(*invocations.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_is_idempotent_and_cancels_discovery() {
        let host = empty_host();
        let broker = DateRangeBroker::create(host);
        broker.dispose();
        broker.dispose();
        assert_eq!(broker.await_discovery().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_landing_after_dispose_is_released() {
        let host = empty_host();
        let broker = DateRangeBroker::create(host);
        broker.dispose();

        // dispose swept the slot while this subscription was still being
        // established; the late store must release it
        let selection = Arc::new(SharedRangeSelection::new());
        let relay = Arc::clone(&broker.shared);
        let callback: RangeCallback = Arc::new(move |range: &DateRange| relay.fan_out(range));
        let kept = broker.shared.install_subscription(selection.subscribe(callback));

        assert!(!kept);
        assert_eq!(selection.subscriber_count(), 0);
        assert!(broker.shared.subscription.lock().is_none());
    }
}
