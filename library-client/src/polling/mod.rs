//! Status polling for documents that are still being processed.
//!
//! A [`PollingCoordinator`] owns at most one active [`PollSubscription`]. A
//! subscription polls its fixed id set once immediately, then again
//! `interval` after each request settles, so requests for one subscription
//! never overlap. Failed cycles are logged and the schedule carries on.
//!
//! Disposing a subscription clears its timer at once. A request already in
//! flight is allowed to finish, but its result is dropped: once `dispose`
//! returns, the callback is never invoked for that subscription again.

use crate::models::StatusUpdate;
use crate::services::metrics::record_poll_cycle;
use crate::services::StatusQueryClient;
use crate::utils::{lock, read, write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Receives every successfully fetched batch.
pub type StatusCallback = Arc<dyn Fn(Vec<StatusUpdate>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// No timer and no request.
    Idle,
    /// Waiting for the next cycle.
    Scheduled,
    /// A status request is in flight.
    Polling,
}

struct Shared {
    client: Arc<dyn StatusQueryClient>,
    interval: Duration,
    callback: RwLock<StatusCallback>,
    next_generation: AtomicU64,
}

impl Shared {
    fn current_callback(&self) -> StatusCallback {
        read(&self.callback).clone()
    }
}

struct ActiveTarget {
    ids: Vec<String>,
    subscription: PollSubscription,
}

pub struct PollingCoordinator {
    shared: Arc<Shared>,
    current: Mutex<Option<ActiveTarget>>,
}

impl PollingCoordinator {
    pub fn new(
        client: Arc<dyn StatusQueryClient>,
        interval: Duration,
        callback: StatusCallback,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                interval,
                callback: RwLock::new(callback),
                next_generation: AtomicU64::new(1),
            }),
            current: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Replace the callback. Running subscriptions pick it up on their next
    /// delivery.
    pub fn set_callback(&self, callback: StatusCallback) {
        *write(&self.shared.callback) = callback;
    }

    /// Start polling `ids` independently of the coordinator's managed
    /// subscription. Returns `None` for an empty id set.
    ///
    /// Must be called within a tokio runtime.
    pub fn subscribe(&self, ids: Vec<String>) -> Option<PollSubscription> {
        if ids.is_empty() {
            return None;
        }

        let generation = self.shared.next_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        let delivery = Arc::new(Mutex::new(()));
        let (phase_tx, phase_rx) = watch::channel(PollPhase::Polling);

        tracing::debug!(generation, targets = ids.len(), "Starting status poll subscription");

        tokio::spawn(run_subscription(
            self.shared.clone(),
            ids,
            generation,
            token.clone(),
            delivery.clone(),
            phase_tx,
        ));

        Some(PollSubscription {
            generation,
            token,
            delivery,
            phase: phase_rx,
        })
    }

    /// Point the managed subscription at `ids`.
    ///
    /// An unchanged id set with `enabled` still true keeps the running
    /// schedule. Any other change disposes it; a non-empty enabled set then
    /// starts a fresh subscription that polls immediately.
    pub fn reconfigure(&self, ids: &[String], enabled: bool) {
        let mut current = lock(&self.current);

        if enabled
            && current
                .as_ref()
                .is_some_and(|active| active.ids.as_slice() == ids)
        {
            return;
        }

        if let Some(previous) = current.take() {
            previous.subscription.dispose();
        }

        if !enabled || ids.is_empty() {
            tracing::debug!(enabled, "Status polling idle");
            return;
        }

        *current = self.subscribe(ids.to_vec()).map(|subscription| ActiveTarget {
            ids: ids.to_vec(),
            subscription,
        });
    }

    /// Dispose the managed subscription.
    pub fn stop(&self) {
        if let Some(previous) = lock(&self.current).take() {
            previous.subscription.dispose();
        }
    }

    pub fn phase(&self) -> PollPhase {
        lock(&self.current)
            .as_ref()
            .map(|active| active.subscription.phase())
            .unwrap_or(PollPhase::Idle)
    }

    pub fn target_ids(&self) -> Vec<String> {
        lock(&self.current)
            .as_ref()
            .map(|active| active.ids.clone())
            .unwrap_or_default()
    }
}

impl Drop for PollingCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Disposer for one polling schedule. Dropping it disposes it.
pub struct PollSubscription {
    generation: u64,
    token: CancellationToken,
    delivery: Arc<Mutex<()>>,
    phase: watch::Receiver<PollPhase>,
}

impl PollSubscription {
    /// Stop the timer and suppress any result still in flight.
    ///
    /// Waits for a delivery that is already running, so it must not be
    /// called from inside the status callback of the same subscription.
    pub fn dispose(&self) {
        let _delivery = lock(&self.delivery);
        if !self.token.is_cancelled() {
            tracing::debug!(generation = self.generation, "Disposing status poll subscription");
            self.token.cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> PollPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions, mainly for tests and diagnostics.
    pub fn phase_changes(&self) -> watch::Receiver<PollPhase> {
        self.phase.clone()
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn run_subscription(
    shared: Arc<Shared>,
    ids: Vec<String>,
    generation: u64,
    token: CancellationToken,
    delivery: Arc<Mutex<()>>,
    phase: watch::Sender<PollPhase>,
) {
    loop {
        phase.send_replace(PollPhase::Polling);
        let result = shared.client.query_statuses(&ids).await;

        match result {
            Ok(updates) => {
                let _delivery = lock(&delivery);
                if token.is_cancelled() {
                    tracing::debug!(
                        generation,
                        "Discarding status batch for disposed subscription"
                    );
                    record_poll_cycle("discarded");
                    break;
                }
                tracing::debug!(generation, received = updates.len(), "Delivering status batch");
                let callback = shared.current_callback();
                callback(updates);
                record_poll_cycle("success");
            }
            Err(e) => {
                if token.is_cancelled() {
                    record_poll_cycle("discarded");
                    break;
                }
                tracing::warn!(generation, error = %e, "Status poll failed, retrying next cycle");
                record_poll_cycle("failure");
            }
        }

        phase.send_replace(PollPhase::Scheduled);
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(shared.interval) => {}
        }
    }

    phase.send_replace(PollPhase::Idle);
    tracing::debug!(generation, "Status poll subscription finished");
}

#[cfg(test)]
mod tests;
