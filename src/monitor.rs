//! Live monitoring of the real-time reading feed.
//!
//! Each pushed reading is appended to the working set, re-tagged with the
//! three-tier classifier, and handed to an asynchronous orchestration
//! refresh. At most one completion request is in flight at a time: a
//! fresher reading cancels the task for a stale one, and a stale task's
//! verdict is dropped if its reading is no longer the newest.

use crate::analysis::{AnalysisOrchestrator, CompletionBackend, Verdict};
use crate::classify::{RiskPolicy, ThreeTierPolicy};
use crate::models::{RiskTier, SensorReading};
use crate::store::ReadingStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A finished orchestration refresh, keyed by the reading that drove it.
#[derive(Debug, Clone)]
pub struct Refresh {
    pub reading_id: i64,
    /// Tier from the synchronous classifier re-tag, for display alongside
    /// the narrative verdict.
    pub tier: RiskTier,
    pub verdict: Verdict,
}

struct InFlight {
    reading_id: i64,
    handle: JoinHandle<()>,
}

/// Owns the working set and serializes orchestration refreshes.
pub struct Monitor<B: CompletionBackend + 'static> {
    store: ReadingStore,
    orchestrator: Arc<AnalysisOrchestrator<B>>,
    refresh_tx: mpsc::UnboundedSender<Refresh>,
    in_flight: Option<InFlight>,
    last_tier: Option<RiskTier>,
}

impl<B: CompletionBackend + 'static> Monitor<B> {
    /// Creates a monitor and the channel on which finished refreshes are
    /// delivered.
    pub fn new(
        store: ReadingStore,
        orchestrator: AnalysisOrchestrator<B>,
    ) -> (Self, mpsc::UnboundedReceiver<Refresh>) {
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        (
            Self {
                store,
                orchestrator: Arc::new(orchestrator),
                refresh_tx,
                in_flight: None,
                last_tier: None,
            },
            refresh_rx,
        )
    }

    pub fn store(&self) -> &ReadingStore {
        &self.store
    }

    /// Appends a pushed reading, re-tags it synchronously, and restarts
    /// the orchestration refresh for it. Returns the tier.
    pub fn ingest(&mut self, reading: SensorReading) -> RiskTier {
        let tier = ThreeTierPolicy.classify(&reading);
        if let Some(previous) = self.last_tier {
            if previous != tier {
                info!("Risk tier transition: {} -> {}", previous, tier);
            }
        }
        self.last_tier = Some(tier);

        self.store.push(reading.clone());
        self.restart_refresh(reading, tier);
        tier
    }

    /// Cancels any in-flight orchestration and starts one for `reading`.
    ///
    /// Requests are keyed by reading identity, not collection length, so
    /// re-deliveries of the same state do not fan out extra calls and a
    /// verdict can be checked against the newest reading on arrival.
    fn restart_refresh(&mut self, reading: SensorReading, tier: RiskTier) {
        if let Some(stale) = self.in_flight.take() {
            debug!(
                "Cancelling in-flight analysis for reading {}",
                stale.reading_id
            );
            stale.handle.abort();
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let refresh_tx = self.refresh_tx.clone();
        let reading_id = reading.id;

        let handle = tokio::spawn(async move {
            let verdict = orchestrator.analyze(&reading).await;
            // A send failure just means the caller stopped listening.
            let _ = refresh_tx.send(Refresh {
                reading_id,
                tier,
                verdict,
            });
        });

        self.in_flight = Some(InFlight { reading_id, handle });
    }

    /// True when `refresh` still describes the newest reading in the set.
    /// Stale verdicts that escaped cancellation are dropped by callers.
    pub fn is_current(&self, refresh: &Refresh) -> bool {
        self.store.latest().map(|r| r.id) == Some(refresh.reading_id)
    }

    /// True while an orchestration task is still running.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|f| !f.handle.is_finished())
    }
}
