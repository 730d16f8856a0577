//! One scan loop per watch entry

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use crate::{
    admission::{AdmissionController, AdmissionKey, OperationKind},
    config::{ConfigHandle, WatchEntry},
    errors::{BotError, BotResult},
    quotes::QuoteSource,
    types::{PriceQuote, SpreadObservation},
    validation::validate_quote,
};
use super::{observe, PollBackoff};

pub const SCANNER_CALLER: &str = "scanner";

#[derive(Debug)]
pub enum PollResult {
    Observed(SpreadObservation),
    /// Nothing comparable this cycle: stale or misaligned quotes, or no gap.
    Skipped(&'static str),
    /// Either venue's admission budget is spent; neither was charged or called.
    Throttled,
    Failed(BotError),
}

pub struct EntryWorker {
    entry: WatchEntry,
    source_x: Arc<dyn QuoteSource>,
    source_y: Arc<dyn QuoteSource>,
    admission: Arc<AdmissionController>,
    config: ConfigHandle,
}

impl EntryWorker {
    pub fn new(
        entry: WatchEntry,
        source_x: Arc<dyn QuoteSource>,
        source_y: Arc<dyn QuoteSource>,
        admission: Arc<AdmissionController>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            entry,
            source_x,
            source_y,
            admission,
            config,
        }
    }

    pub fn entry(&self) -> &WatchEntry {
        &self.entry
    }

    pub async fn poll_once(&self) -> PollResult {
        let keys = [
            AdmissionKey::new(self.source_x.endpoint(), SCANNER_CALLER),
            AdmissionKey::new(self.source_y.endpoint(), SCANNER_CALLER),
        ];
        if !self.admission.try_consume_all(&keys, 1, OperationKind::Read).is_allowed() {
            return PollResult::Throttled;
        }

        let snapshot = self.config.snapshot();
        let settings = &snapshot.config.scanner;
        let timeout = Duration::from_millis(settings.quote_timeout_ms);

        let (quote_x, quote_y) = tokio::join!(
            self.fetch(&self.source_x, timeout),
            self.fetch(&self.source_y, timeout),
        );
        let (quote_x, quote_y) = match (quote_x, quote_y) {
            (Ok(x), Ok(y)) => (x, y),
            (Err(e), _) | (_, Err(e)) => return PollResult::Failed(e),
        };

        match observe(&self.entry, quote_x, quote_y, Utc::now(), settings) {
            Some(observation) => PollResult::Observed(observation),
            None => PollResult::Skipped("not comparable"),
        }
    }

    async fn fetch(&self, source: &Arc<dyn QuoteSource>, timeout: Duration) -> BotResult<PriceQuote> {
        let quote = tokio::time::timeout(
            timeout,
            source.get_quote(&self.entry.network, self.entry.token_a, self.entry.token_b),
        )
        .await
        .map_err(|_| BotError::Timeout {
            operation: format!("{} quote", source.venue()),
            after: timeout,
        })??;
        validate_quote(&quote, self.entry.token_a, self.entry.token_b)?;
        Ok(quote)
    }

    /// Polls until the observation channel closes. Paused entries wait on `paused`.
    pub async fn run(
        self,
        tx: mpsc::Sender<SpreadObservation>,
        mut paused: watch::Receiver<bool>,
        last_observation: Arc<Mutex<Option<Instant>>>,
    ) {
        let (base, max) = {
            let snapshot = self.config.snapshot();
            let s = &snapshot.config.scanner;
            (Duration::from_millis(s.poll_interval_ms), Duration::from_millis(s.max_backoff_ms))
        };
        let mut backoff = PollBackoff::new(base, max);
        info!("🔎 Scanning {} ({} vs {})", self.entry.id, self.entry.venue_x, self.entry.venue_y);

        loop {
            if *paused.borrow() {
                if paused.changed().await.is_err() {
                    return;
                }
                continue;
            }

            match self.poll_once().await {
                PollResult::Observed(observation) => {
                    backoff.on_success();
                    *last_observation.lock() = Some(Instant::now());
                    match tx.try_send(observation) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!(watch_id = %self.entry.id, "Observation channel full, dropping");
                        }
                        Err(TrySendError::Closed(_)) => return,
                    }
                }
                PollResult::Skipped(why) => {
                    backoff.on_success();
                    debug!(watch_id = %self.entry.id, why, "Cycle skipped");
                }
                // Venues were not called, so the back-off stands
                PollResult::Throttled => {
                    debug!(watch_id = %self.entry.id, "Cycle throttled");
                }
                PollResult::Failed(e) => {
                    let next = backoff.on_failure();
                    warn!(
                        watch_id = %self.entry.id,
                        failures = backoff.failures(),
                        "⚠️ Quote fetch failed: {}. Next poll in {}ms",
                        e,
                        next.as_millis()
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff.interval()) => {}
                changed = paused.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
