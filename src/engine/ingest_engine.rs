use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::CardConfig;
use crate::detector::TapMismatchDetector;
use crate::fetch::{Fetch, FetchError};
use crate::models::{Transaction, is_pending};
use crate::notify::Notifier;
use crate::storage::{Store, StoreError};

/// A cycle-aborting failure for one card. Other cards in the same poll are
/// unaffected; the outer loop retries at the next scheduled interval.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary of one poll cycle across every configured card.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub new_transactions: usize,
    pub new_mismatches: usize,
    pub failed_cards: usize,
}

impl CycleReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed_cards == 0
    }
}

/// Incremental-ingestion engine: decides which remote records are new
/// relative to the store, commits them atomically, and drives the detector
/// and notifier with the results.
pub struct IngestEngine<S, F, N> {
    store: Arc<S>,
    fetch: Arc<F>,
    notifier: N,
    detector: TapMismatchDetector,
}

impl<S: Store, F: Fetch, N: Notifier> IngestEngine<S, F, N> {
    pub fn new(store: Arc<S>, fetch: Arc<F>, notifier: N) -> Self {
        Self {
            store,
            fetch,
            notifier,
            detector: TapMismatchDetector,
        }
    }

    /// Ingests one card: fetch, normalize, diff against the store, insert
    /// the difference atomically. Returns exactly the inserted transactions;
    /// a repeat run against identical remote data returns an empty set.
    ///
    /// One malformed record never blocks the rest of its batch; it is
    /// logged and skipped at record granularity.
    pub async fn run_cycle(&self, card: &CardConfig) -> Result<Vec<Transaction>, CycleError> {
        let raw_records = self.fetch.fetch_raw_records(&card.id).await?;

        let mut normalized = Vec::with_capacity(raw_records.len());
        for record in &raw_records {
            if is_pending(record) {
                debug!("Skipping pending transaction for card [{}]", card.id);
                continue;
            }

            match Transaction::from_raw(&card.id, card.name.as_deref(), record) {
                Ok(transaction) => normalized.push(transaction),
                Err(error) => warn!("Skipping record for card [{}]: {error}", card.id),
            }
        }

        let known = self.store.existing_ids(&card.id)?;
        let fresh: Vec<Transaction> = normalized
            .into_iter()
            .filter(|transaction| !known.contains(&transaction.cardtransactionid))
            .collect();

        let inserted = self.store.insert_new(&fresh)?;
        Ok(inserted)
    }

    /// Processes every configured card in turn. One card's failure is logged
    /// and never prevents processing of the others; notification failures
    /// are absorbed by the notifier and never roll back storage.
    pub async fn run_once(&self, cards: &[CardConfig]) -> CycleReport {
        let mut report = CycleReport::default();

        for card in cards {
            info!("Scraping card [{}] ({})", card.id, card.display_name());

            let inserted = match self.run_cycle(card).await {
                Ok(inserted) => inserted,
                Err(cycle_error) => {
                    error!("Cycle failed for card [{}]: {cycle_error}", card.id);
                    report.failed_cards += 1;
                    continue;
                }
            };

            for transaction in &inserted {
                info!(
                    "New transaction [{}] for card [{}] ({})",
                    transaction.cardtransactionid,
                    card.id,
                    card.display_name()
                );
            }

            let mismatches = match self.detector.detect(self.store.as_ref(), &card.id) {
                Ok(mismatches) => mismatches,
                Err(store_error) => {
                    error!(
                        "Mismatch detection failed for card [{}]: {store_error}",
                        card.id
                    );
                    report.failed_cards += 1;
                    Vec::new()
                }
            };

            report.new_transactions += inserted.len();
            report.new_mismatches += mismatches.len();

            if !inserted.is_empty() || !mismatches.is_empty() {
                self.notifier.notify(card, &inserted, &mismatches).await;
            }
        }

        report
    }
}
