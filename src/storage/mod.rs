mod sqlite_store;

use std::collections::HashSet;

use thiserror::Error;

use crate::models::{TapMismatch, Transaction};
use crate::types::{CardId, TransactionId};

pub use sqlite_store::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Any storage-layer I/O failure. Callers abort the current cycle and
    /// rely on the outer poll loop to retry at the next interval.
    #[error("Store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
    /// A notification row already exists for this key. Benign: it means the
    /// anomaly was surfaced on an earlier scan.
    #[error("Notification already recorded for transaction [{transaction_id}] on card [{card_id}]")]
    DuplicateNotification {
        card_id: CardId,
        transaction_id: TransactionId,
    },
}

/// Exclusive owner of the transaction and notification tables. All other
/// components go through this contract; nothing shares mutable state.
pub trait Store: Send + Sync + 'static {
    /// Inserts every transaction whose `(card_id, cardtransactionid)` key is
    /// not already present. Duplicates, in-batch or against existing rows,
    /// are silently skipped and the first occurrence wins. The whole batch is
    /// one atomic unit: on failure no row of it becomes visible.
    ///
    /// Returns exactly the transactions that were inserted.
    fn insert_new(&self, transactions: &[Transaction]) -> Result<Vec<Transaction>, StoreError>;

    /// All transaction ids already stored for a card.
    fn existing_ids(&self, card_id: &str) -> Result<HashSet<TransactionId>, StoreError>;

    /// Every stored transaction for a card in chronological order, as a
    /// consistent snapshot at the time of the call.
    fn history_for(&self, card_id: &str) -> Result<Vec<Transaction>, StoreError>;

    /// Whether a mismatch notification has already been recorded for the key.
    fn has_notified(&self, card_id: &str, transaction_id: &str) -> Result<bool, StoreError>;

    /// Records that a mismatch has been surfaced.
    ///
    /// # Errors
    /// `StoreError::DuplicateNotification` if a row for the same key already
    /// exists; callers treat that as a benign no-op.
    fn record_notified(&self, mismatch: &TapMismatch) -> Result<(), StoreError>;
}
