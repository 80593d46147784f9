use tracing::warn;

use crate::models::{TapKind, TapMismatch, Transaction};
use crate::storage::{Store, StoreError};

/// Detects tap mismatches by replaying a card's chronological history.
///
/// The state is a single slot per card: the last entry-type transaction with
/// no matching exit yet, or none. A second entry while the slot is occupied
/// is a mismatch; exit and clearing events empty the slot. Cards are fully
/// independent, and nothing is carried across calls; the notification table
/// alone guarantees at-most-once surfacing over repeated full rescans.
#[derive(Debug, Default)]
pub struct TapMismatchDetector;

impl TapMismatchDetector {
    /// Returns the mismatches in this card's history that have not been
    /// surfaced before, recording each one as it is surfaced.
    pub fn detect<S: Store>(
        &self,
        store: &S,
        card_id: &str,
    ) -> Result<Vec<TapMismatch>, StoreError> {
        let history = store.history_for(card_id)?;

        let mut open_entry: Option<&Transaction> = None;
        let mut flagged: Vec<(&Transaction, &Transaction)> = Vec::new();

        for transaction in &history {
            match TapKind::classify(transaction.transaction_type.as_deref()) {
                TapKind::Entry => {
                    if let Some(previous) = open_entry {
                        flagged.push((transaction, previous));
                    }
                    // The new entry becomes the open one either way, so a
                    // third consecutive entry is flagged against the second.
                    open_entry = Some(transaction);
                }
                TapKind::Exit | TapKind::Clearing => open_entry = None,
                TapKind::Other => {}
            }
        }

        let mut surfaced = Vec::new();

        for (transaction, previous) in flagged {
            if store.has_notified(card_id, &transaction.cardtransactionid)? {
                continue;
            }

            let mismatch = TapMismatch::consecutive_entries(transaction, previous);
            match store.record_notified(&mismatch) {
                Ok(()) => surfaced.push(mismatch),
                // A lost race on the same key is benign; any other failure is
                // logged and skipped so the remaining mismatches still land.
                Err(error) => warn!(
                    "Could not record mismatch [{}] for card [{card_id}]: {error}",
                    transaction.cardtransactionid
                ),
            }
        }

        Ok(surfaced)
    }
}
