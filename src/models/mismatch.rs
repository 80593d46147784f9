use chrono::{DateTime, Utc};

use crate::models::Transaction;
use crate::types::{CardId, TransactionId};

/// Category of a detected tap anomaly, persisted as its string code.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MismatchType {
    /// Two entry-type taps with no exit or clearing event between them.
    ConsecutiveEntries,
}

impl MismatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MismatchType::ConsecutiveEntries => "consecutive-entries",
        }
    }
}

/// One detected tap anomaly, keyed by the later transaction of the pair.
///
/// A persisted row with this identity means the anomaly has already been
/// surfaced to the user and must never be surfaced again.
#[derive(Debug, Clone)]
pub struct TapMismatch {
    pub card_id: CardId,
    /// The later transaction of the anomalous pair; the notification key.
    pub transaction_id: TransactionId,
    /// The earlier transaction that was left unmatched.
    pub previous_transaction_id: TransactionId,
    pub mismatch_type: MismatchType,
    /// Local wall-clock time the notification record was created.
    pub notified_at: DateTime<Utc>,
    /// Remote-clock timestamp of the flagged transaction, for display only.
    pub occurred_at: Option<String>,
    /// Location of the flagged transaction, for display only.
    pub location: Option<String>,
}

impl TapMismatch {
    /// Builds a consecutive-entries mismatch flagging `transaction` and
    /// referencing the earlier unmatched entry `previous`.
    pub fn consecutive_entries(transaction: &Transaction, previous: &Transaction) -> Self {
        Self {
            card_id: transaction.card_id.clone(),
            transaction_id: transaction.cardtransactionid.clone(),
            previous_transaction_id: previous.cardtransactionid.clone(),
            mismatch_type: MismatchType::ConsecutiveEntries,
            notified_at: Utc::now(),
            occurred_at: transaction.transactiondatetime.clone(),
            location: transaction.location.clone(),
        }
    }
}
