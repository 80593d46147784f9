use thiserror::Error;

use crate::types::CardId;

/// Failures raised while normalizing one raw remote record.
///
/// These are always record-scoped: the caller logs the error and continues
/// with the rest of the batch.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record for card [{card_id}] has no usable transaction id")]
    MissingTransactionId { card_id: CardId },
    #[error("Record for card [{card_id}] is malformed: {reason}")]
    Malformed { card_id: CardId, reason: String },
}

impl RecordError {
    pub fn missing_transaction_id(card_id: &str) -> Self {
        Self::MissingTransactionId {
            card_id: card_id.to_string(),
        }
    }

    pub fn malformed(card_id: &str, reason: impl ToString) -> Self {
        Self::Malformed {
            card_id: card_id.to_string(),
            reason: reason.to_string(),
        }
    }
}
