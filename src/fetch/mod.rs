mod hop_client;

use std::future::Future;

use thiserror::Error;

use crate::models::RawRecord;
use crate::types::CardId;

pub use hop_client::HopApiClient;

/// A fetch failure for a single card. Card-scoped: the cycle logs it and
/// carries on with the remaining cards.
#[derive(Debug, Error)]
#[error("Fetch failed for card [{card_id}]: {reason}")]
pub struct FetchError {
    pub card_id: CardId,
    pub reason: String,
}

impl FetchError {
    pub fn new(card_id: &str, reason: impl ToString) -> Self {
        Self {
            card_id: card_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Boundary to the authenticated remote portal. Session acquisition lives
/// behind the implementation; the engine only sees raw record batches.
pub trait Fetch: Send + Sync + 'static {
    fn fetch_raw_records(
        &self,
        card_id: &str,
    ) -> impl Future<Output = Result<Vec<RawRecord>, FetchError>> + Send;
}
