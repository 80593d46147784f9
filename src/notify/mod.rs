mod slack;

use std::future::Future;

use crate::config::CardConfig;
use crate::models::{TapMismatch, Transaction};

pub use slack::SlackNotifier;

/// Best-effort delivery boundary for one card's cycle results.
///
/// Implementations must swallow their own failures: data durability never
/// depends on notification success, so nothing here returns an error.
pub trait Notifier: Send + Sync + 'static {
    fn notify(
        &self,
        card: &CardConfig,
        new_transactions: &[Transaction],
        new_mismatches: &[TapMismatch],
    ) -> impl Future<Output = ()> + Send;
}

/// Notifier used when no delivery channel is configured.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        _card: &CardConfig,
        _new_transactions: &[Transaction],
        _new_mismatches: &[TapMismatch],
    ) {
    }
}
