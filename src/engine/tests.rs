use super::IngestEngine;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde_json::{Value, json};

use crate::config::CardConfig;
use crate::fetch::{Fetch, FetchError};
use crate::models::{RawRecord, TapMismatch, Transaction};
use crate::notify::Notifier;
use crate::storage::{SqliteStore, Store};

/// Serves canned raw record batches per card, failing for listed cards.
#[derive(Default)]
struct StaticFetch {
    records: HashMap<String, Vec<RawRecord>>,
    failing: HashSet<String>,
}

impl StaticFetch {
    fn with_records(card_id: &str, records: Vec<RawRecord>) -> Self {
        let mut fetch = Self::default();
        fetch.records.insert(card_id.to_string(), records);
        fetch
    }

    fn add_records(mut self, card_id: &str, records: Vec<RawRecord>) -> Self {
        self.records.insert(card_id.to_string(), records);
        self
    }

    fn fail_for(mut self, card_id: &str) -> Self {
        self.failing.insert(card_id.to_string());
        self
    }
}

impl Fetch for StaticFetch {
    async fn fetch_raw_records(&self, card_id: &str) -> Result<Vec<RawRecord>, FetchError> {
        if self.failing.contains(card_id) {
            return Err(FetchError::new(card_id, "simulated outage"));
        }
        Ok(self.records.get(card_id).cloned().unwrap_or_default())
    }
}

/// Remembers every delivery so tests can assert what would have been sent.
#[derive(Clone, Default)]
struct RecordingNotifier {
    deliveries: Arc<Mutex<Vec<(String, usize, usize)>>>,
}

impl RecordingNotifier {
    fn deliveries(&self) -> Vec<(String, usize, usize)> {
        self.deliveries.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        card: &CardConfig,
        new_transactions: &[Transaction],
        new_mismatches: &[TapMismatch],
    ) {
        self.deliveries.lock().unwrap().push((
            card.id.clone(),
            new_transactions.len(),
            new_mismatches.len(),
        ));
    }
}

fn record(transaction_id: &str, datetime: &str, kind: &str) -> RawRecord {
    let value = json!({
        "cardtransactionid": transaction_id,
        "description": "Bus 25B To City",
        "location": "Dominion Rd",
        "transactiondatetime": datetime,
        "hop-balance-display": "$21.50",
        "value": -3.5,
        "value-display": "-$3.50",
        "journey-id": "journey-7",
        "refundrequested": 0,
        "refundable-value": 0.0,
        "transaction-type-description": kind,
        "transaction-type": kind,
    });
    value.as_object().cloned().expect("record fixture is an object")
}

fn engine_with(
    fetch: StaticFetch,
) -> Result<(
    Arc<SqliteStore>,
    RecordingNotifier,
    IngestEngine<SqliteStore, StaticFetch, RecordingNotifier>,
)> {
    let store = Arc::new(SqliteStore::in_memory()?);
    let notifier = RecordingNotifier::default();
    let engine = IngestEngine::new(store.clone(), Arc::new(fetch), notifier.clone());
    Ok((store, notifier, engine))
}

#[tokio::test]
async fn test_run_cycle_is_idempotent_for_identical_remote_data() -> Result<()> {
    let fetch = StaticFetch::with_records(
        "card-a",
        vec![
            record("txn-1", "2026-08-01T08:00:00", "TagOn"),
            record("txn-2", "2026-08-01T08:30:00", "TagOff"),
        ],
    );
    let (store, _, engine) = engine_with(fetch)?;
    let card = CardConfig::new("card-a", Some("Paul"));

    let first_run = engine.run_cycle(&card).await?;
    let second_run = engine.run_cycle(&card).await?;

    assert_eq!(first_run.len(), 2);
    assert!(second_run.is_empty());
    assert_eq!(store.history_for("card-a")?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_run_cycle_skips_malformed_records() -> Result<()> {
    let mut broken = record("txn-3", "2026-08-01T09:00:00", "TagOn");
    broken.remove("cardtransactionid");

    let fetch = StaticFetch::with_records(
        "card-a",
        vec![
            record("txn-1", "2026-08-01T08:00:00", "TagOn"),
            record("txn-2", "2026-08-01T08:30:00", "TagOff"),
            broken,
            record("txn-4", "2026-08-01T09:30:00", "TagOn"),
            record("txn-5", "2026-08-01T10:00:00", "TagOff"),
        ],
    );
    let (store, _, engine) = engine_with(fetch)?;

    let inserted = engine.run_cycle(&CardConfig::new("card-a", None)).await?;

    assert_eq!(inserted.len(), 4);
    assert_eq!(store.history_for("card-a")?.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_run_cycle_skips_pending_rows() -> Result<()> {
    let pending = json!({ "description": "TRANSACTION(S) PENDING" })
        .as_object()
        .cloned()
        .expect("pending fixture is an object");

    let fetch = StaticFetch::with_records(
        "card-a",
        vec![pending, record("txn-1", "2026-08-01T08:00:00", "TagOn")],
    );
    let (_, _, engine) = engine_with(fetch)?;

    let inserted = engine.run_cycle(&CardConfig::new("card-a", None)).await?;

    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].cardtransactionid, "txn-1");

    Ok(())
}

#[tokio::test]
async fn test_run_cycle_keeps_first_of_in_batch_duplicates() -> Result<()> {
    let mut conflicting = record("txn-1", "2026-08-01T08:00:00", "TagOn");
    conflicting.insert("description".to_string(), Value::from("Changed later"));

    let fetch = StaticFetch::with_records(
        "card-a",
        vec![record("txn-1", "2026-08-01T08:00:00", "TagOn"), conflicting],
    );
    let (store, _, engine) = engine_with(fetch)?;

    let inserted = engine.run_cycle(&CardConfig::new("card-a", None)).await?;

    assert_eq!(inserted.len(), 1);
    let history = store.history_for("card-a")?;
    assert_eq!(history[0].description.as_deref(), Some("Bus 25B To City"));

    Ok(())
}

#[tokio::test]
async fn test_run_once_isolates_card_failures() -> Result<()> {
    let fetch = StaticFetch::with_records(
        "card-b",
        vec![record("txn-1", "2026-08-01T08:00:00", "TagOn")],
    )
    .fail_for("card-a");
    let (store, notifier, engine) = engine_with(fetch)?;

    let cards = vec![
        CardConfig::new("card-a", Some("Paul")),
        CardConfig::new("card-b", Some("Family")),
    ];
    let report = engine.run_once(&cards).await;

    assert_eq!(report.failed_cards, 1);
    assert_eq!(report.new_transactions, 1);
    assert!(!report.all_succeeded());
    assert_eq!(store.history_for("card-b")?.len(), 1);
    assert!(store.history_for("card-a")?.is_empty());

    let deliveries = notifier.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "card-b");

    Ok(())
}

#[tokio::test]
async fn test_run_once_reports_and_notifies_mismatches() -> Result<()> {
    let fetch = StaticFetch::with_records(
        "card-a",
        vec![
            record("txn-1", "2026-08-01T08:00:00", "TagOn"),
            record("txn-2", "2026-08-01T09:00:00", "TagOn"),
        ],
    );
    let (_, notifier, engine) = engine_with(fetch)?;
    let cards = vec![CardConfig::new("card-a", None)];

    let report = engine.run_once(&cards).await;

    assert_eq!(report.new_transactions, 2);
    assert_eq!(report.new_mismatches, 1);
    assert!(report.all_succeeded());
    assert_eq!(notifier.deliveries(), vec![("card-a".to_string(), 2, 1)]);

    // Second poll with identical remote data: nothing new, nothing delivered.
    let repeat = engine.run_once(&cards).await;
    assert_eq!(repeat.new_transactions, 0);
    assert_eq!(repeat.new_mismatches, 0);
    assert_eq!(notifier.deliveries().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_run_once_isolates_cards_from_each_other() -> Result<()> {
    let fetch = StaticFetch::with_records(
        "card-a",
        vec![
            record("txn-1", "2026-08-01T08:00:00", "TagOn"),
            record("txn-2", "2026-08-01T09:00:00", "TagOn"),
        ],
    )
    .add_records(
        "card-b",
        vec![
            record("txn-1", "2026-08-01T08:00:00", "TagOn"),
            record("txn-2", "2026-08-01T08:30:00", "TagOff"),
        ],
    );
    let (store, _, engine) = engine_with(fetch)?;

    let cards = vec![
        CardConfig::new("card-a", None),
        CardConfig::new("card-b", None),
    ];
    let report = engine.run_once(&cards).await;

    assert_eq!(report.new_transactions, 4);
    assert_eq!(report.new_mismatches, 1);
    assert!(store.has_notified("card-a", "txn-2")?);
    assert!(!store.has_notified("card-b", "txn-2")?);

    Ok(())
}
