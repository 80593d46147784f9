use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, OpenFlags, Row, params};

use crate::models::{TapMismatch, Transaction};
use crate::storage::{Store, StoreError};
use crate::types::TransactionId;

/// Schema SQL embedded at compile time. Creation is idempotent; existing
/// rows are never dropped or migrated.
const SCHEMA_SQL: &str = include_str!("schema.sql");

const TRANSACTION_COLUMNS: &str = "card_id, card_name, cardtransactionid, description, location, \
     transactiondatetime, hop_balance_display, value, value_display, journey_id, \
     refundrequested, refundable_value, transaction_type_description, transaction_type";

/// SQLite-backed durable store.
///
/// WAL mode allows concurrent reads; the connection mutex serializes writers
/// so the per-batch atomicity guarantee holds even under concurrent card
/// fan-out.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory store, used by tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Poisoning means another thread panicked mid-operation; there is no
        // sane state to resume from.
        self.conn.lock().unwrap()
    }

    fn map_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
        Ok(Transaction {
            card_id: row.get(0)?,
            card_name: row.get(1)?,
            cardtransactionid: row.get(2)?,
            description: row.get(3)?,
            location: row.get(4)?,
            transactiondatetime: row.get(5)?,
            hop_balance_display: row.get(6)?,
            value: row.get(7)?,
            value_display: row.get(8)?,
            journey_id: row.get(9)?,
            refundrequested: row.get(10)?,
            refundable_value: row.get(11)?,
            transaction_type_description: row.get(12)?,
            transaction_type: row.get(13)?,
        })
    }
}

impl Store for SqliteStore {
    fn insert_new(&self, transactions: &[Transaction]) -> Result<Vec<Transaction>, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut inserted = Vec::new();

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO transactions ({TRANSACTION_COLUMNS}) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)"
            ))?;

            for transaction in transactions {
                let changed = stmt.execute(params![
                    transaction.card_id,
                    transaction.card_name,
                    transaction.cardtransactionid,
                    transaction.description,
                    transaction.location,
                    transaction.transactiondatetime,
                    transaction.hop_balance_display,
                    transaction.value,
                    transaction.value_display,
                    transaction.journey_id,
                    transaction.refundrequested,
                    transaction.refundable_value,
                    transaction.transaction_type_description,
                    transaction.transaction_type,
                ])?;

                if changed == 1 {
                    inserted.push(transaction.clone());
                }
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn existing_ids(&self, card_id: &str) -> Result<HashSet<TransactionId>, StoreError> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT cardtransactionid FROM transactions WHERE card_id = ?1")?;

        let ids = stmt
            .query_map(params![card_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;

        Ok(ids)
    }

    fn history_for(&self, card_id: &str) -> Result<Vec<Transaction>, StoreError> {
        let conn = self.lock();
        // The remote timestamp is a string on the remote clock; the id
        // tie-break keeps replay order deterministic for equal timestamps.
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE card_id = ?1 \
             ORDER BY transactiondatetime ASC, cardtransactionid ASC"
        ))?;

        let history = stmt
            .query_map(params![card_id], Self::map_transaction)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(history)
    }

    fn has_notified(&self, card_id: &str, transaction_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock();
        let notified = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tap_mismatch_notifications \
             WHERE card_id = ?1 AND transaction_id = ?2)",
            params![card_id, transaction_id],
            |row| row.get::<_, bool>(0),
        )?;

        Ok(notified)
    }

    fn record_notified(&self, mismatch: &TapMismatch) -> Result<(), StoreError> {
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO tap_mismatch_notifications \
             (card_id, transaction_id, mismatch_type, notified_at, previous_transaction_id) \
             VALUES (?1,?2,?3,?4,?5)",
            params![
                mismatch.card_id,
                mismatch.transaction_id,
                mismatch.mismatch_type.as_str(),
                mismatch.notified_at.to_rfc3339(),
                mismatch.previous_transaction_id,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(error, _))
                if error.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateNotification {
                    card_id: mismatch.card_id.clone(),
                    transaction_id: mismatch.transaction_id.clone(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }
}
