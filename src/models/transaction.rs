use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

use crate::models::RecordError;
use crate::types::{CardId, TransactionId};

/// One raw record as returned by the remote transactions endpoint: an
/// untyped JSON object whose keys use the portal's dashed naming.
pub type RawRecord = serde_json::Map<String, Value>;

/// Placeholder rows the portal emits while a journey is still open. They
/// carry no stable identity yet and are skipped before normalization.
const PENDING_DESCRIPTION: &str = "TRANSACTION(S) PENDING";

/// Returns true when a raw record is a pending placeholder row.
pub fn is_pending(raw: &RawRecord) -> bool {
    raw.get("description").and_then(Value::as_str) == Some(PENDING_DESCRIPTION)
}

/// Canonical transaction entity, one per card-swipe event.
///
/// Field names match the persisted column names exactly. Only the identity
/// (`card_id`, `cardtransactionid`) is required; every other remote field
/// maps to `None` when absent rather than to a lookalike default.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Card the event belongs to (request parameter, not part of the record).
    pub card_id: CardId,
    /// Locally configured display label for the card. Not authoritative.
    pub card_name: Option<String>,
    /// Remote-assigned transaction id, unique per card, immutable.
    pub cardtransactionid: TransactionId,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Timestamp on the remote system's clock, stored verbatim.
    pub transactiondatetime: Option<String>,
    pub hop_balance_display: Option<String>,
    /// Signed amount of the event, when the remote provides one.
    pub value: Option<f64>,
    pub value_display: Option<String>,
    /// Correlation id linking the taps of one journey.
    pub journey_id: Option<String>,
    pub refundrequested: Option<i64>,
    pub refundable_value: Option<f64>,
    pub transaction_type_description: Option<String>,
    /// Categorical code distinguishing entry/exit/top-up events.
    pub transaction_type: Option<String>,
}

/// Wire shape of one remote record. Keys are dashed on the wire; everything
/// except the transaction id is optional.
#[derive(Debug, Deserialize)]
struct WireTransaction {
    cardtransactionid: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    transactiondatetime: Option<String>,
    #[serde(default, rename = "hop-balance-display")]
    hop_balance_display: Option<String>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default, rename = "value-display")]
    value_display: Option<String>,
    #[serde(default, rename = "journey-id")]
    journey_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_refund_flag")]
    refundrequested: Option<i64>,
    #[serde(default, rename = "refundable-value")]
    refundable_value: Option<f64>,
    #[serde(default, rename = "transaction-type-description")]
    transaction_type_description: Option<String>,
    #[serde(default, rename = "transaction-type")]
    transaction_type: Option<String>,
}

/// The portal has been observed sending `refundrequested` as both a bare
/// integer and a boolean; store either as 0/1.
fn deserialize_refund_flag<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(i64::from(flag))),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| de::Error::custom("refundrequested is not an integer")),
        Some(other) => Err(de::Error::custom(format!(
            "refundrequested has unexpected type: {other}"
        ))),
    }
}

impl Transaction {
    /// Normalizes one raw remote record into a canonical transaction.
    ///
    /// Total and deterministic: the same raw input and configured name always
    /// produce the same value, and nothing here touches the wall clock.
    ///
    /// # Errors
    /// Returns `RecordError` when the transaction id is absent, empty, or of
    /// the wrong shape, or when a present field cannot be decoded.
    pub fn from_raw(
        card_id: &str,
        card_name: Option<&str>,
        raw: &RawRecord,
    ) -> Result<Self, RecordError> {
        if !raw.contains_key("cardtransactionid") {
            return Err(RecordError::missing_transaction_id(card_id));
        }

        let wire: WireTransaction = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|error| RecordError::malformed(card_id, error))?;

        if wire.cardtransactionid.is_empty() {
            return Err(RecordError::missing_transaction_id(card_id));
        }

        Ok(Self {
            card_id: card_id.to_string(),
            card_name: card_name.map(str::to_string),
            cardtransactionid: wire.cardtransactionid,
            description: wire.description,
            location: wire.location,
            transactiondatetime: wire.transactiondatetime,
            hop_balance_display: wire.hop_balance_display,
            value: wire.value,
            value_display: wire.value_display,
            journey_id: wire.journey_id,
            refundrequested: wire.refundrequested,
            refundable_value: wire.refundable_value,
            transaction_type_description: wire.transaction_type_description,
            transaction_type: wire.transaction_type,
        })
    }
}
