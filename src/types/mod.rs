/// Card identifier assigned by the remote portal. Treated as an opaque string.
pub type CardId = String;

/// Transaction identifier assigned by the remote system at swipe time.
/// Unique per card; `(CardId, TransactionId)` is the global natural key.
pub type TransactionId = String;
