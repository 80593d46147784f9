mod errors;
mod mismatch;
mod transaction;

pub use errors::RecordError;
pub use mismatch::{MismatchType, TapMismatch};
pub use transaction::{RawRecord, Transaction, is_pending};

/// Classification of a transaction's categorical type code for tap tracking.
///
/// The portal's category code set is not formally documented; the table below
/// follows the tag-on/tag-off naming used in its UI. Unknown codes classify
/// as [`TapKind::Other`] and never disturb the detector state.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TapKind {
    /// A tag-on event opening a journey.
    Entry,
    /// A tag-off event closing the open journey.
    Exit,
    /// An event (top-up, reload) that clears any open journey state.
    Clearing,
    /// Anything else, including an absent code.
    Other,
}

impl TapKind {
    pub fn classify(transaction_type: Option<&str>) -> Self {
        let Some(code) = transaction_type else {
            return TapKind::Other;
        };

        // Codes vary in casing and separators across endpoints ("TagOn",
        // "tag-on", "Tag On"), so compare on alphanumerics only.
        let normalized: String = code
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "tagon" | "entry" => TapKind::Entry,
            "tagoff" | "exit" => TapKind::Exit,
            "topup" | "reload" => TapKind::Clearing,
            _ => TapKind::Other,
        }
    }
}
