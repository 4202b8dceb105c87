//! Type-safe cache key builders

use std::fmt;

pub mod transaction {
    use super::*;
    use crate::services::transaction_id::canonical_transaction_id;

    /// Key of a cached transaction entry: `txn_{ID}`.
    ///
    /// The id is canonicalized so that retries differing only in case hit
    /// the same entry.
    #[derive(Debug, Clone)]
    pub struct RecordKey {
        pub transaction_id: String,
    }

    impl RecordKey {
        pub fn new(transaction_id: impl AsRef<str>) -> Self {
            Self {
                transaction_id: canonical_transaction_id(transaction_id.as_ref()),
            }
        }
    }

    impl fmt::Display for RecordKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "txn_{}", self.transaction_id)
        }
    }

    /// SCAN pattern matching every transaction entry.
    pub const SCAN_PATTERN: &str = "txn_*";
}
