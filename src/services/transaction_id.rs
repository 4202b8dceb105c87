//! Transaction id generation and validation.
//!
//! Ids look like `TXN-1700000000000-k3v9qa1-5f2c8e41`: wall-clock millis, a
//! random alphanumeric segment, and a hex digest segment sourced from OS
//! randomness. Validation is case-insensitive; all keying uses the
//! upper-cased canonical form so concurrent retries that differ only in
//! case collide on the same record.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::{rngs::OsRng, Rng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

const RANDOM_SEGMENT_LEN: usize = 7;
const HASH_SEGMENT_LEN: usize = 8;

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)TXN-\d{13,}-[a-z0-9]{4,16}-[0-9a-f]{6,64}$").expect("valid id regex")
    })
}

/// Generate a fresh, globally unique transaction id.
pub fn generate_transaction_id() -> String {
    let timestamp = Utc::now().timestamp_millis();

    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SEGMENT_LEN)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();

    // Collision resistance does not rest on the thread RNG alone: the final
    // segment digests cryptographically sourced bytes.
    let mut seed = [0u8; 16];
    OsRng.fill_bytes(&mut seed);
    let mut hasher = Sha256::new();
    hasher.update(timestamp.to_be_bytes());
    hasher.update(random.as_bytes());
    hasher.update(seed);
    let digest = hex::encode(&hasher.finalize()[..HASH_SEGMENT_LEN / 2]);

    format!("TXN-{timestamp}-{random}-{digest}")
}

/// Pure predicate gating every public payment operation; malformed ids fail
/// fast and never reach storage.
pub fn is_valid_transaction_id(id: &str) -> bool {
    id_pattern().is_match(id)
}

/// Upper-cased canonical form used for cache keys and datastore lookups.
pub fn canonical_transaction_id(id: &str) -> String {
    id.to_ascii_uppercase()
}
