//! Content fingerprinting for history deduplication
//!
//! The fingerprint is the SHA-256 of a canonical text form of the echo:
//!
//! ```text
//! <id byte length>:<character>|<cost>|<main stat key or ->|<kind>:<tenths>;<kind>:<tenths>;...
//! ```
//!
//! The character id is free text and may itself contain `|`, hence the
//! length prefix.
//!
//! Substats are sorted by kind and each value is rounded to one decimal
//! place (stored as integer tenths) before hashing, so input order and
//! small precision differences between two readings of the same echo do
//! not change the result. The source timestamp is not part of the identity.

use echo_common::{EchoRecord, Fingerprint, SubStat};
use sha2::{Digest, Sha256};

/// Value rounded to one decimal place, as integer tenths
pub fn quantize(value: f64) -> i64 {
    (value * 10.0).round() as i64
}

/// Canonical text form hashed by [`fingerprint`]
pub fn canonical_form(echo: &EchoRecord) -> String {
    let mut subs: Vec<&SubStat> = echo.sub_stats().iter().collect();
    subs.sort_by_key(|sub| sub.kind);

    let subs_part: String = subs
        .iter()
        .map(|sub| format!("{}:{};", sub.kind.key(), quantize(sub.value)))
        .collect();

    let character = echo.character_id();
    format!(
        "{}:{}|{}|{}|{}",
        character.len(),
        character,
        echo.cost(),
        echo.main_stat().map(|kind| kind.key()).unwrap_or("-"),
        subs_part
    )
}

/// Stable identity of an echo's content
pub fn fingerprint(echo: &EchoRecord) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(canonical_form(echo).as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());
    Fingerprint::from_hex(hash_hex)
}
