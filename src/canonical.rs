//! Canonical serialization for reproducible fingerprints.
//!
//! Allocations and run configurations are fingerprinted so a fairness
//! certificate can be matched to the exact state and parameters that
//! produced it.
//!
//! ## Determinism Guarantees
//!
//! - Maps are BTreeMaps keyed by agent/item keys, so entries serialize in
//!   ascending key order
//! - Struct fields serialize in declaration order
//! - Valuations are integers; no float formatting is involved

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute the canonical xxh64 hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute the canonical hash as a 16-digit hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}
