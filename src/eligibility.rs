//! Eligibility verification for issuance requests.
//!
//! First issuance is gated by a keccak256 sorted-pair merkle membership proof against the
//! commitment root published on the ledger. Periodic issuance is gated by the rolling
//! [`PERIODIC_WINDOW_DAYS`] window since the wallet's most recent periodic record.
//!
//! Both checks are pure with respect to their inputs: no I/O, fully deterministic.

use crate::constants::{MAX_PROOF_DEPTH, PERIODIC_WINDOW_DAYS};
use alloy::primitives::{Address, B256, Bytes, keccak256};
use chrono::{DateTime, Duration, Utc};

/// Hashes a wallet address into its leaf node.
pub fn leaf_hash(wallet: Address) -> B256 {
    keccak256(wallet)
}

/// Hashes a sorted node pair: `keccak256(min(a, b) || max(a, b))`.
///
/// Sorting makes the path recomputation independent of sibling position, matching how the
/// commitment root is built out-of-band.
pub fn hash_pair(a: B256, b: B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_slice());
    buf[32..].copy_from_slice(hi.as_slice());
    keccak256(buf)
}

/// Verifies a first-issuance membership proof against a commitment root.
///
/// The proof is an opaque byte string: a concatenation of 32-byte sibling hashes ordered from the
/// leaf up. Recomputes the path from the wallet leaf and returns `true` only on an exact root
/// match. Any malformed proof returns `false`; this never panics or errors.
pub fn verify_first(wallet: Address, proof: &Bytes, commitment_root: B256) -> bool {
    if proof.len() % 32 != 0 || proof.len() / 32 > MAX_PROOF_DEPTH {
        return false;
    }

    let mut node = leaf_hash(wallet);
    for sibling in proof.chunks_exact(32) {
        node = hash_pair(node, B256::from_slice(sibling));
    }

    node == commitment_root
}

/// Verifies periodic-issuance eligibility.
///
/// Returns `true` iff at least [`PERIODIC_WINDOW_DAYS`] days have elapsed since the wallet's most
/// recent periodic record. Callers with no prior record must not call this; periodic issuance
/// without a preceding first issuance is rejected upstream.
pub fn verify_periodic(last_record_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(last_record_at) >= Duration::days(PERIODIC_WINDOW_DAYS)
}
