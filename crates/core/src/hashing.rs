//! Deterministic bucketing of identifiers.
//!
//! Used by the simulator to pick a stable sample result per job id.

use sha2::{Digest, Sha256};

/// Map `data` onto `0..len` using the first eight bytes of its SHA-256
/// digest. Returns `0` when `len` is zero.
pub fn stable_index(data: &[u8], len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let hash = Sha256::digest(data);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    (u64::from_be_bytes(prefix) % len as u64) as usize
}
