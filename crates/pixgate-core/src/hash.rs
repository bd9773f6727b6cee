//! Frozen stable hash for sticky routing and fingerprints
//!
//! Sticky weighted routing must land the same subject on the same gateway
//! across process restarts and snapshot recompiles, so the hash function is
//! part of the wire contract and can never change. This is 64-bit FNV-1a:
//! starting from the offset basis, each input byte is XORed in and the state
//! multiplied by the FNV prime (wrapping). Output is the final state.

/// FNV-1a 64-bit offset basis.
pub const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash `bytes` with 64-bit FNV-1a.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut h = FNV_OFFSET;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Bucket a sticky key into `[0, total)`.
///
/// Input bytes are `salt`, a `:` separator and the key's UTF-8 bytes when a
/// salt is configured, or just the key bytes otherwise. With no salt the
/// bucket for a given key is identical across every snapshot that uses the
/// same weight total.
pub fn sticky_bucket(salt: Option<&str>, key: &str, total: u64) -> u64 {
    debug_assert!(total > 0);
    let h = match salt {
        Some(salt) => {
            let mut buf = Vec::with_capacity(salt.len() + 1 + key.len());
            buf.extend_from_slice(salt.as_bytes());
            buf.push(b':');
            buf.extend_from_slice(key.as_bytes());
            fnv1a64(&buf)
        }
        None => fnv1a64(key.as_bytes()),
    };
    h % total
}
