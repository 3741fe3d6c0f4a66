//! Stable content and URL fingerprints.
//!
//! Localized asset names embed a fingerprint of the remote URL, so the hash
//! must be identical across runs, platforms and crate versions. `blake3` gives
//! that guarantee; an in-memory hasher does not.
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash;
//!
//! let fp = hash::fingerprint_n("https://framerusercontent.com/x.woff2", 8); // -> "a1b2c3d4"
//! ```

/// Full hex digest of `data`.
#[inline]
pub fn digest<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    hex::encode(blake3::hash(data.as_ref()).as_bytes())
}

/// First `len` hex chars of the digest (clamped to the digest length).
#[inline]
pub fn fingerprint_n<T: AsRef<[u8]> + ?Sized>(value: &T, len: usize) -> String {
    let mut hex = digest(value);
    hex.truncate(len.min(hex.len()));
    hex
}
