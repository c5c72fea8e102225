// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sortable 20-byte identifiers used for endpoints, frames, and correlation
//! groups.
//!
//! The layout is a 4-byte big-endian Unix timestamp (seconds) followed by 16
//! bytes of process-local randomness. Byte-sorting the identifier therefore
//! sorts by creation time first, which is what the discovery layer's
//! name-clash tie-break relies on (prefer the smaller, i.e. older, id).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A 20-byte sortable, globally-unique identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Serialize, serde::Deserialize)]
pub struct MeshId([u8; 20]);

/// Identifies one running endpoint.
pub type EndpointId = MeshId;
/// Identifies one frame on the wire; fresh for every send, reused across
/// retransmissions of the same frame.
pub type FrameId = MeshId;
/// Identifies all fragments belonging to one logical published message.
pub type CorrelationId = MeshId;

impl MeshId {
    /// Build an id from raw bytes, no validation performed.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// The all-zero id, used as a sentinel "no id" value.
    pub const fn zero() -> Self {
        Self([0u8; 20])
    }

    /// True if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Raw byte representation.
    pub const fn as_bytes(&self) -> [u8; 20] {
        self.0
    }

    /// Generate a fresh id: current Unix timestamp prefix plus 16 bytes of
    /// process-local randomness.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 20];

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        bytes[0..4].copy_from_slice(&(secs as u32).to_be_bytes());

        let mut state = mix_seed();
        for chunk in bytes[4..20].chunks_mut(8) {
            state = splitmix64(state);
            let word = state.to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }

        Self(bytes)
    }
}

/// Combines wall-clock nanoseconds, the process id, and a per-process
/// monotonic counter into a seed. Not cryptographically secure; identifiers
/// only need to avoid collision within a LAN's worth of endpoints, not
/// resist an adversary.
fn mix_seed() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let pid = std::process::id() as u64;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);

    nanos ^ (pid.rotate_left(17)) ^ (seq.wrapping_mul(0x9E3779B97F4A7C15))
}

/// SplitMix64, used here purely as a fast deterministic avalanche step, not
/// as a cryptographic primitive.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MeshId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_round_trips_through_as_bytes() {
        let bytes = [7u8; 20];
        let id = MeshId::from_bytes(bytes);
        assert_eq!(id.as_bytes(), bytes);
    }

    #[test]
    fn zero_is_zero() {
        assert!(MeshId::zero().is_zero());
        assert!(!MeshId::generate().is_zero());
    }

    #[test]
    fn display_is_dot_separated_hex() {
        let id = MeshId::from_bytes([0xab; 20]);
        let s = id.to_string();
        assert_eq!(s, vec!["ab"; 20].join("."));
    }

    #[test]
    fn generate_is_unique_across_calls() {
        let a = MeshId::generate();
        let b = MeshId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn sorts_by_timestamp_prefix_first() {
        let mut older = [0u8; 20];
        older[0..4].copy_from_slice(&100u32.to_be_bytes());
        let mut newer = [0u8; 20];
        newer[0..4].copy_from_slice(&200u32.to_be_bytes());

        assert!(MeshId::from_bytes(older) < MeshId::from_bytes(newer));
    }

    #[test]
    fn equality_and_hash_are_consistent() {
        let a = MeshId::from_bytes([1u8; 20]);
        let b = MeshId::from_bytes([1u8; 20]);
        assert_eq!(a, b);

        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }
}
