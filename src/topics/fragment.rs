// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Splits an encoded message envelope into chunks no larger than
//! [`crate::config::FRAGMENT_MAX_CHUNK_SIZE`] so each fits, with room to
//! spare, in one UDP datagram alongside its frame envelope.

/// Split `bytes` into chunks of at most `chunk_size`. An empty input yields
/// one empty chunk, not zero chunks, so a zero-length publish still sends
/// exactly one frame.
pub fn fragment(bytes: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    if bytes.is_empty() {
        return vec![Vec::new()];
    }
    bytes.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect()
}

/// Concatenate fragments already sorted by index back into the original
/// bytes.
pub fn reassemble(ordered_fragments: &[Vec<u8>]) -> Vec<u8> {
    ordered_fragments.concat()
}
