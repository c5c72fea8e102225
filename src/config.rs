// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide constants: multicast defaults, datagram sizing, and the timing
//! budgets that drive every scheduled worker in the mesh.
//!
//! Every numeric default named here matches the reference wire format and
//! timing contract; changing them is safe locally but breaks interop with
//! peers running the defaults.

use std::time::Duration;

// ============================================================================
// Multicast discovery defaults
// ============================================================================

/// Default multicast group + port endpoints announce to and listen on.
pub const DEFAULT_MULTICAST_GROUP: &str = "239.192.137.1:27320";

/// Default period between discovery announcements.
pub const DEFAULT_ANNOUNCEMENT_PERIOD: Duration = Duration::from_secs(1);

/// A peer is considered expired after `announcement_period * this` elapses
/// without a fresh announcement.
pub const DEFAULT_RATE_TIMEOUT_MULTIPLIER: u32 = 3;

/// Period of the discovery liveness sweeper.
pub const DISCOVERY_SWEEPER_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// UDP datagram sizing
// ============================================================================

/// Largest UDP datagram this crate will ever send or expect to receive.
pub const MAX_UDP_DATAGRAM_SIZE: usize = 65_507;

/// Floor for the socket receive buffer on every bound receiver.
pub const RECEIVER_BUFFER_SIZE: usize = 64 * 1024;

/// Read deadline applied to every blocking `recv_from` call. A timeout is
/// not an error; it just gives the receive loop a chance to observe shutdown.
pub const RECEIVER_READ_DEADLINE: Duration = Duration::from_secs(1);

// ============================================================================
// Transport retransmission
// ============================================================================

/// Period of the transport retransmit sweep.
pub const RETRANSMIT_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Topics layer
// ============================================================================

/// Largest chunk a published payload is split into before being handed to
/// the transport layer as one frame per chunk.
pub const FRAGMENT_MAX_CHUNK_SIZE: usize = 8_192;

/// Per-fragment resend period used for publication broadcasts.
pub const MESSAGE_TIMEOUT: Duration = Duration::from_millis(100);

/// Per-fragment resend expiry used for publication broadcasts; once elapsed
/// since the first send, the transport layer gives up on that frame.
pub const MESSAGE_EXPIRY: Duration = Duration::from_millis(500);

/// Reassembly entries older than this (measured from the first fragment's
/// arrival) are dropped by the reassembly sweep even if incomplete. Chosen as
/// twice [`MESSAGE_EXPIRY`] so a reassembly never outlives every retransmit
/// attempt for its fragments.
pub const REASSEMBLY_EXPIRY: Duration = Duration::from_millis(1_000);

/// Period of the publication/subscription message-bookkeeping sweep.
pub const TOPIC_SWEEPER_PERIOD: Duration = Duration::from_millis(100);

/// Reserved subscription name that matches every topic.
pub const WILDCARD_TOPIC_NAME: &str = "#";

// ============================================================================
// Topic message type codes
// ============================================================================

/// A normally published message.
pub const MESSAGE_TYPE_STANDARD: u8 = 1;
/// A message reflected by a peer on behalf of its original publisher.
pub const MESSAGE_TYPE_FORWARDED: u8 = 2;
/// Reserved for a future late-joiner replay request. Never sent today.
pub const MESSAGE_TYPE_LATE_JOINER_REQUEST: u8 = 3;
/// Reserved for a future late-joiner replay response. Never sent today.
pub const MESSAGE_TYPE_LATE_JOINER_RESPONSE: u8 = 4;

// ============================================================================
// Bounded callback dispatcher
// ============================================================================

/// Worker threads backing the shared callback dispatcher.
pub const DISPATCH_POOL_SIZE: usize = 4;

/// Capacity of the dispatcher's job queue before new jobs are dropped.
pub const DISPATCH_QUEUE_CAPACITY: usize = 1024;
