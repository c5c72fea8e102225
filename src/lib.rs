// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # meshwire - a brokerless LAN pub/sub fabric
//!
//! Endpoints on the same multicast-capable network discover each other
//! automatically and exchange topic-addressed messages over unicast UDP,
//! with per-frame acknowledgement, retransmission, and fragmentation of
//! large payloads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshwire::{Endpoint, EndpointConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let endpoint = Endpoint::start(EndpointConfig::new("my-app", 1))?;
//!
//!     endpoint.subscribe("sensors/temperature", "f64", |msg| {
//!         println!("got {} bytes", msg.payload.len());
//!     })?;
//!
//!     endpoint.publish("sensors/temperature", "f64", &21.5f64.to_le_bytes())?;
//!
//!     endpoint.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                            Topics Layer                             |
//! |   Publisher/Publication | Subscriber/Subscription | Fragmentation  |
//! +---------------------------------------------------------------------+
//! |                          Transport Layer                            |
//! |   Frame send/recv | ACK + retransmit | Broadcast over discovery    |
//! +---------------------------------------------------------------------+
//! |                          Discovery Layer                            |
//! |   Announcer | Listener | Liveness table | Sweeper                  |
//! +---------------------------------------------------------------------+
//! |                           Network Layer                              |
//! |   UDP unicast/multicast sockets, lazily opened and cached           |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Endpoint`] | Entry point; owns discovery, transport, and topics for one process |
//! | [`EndpointId`] | 20-byte sortable identifier assigned to each endpoint at startup |
//! | [`Error`] / [`Result`] | Crate-wide error taxonomy |
//! | [`topics::Message`] | Decoded topic message delivered to a subscription callback |
//!
//! ## Modules Overview
//!
//! - [`endpoint`] - top-level façade wiring discovery, transport, and topics together
//! - [`network`] - UDP socket management (senders, receivers, multicast join)
//! - [`discovery`] - peer announcement, liveness tracking, unicast bootstrap
//! - [`transport`] - reliable frame send/receive, retransmission, discovery-driven broadcast
//! - [`topics`] - publish/subscribe registry, fragmentation, wire envelope
//! - [`worker`] - scheduled and blocked background task primitives
//! - [`config`] - crate-wide constants (ports, timeouts, buffer sizes)
//! - [`id`] - 20-byte sortable identifiers for endpoints, frames, and correlation groups
//! - [`dispatch`] - bounded callback dispatcher shared by discovery/network/topics

/// Crate-wide constants: multicast defaults, timing, and buffer sizes.
pub mod config;
/// Bounded worker-pool dispatcher used to invoke user callbacks off the I/O thread.
pub mod dispatch;
/// Peer discovery: announcer, listener, liveness table, unicast bootstrap.
pub mod discovery;
/// Top-level façade composing network, discovery, transport, and topics.
pub mod endpoint;
/// Crate-wide error taxonomy.
pub mod error;
/// Sortable 20-byte identifiers (endpoints, frames, correlation groups).
pub mod id;
/// UDP socket management: senders, receivers, multicast group membership.
pub mod network;
/// Publish/subscribe registry, fragmentation, and the wire envelope.
pub mod topics;
/// Reliable unicast transport: frame send/receive, ACK, retransmission.
pub mod transport;
/// Scheduled and blocked background task primitives.
pub mod worker;
/// The on-wire envelope shared by discovery and transport.
pub mod wire;

pub use endpoint::{Endpoint, EndpointConfig};
pub use error::{Error, Result};
pub use id::EndpointId;

/// meshwire crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
