// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP socket management.
//!
//! Turns datagrams into bytes on the wire and bytes on the wire into
//! callbacks. Sockets are opened lazily on first use and cached by the
//! [`Manager`] so that repeated sends to the same destination, or repeated
//! registrations on the same bind address, reuse one socket.

mod manager;
pub mod multicast;
mod receiver;
mod sender;

pub use manager::Manager;
pub use receiver::{CallbackHandle, Receiver};
pub use sender::Sender;

use std::net::SocketAddr;

/// A datagram as observed by a receiver: source address, the address it
/// arrived on, and the raw bytes.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Address the packet was sent from.
    pub src: SocketAddr,
    /// Local address the packet was received on.
    pub dst: SocketAddr,
    /// Raw payload bytes.
    pub bytes: Vec<u8>,
}
