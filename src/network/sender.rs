// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-destination UDP sender with lazy socket open and close-on-failure
//! semantics.

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, UdpSocket};

use crate::error::Result;

/// Owns at most one connected UDP socket for a single destination address.
/// The socket is opened on first use and closed (to be reopened lazily) on
/// any send error.
pub struct Sender {
    destination: SocketAddr,
    socket: Mutex<Option<UdpSocket>>,
}

impl Sender {
    /// Build a sender for `destination`. No socket is opened yet.
    pub fn new(destination: SocketAddr) -> Self {
        Self {
            destination,
            socket: Mutex::new(None),
        }
    }

    /// The destination this sender talks to.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Send `bytes` to the destination, opening the socket on first use.
    /// On failure the cached socket is dropped so the next call retries
    /// from scratch.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.socket.lock();

        if guard.is_none() {
            *guard = Some(open_and_dial(self.destination)?);
        }

        let result = guard.as_ref().expect("just populated above").send(bytes);

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                log::debug!("send to {} failed, closing socket: {e}", self.destination);
                *guard = None;
                Err(e.into())
            }
        }
    }

    /// The local address the OS assigned to the dialed socket. `None` if no
    /// socket has been opened yet.
    pub fn source_address(&self) -> Option<SocketAddr> {
        self.socket
            .lock()
            .as_ref()
            .and_then(|s| s.local_addr().ok())
    }

    /// Open the socket (dialing the destination) if not already open, and
    /// return the local address the OS assigned. `connect()` on a UDP
    /// socket never puts a byte on the wire; it only lets the OS pick a
    /// route and source address, which is what discovery and transport
    /// need before they can stamp an outgoing container's `sent_by`.
    pub fn ensure_open(&self) -> Result<SocketAddr> {
        let mut guard = self.socket.lock();
        if guard.is_none() {
            *guard = Some(open_and_dial(self.destination)?);
        }
        guard
            .as_ref()
            .expect("just populated above")
            .local_addr()
            .map_err(Into::into)
    }

    /// Close the cached socket, if any.
    pub fn close(&self) {
        *self.socket.lock() = None;
    }
}

fn open_and_dial(destination: SocketAddr) -> Result<UdpSocket> {
    let domain = if destination.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    let any: SocketAddr = if destination.is_ipv4() {
        "0.0.0.0:0".parse().expect("valid literal address")
    } else {
        "[::]:0".parse().expect("valid literal address")
    };
    socket.bind(&any.into())?;
    socket.connect(&destination.into())?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_open_populates_source_address_without_sending() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(std::time::Duration::from_millis(100)))
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = Sender::new(addr);
        let source = sender.ensure_open().unwrap();
        assert_eq!(source.ip(), addr.ip());

        let mut buf = [0u8; 16];
        assert!(listener.recv_from(&mut buf).is_err());
    }

    #[test]
    fn sends_to_local_listener() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(std::time::Duration::from_secs(1)))
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = Sender::new(addr);
        sender.send(b"hello").unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = listener.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn close_forces_reopen_on_next_send() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = Sender::new(addr);
        sender.send(b"one").unwrap();
        assert!(sender.source_address().is_some());

        sender.close();
        assert!(sender.source_address().is_none());

        sender.send(b"two").unwrap();
        assert!(sender.source_address().is_some());
    }
}
