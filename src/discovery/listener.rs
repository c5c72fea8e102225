// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receives announcement datagrams and hands well-formed, network-matching
//! ones to the liveness [`Manager`](super::Manager).

use std::net::SocketAddr;
use std::sync::Arc;

use crate::discovery::Manager;
use crate::network::{self, CallbackHandle};
use crate::wire;

/// Owns the registration of the discovery receive callback.
pub struct Listener {
    receiver: Arc<network::Receiver>,
    handle: CallbackHandle,
}

impl Listener {
    /// Bind `discovery_listen_address` (joining multicast on `interface` if
    /// applicable) and start forwarding announcements to `manager`.
    pub fn bind(
        discovery_listen_address: SocketAddr,
        interface: Option<String>,
        network_id: i64,
        manager: Arc<Manager>,
        network: Arc<network::Manager>,
    ) -> crate::error::Result<Self> {
        let receiver = network.receiver(discovery_listen_address, interface)?;

        let handle = receiver.register_callback(move |datagram| {
            let mut container = match wire::deserialize(&datagram.bytes) {
                Ok(c) => c,
                Err(e) => {
                    log::debug!("discovery: dropping malformed datagram: {e}");
                    return;
                }
            };

            if container.announcement.is_none() {
                log::debug!("discovery: dropping container without an announcement");
                return;
            }

            if container.network_id != network_id {
                return;
            }

            container.stamp_received(datagram.src, datagram.dst);
            manager.on_receive(container);
        });

        Ok(Self { receiver, handle })
    }

    /// Stop listening.
    pub fn stop(&self) {
        self.receiver.unregister_callback(self.handle);
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}
