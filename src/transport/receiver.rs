// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binds the transport listen port and routes received frames: ACK emission
//! happens before anything else (even a `network_id` mismatch), ACK
//! consumption stops there, everything else is handed up to Topics.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::Result;
use crate::network::{self, CallbackHandle};
use crate::transport::Sender;
use crate::wire::{self, Container};

/// Owns the registration of the transport receive callback.
pub struct Receiver {
    receiver: Arc<network::Receiver>,
    handle: CallbackHandle,
}

impl Receiver {
    /// Bind `0.0.0.0:listen_port` and start routing frames. `sender` is used
    /// to emit ACKs and to stop retransmission on a received ACK;
    /// `on_frame` receives every frame that isn't itself an ACK.
    pub fn bind<F>(
        listen_port: u16,
        network_id: i64,
        sender: Arc<Sender>,
        network: Arc<network::Manager>,
        on_frame: F,
    ) -> Result<Self>
    where
        F: Fn(Container) + Send + Sync + 'static,
    {
        let bind_address: SocketAddr = SocketAddr::new(std::net::Ipv4Addr::UNSPECIFIED.into(), listen_port);
        let receiver = network.receiver(bind_address, None)?;

        let handle = receiver.register_callback(move |datagram| {
            let mut container = match wire::deserialize(&datagram.bytes) {
                Ok(c) => c,
                Err(e) => {
                    log::debug!("transport: dropping malformed datagram: {e}");
                    return;
                }
            };
            container.stamp_received(datagram.src, datagram.dst);

            if container.frame.is_none() {
                log::debug!("transport: dropping container without a frame");
                return;
            }

            // ACK before validating network_id: an ACK only promises "this
            // frame reached a listener on this port", not delivery to the
            // intended endpoint, so it is owed regardless.
            let needs_ack = container
                .frame
                .as_ref()
                .map(|f| f.needs_ack)
                .unwrap_or(false);
            if needs_ack {
                sender.send_ack(&container);
            }

            if container.network_id != network_id {
                return;
            }

            let is_ack = container.frame.as_ref().map(|f| f.is_ack).unwrap_or(false);
            if is_ack {
                sender.mark_ack(&container);
                return;
            }

            on_frame(container);
        });

        Ok(Self { receiver, handle })
    }

    /// The port this receiver actually bound to (useful when `listen_port`
    /// was `0` and the OS assigned one).
    pub fn listen_port(&self) -> u16 {
        self.receiver.bind_address().port()
    }

    /// Stop routing frames.
    pub fn stop(&self) {
        self.receiver.unregister_callback(self.handle);
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}
