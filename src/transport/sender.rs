// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliable unicast frame sender: resolves a named peer's address through
//! discovery, optionally tracks the frame for retransmission, and fans a
//! frame out to every currently-known peer for `broadcast`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RETRANSMIT_PERIOD;
use crate::discovery;
use crate::error::{Error, Result};
use crate::id::{CorrelationId, EndpointId, FrameId};
use crate::network;
use crate::transport::retransmit::RetransmitTable;
use crate::wire::{self, Container, Frame};
use crate::worker::ScheduledWorker;

/// Sends frames to named peers, tracks outstanding ACKs, and retransmits on
/// a schedule until acknowledged or expired.
pub struct Sender {
    self_id: EndpointId,
    self_name: String,
    network_id: i64,
    discovery: Arc<discovery::Manager>,
    network: Arc<network::Manager>,
    retransmit: Arc<RetransmitTable>,
    scheduler: parking_lot::Mutex<Option<ScheduledWorker>>,
}

impl Sender {
    /// Build a sender and start its retransmit scheduler.
    pub fn new(
        self_id: EndpointId,
        self_name: String,
        network_id: i64,
        discovery: Arc<discovery::Manager>,
        network: Arc<network::Manager>,
    ) -> Arc<Self> {
        let retransmit = Arc::new(RetransmitTable::new());

        let sender = Arc::new(Self {
            self_id,
            self_name,
            network_id,
            discovery,
            network: Arc::clone(&network),
            retransmit: Arc::clone(&retransmit),
            scheduler: parking_lot::Mutex::new(None),
        });

        let worker = ScheduledWorker::spawn(
            RETRANSMIT_PERIOD,
            || {},
            move || retransmit.sweep(&network),
            || {},
        );
        *sender.scheduler.lock() = Some(worker);

        sender
    }

    /// Send one frame to a peer known to discovery by name.
    #[allow(clippy::too_many_arguments)]
    pub fn send(
        &self,
        resend_period: Duration,
        resend_expiry: Duration,
        correlation_id: CorrelationId,
        fragment_count: i64,
        fragment_index: i64,
        dst_id: EndpointId,
        dst_name: &str,
        needs_ack: bool,
        is_ack: bool,
        payload: Vec<u8>,
    ) -> Result<FrameId> {
        let peer = self
            .discovery
            .get_by_name(dst_name)
            .ok_or_else(|| Error::UnknownEndpoint(dst_name.to_string()))?;
        let destination = resolve_peer_address(&peer)
            .ok_or_else(|| Error::UnknownEndpoint(dst_name.to_string()))?;

        let frame_id = FrameId::generate();
        let frame = Frame {
            frame_id,
            correlation_id,
            fragment_count,
            fragment_index,
            destination_endpoint_id: dst_id,
            destination_endpoint_name: dst_name.to_string(),
            needs_ack,
            is_ack,
            payload,
            resend_period,
            resend_expiry,
        };

        let network_sender = self.network.sender(destination);
        let source = network_sender.ensure_open().unwrap_or(destination);

        let mut container = Container::new_frame(
            self.network_id,
            self.self_id,
            self.self_name.clone(),
            destination.to_string(),
            frame,
        );
        container.sent_by = source.to_string();

        if needs_ack && !is_ack {
            self.retransmit.track(frame_id, container.clone(), destination);
        }

        let bytes = wire::serialize(&container)?;
        network_sender.send(&bytes)?;
        Ok(frame_id)
    }

    /// Send the same frame to every currently-known peer. An ACK is never
    /// broadcast (it is a targeted reply). Per-peer failures are logged and
    /// do not abort the rest of the broadcast.
    #[allow(clippy::too_many_arguments)]
    pub fn broadcast(
        &self,
        resend_period: Duration,
        resend_expiry: Duration,
        correlation_id: CorrelationId,
        fragment_count: i64,
        fragment_index: i64,
        needs_ack: bool,
        payload: Vec<u8>,
    ) {
        for peer in self.discovery.get_all(false) {
            let dst_id = peer.source_endpoint_id;
            let dst_name = peer.source_endpoint_name.clone();
            if let Err(e) = self.send(
                resend_period,
                resend_expiry,
                correlation_id,
                fragment_count,
                fragment_index,
                dst_id,
                &dst_name,
                needs_ack,
                false,
                payload.clone(),
            ) {
                log::debug!("transport: broadcast to '{dst_name}' failed: {e}");
            }
        }
    }

    /// Reply to a received frame with an empty ACK frame, sent once,
    /// directly back to the address the datagram actually arrived from
    /// (not a discovery-resolved address) — an ACK only promises "this
    /// frame reached a listener on this port", nothing about the intended
    /// destination endpoint.
    pub fn send_ack(&self, received: &Container) {
        let Some(frame) = &received.frame else {
            return;
        };
        let Some(destination) = received.received_from else {
            return;
        };

        let ack_frame = Frame::ack_for(frame, self.self_id, self.self_name.clone());
        let container = Container::new_frame(
            received.network_id,
            self.self_id,
            self.self_name.clone(),
            destination.to_string(),
            ack_frame,
        );

        match wire::serialize(&container) {
            Ok(bytes) => {
                let sender = self.network.sender(destination);
                if let Err(e) = sender.send(&bytes) {
                    log::debug!("transport: ack send to {destination} failed: {e}");
                }
            }
            Err(e) => log::warn!("transport: failed to encode ack: {e}"),
        }
    }

    /// Stop retransmitting a frame in response to a received ACK. An ACK
    /// for a frame we aren't (or are no longer) tracking is common and
    /// benign — it just means `resend_expiry` already won the race.
    pub fn mark_ack(&self, container: &Container) {
        let Some(frame) = &container.frame else {
            return;
        };
        if !self.retransmit.ack(frame.frame_id) {
            log::warn!("transport: ack for untracked frame {}", frame.frame_id);
        }
    }

    /// Number of frames currently awaiting acknowledgement.
    pub fn pending_count(&self) -> usize {
        self.retransmit.len()
    }

    /// Stop the retransmit scheduler.
    pub fn stop(&self) {
        if let Some(mut worker) = self.scheduler.lock().take() {
            worker.stop();
        }
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The peer's unicast listen address: IP observed by the network layer when
/// its most recent announcement arrived, port taken from the announcement
/// itself.
fn resolve_peer_address(peer: &Container) -> Option<SocketAddr> {
    let announcement = peer.announcement.as_ref()?;
    let ip = peer.received_from?.ip();
    Some(SocketAddr::new(ip, announcement.listen_port))
}
