// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The on-wire envelope shared by discovery and transport: [`Container`]
//! carries exactly one of [`Announcement`] or [`Frame`], plus common
//! addressing metadata.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};
use crate::id::{CorrelationId, EndpointId, FrameId};

/// The uniform serialized envelope. Exactly one of `announcement`/`frame`
/// is populated; enforced by [`Container::new_announcement`] /
/// [`Container::new_frame`] and re-checked in [`deserialize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub sent_timestamp: SystemTime,
    pub last_sent_timestamp: SystemTime,
    pub sent_by: String,
    pub sent_to: String,

    /// Set by the receiver; never sent on the wire.
    #[serde(skip)]
    pub received_timestamp: Option<SystemTime>,
    #[serde(skip)]
    pub received_from: Option<SocketAddr>,
    #[serde(skip)]
    pub received_by: Option<SocketAddr>,

    pub network_id: i64,
    pub source_endpoint_id: EndpointId,
    pub source_endpoint_name: String,

    pub announcement: Option<Announcement>,
    pub frame: Option<Frame>,
}

impl Container {
    /// Build a container wrapping an [`Announcement`].
    pub fn new_announcement(
        network_id: i64,
        source_endpoint_id: EndpointId,
        source_endpoint_name: String,
        sent_to: String,
        announcement: Announcement,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            sent_timestamp: now,
            last_sent_timestamp: now,
            sent_by: String::new(),
            sent_to,
            received_timestamp: None,
            received_from: None,
            received_by: None,
            network_id,
            source_endpoint_id,
            source_endpoint_name,
            announcement: Some(announcement),
            frame: None,
        }
    }

    /// Build a container wrapping a [`Frame`].
    pub fn new_frame(
        network_id: i64,
        source_endpoint_id: EndpointId,
        source_endpoint_name: String,
        sent_to: String,
        frame: Frame,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            sent_timestamp: now,
            last_sent_timestamp: now,
            sent_by: String::new(),
            sent_to,
            received_timestamp: None,
            received_from: None,
            received_by: None,
            network_id,
            source_endpoint_id,
            source_endpoint_name,
            announcement: None,
            frame: Some(frame),
        }
    }

    /// True if exactly one of `announcement`/`frame` is populated.
    pub fn is_well_formed(&self) -> bool {
        self.announcement.is_some() != self.frame.is_some()
    }

    /// Stamp receive-side metadata. Done once, immediately after a
    /// datagram is deserialized.
    pub fn stamp_received(&mut self, from: SocketAddr, by: SocketAddr) {
        self.received_timestamp = Some(SystemTime::now());
        self.received_from = Some(from);
        self.received_by = Some(by);
    }
}

/// Periodic self-description used for peer liveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    #[serde(with = "duration_nanos")]
    pub sent_rate: Duration,
    pub listen_port: u16,
    pub discovery_listen_address: String,
    pub discovery_target_address: String,
    /// True if this announcement was reflected by a peer on behalf of its
    /// original source, rather than sent directly by that source.
    pub forwarded: bool,
}

/// A single on-wire unit of the transport layer; may be one fragment of a
/// larger logical message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: FrameId,
    pub correlation_id: CorrelationId,
    pub fragment_count: i64,
    pub fragment_index: i64,
    pub destination_endpoint_id: EndpointId,
    pub destination_endpoint_name: String,
    pub needs_ack: bool,
    pub is_ack: bool,
    pub payload: Vec<u8>,

    /// Transport-local resend cadence; never serialized.
    #[serde(skip)]
    pub resend_period: Duration,
    /// Transport-local give-up deadline; never serialized.
    #[serde(skip)]
    pub resend_expiry: Duration,
}

impl Frame {
    /// Build an ACK frame mirroring `frame_id`/`correlation_id`, with
    /// source and destination swapped relative to the frame it acknowledges.
    pub fn ack_for(original: &Frame, ack_source_id: EndpointId, ack_source_name: String) -> Self {
        let _ = (ack_source_id, ack_source_name); // carried at the Container level, not Frame
        Self {
            frame_id: original.frame_id,
            correlation_id: original.correlation_id,
            fragment_count: 1,
            fragment_index: 0,
            destination_endpoint_id: original.destination_endpoint_id,
            destination_endpoint_name: original.destination_endpoint_name.clone(),
            needs_ack: false,
            is_ack: true,
            payload: Vec::new(),
            resend_period: Duration::ZERO,
            resend_expiry: Duration::ZERO,
        }
    }
}

pub(crate) mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_nanos() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(d)?;
        Ok(Duration::from_nanos(nanos))
    }
}

/// Encode a container with the MessagePack-compatible binary wire format.
pub fn serialize(container: &Container) -> Result<Vec<u8>> {
    if !container.is_well_formed() {
        return Err(Error::Codec(
            "container must carry exactly one of announcement/frame".into(),
        ));
    }
    rmp_serde::to_vec_named(container).map_err(|e| Error::Codec(e.to_string()))
}

/// Decode a container, rejecting anything that isn't exactly one of
/// announcement/frame (the full XOR, stricter than merely rejecting
/// "both populated").
pub fn deserialize(bytes: &[u8]) -> Result<Container> {
    let container: Container =
        rmp_serde::from_slice(bytes).map_err(|e| Error::Codec(e.to_string()))?;
    if !container.is_well_formed() {
        return Err(Error::Codec(
            "container must carry exactly one of announcement/frame".into(),
        ));
    }
    Ok(container)
}
