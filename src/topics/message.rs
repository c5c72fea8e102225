// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The topic message envelope carried inside frame payload bytes, and its
//! binary encoding.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::{Duration, SystemTime};

use crate::config::{
    MESSAGE_TYPE_FORWARDED, MESSAGE_TYPE_LATE_JOINER_REQUEST, MESSAGE_TYPE_LATE_JOINER_RESPONSE,
    MESSAGE_TYPE_STANDARD,
};
use crate::error::{Error, Result};
use crate::id::EndpointId;
use crate::wire::duration_nanos;

/// What role a topic message plays. Only [`MessageType::Standard`] is ever
/// produced today; the late-joiner variants are a reserved hook (see
/// [`crate::topics`] docs) that nothing in this crate emits yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// A normally published message.
    Standard,
    /// Reflected by a peer on behalf of its original publisher. Unused
    /// today; no code path constructs a `Forwarded` topic message (as
    /// opposed to a forwarded discovery announcement, which is unrelated).
    Forwarded,
    /// Reserved for a future late-joiner replay request.
    LateJoinerRequest,
    /// Reserved for a future late-joiner replay response.
    LateJoinerResponse,
}

impl MessageType {
    fn code(self) -> u8 {
        match self {
            MessageType::Standard => MESSAGE_TYPE_STANDARD,
            MessageType::Forwarded => MESSAGE_TYPE_FORWARDED,
            MessageType::LateJoinerRequest => MESSAGE_TYPE_LATE_JOINER_REQUEST,
            MessageType::LateJoinerResponse => MESSAGE_TYPE_LATE_JOINER_RESPONSE,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            MESSAGE_TYPE_STANDARD => Some(MessageType::Standard),
            MESSAGE_TYPE_FORWARDED => Some(MessageType::Forwarded),
            MESSAGE_TYPE_LATE_JOINER_REQUEST => Some(MessageType::LateJoinerRequest),
            MESSAGE_TYPE_LATE_JOINER_RESPONSE => Some(MessageType::LateJoinerResponse),
            _ => None,
        }
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let code = u8::deserialize(d)?;
        MessageType::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown message_type code {code}")))
    }
}

/// A decoded topic message, delivered to subscription callbacks exactly as
/// it is reassembled off the wire (or, for loopback, built in-process).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: SystemTime,
    #[serde(with = "duration_nanos")]
    pub expiry: Duration,
    pub endpoint_id: EndpointId,
    pub endpoint_name: String,
    pub sequence_number: u64,
    pub topic_name: String,
    pub topic_type: String,
    pub message_type: MessageType,
    pub payload: Vec<u8>,
}

impl Message {
    /// True if `timestamp + expiry` has passed as of `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now.duration_since(self.timestamp).unwrap_or(Duration::ZERO) >= self.expiry
    }
}

/// Encode a message with the same binary wire format used for [`Container`]
/// ([`crate::wire::Container`]).
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(message).map_err(|e| Error::Codec(e.to_string()))
}

/// Decode a message envelope previously produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Message> {
    rmp_serde::from_slice(bytes).map_err(|e| Error::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::MeshId;

    fn sample() -> Message {
        Message {
            timestamp: SystemTime::now(),
            expiry: Duration::from_millis(500),
            endpoint_id: MeshId::generate(),
            endpoint_name: "peer-a".into(),
            sequence_number: 7,
            topic_name: "sensors/temperature".into(),
            topic_type: "f64".into(),
            message_type: MessageType::Standard,
            payload: vec![1, 2, 3, 4],
        }
    }

    #[test]
    fn round_trips() {
        let original = sample();
        let bytes = encode(&original).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.topic_name, original.topic_name);
        assert_eq!(decoded.sequence_number, original.sequence_number);
        assert_eq!(decoded.payload, original.payload);
        assert_eq!(decoded.message_type, MessageType::Standard);
    }

    #[test]
    fn unknown_message_type_code_is_rejected() {
        // Hand-build a map with an out-of-range message_type to confirm
        // decode fails closed rather than defaulting silently.
        #[derive(Serialize)]
        struct Bogus {
            timestamp: SystemTime,
            expiry: u64,
            endpoint_id: EndpointId,
            endpoint_name: String,
            sequence_number: u64,
            topic_name: String,
            topic_type: String,
            message_type: u8,
            payload: Vec<u8>,
        }
        let bogus = Bogus {
            timestamp: SystemTime::now(),
            expiry: 500,
            endpoint_id: MeshId::generate(),
            endpoint_name: "x".into(),
            sequence_number: 1,
            topic_name: "t".into(),
            topic_type: "t".into(),
            message_type: 99,
            payload: Vec::new(),
        };
        let bytes = rmp_serde::to_vec_named(&bogus).unwrap();
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn expiry_is_relative_to_timestamp() {
        let mut message = sample();
        message.timestamp = SystemTime::now() - Duration::from_secs(10);
        message.expiry = Duration::from_secs(1);
        assert!(message.is_expired_at(SystemTime::now()));

        message.timestamp = SystemTime::now();
        message.expiry = Duration::from_secs(10);
        assert!(!message.is_expired_at(SystemTime::now()));
    }
}
