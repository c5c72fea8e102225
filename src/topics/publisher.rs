// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-topic publication state and the `publish` entry point.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::{FRAGMENT_MAX_CHUNK_SIZE, MESSAGE_EXPIRY, MESSAGE_TIMEOUT, TOPIC_SWEEPER_PERIOD};
use crate::error::{Error, Result};
use crate::id::{EndpointId, MeshId};
use crate::topics::{fragment, message, LocalDeliverer, Message, MessageType};
use crate::transport;
use crate::worker::ScheduledWorker;

/// Per-topic publication state: a sequence counter and a short window of
/// recently-sent messages, swept on the same cadence as subscriptions.
struct Publication {
    topic_type: String,
    sequence: AtomicU64,
    sent: DashMap<(EndpointId, u64), Message>,
    sweeper: parking_lot::Mutex<Option<ScheduledWorker>>,
}

impl Publication {
    fn new(topic_type: String) -> Arc<Self> {
        let sent = DashMap::new();
        let publication = Arc::new(Self {
            topic_type,
            sequence: AtomicU64::new(0),
            sent,
            sweeper: parking_lot::Mutex::new(None),
        });

        let sweep_publication = Arc::clone(&publication);
        let worker = ScheduledWorker::spawn(
            TOPIC_SWEEPER_PERIOD,
            || {},
            move || {
                let now = SystemTime::now();
                sweep_publication.sent.retain(|_, message: &mut Message| !message.is_expired_at(now));
            },
            || {},
        );
        *publication.sweeper.lock() = Some(worker);

        publication
    }
}

impl Drop for Publication {
    fn drop(&mut self) {
        if let Some(mut worker) = self.sweeper.lock().take() {
            worker.stop();
        }
    }
}

/// Owns every topic this endpoint has published to, and drives both the
/// local loopback delivery and the network broadcast of a `publish` call.
pub struct Publisher {
    self_id: EndpointId,
    self_name: String,
    publications: DashMap<String, Arc<Publication>>,
    transport: Arc<transport::Sender>,
    deliverer: Arc<dyn LocalDeliverer>,
}

impl Publisher {
    pub fn new(
        self_id: EndpointId,
        self_name: String,
        transport: Arc<transport::Sender>,
        deliverer: Arc<dyn LocalDeliverer>,
    ) -> Self {
        Self {
            self_id,
            self_name,
            publications: DashMap::new(),
            transport,
            deliverer,
        }
    }

    /// Publish `payload` on `topic_name` as `topic_type`. The first publish
    /// on a topic fixes its type; later publishes with a different type are
    /// rejected rather than silently overwriting it.
    pub fn publish(&self, topic_name: &str, topic_type: &str, payload: Vec<u8>) -> Result<()> {
        let publication = self
            .publications
            .entry(topic_name.to_string())
            .or_insert_with(|| Publication::new(topic_type.to_string()))
            .value()
            .clone();

        if publication.topic_type != topic_type {
            return Err(Error::TopicTypeMismatch {
                topic_name: topic_name.to_string(),
                expected: publication.topic_type.clone(),
                actual: topic_type.to_string(),
            });
        }

        let sequence_number = publication.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let message = Message {
            timestamp: SystemTime::now(),
            expiry: MESSAGE_EXPIRY,
            endpoint_id: self.self_id,
            endpoint_name: self.self_name.clone(),
            sequence_number,
            topic_name: topic_name.to_string(),
            topic_type: topic_type.to_string(),
            message_type: MessageType::Standard,
            payload,
        };

        publication
            .sent
            .insert((message.endpoint_id, message.sequence_number), message.clone());

        // Loopback happens before the message ever touches the network.
        self.deliverer.deliver_local(message.clone());

        let encoded = message::encode(&message)?;
        let chunks = fragment::fragment(&encoded, FRAGMENT_MAX_CHUNK_SIZE);
        let correlation_id = MeshId::generate();
        let fragment_count = chunks.len() as i64;

        for (index, chunk) in chunks.into_iter().enumerate() {
            self.transport.broadcast(
                MESSAGE_TIMEOUT,
                MESSAGE_EXPIRY,
                correlation_id,
                fragment_count,
                index as i64,
                true,
                chunk,
            );
        }

        Ok(())
    }
}
