// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscription registry, fragment reassembly, and receive-side dispatch.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::{REASSEMBLY_EXPIRY, TOPIC_SWEEPER_PERIOD, WILDCARD_TOPIC_NAME};
use crate::dispatch::Dispatcher;
use crate::id::{CorrelationId, EndpointId};
use crate::topics::{message, LocalDeliverer, Message};
use crate::wire::Container;
use crate::worker::ScheduledWorker;

type Callback = Arc<dyn Fn(Message) + Send + Sync>;

struct SubscriptionHandle {
    topic_type: String,
    callback: Callback,
    seen: Arc<DashMap<(EndpointId, u64), Message>>,
    sweeper: parking_lot::Mutex<Option<ScheduledWorker>>,
}

impl SubscriptionHandle {
    fn new(topic_type: String, callback: Callback) -> Arc<Self> {
        let seen = Arc::new(DashMap::new());
        let handle = Arc::new(Self {
            topic_type,
            callback,
            seen: Arc::clone(&seen),
            sweeper: parking_lot::Mutex::new(None),
        });

        let sweep_seen = Arc::clone(&seen);
        let worker = ScheduledWorker::spawn(
            TOPIC_SWEEPER_PERIOD,
            || {},
            move || {
                let now = SystemTime::now();
                sweep_seen.retain(|_, message: &mut Message| !message.is_expired_at(now));
            },
            || {},
        );
        *handle.sweeper.lock() = Some(worker);

        handle
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(mut worker) = self.sweeper.lock().take() {
            worker.stop();
        }
    }
}

struct ReassemblyEntry {
    first_seen: SystemTime,
    total: i64,
    fragments: BTreeMap<i64, Vec<u8>>,
}

/// Owns subscriptions and the fragment reassembly table; implements
/// [`LocalDeliverer`] so a [`crate::topics::Publisher`] can hand it loopback
/// messages without either side holding a hard reference to the other's
/// concrete type.
pub struct Subscriber {
    subscriptions: DashMap<String, Arc<SubscriptionHandle>>,
    reassembly: DashMap<CorrelationId, ReassemblyEntry>,
    dispatcher: Arc<Dispatcher>,
    reassembly_sweeper: parking_lot::Mutex<Option<ScheduledWorker>>,
}

impl Subscriber {
    /// Build a subscriber and start its reassembly expiry sweep.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Arc<Self> {
        let subscriber = Arc::new(Self {
            subscriptions: DashMap::new(),
            reassembly: DashMap::new(),
            dispatcher,
            reassembly_sweeper: parking_lot::Mutex::new(None),
        });

        let sweep_subscriber = Arc::clone(&subscriber);
        let worker = ScheduledWorker::spawn(
            TOPIC_SWEEPER_PERIOD,
            || {},
            move || sweep_subscriber.sweep_reassembly(),
            || {},
        );
        *subscriber.reassembly_sweeper.lock() = Some(worker);

        subscriber
    }

    /// Register `callback` for `topic_name`. If a subscription already
    /// exists for this name, the callback is replaced (latest subscriber
    /// wins; this crate does not fan a topic out to multiple subscribers).
    pub fn subscribe<F>(&self, topic_name: &str, topic_type: &str, callback: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let handle = SubscriptionHandle::new(topic_type.to_string(), Arc::new(callback));
        self.subscriptions.insert(topic_name.to_string(), handle);
    }

    /// Stop and remove the subscription for `topic_name`, if any.
    pub fn unsubscribe(&self, topic_name: &str) {
        self.subscriptions.remove(topic_name);
    }

    /// Entry point from the transport layer: reassemble fragments, decode
    /// the envelope, and dispatch.
    pub fn handle_receive(&self, container: Container) {
        let Some(frame) = &container.frame else {
            return;
        };

        let complete_bytes = if frame.fragment_count > 1 {
            match self.reassemble(frame.correlation_id, frame.fragment_count, frame.fragment_index, frame.payload.clone()) {
                Some(bytes) => bytes,
                None => return,
            }
        } else {
            frame.payload.clone()
        };

        match message::decode(&complete_bytes) {
            Ok(message) => self.handle_internal_receive(message),
            Err(e) => log::debug!("topics: dropping undecodable message envelope: {e}"),
        }
    }

    fn reassemble(
        &self,
        correlation_id: CorrelationId,
        fragment_count: i64,
        fragment_index: i64,
        payload: Vec<u8>,
    ) -> Option<Vec<u8>> {
        let mut complete = None;

        {
            let mut entry = self.reassembly.entry(correlation_id).or_insert_with(|| ReassemblyEntry {
                first_seen: SystemTime::now(),
                total: fragment_count,
                fragments: BTreeMap::new(),
            });
            entry.fragments.insert(fragment_index, payload);

            if entry.fragments.len() as i64 >= entry.total {
                let bytes: Vec<u8> = entry.fragments.values().flat_map(|f| f.iter().copied()).collect();
                complete = Some(bytes);
            }
        }

        if complete.is_some() {
            self.reassembly.remove(&correlation_id);
        }

        complete
    }

    fn sweep_reassembly(&self) {
        let now = SystemTime::now();
        self.reassembly.retain(|_, entry: &mut ReassemblyEntry| {
            now.duration_since(entry.first_seen).unwrap_or(Duration::ZERO) < REASSEMBLY_EXPIRY
        });
    }

    fn handle_internal_receive(&self, message: Message) {
        let (subscription, is_wildcard) = match self.subscriptions.get(&message.topic_name) {
            Some(exact) => (Arc::clone(exact.value()), false),
            None => match self.subscriptions.get(WILDCARD_TOPIC_NAME) {
                Some(wildcard) => (Arc::clone(wildcard.value()), true),
                None => return,
            },
        };

        if !is_wildcard && message.topic_type != subscription.topic_type {
            log::warn!(
                "topics: dropping message on '{}': type '{}' does not match subscription type '{}'",
                message.topic_name,
                message.topic_type,
                subscription.topic_type
            );
            return;
        }

        subscription
            .seen
            .insert((message.endpoint_id, message.sequence_number), message.clone());

        let callback = Arc::clone(&subscription.callback);
        self.dispatcher.submit(move || callback(message));
    }

    /// Stop every subscription's sweeper and the reassembly sweep.
    pub fn stop(&self) {
        self.subscriptions.clear();
        if let Some(mut worker) = self.reassembly_sweeper.lock().take() {
            worker.stop();
        }
    }
}

impl LocalDeliverer for Subscriber {
    fn deliver_local(&self, message: Message) {
        self.handle_internal_receive(message);
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.stop();
    }
}
