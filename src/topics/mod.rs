// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic-scoped publish/subscribe built on top of the transport layer:
//! fragmentation, reassembly, and the loopback path that lets a local
//! subscriber see its own endpoint's publications without a round trip
//! through the network.

mod fragment;
mod message;
mod publisher;
mod subscriber;

pub use message::{Message, MessageType};
pub use publisher::Publisher;
pub use subscriber::Subscriber;

use std::sync::Arc;

use crate::error::Result;
use crate::id::EndpointId;
use crate::wire::Container;

/// Hands a just-published [`Message`] to whatever locally owns matching
/// subscriptions, without [`Publisher`] holding a concrete reference to
/// [`Subscriber`] (which would need the reverse reference to loop a publish
/// back to this endpoint's own subscriptions, and two `Arc`s pointing at
/// each other never drop).
pub trait LocalDeliverer: Send + Sync {
    fn deliver_local(&self, message: Message);
}

/// Owns both halves of the topics layer for one endpoint and is the entry
/// point [`crate::endpoint::Endpoint`] drives.
pub struct Topics {
    publisher: Publisher,
    subscriber: Arc<Subscriber>,
}

impl Topics {
    pub fn new(
        self_id: EndpointId,
        self_name: String,
        transport: Arc<crate::transport::Sender>,
        dispatcher: Arc<crate::dispatch::Dispatcher>,
    ) -> Self {
        let subscriber = Subscriber::new(dispatcher);
        let publisher = Publisher::new(
            self_id,
            self_name,
            transport,
            Arc::clone(&subscriber) as Arc<dyn LocalDeliverer>,
        );
        Self { publisher, subscriber }
    }

    /// Publish `payload` on `topic_name` as `topic_type`.
    pub fn publish(&self, topic_name: &str, topic_type: &str, payload: Vec<u8>) -> Result<()> {
        self.publisher.publish(topic_name, topic_type, payload)
    }

    /// Subscribe to `topic_name`, replacing any previous subscription with
    /// the same name.
    pub fn subscribe<F>(&self, topic_name: &str, topic_type: &str, callback: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.subscriber.subscribe(topic_name, topic_type, callback);
    }

    /// Remove the subscription for `topic_name`, if any.
    pub fn unsubscribe(&self, topic_name: &str) {
        self.subscriber.unsubscribe(topic_name);
    }

    /// Entry point from the transport receive loop for non-ACK frames.
    pub fn handle_receive(&self, container: Container) {
        self.subscriber.handle_receive(container);
    }

    /// Stop every subscription sweeper and the reassembly sweep.
    pub fn stop(&self) {
        self.subscriber.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RATE_TIMEOUT_MULTIPLIER;
    use crate::dispatch::Dispatcher;
    use crate::discovery;
    use crate::id::MeshId;
    use crate::network;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn test_topics() -> Topics {
        let self_id = MeshId::generate();
        let network = Arc::new(network::Manager::new());
        let dispatcher = Arc::new(Dispatcher::new());
        let discovery_manager = discovery::Manager::new(
            self_id,
            "self".into(),
            1,
            DEFAULT_RATE_TIMEOUT_MULTIPLIER,
            Arc::clone(&network),
            Arc::clone(&dispatcher),
        );
        let transport = crate::transport::Sender::new(self_id, "self".into(), 1, discovery_manager, network);
        Topics::new(self_id, "self".into(), transport, dispatcher)
    }

    #[test]
    fn publish_is_delivered_to_local_subscription() {
        let topics = test_topics();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let received_cb = Arc::clone(&received);
        topics.subscribe("t", "ty", move |m| received_cb.lock().unwrap().push(m));

        topics.publish("t", "ty", b"hello".to_vec()).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let got = received.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].payload, b"hello");
    }

    #[test]
    fn type_mismatch_publish_is_rejected() {
        let topics = test_topics();
        topics.publish("t", "ty-a", b"x".to_vec()).unwrap();
        let result = topics.publish("t", "ty-b", b"y".to_vec());
        assert!(result.is_err());
    }
}
