// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Top-level façade wiring the network, discovery, transport, and topics
//! layers together for one running process.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{
    DEFAULT_ANNOUNCEMENT_PERIOD, DEFAULT_MULTICAST_GROUP, DEFAULT_RATE_TIMEOUT_MULTIPLIER,
};
use crate::dispatch::Dispatcher;
use crate::discovery;
use crate::error::Result;
use crate::id::EndpointId;
use crate::network;
use crate::topics::{Message, Topics};
use crate::transport;

/// Parameters needed to start an [`Endpoint`]. Mirrors the CLI surface
/// described for a binary built on top of this crate (`--networkID`,
/// `--endpointName`, `--interfaceName`, `--listenPort`,
/// `--multicastAddress`, `--rateMillis`, `--timeoutMultiplier`); flag/env
/// parsing itself is that binary's concern, not this crate's.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub endpoint_name: String,
    pub network_id: i64,
    pub interface_name: Option<String>,
    pub listen_port: u16,
    pub multicast_address: SocketAddr,
    pub announcement_rate: Duration,
    pub rate_timeout_multiplier: u32,
}

impl EndpointConfig {
    /// Build a config with this crate's defaults: the standard multicast
    /// group, a 1 s announcement rate, a 3x timeout multiplier, and an
    /// ephemeral listen port.
    pub fn new(endpoint_name: impl Into<String>, network_id: i64) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            network_id,
            interface_name: None,
            listen_port: 0,
            multicast_address: DEFAULT_MULTICAST_GROUP
                .parse()
                .expect("DEFAULT_MULTICAST_GROUP is a valid socket address"),
            announcement_rate: DEFAULT_ANNOUNCEMENT_PERIOD,
            rate_timeout_multiplier: DEFAULT_RATE_TIMEOUT_MULTIPLIER,
        }
    }

    pub fn with_interface(mut self, interface_name: impl Into<String>) -> Self {
        self.interface_name = Some(interface_name.into());
        self
    }

    pub fn with_listen_port(mut self, listen_port: u16) -> Self {
        self.listen_port = listen_port;
        self
    }

    pub fn with_multicast_address(mut self, multicast_address: SocketAddr) -> Self {
        self.multicast_address = multicast_address;
        self
    }

    pub fn with_announcement_rate(mut self, announcement_rate: Duration) -> Self {
        self.announcement_rate = announcement_rate;
        self
    }

    pub fn with_rate_timeout_multiplier(mut self, rate_timeout_multiplier: u32) -> Self {
        self.rate_timeout_multiplier = rate_timeout_multiplier;
        self
    }
}

/// One running mesh participant: owns every socket, background worker, and
/// registry needed to discover peers and exchange topic messages with them.
pub struct Endpoint {
    self_id: EndpointId,
    network: Arc<network::Manager>,
    discovery: Arc<discovery::Manager>,
    listener: discovery::Listener,
    announcer: discovery::Announcer,
    transport_sender: Arc<transport::Sender>,
    transport_receiver: transport::Receiver,
    topics: Arc<Topics>,
}

impl Endpoint {
    /// Assign an identity, open every socket, and start every background
    /// worker named in this crate's concurrency model.
    pub fn start(config: EndpointConfig) -> Result<Self> {
        let self_id = EndpointId::generate();
        let network = Arc::new(network::Manager::new());

        let discovery = discovery::Manager::new(
            self_id,
            config.endpoint_name.clone(),
            config.network_id,
            config.rate_timeout_multiplier,
            Arc::clone(&network),
            Arc::new(Dispatcher::new()),
        );

        let transport_sender = transport::Sender::new(
            self_id,
            config.endpoint_name.clone(),
            config.network_id,
            Arc::clone(&discovery),
            Arc::clone(&network),
        );

        let topics = Arc::new(Topics::new(
            self_id,
            config.endpoint_name.clone(),
            Arc::clone(&transport_sender),
            Arc::new(Dispatcher::new()),
        ));

        let receive_topics = Arc::clone(&topics);
        let transport_receiver = transport::Receiver::bind(
            config.listen_port,
            config.network_id,
            Arc::clone(&transport_sender),
            Arc::clone(&network),
            move |container| receive_topics.handle_receive(container),
        )?;
        let listen_port = transport_receiver.listen_port();

        let listener = discovery::Listener::bind(
            config.multicast_address,
            config.interface_name.clone(),
            config.network_id,
            Arc::clone(&discovery),
            Arc::clone(&network),
        )?;

        let announcer = discovery::Announcer::spawn(
            self_id,
            config.endpoint_name.clone(),
            config.network_id,
            config.announcement_rate,
            listen_port,
            config.multicast_address.to_string(),
            Some(config.multicast_address),
            Arc::clone(&network),
        );

        Ok(Self {
            self_id,
            network,
            discovery,
            listener,
            announcer,
            transport_sender,
            transport_receiver,
            topics,
        })
    }

    /// This endpoint's identifier, stable for the process lifetime.
    pub fn id(&self) -> EndpointId {
        self.self_id
    }

    /// Register `callback` for `topic_name`, replacing any previous
    /// subscription with the same name. `"#"` subscribes to every topic
    /// regardless of type.
    pub fn subscribe<F>(&self, topic_name: &str, topic_type: &str, callback: F) -> Result<()>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.topics.subscribe(topic_name, topic_type, callback);
        Ok(())
    }

    /// Stop and remove the subscription for `topic_name`, if any.
    pub fn unsubscribe(&self, topic_name: &str) {
        self.topics.unsubscribe(topic_name);
    }

    /// Publish `payload` on `topic_name` as `topic_type`. Fails with
    /// [`crate::Error::TopicTypeMismatch`] if the topic was previously
    /// published with a different type.
    pub fn publish(&self, topic_name: &str, topic_type: &str, payload: &[u8]) -> Result<()> {
        self.topics.publish(topic_name, topic_type, payload.to_vec())
    }

    /// Register a callback fired (on the dispatcher pool) when a new peer
    /// is first seen. Returns an opaque handle accepted by nothing today —
    /// retained for parity with [`discovery::Manager::on_added`].
    pub fn on_peer_added<F>(&self, callback: F) -> discovery::CallbackHandle
    where
        F: Fn(&crate::wire::Container) + Send + Sync + 'static,
    {
        self.discovery.on_added(callback)
    }

    /// Register a callback fired when a previously live peer expires.
    pub fn on_peer_removed<F>(&self, callback: F) -> discovery::CallbackHandle
    where
        F: Fn(&crate::wire::Container) + Send + Sync + 'static,
    {
        self.discovery.on_removed(callback)
    }

    /// Peers currently considered alive, excluding self.
    pub fn peers(&self) -> Vec<crate::wire::Container> {
        self.discovery.get_all(false)
    }

    /// Stop every background worker in the order the concurrency model
    /// specifies: network, then discovery, then transport, then topics.
    /// Each stop is independent and safe to call even if an earlier one
    /// was skipped. Stops the announcer first so the endpoint is silent on
    /// the wire for the rest of the sequence.
    pub fn stop(&self) {
        self.announcer.stop();
        self.listener.stop();
        self.network.stop();
        self.discovery.stop();
        self.transport_receiver.stop();
        self.transport_sender.stop();
        self.topics.stop();
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn config(name: &str, listen_port: u16, multicast: &str) -> EndpointConfig {
        EndpointConfig::new(name, 1)
            .with_listen_port(listen_port)
            .with_multicast_address(multicast.parse().unwrap())
            .with_announcement_rate(Duration::from_millis(50))
            .with_rate_timeout_multiplier(3)
    }

    #[test]
    fn publish_without_any_subscriber_succeeds() {
        let endpoint = Endpoint::start(config("solo", 0, "239.192.137.5:27320")).unwrap();
        assert!(endpoint.publish("t", "ty", b"x").is_ok());
    }

    #[test]
    fn self_delivery_loopback_works_without_any_peer() {
        let endpoint = Endpoint::start(config("solo2", 0, "239.192.137.6:27320")).unwrap();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let received_cb = Arc::clone(&received);
        endpoint
            .subscribe("some_topic", "some_type", move |m| {
                received_cb.lock().unwrap().push(m.payload);
            })
            .unwrap();

        endpoint.publish("some_topic", "some_type", b"Some payload").unwrap();
        std::thread::sleep(Duration::from_millis(200));

        let got = received.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0], b"Some payload");
    }

    #[test]
    fn topic_type_mismatch_is_surfaced_synchronously() {
        let endpoint = Endpoint::start(config("solo3", 0, "239.192.137.7:27320")).unwrap();
        endpoint.publish("t", "a", b"x").unwrap();
        let result = endpoint.publish("t", "b", b"y");
        assert!(matches!(result, Err(crate::Error::TopicTypeMismatch { .. })));
    }
}
