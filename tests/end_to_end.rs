// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end scenarios: two in-process endpoints exchanging messages over
//! loopback UDP multicast and unicast.

use meshwire::{Endpoint, EndpointConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config(name: &str, multicast_port: u16) -> EndpointConfig {
    EndpointConfig::new(name, 1)
        .with_listen_port(0)
        .with_multicast_address(format!("239.192.137.{multicast_port}:27320").parse().unwrap())
        .with_announcement_rate(Duration::from_millis(100))
        .with_rate_timeout_multiplier(3)
}

#[test]
fn two_peer_multicast_discovery() {
    let a = Endpoint::start(config("A", 40)).unwrap();
    let b = Endpoint::start(config("B", 40)).unwrap();

    let a_sees_b = Arc::new(Mutex::new(false));
    let a_sees_b_cb = Arc::clone(&a_sees_b);
    a.on_peer_added(move |container| {
        if container.source_endpoint_name == "B" {
            *a_sees_b_cb.lock().unwrap() = true;
        }
    });

    let b_sees_a = Arc::new(Mutex::new(false));
    let b_sees_a_cb = Arc::clone(&b_sees_a);
    b.on_peer_added(move |container| {
        if container.source_endpoint_name == "A" {
            *b_sees_a_cb.lock().unwrap() = true;
        }
    });

    std::thread::sleep(Duration::from_millis(1000));
    assert!(*a_sees_b.lock().unwrap(), "A should discover B within 1s");
    assert!(*b_sees_a.lock().unwrap(), "B should discover A within 1s");

    let b_removed = Arc::new(Mutex::new(false));
    let b_removed_cb = Arc::clone(&b_removed);
    a.on_peer_removed(move |container| {
        if container.source_endpoint_name == "B" {
            *b_removed_cb.lock().unwrap() = true;
        }
    });

    b.stop();

    std::thread::sleep(Duration::from_millis(600));
    assert!(*b_removed.lock().unwrap(), "A should evict B once it stops announcing");

    a.stop();
}

#[test]
fn publish_and_subscribe_across_peers() {
    let a = Endpoint::start(config("A", 41)).unwrap();
    let b = Endpoint::start(config("B", 41)).unwrap();

    std::thread::sleep(Duration::from_millis(500));

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_cb = Arc::clone(&received);
    a.subscribe("some_topic", "some_type", move |m| {
        received_cb.lock().unwrap().push(m.payload);
    })
    .unwrap();

    let payload = vec![0x53, 0x6f, 0x6d, 0x65, 0x20, 0x70, 0x61, 0x79, 0x6c, 0x6f, 0x61, 0x64];
    b.publish("some_topic", "some_type", &payload).unwrap();

    std::thread::sleep(Duration::from_millis(1000));
    let got = received.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0], payload);

    a.stop();
    b.stop();
}

#[test]
fn self_delivery_loopback() {
    let endpoint = Endpoint::start(config("solo", 42)).unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
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

    endpoint.stop();
}

#[test]
fn wildcard_subscription_receives_regardless_of_topic_type() {
    let endpoint = Endpoint::start(config("wild", 43)).unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_cb = Arc::clone(&received);
    endpoint
        .subscribe("#", "unused", move |m| {
            received_cb.lock().unwrap().push(m.payload);
        })
        .unwrap();

    endpoint.publish("some_topic", "whatever_type", b"hi").unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let got = received.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0], b"hi");

    endpoint.stop();
}

#[test]
fn fragmented_payload_round_trips_across_peers() {
    let a = Endpoint::start(config("A", 44)).unwrap();
    let b = Endpoint::start(config("B", 44)).unwrap();

    std::thread::sleep(Duration::from_millis(500));

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_cb = Arc::clone(&received);
    a.subscribe("big_topic", "bytes", move |m| {
        received_cb.lock().unwrap().push(m.payload);
    })
    .unwrap();

    let payload = vec![0xABu8; 65_536];
    b.publish("big_topic", "bytes", &payload).unwrap();

    std::thread::sleep(Duration::from_millis(1500));
    let got = received.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].len(), 65_536);
    assert_eq!(got[0], payload);

    a.stop();
    b.stop();
}

#[test]
fn topic_type_mismatch_returns_an_error() {
    let endpoint = Endpoint::start(config("mismatch", 45)).unwrap();

    endpoint.publish("t", "a", b"x").unwrap();
    let result = endpoint.publish("t", "b", b"y");

    assert!(matches!(result, Err(meshwire::Error::TopicTypeMismatch { .. })));

    endpoint.stop();
}
