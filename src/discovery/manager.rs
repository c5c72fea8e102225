// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Liveness table: tracks the most recently received announcement per peer,
//! evicts stale entries, detects name clashes, and reflects known peers to
//! late joiners reached over unicast.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::DISCOVERY_SWEEPER_PERIOD;
use crate::dispatch::Dispatcher;
use crate::id::EndpointId;
use crate::network;
use crate::wire::{self, Container};
use crate::worker::ScheduledWorker;

/// Opaque token for an `on_added`/`on_removed` registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

type PeerCallback = Arc<dyn Fn(&Container) + Send + Sync>;

/// Tracks which peers are alive and fires callbacks as they come and go.
pub struct Manager {
    self_id: EndpointId,
    self_name: String,
    network_id: i64,
    rate_timeout_multiplier: u32,

    by_id: DashMap<EndpointId, Container>,
    id_by_name: DashMap<String, EndpointId>,

    on_added: DashMap<CallbackHandle, PeerCallback>,
    on_removed: DashMap<CallbackHandle, PeerCallback>,
    next_handle: AtomicU64,

    network: Arc<network::Manager>,
    dispatcher: Arc<Dispatcher>,
    sweeper: parking_lot::Mutex<Option<ScheduledWorker>>,
}

impl Manager {
    /// Build a liveness table for one endpoint.
    pub fn new(
        self_id: EndpointId,
        self_name: String,
        network_id: i64,
        rate_timeout_multiplier: u32,
        network: Arc<network::Manager>,
        dispatcher: Arc<Dispatcher>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            self_id,
            self_name,
            network_id,
            rate_timeout_multiplier,
            by_id: DashMap::new(),
            id_by_name: DashMap::new(),
            on_added: DashMap::new(),
            on_removed: DashMap::new(),
            next_handle: AtomicU64::new(1),
            network,
            dispatcher,
            sweeper: parking_lot::Mutex::new(None),
        });

        let sweep_manager = Arc::clone(&manager);
        let worker = ScheduledWorker::spawn(
            DISCOVERY_SWEEPER_PERIOD,
            || {},
            move || sweep_manager.sweep(),
            || {},
        );
        *manager.sweeper.lock() = Some(worker);

        manager
    }

    /// Register a callback fired (on the dispatcher pool) when a new peer
    /// is first seen.
    pub fn on_added<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&Container) + Send + Sync + 'static,
    {
        let handle = CallbackHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.on_added.insert(handle, Arc::new(callback));
        handle
    }

    /// Register a callback fired when a previously live peer expires.
    pub fn on_removed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&Container) + Send + Sync + 'static,
    {
        let handle = CallbackHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.on_removed.insert(handle, Arc::new(callback));
        handle
    }

    /// Look up a peer's most recent announcement container by name.
    pub fn get_by_name(&self, name: &str) -> Option<Container> {
        let id = self.id_by_name.get(name)?;
        self.by_id.get(id.value()).map(|e| e.value().clone())
    }

    /// All currently-live peers. Includes self only if `include_self`.
    pub fn get_all(&self, include_self: bool) -> Vec<Container> {
        self.by_id
            .iter()
            .filter(|e| include_self || *e.key() != self.self_id)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Handle a freshly received, already network-id-filtered announcement
    /// container.
    pub fn on_receive(&self, container: Container) {
        let source_id = container.source_endpoint_id;
        let source_name = container.source_endpoint_name.clone();

        if source_id == self.self_id {
            return;
        }

        if source_name == self.self_name && source_id != self.self_id {
            log::warn!(
                "discovery: peer {source_id} claims our own name '{source_name}', dropping"
            );
            return;
        }

        if let Some(existing) = self.id_by_name.get(&source_name) {
            let existing_id = *existing.value();
            drop(existing);

            if existing_id != source_id {
                // Two endpoints claiming the same name: tie-break on the
                // sortable, time-prefixed id and let the earlier starter
                // keep the name rather than whichever announcement won the
                // race to arrive first.
                if source_id < existing_id {
                    log::warn!(
                        "discovery: name clash for '{source_name}' ({existing_id} vs {source_id}), evicting younger claimant {existing_id}"
                    );
                    if let Some((_, evicted)) = self.by_id.remove(&existing_id) {
                        self.fire_removed(evicted);
                    }
                } else {
                    log::warn!(
                        "discovery: name clash for '{source_name}' ({existing_id} vs {source_id}), dropping younger claimant {source_id}"
                    );
                    return;
                }
            }
        }

        let is_new = !self.by_id.contains_key(&source_id);
        self.id_by_name.insert(source_name, source_id);
        self.by_id.insert(source_id, container.clone());

        if is_new {
            self.fire_added(container.clone());
        }

        self.maybe_reflect(&container);
    }

    fn fire_added(&self, container: Container) {
        let callbacks: Vec<PeerCallback> = self.on_added.iter().map(|e| Arc::clone(e.value())).collect();
        for callback in callbacks {
            let container = container.clone();
            self.dispatcher.submit(move || callback(&container));
        }
    }

    fn fire_removed(&self, container: Container) {
        let callbacks: Vec<PeerCallback> = self.on_removed.iter().map(|e| Arc::clone(e.value())).collect();
        for callback in callbacks {
            let container = container.clone();
            self.dispatcher.submit(move || callback(&container));
        }
    }

    fn maybe_reflect(&self, container: &Container) {
        let Some(announcement) = &container.announcement else {
            return;
        };
        if announcement.forwarded {
            return;
        }
        let Ok(target): Result<SocketAddr, _> = announcement.discovery_target_address.parse()
        else {
            return;
        };
        if network::multicast::is_multicast(target.ip()) {
            return;
        }
        if announcement.discovery_listen_address.is_empty() {
            return;
        }

        for entry in self.by_id.iter() {
            if *entry.key() == container.source_endpoint_id {
                continue;
            }
            let other = entry.value();
            let Some(other_announcement) = &other.announcement else {
                continue;
            };
            if other_announcement.forwarded {
                continue;
            }

            let mut reflected = other.clone();
            let mut reflected_announcement = other_announcement.clone();
            reflected_announcement.forwarded = true;
            reflected.announcement = Some(reflected_announcement);

            if let Ok(bytes) = wire::serialize(&reflected) {
                let sender = self.network.sender(target);
                if let Err(e) = sender.send(&bytes) {
                    log::debug!("discovery: failed to reflect peer to {target}: {e}");
                }
            }
        }
    }

    fn sweep(&self) {
        let now = SystemTime::now();
        let mut expired = Vec::new();

        for entry in self.by_id.iter() {
            let container = entry.value();
            let Some(announcement) = &container.announcement else {
                continue;
            };
            let Some(received) = container.received_timestamp else {
                continue;
            };
            let timeout = announcement.sent_rate * self.rate_timeout_multiplier;
            if now.duration_since(received).unwrap_or(Duration::ZERO) >= timeout {
                expired.push(*entry.key());
            }
        }

        for id in expired {
            if let Some((_, container)) = self.by_id.remove(&id) {
                self.id_by_name.remove(&container.source_endpoint_name);
                self.fire_removed(container);
            }
        }
    }

    /// Stop the sweeper.
    pub fn stop(&self) {
        if let Some(mut worker) = self.sweeper.lock().take() {
            worker.stop();
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Announcement;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn test_manager(self_id: EndpointId, self_name: &str) -> Arc<Manager> {
        Manager::new(
            self_id,
            self_name.to_string(),
            1,
            3,
            Arc::new(network::Manager::new()),
            Arc::new(Dispatcher::new()),
        )
    }

    fn announcement_from(id: EndpointId, name: &str, sent_rate: Duration) -> Container {
        let mut container = Container::new_announcement(
            1,
            id,
            name.to_string(),
            "239.192.137.1:27320".into(),
            Announcement {
                sent_rate,
                listen_port: 27321,
                discovery_listen_address: "239.192.137.1:27320".into(),
                discovery_target_address: "239.192.137.1:27320".into(),
                forwarded: false,
            },
        );
        container.stamp_received(
            "10.0.0.2:27320".parse().unwrap(),
            "239.192.137.1:27320".parse().unwrap(),
        );
        container
    }

    #[test]
    fn on_receive_inserts_and_fires_added() {
        let manager = test_manager(EndpointId::generate(), "self");
        let added = Arc::new(AtomicUsize::new(0));
        let added_cb = Arc::clone(&added);
        manager.on_added(move |_| {
            added_cb.fetch_add(1, Ordering::SeqCst);
        });

        let peer_id = EndpointId::generate();
        manager.on_receive(announcement_from(peer_id, "peer-a", Duration::from_millis(50)));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert!(manager.get_by_name("peer-a").is_some());
        assert_eq!(manager.get_all(false).len(), 1);
    }

    #[test]
    fn ignores_own_echo() {
        let self_id = EndpointId::generate();
        let manager = test_manager(self_id, "self");
        manager.on_receive(announcement_from(self_id, "self", Duration::from_millis(50)));
        assert!(manager.get_all(true).is_empty());
    }

    #[test]
    fn name_clash_drops_younger_claimant() {
        let manager = test_manager(EndpointId::generate(), "self");

        let mut older = [0u8; 20];
        older[0..4].copy_from_slice(&100u32.to_be_bytes());
        let mut younger = [0u8; 20];
        younger[0..4].copy_from_slice(&200u32.to_be_bytes());
        let older_id = EndpointId::from_bytes(older);
        let younger_id = EndpointId::from_bytes(younger);

        manager.on_receive(announcement_from(older_id, "contested", Duration::from_millis(50)));
        manager.on_receive(announcement_from(younger_id, "contested", Duration::from_millis(50)));

        let bound = manager.get_by_name("contested").unwrap();
        assert_eq!(bound.source_endpoint_id, older_id);
    }

    #[test]
    fn name_clash_evicts_younger_incumbent_when_older_arrives_later() {
        let manager = test_manager(EndpointId::generate(), "self");

        let mut older = [0u8; 20];
        older[0..4].copy_from_slice(&100u32.to_be_bytes());
        let mut younger = [0u8; 20];
        younger[0..4].copy_from_slice(&200u32.to_be_bytes());
        let older_id = EndpointId::from_bytes(older);
        let younger_id = EndpointId::from_bytes(younger);

        manager.on_receive(announcement_from(younger_id, "contested", Duration::from_millis(50)));
        assert_eq!(
            manager.get_by_name("contested").unwrap().source_endpoint_id,
            younger_id
        );

        manager.on_receive(announcement_from(older_id, "contested", Duration::from_millis(50)));
        assert_eq!(
            manager.get_by_name("contested").unwrap().source_endpoint_id,
            older_id
        );
    }

    #[test]
    fn sweep_evicts_expired_peer_and_fires_removed() {
        let manager = test_manager(EndpointId::generate(), "self");
        let removed = Arc::new(AtomicUsize::new(0));
        let removed_cb = Arc::clone(&removed);
        manager.on_removed(move |_| {
            removed_cb.fetch_add(1, Ordering::SeqCst);
        });

        let peer_id = EndpointId::generate();
        manager.on_receive(announcement_from(peer_id, "peer-a", Duration::from_millis(10)));
        assert!(manager.get_by_name("peer-a").is_some());

        thread::sleep(Duration::from_millis(300));
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert!(manager.get_by_name("peer-a").is_none());
    }
}
