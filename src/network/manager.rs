// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dedups senders by destination and receivers by `(bind_address,
//! interface)`, so repeated registrations share one socket.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::network::{Receiver, Sender};

type ReceiverKey = (SocketAddr, Option<String>);

/// Owns every socket opened by one endpoint.
pub struct Manager {
    senders: DashMap<SocketAddr, Arc<Sender>>,
    receivers: DashMap<ReceiverKey, Arc<Receiver>>,
    dispatcher: Arc<Dispatcher>,
}

impl Manager {
    /// Build a manager backed by a fresh bounded callback dispatcher.
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
            receivers: DashMap::new(),
            dispatcher: Arc::new(Dispatcher::new()),
        }
    }

    /// Get (or lazily create) the sender for `destination`.
    pub fn sender(&self, destination: SocketAddr) -> Arc<Sender> {
        Arc::clone(
            self.senders
                .entry(destination)
                .or_insert_with(|| Arc::new(Sender::new(destination))),
        )
    }

    /// Get (or lazily create and bind) the receiver for `(bind_address,
    /// interface)`.
    pub fn receiver(
        &self,
        bind_address: SocketAddr,
        interface: Option<String>,
    ) -> Result<Arc<Receiver>> {
        let key = (bind_address, interface.clone());
        if let Some(existing) = self.receivers.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }

        let receiver = Arc::new(Receiver::bind(
            bind_address,
            interface,
            Arc::clone(&self.dispatcher),
        )?);
        self.receivers.insert(key, Arc::clone(&receiver));
        Ok(receiver)
    }

    /// Close every cached sender and receiver.
    pub fn stop(&self) {
        for entry in self.senders.iter() {
            entry.value().close();
        }
        self.senders.clear();

        for entry in self.receivers.iter() {
            entry.value().close();
        }
        self.receivers.clear();
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.stop();
    }
}
