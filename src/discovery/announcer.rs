// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic self-description broadcast on a schedule.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::id::EndpointId;
use crate::network;
use crate::wire::{Announcement, Container};
use crate::worker::ScheduledWorker;

/// Periodically sends an [`Announcement`] to the discovery target address.
pub struct Announcer {
    worker: parking_lot::Mutex<Option<ScheduledWorker>>,
}

impl Announcer {
    /// Start announcing every `rate` to `discovery_target`. A `None` target
    /// is a degenerate but permitted no-op tick (nothing to announce to).
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        self_id: EndpointId,
        self_name: String,
        network_id: i64,
        rate: Duration,
        listen_port: u16,
        discovery_listen_address: String,
        discovery_target: Option<SocketAddr>,
        network: Arc<network::Manager>,
    ) -> Self {
        let target_string = discovery_target.map(|a| a.to_string()).unwrap_or_default();

        let worker = ScheduledWorker::spawn(
            rate,
            || log::info!("discovery announcer started"),
            move || {
                let Some(discovery_target) = discovery_target else {
                    return;
                };

                let announcement = Announcement {
                    sent_rate: rate,
                    listen_port,
                    discovery_listen_address: discovery_listen_address.clone(),
                    discovery_target_address: target_string.clone(),
                    forwarded: false,
                };
                let mut container = Container::new_announcement(
                    network_id,
                    self_id,
                    self_name.clone(),
                    target_string.clone(),
                    announcement,
                );

                let sender = network.sender(discovery_target);
                if let Ok(source) = sender.ensure_open() {
                    container.sent_by = source.to_string();
                }

                match crate::wire::serialize(&container) {
                    Ok(bytes) => {
                        if let Err(e) = sender.send(&bytes) {
                            log::debug!("announce to {discovery_target} failed: {e}");
                        }
                    }
                    Err(e) => log::warn!("failed to encode announcement: {e}"),
                }
            },
            || log::info!("discovery announcer stopped"),
        );

        Self {
            worker: parking_lot::Mutex::new(Some(worker)),
        }
    }

    /// Stop announcing. Safe to call more than once; only the first call
    /// has an effect.
    pub fn stop(&self) {
        if let Some(mut worker) = self.worker.lock().take() {
            worker.stop();
        }
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.stop();
    }
}
