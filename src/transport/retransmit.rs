// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The retransmit table: frames sent with `needs_ack` live here until an ACK
//! arrives or their `resend_expiry` elapses, re-sent every `resend_period` in
//! between.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

use crate::id::FrameId;
use crate::network;
use crate::wire::{self, Container};

struct RetransmitEntry {
    container: Container,
    destination: SocketAddr,
}

/// Tracks frames awaiting acknowledgement and re-sends them on a schedule.
#[derive(Default)]
pub struct RetransmitTable {
    entries: DashMap<FrameId, RetransmitEntry>,
}

impl RetransmitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a freshly sent frame for retransmission.
    pub fn track(&self, frame_id: FrameId, container: Container, destination: SocketAddr) {
        self.entries.insert(frame_id, RetransmitEntry { container, destination });
    }

    /// Remove the entry for `frame_id` in response to an ACK. Returns
    /// `true` if an entry was actually awaiting it.
    pub fn ack(&self, frame_id: FrameId) -> bool {
        self.entries.remove(&frame_id).is_some()
    }

    /// Number of frames currently awaiting acknowledgement.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One sweep: drop entries past their `resend_expiry`, re-send entries
    /// whose `resend_period` elapsed since their last (re)send.
    pub fn sweep(&self, network: &network::Manager) {
        let now = SystemTime::now();
        let mut expired = Vec::new();
        let mut to_resend: Vec<(Container, SocketAddr)> = Vec::new();

        for mut entry in self.entries.iter_mut() {
            let frame_id = *entry.key();
            let resend_entry = entry.value_mut();
            let frame = resend_entry
                .container
                .frame
                .as_ref()
                .expect("retransmit entries always carry a frame");

            let resend_expiry = frame.resend_expiry;
            let resend_period = frame.resend_period;

            if now
                .duration_since(resend_entry.container.sent_timestamp)
                .unwrap_or(Duration::ZERO)
                >= resend_expiry
            {
                expired.push(frame_id);
                continue;
            }

            if now
                .duration_since(resend_entry.container.last_sent_timestamp)
                .unwrap_or(Duration::ZERO)
                >= resend_period
            {
                resend_entry.container.last_sent_timestamp = now;
                to_resend.push((resend_entry.container.clone(), resend_entry.destination));
            }
        }

        for frame_id in expired {
            self.entries.remove(&frame_id);
        }

        for (container, destination) in to_resend {
            match wire::serialize(&container) {
                Ok(bytes) => {
                    let sender = network.sender(destination);
                    if let Err(e) = sender.send(&bytes) {
                        log::debug!("transport: retransmit to {destination} failed: {e}");
                    }
                }
                Err(e) => log::warn!("transport: failed to re-encode frame for retransmit: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::MeshId;
    use crate::wire::Frame;
    use std::time::Duration;

    fn sample_container(resend_period: Duration, resend_expiry: Duration) -> Container {
        let frame_id = MeshId::generate();
        Container::new_frame(
            1,
            MeshId::generate(),
            "peer-a".into(),
            "127.0.0.1:9".into(),
            Frame {
                frame_id,
                correlation_id: MeshId::generate(),
                fragment_count: 1,
                fragment_index: 0,
                destination_endpoint_id: MeshId::generate(),
                destination_endpoint_name: "peer-b".into(),
                needs_ack: true,
                is_ack: false,
                payload: b"hi".to_vec(),
                resend_period,
                resend_expiry,
            },
        )
    }

    #[test]
    fn ack_removes_tracked_entry() {
        let table = RetransmitTable::new();
        let container = sample_container(Duration::from_millis(50), Duration::from_millis(500));
        let frame_id = container.frame.as_ref().unwrap().frame_id;

        table.track(frame_id, container, "127.0.0.1:9".parse().unwrap());
        assert_eq!(table.len(), 1);
        assert!(table.ack(frame_id));
        assert!(table.is_empty());
    }

    #[test]
    fn ack_for_unknown_frame_returns_false() {
        let table = RetransmitTable::new();
        assert!(!table.ack(MeshId::generate()));
    }

    #[test]
    fn sweep_resends_until_expiry_then_drops() {
        let table = RetransmitTable::new();
        let listener = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let dest = listener.local_addr().unwrap();

        let container = sample_container(Duration::from_millis(10), Duration::from_millis(60));
        let frame_id = container.frame.as_ref().unwrap().frame_id;
        table.track(frame_id, container, dest);

        let network = network::Manager::new();

        let mut resends = 0;
        for _ in 0..12 {
            std::thread::sleep(Duration::from_millis(10));
            table.sweep(&network);
            let mut buf = [0u8; 2048];
            while listener.recv_from(&mut buf).is_ok() {
                resends += 1;
            }
        }

        assert!(resends >= 1, "expected at least one retransmission");
        assert!(table.is_empty(), "entry should be dropped after resend_expiry");
    }
}
