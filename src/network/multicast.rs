// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast group membership and interface-name resolution.

use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Join `group` on the named interface (or on every available non-loopback
/// IPv4 interface if `interface` is `None`). `EADDRINUSE` (already joined on
/// the same NIC) is treated as success.
pub fn join_multicast_group(
    socket: &UdpSocket,
    group: Ipv4Addr,
    interface: Option<&str>,
) -> io::Result<()> {
    let candidates: Vec<Ipv4Addr> = match interface {
        Some(name) => vec![resolve_interface(name)?],
        None => {
            let all = all_ipv4_interfaces();
            if all.is_empty() {
                vec![Ipv4Addr::UNSPECIFIED]
            } else {
                all
            }
        }
    };

    for iface in &candidates {
        match socket.join_multicast_v4(&group, iface) {
            Ok(()) => log::debug!("joined multicast {group} on interface {iface}"),
            Err(e) if e.raw_os_error() == Some(98) => {
                log::debug!("multicast {group} already joined on {iface}, skipping");
            }
            Err(e) => {
                log::debug!("join_multicast_v4({group}) on {iface} failed (non-fatal): {e}");
            }
        }
    }

    socket.set_multicast_loop_v4(true)?;
    Ok(())
}

/// Resolve an interface name (e.g. `"eth0"`) to its IPv4 address.
pub fn resolve_interface(name: &str) -> io::Result<Ipv4Addr> {
    for (iface_name, addr) in local_ip_address::list_afinet_netifas().unwrap_or_default() {
        if iface_name == name {
            if let IpAddr::V4(v4) = addr {
                return Ok(v4);
            }
        }
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no IPv4 address found for interface '{name}'"),
    ))
}

fn all_ipv4_interfaces() -> Vec<Ipv4Addr> {
    local_ip_address::list_afinet_netifas()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(_, addr)| match addr {
            IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
            _ => None,
        })
        .collect()
}

/// True if `addr` falls in the IPv4 multicast range (224.0.0.0/4).
pub fn is_multicast(addr: IpAddr) -> bool {
    addr.is_multicast()
}
