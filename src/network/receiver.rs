// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bound UDP receiver with a blocking receive loop and a fan-out callback
//! table.

use dashmap::DashMap;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RECEIVER_BUFFER_SIZE, RECEIVER_READ_DEADLINE};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::network::multicast;
use crate::network::Datagram;
use crate::worker::BlockedWorker;

/// Opaque token returned by [`Receiver::register_callback`]. Dedup is by
/// this handle, never by comparing closures or function pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

type Callback = Box<dyn Fn(Datagram) + Send + Sync>;

/// A single bound UDP socket, its receive loop, and the set of callbacks
/// subscribed to its datagrams.
pub struct Receiver {
    bind_address: SocketAddr,
    interface: Option<String>,
    callbacks: Arc<DashMap<CallbackHandle, Callback>>,
    next_handle: AtomicU64,
    worker: parking_lot::Mutex<Option<BlockedWorker>>,
    dispatcher: Arc<Dispatcher>,
}

impl Receiver {
    /// Bind to `bind_address` (joining its multicast group on `interface` if
    /// it falls in the multicast range) and start the receive loop.
    pub fn bind(
        bind_address: SocketAddr,
        interface: Option<String>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self> {
        let socket = open_socket(bind_address, interface.as_deref())?;

        let receiver = Self {
            bind_address,
            interface,
            callbacks: Arc::new(DashMap::new()),
            next_handle: AtomicU64::new(1),
            worker: parking_lot::Mutex::new(None),
            dispatcher,
        };

        receiver.start(socket);
        Ok(receiver)
    }

    fn start(&self, socket: UdpSocket) {
        let callbacks = Arc::clone(&self.callbacks);
        let dispatcher = Arc::clone(&self.dispatcher);
        let bind_address = self.bind_address;

        let mut buf = vec![0u8; crate::config::MAX_UDP_DATAGRAM_SIZE];

        let worker = BlockedWorker::spawn(
            || {},
            move || match socket.recv_from(&mut buf) {
                Ok((n, src)) => {
                    let datagram = Datagram {
                        src,
                        dst: bind_address,
                        bytes: buf[..n].to_vec(),
                    };
                    let callbacks = Arc::clone(&callbacks);
                    dispatcher.submit(move || {
                        for entry in callbacks.iter() {
                            entry.value()(datagram.clone());
                        }
                    });
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    // Read deadline elapsed; gives the loop a chance to
                    // observe shutdown. Not an error.
                }
                Err(e) => {
                    log::debug!("receive on {bind_address} failed: {e}");
                }
            },
            || {},
        );

        *self.worker.lock() = Some(worker);
    }

    /// Register a callback invoked for every datagram received on this
    /// socket. Returns an opaque handle to later unregister it.
    pub fn register_callback<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(Datagram) + Send + Sync + 'static,
    {
        let handle = CallbackHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.callbacks.insert(handle, Box::new(callback));
        handle
    }

    /// Remove a previously registered callback.
    pub fn unregister_callback(&self, handle: CallbackHandle) {
        self.callbacks.remove(&handle);
    }

    /// The bind address this receiver is listening on.
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// The interface this receiver joined its multicast group on, if any.
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// Stop the receive loop and close the socket.
    pub fn close(&self) {
        if let Some(mut worker) = self.worker.lock().take() {
            worker.stop();
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_socket(bind_address: SocketAddr, interface: Option<&str>) -> Result<UdpSocket> {
    let domain = if bind_address.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    set_reuseport(&socket)?;

    socket.bind(&bind_address.into())?;
    socket.set_recv_buffer_size(RECEIVER_BUFFER_SIZE)?;
    socket.set_read_timeout(Some(RECEIVER_READ_DEADLINE))?;

    let std_socket: UdpSocket = socket.into();

    if let std::net::IpAddr::V4(group) = bind_address.ip() {
        if multicast::is_multicast(bind_address.ip()) {
            multicast::join_multicast_group(&std_socket, group, interface)?;
        }
    }

    Ok(std_socket)
}

#[cfg(unix)]
fn set_reuseport(socket: &Socket) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = socket.as_raw_fd();
    let enable: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &enable as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Read deadline applied between polls of the shutdown flag when no
/// datagram arrives; exported for documentation/tests that want to wait
/// out one deadline cycle.
pub const POLL_INTERVAL: Duration = RECEIVER_READ_DEADLINE;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn receives_and_fans_out_to_callbacks() {
        let dispatcher = Arc::new(Dispatcher::new());
        let receiver =
            Receiver::bind("127.0.0.1:0".parse().unwrap(), None, dispatcher).unwrap();
        let bound = receiver.bind_address();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        receiver.register_callback(move |dgram: Datagram| {
            seen_cb.lock().unwrap().push(dgram.bytes);
        });

        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.send_to(b"ping", bound).unwrap();

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(seen.lock().unwrap().as_slice(), &[b"ping".to_vec()]);
    }

    #[test]
    fn unregistered_callback_stops_receiving() {
        let dispatcher = Arc::new(Dispatcher::new());
        let receiver =
            Receiver::bind("127.0.0.1:0".parse().unwrap(), None, dispatcher).unwrap();
        let bound = receiver.bind_address();

        let count = Arc::new(AtomicUsize::new(0));
        let count_cb = Arc::clone(&count);
        let handle = receiver.register_callback(move |_| {
            count_cb.fetch_add(1, Ordering::SeqCst);
        });
        receiver.unregister_callback(handle);

        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.send_to(b"ping", bound).unwrap();

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
