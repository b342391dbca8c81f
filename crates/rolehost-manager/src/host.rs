// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local host address discovery.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

/// Host name used when address discovery fails.
pub const FALLBACK_HOST: &str = "localhost";

/// Discovers the address other cluster members can reach this host on.
pub trait HostResolver: Send + Sync {
    /// Attempt discovery. May fail.
    fn discover(&self) -> io::Result<String>;

    /// Discover the host address, falling back to [`FALLBACK_HOST`].
    fn resolve_host(&self) -> String {
        match self.discover() {
            Ok(host) => host,
            Err(e) => {
                warn!(error = %e, fallback = FALLBACK_HOST, "Host discovery failed");
                FALLBACK_HOST.to_string()
            }
        }
    }
}

/// Resolves the address the OS would use for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only asks the routing table
/// for a source address.
#[derive(Debug, Clone)]
pub struct NetworkHostResolver {
    probe_addr: SocketAddr,
}

impl Default for NetworkHostResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkHostResolver {
    /// Create a resolver probing a public address.
    pub fn new() -> Self {
        Self {
            probe_addr: SocketAddr::from(([8, 8, 8, 8], 80)),
        }
    }

    /// Create a resolver probing a specific address.
    pub fn with_probe_addr(probe_addr: SocketAddr) -> Self {
        Self { probe_addr }
    }
}

impl HostResolver for NetworkHostResolver {
    fn discover(&self) -> io::Result<String> {
        let bind_addr = if self.probe_addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(self.probe_addr)?;
        let ip = socket.local_addr()?.ip();

        if ip.is_loopback() || ip.is_unspecified() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no routable local address (got {ip})"),
            ));
        }

        debug!(host = %ip, "Discovered host address");
        Ok(ip.to_string())
    }
}

/// Resolver returning a fixed answer. Counts discovery attempts.
///
/// Used by tests and by deployments that pin the advertised host.
#[derive(Debug)]
pub struct FixedHostResolver {
    host: Option<String>,
    calls: AtomicUsize,
}

impl FixedHostResolver {
    /// Always discover `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Discovery always fails, so resolution always falls back.
    pub fn unreachable() -> Self {
        Self {
            host: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of discovery attempts so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HostResolver for FixedHostResolver {
    fn discover(&self) -> io::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.host.clone().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no network interface available")
        })
    }
}
