// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ephemeral port allocation.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

/// Default number of bind attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 16;

/// How long a handed-out port stays reserved against reissue.
pub const DEFAULT_RESERVATION: Duration = Duration::from_secs(60);

/// Hands out free TCP ports.
pub trait PortAllocator: Send + Sync {
    /// Return a port nobody is listening on right now.
    ///
    /// Never returns a port it already handed out within its reservation
    /// window, whether to this caller or a concurrent one.
    fn allocate(&self) -> Result<u16>;
}

/// Asks the OS for a port by binding to port 0.
///
/// The listener is dropped immediately, so the port is only free until
/// someone else binds it. Issued ports are remembered for the reservation
/// window and skipped if the OS offers them again.
#[derive(Debug)]
pub struct EphemeralPortAllocator {
    max_attempts: usize,
    reservation: Duration,
    issued: Mutex<HashMap<u16, Instant>>,
}

impl Default for EphemeralPortAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemeralPortAllocator {
    /// Create an allocator with default limits.
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reservation: DEFAULT_RESERVATION,
            issued: Mutex::new(HashMap::new()),
        }
    }

    /// Set the number of bind attempts per allocation.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the reservation window.
    pub fn with_reservation(mut self, reservation: Duration) -> Self {
        self.reservation = reservation;
        self
    }

    /// Number of ports currently reserved.
    pub fn reserved(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PortAllocator for EphemeralPortAllocator {
    fn allocate(&self) -> Result<u16> {
        // Held across the bind so concurrent callers cannot race on a port.
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        issued.retain(|_, at| now.duration_since(*at) < self.reservation);

        for attempt in 1..=self.max_attempts {
            let port = match TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], 0)))
                .and_then(|listener| listener.local_addr())
            {
                Ok(addr) => addr.port(),
                Err(e) => {
                    debug!(attempt, error = %e, "Ephemeral bind failed");
                    continue;
                }
            };

            if issued.contains_key(&port) {
                debug!(attempt, port, "Port still reserved, retrying");
                continue;
            }

            issued.insert(port, now);
            debug!(port, "Allocated port");
            return Ok(port);
        }

        Err(Error::ResourceExhausted(self.max_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_allocate_returns_bindable_port() {
        let allocator = EphemeralPortAllocator::new();
        let port = allocator.allocate().unwrap();
        assert!(port > 0);
        TcpListener::bind(("0.0.0.0", port)).expect("allocated port should be free");
    }

    #[test]
    fn test_sequential_allocations_are_distinct() {
        let allocator = EphemeralPortAllocator::new();
        let mut seen = HashSet::new();
        for _ in 0..64 {
            assert!(seen.insert(allocator.allocate().unwrap()));
        }
        assert_eq!(allocator.reserved(), 64);
    }

    #[test]
    fn test_concurrent_allocations_are_distinct() {
        let allocator = Arc::new(EphemeralPortAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = allocator.clone();
                std::thread::spawn(move || {
                    (0..16)
                        .map(|_| allocator.allocate().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for port in handle.join().unwrap() {
                assert!(seen.insert(port), "port {port} issued twice");
            }
        }
        assert_eq!(seen.len(), 128);
    }

    #[test]
    fn test_expired_reservations_are_dropped() {
        let allocator = EphemeralPortAllocator::new().with_reservation(Duration::ZERO);
        allocator.allocate().unwrap();
        allocator.allocate().unwrap();
        assert!(allocator.reserved() <= 1);
    }

    #[test]
    fn test_exhausted_after_bounded_attempts() {
        let allocator = EphemeralPortAllocator::new().with_max_attempts(0);
        let err = allocator.allocate().unwrap_err();
        assert!(matches!(err, Error::ResourceExhausted(0)));
    }
}
