//! Live connection bookkeeping
//!
//! The registry never fails and never enforces limits; the hub decides
//! admission before calling [`Registry::add`].

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::connection::{Connection, ConnectionId};

/// Set of live connections plus a per-address count
#[derive(Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Arc<dyn Connection>>,
    per_address: HashMap<IpAddr, usize>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection and count it against its address
    pub fn add(&mut self, conn: Arc<dyn Connection>) {
        let id = conn.id();
        let addr = conn.remote_addr();
        if self.connections.insert(id, conn).is_none() {
            *self.per_address.entry(addr).or_insert(0) += 1;
        }
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Arc<dyn Connection>> {
        let conn = self.connections.remove(&id)?;
        let addr = conn.remote_addr();
        if let Some(count) = self.per_address.get_mut(&addr) {
            *count -= 1;
            if *count == 0 {
                self.per_address.remove(&addr);
            }
        }
        Some(conn)
    }

    /// Look up a live connection
    #[must_use]
    pub fn get(&self, id: &ConnectionId) -> Option<&Arc<dyn Connection>> {
        self.connections.get(id)
    }

    /// Live connections from `addr`
    #[must_use]
    pub fn count_for(&self, addr: &IpAddr) -> usize {
        self.per_address.get(addr).copied().unwrap_or(0)
    }

    /// Total live connections
    #[must_use]
    pub fn total(&self) -> usize {
        self.connections.len()
    }

    /// Distinct addresses with live connections
    #[must_use]
    pub fn address_count(&self) -> usize {
        self.per_address.len()
    }

    /// Whether any connection from `addr` is live
    #[must_use]
    pub fn is_address_live(&self, addr: &IpAddr) -> bool {
        self.per_address.contains_key(addr)
    }

    /// Iterate over live connections
    pub fn connections(&self) -> impl Iterator<Item = &Arc<dyn Connection>> {
        self.connections.values()
    }

    /// Remove every connection
    pub fn drain(&mut self) -> Vec<Arc<dyn Connection>> {
        self.per_address.clear();
        self.connections.drain().map(|(_, conn)| conn).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::net::Ipv4Addr;

    struct Stub {
        id: ConnectionId,
        addr: IpAddr,
    }

    impl Connection for Stub {
        fn id(&self) -> ConnectionId {
            self.id
        }
        fn remote_addr(&self) -> IpAddr {
            self.addr
        }
        fn send(&self, _text: &str) -> Result<()> {
            Ok(())
        }
        fn close(&self) {}
    }

    fn stub(last: u8) -> Arc<dyn Connection> {
        Arc::new(Stub {
            id: ConnectionId::new(),
            addr: IpAddr::V4(Ipv4Addr::new(192, 168, 0, last)),
        })
    }

    #[test]
    fn test_counts_per_address() {
        let mut registry = Registry::new();
        let a1 = stub(1);
        let a2 = stub(1);
        let b = stub(2);
        let addr_a = a1.remote_addr();

        registry.add(a1.clone());
        registry.add(a2.clone());
        registry.add(b.clone());

        assert_eq!(registry.total(), 3);
        assert_eq!(registry.count_for(&addr_a), 2);

        registry.remove(a1.id());
        assert_eq!(registry.count_for(&addr_a), 1);
        assert!(registry.is_address_live(&addr_a));

        registry.remove(a2.id());
        assert_eq!(registry.count_for(&addr_a), 0);
        assert!(!registry.is_address_live(&addr_a));
        assert_eq!(registry.total(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = Registry::new();
        let conn = stub(1);
        let addr = conn.remote_addr();
        registry.add(conn.clone());

        assert!(registry.remove(conn.id()).is_some());
        assert!(registry.remove(conn.id()).is_none());
        assert_eq!(registry.count_for(&addr), 0);
        assert_eq!(registry.total(), 0);
    }

    #[test]
    fn test_duplicate_add_counts_once() {
        let mut registry = Registry::new();
        let conn = stub(1);
        registry.add(conn.clone());
        registry.add(conn.clone());
        assert_eq!(registry.count_for(&conn.remote_addr()), 1);
    }

    #[test]
    fn test_drain() {
        let mut registry = Registry::new();
        registry.add(stub(1));
        registry.add(stub(2));

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.total(), 0);
        assert_eq!(registry.connections().count(), 0);
    }
}
