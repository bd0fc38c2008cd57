//! In-process list repository.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::net::IpAddr;

use super::{AddressItem, IpListRepository, Ipv4Net, ListKind};
use crate::error::{GuardError, Result};

struct Entry {
    network: Ipv4Net,
    item: AddressItem,
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
    next_id: i64,
}

/// A list kept in memory; contents are lost on restart.
pub struct MemoryIpList {
    kind: ListKind,
    state: RwLock<State>,
}

impl MemoryIpList {
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            state: RwLock::new(State::default()),
        }
    }

    /// Number of stored networks.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IpListRepository for MemoryIpList {
    fn kind(&self) -> ListKind {
        self.kind
    }

    async fn exists(&self, addr: IpAddr) -> Result<bool> {
        Ok(self.state.read().entries.iter().any(|e| e.network.contains(addr)))
    }

    async fn add(&self, network: Ipv4Net) -> Result<AddressItem> {
        let mut state = self.state.write();
        if state.entries.iter().any(|e| e.network.covers(&network)) {
            return Err(GuardError::Duplicate);
        }

        state.next_id += 1;
        let item = AddressItem {
            id: state.next_id,
            address: network.to_string(),
            added_at: Utc::now(),
        };
        state.entries.push(Entry {
            network,
            item: item.clone(),
        });
        Ok(item)
    }

    async fn delete(&self, network: Ipv4Net) -> Result<AddressItem> {
        let mut state = self.state.write();
        let position = state
            .entries
            .iter()
            .position(|e| e.network == network)
            .ok_or(GuardError::NotExists)?;

        Ok(state.entries.remove(position).item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_add_and_exists() {
        let list = MemoryIpList::new(ListKind::Blacklist);
        let item = assert_ok!(list.add(net("192.168.0.1/16")).await);

        assert_eq!(item.id, 1);
        assert_eq!(item.address, "192.168.0.0/16");
        assert!(assert_ok!(list.exists("192.168.44.1".parse().unwrap()).await));
        assert!(!assert_ok!(list.exists("192.169.0.1".parse().unwrap()).await));
    }

    #[tokio::test]
    async fn test_covered_network_is_duplicate() {
        let list = MemoryIpList::new(ListKind::Whitelist);
        assert_ok!(list.add(net("192.168.0.0/16")).await);

        let err = assert_err!(list.add(net("192.168.0.1/32")).await);
        assert!(matches!(err, GuardError::Duplicate));

        // Outside the stored network
        assert_ok!(list.add(net("192.169.0.1/32")).await);
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_requires_exact_match() {
        let list = MemoryIpList::new(ListKind::Blacklist);
        assert_ok!(list.add(net("10.0.0.0/8")).await);

        let err = assert_err!(list.delete(net("10.0.0.0/16")).await);
        assert!(matches!(err, GuardError::NotExists));

        let removed = assert_ok!(list.delete(net("10.0.0.0/8")).await);
        assert_eq!(removed.address, "10.0.0.0/8");
        assert!(list.is_empty());
    }
}
