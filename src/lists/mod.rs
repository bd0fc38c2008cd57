//! Static allow/deny IP network lists.
//!
//! The rate limiter consults these before touching any counter: a source
//! address inside a blacklisted network is always rejected, one inside a
//! whitelisted network is always admitted.

mod memory;
mod network;
mod sqlite;

pub use memory::MemoryIpList;
pub use network::Ipv4Net;
pub use sqlite::{connect_pool, SqliteIpList};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::{GuardError, Result};

/// Which of the two lists a repository holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// Addresses that are always admitted
    Whitelist,
    /// Addresses that are always rejected
    Blacklist,
}

impl ListKind {
    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            ListKind::Whitelist => "ip_whitelist",
            ListKind::Blacklist => "ip_blacklist",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Whitelist => "whitelist",
            ListKind::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListKind {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "whitelist" => Ok(ListKind::Whitelist),
            "blacklist" => Ok(ListKind::Blacklist),
            other => Err(GuardError::UnknownListKind(other.to_string())),
        }
    }
}

/// A stored network entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressItem {
    pub id: i64,
    /// Normalized CIDR text, e.g. `192.168.0.0/16`
    pub address: String,
    pub added_at: DateTime<Utc>,
}

/// Storage for one IP network list.
#[async_trait]
pub trait IpListRepository: Send + Sync {
    /// Which list this repository holds.
    fn kind(&self) -> ListKind;

    /// Whether `addr` falls within any stored network.
    async fn exists(&self, addr: IpAddr) -> Result<bool>;

    /// Store `network`. Fails with [`GuardError::Duplicate`] if a stored
    /// network already covers it.
    async fn add(&self, network: Ipv4Net) -> Result<AddressItem>;

    /// Remove the stored network equal to `network`. Fails with
    /// [`GuardError::NotExists`] if there is none.
    async fn delete(&self, network: Ipv4Net) -> Result<AddressItem>;
}

/// The whitelist and blacklist repositories used by one process.
#[derive(Clone)]
pub struct IpLists {
    pub whitelist: Arc<dyn IpListRepository>,
    pub blacklist: Arc<dyn IpListRepository>,
}

impl IpLists {
    /// Open both lists according to the database configuration.
    ///
    /// `memory` keeps the lists in process; anything else is treated as a
    /// SQLite connection URL.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        if config.url == "memory" {
            return Ok(Self::in_memory());
        }

        let pool = connect_pool(config).await?;
        Ok(Self {
            whitelist: Arc::new(SqliteIpList::new(pool.clone(), ListKind::Whitelist)),
            blacklist: Arc::new(SqliteIpList::new(pool, ListKind::Blacklist)),
        })
    }

    /// Two empty in-process lists.
    pub fn in_memory() -> Self {
        Self {
            whitelist: Arc::new(MemoryIpList::new(ListKind::Whitelist)),
            blacklist: Arc::new(MemoryIpList::new(ListKind::Blacklist)),
        }
    }

    /// The repository holding `kind`.
    pub fn get(&self, kind: ListKind) -> &Arc<dyn IpListRepository> {
        match kind {
            ListKind::Whitelist => &self.whitelist,
            ListKind::Blacklist => &self.blacklist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_kind_round_trip() {
        assert_eq!("whitelist".parse::<ListKind>().unwrap(), ListKind::Whitelist);
        assert_eq!("blacklist".parse::<ListKind>().unwrap(), ListKind::Blacklist);
        assert!("graylist".parse::<ListKind>().is_err());
        assert_eq!(ListKind::Blacklist.table(), "ip_blacklist");
    }

    #[tokio::test]
    async fn test_in_memory_lists_are_independent() {
        let lists = IpLists::in_memory();
        lists.get(ListKind::Blacklist).add("10.0.0.0/8".parse().unwrap()).await.unwrap();

        let addr = "10.1.2.3".parse().unwrap();
        assert!(lists.blacklist.exists(addr).await.unwrap());
        assert!(!lists.whitelist.exists(addr).await.unwrap());
        assert_eq!(lists.get(ListKind::Whitelist).kind(), ListKind::Whitelist);
    }
}
