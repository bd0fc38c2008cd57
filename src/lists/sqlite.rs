//! SQLite-backed list repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::net::IpAddr;
use std::str::FromStr;
use tracing::{debug, info};

use super::{AddressItem, IpListRepository, Ipv4Net, ListKind};
use crate::config::DatabaseConfig;
use crate::error::{GuardError, Result};

/// Open a connection pool and make sure both list tables exist.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    for kind in [ListKind::Whitelist, ListKind::Blacklist] {
        create_table(&pool, kind).await?;
    }

    info!(url = %config.url, "Connected to list database");
    Ok(pool)
}

async fn create_table(pool: &SqlitePool, kind: ListKind) -> Result<()> {
    let table = kind.table();
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            address     TEXT    NOT NULL UNIQUE,
            range_start INTEGER NOT NULL,
            range_end   INTEGER NOT NULL,
            added_at    TEXT    NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS {table}_range ON {table} (range_start, range_end)"
    ))
    .execute(pool)
    .await?;
    Ok(())
}

/// SQL text for one table, built once.
struct Queries {
    exists: String,
    insert: String,
    delete: String,
}

impl Queries {
    fn for_table(table: &str) -> Self {
        Self {
            exists: format!(
                "SELECT 1 FROM {table} WHERE range_start <= ?1 AND range_end >= ?1 LIMIT 1"
            ),
            // Only inserts when no stored network covers the new one
            insert: format!(
                r#"
                INSERT INTO {table} (address, range_start, range_end, added_at)
                SELECT ?1, ?2, ?3, ?4
                WHERE NOT EXISTS (
                    SELECT 1 FROM {table} WHERE range_start <= ?2 AND range_end >= ?3
                )
                RETURNING id, address, added_at
                "#
            ),
            delete: format!(
                "DELETE FROM {table} WHERE address = ?1 RETURNING id, address, added_at"
            ),
        }
    }
}

/// A list stored in one SQLite table.
///
/// Networks are stored with their numeric IPv4 bounds so that containment
/// checks are a range query.
pub struct SqliteIpList {
    pool: SqlitePool,
    kind: ListKind,
    queries: Queries,
}

impl SqliteIpList {
    /// Wrap a pool prepared by [`connect_pool`].
    pub fn new(pool: SqlitePool, kind: ListKind) -> Self {
        Self {
            pool,
            kind,
            queries: Queries::for_table(kind.table()),
        }
    }
}

fn address_item(row: &SqliteRow) -> Result<AddressItem> {
    Ok(AddressItem {
        id: row.try_get("id")?,
        address: row.try_get("address")?,
        added_at: row.try_get::<DateTime<Utc>, _>("added_at")?,
    })
}

#[async_trait]
impl IpListRepository for SqliteIpList {
    fn kind(&self) -> ListKind {
        self.kind
    }

    async fn exists(&self, addr: IpAddr) -> Result<bool> {
        let IpAddr::V4(v4) = addr else {
            return Ok(false);
        };

        let found = sqlx::query(&self.queries.exists)
            .bind(i64::from(u32::from(v4)))
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn add(&self, network: Ipv4Net) -> Result<AddressItem> {
        let (start, end) = network.range();
        let row = sqlx::query(&self.queries.insert)
            .bind(network.to_string())
            .bind(i64::from(start))
            .bind(i64::from(end))
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GuardError::Duplicate)?;

        let item = address_item(&row)?;
        debug!(list = %self.kind, address = %item.address, id = item.id, "Stored network");
        Ok(item)
    }

    async fn delete(&self, network: Ipv4Net) -> Result<AddressItem> {
        let row = sqlx::query(&self.queries.delete)
            .bind(network.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GuardError::NotExists)?;

        let item = address_item(&row)?;
        debug!(list = %self.kind, address = %item.address, id = item.id, "Deleted network");
        Ok(item)
    }
}
