//! SQLite-backed storage: a single unified `events` table plus per-contract
//! `sync_state`, coupled atomically by `commit`.

use std::sync::atomic::{AtomicBool, Ordering};

use chaintap_core::event::DecodedEvent;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::StorageError;
use crate::query::QueryFilter;

pub struct SqliteStorage {
    pool: SqlitePool,
    closed: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct SyncStateRow {
    pub last_block: u64,
    pub last_sync: i64,
    pub status: String,
}

impl SqliteStorage {
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url).await?;
        let storage = Self {
            pool,
            closed: AtomicBool::new(false),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        let storage = Self {
            pool,
            closed: AtomicBool::new(false),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                contract_address TEXT    NOT NULL,
                block_number     INTEGER NOT NULL,
                block_timestamp  INTEGER NOT NULL,
                transaction_hash TEXT    NOT NULL,
                log_index        INTEGER NOT NULL,
                event_name       TEXT    NOT NULL,
                event_data       TEXT    NOT NULL,
                indexed_at       INTEGER NOT NULL,
                UNIQUE(transaction_hash, log_index)
            );",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_contract_block
             ON events (contract_address, block_number);",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_contract_name
             ON events (contract_address, event_name);",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_block ON events (block_number);")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sync_state (
                contract_address TEXT PRIMARY KEY,
                chain_id         INTEGER NOT NULL,
                last_block       INTEGER NOT NULL,
                last_sync        INTEGER NOT NULL,
                status           TEXT NOT NULL DEFAULT 'active'
            );",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn check_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    /// Insert a batch of events in one transaction. Rows colliding on
    /// `(transaction_hash, log_index)` are silently discarded. Returns the
    /// number of rows actually inserted.
    pub async fn insert_batch(&self, events: &[DecodedEvent]) -> Result<u64, StorageError> {
        self.check_open()?;
        let mut tx = self.pool.begin().await?;
        let indexed_at = Utc::now().timestamp();
        let mut inserted = 0u64;
        for event in events {
            inserted += insert_one(&mut tx, event, indexed_at).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn get_last_synced_block(
        &self,
        contract_address: &str,
    ) -> Result<Option<u64>, StorageError> {
        self.check_open()?;
        let row = sqlx::query("SELECT last_block FROM sync_state WHERE contract_address = ?")
            .bind(contract_address.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("last_block") as u64))
    }

    /// Full `sync_state` row for a contract, used by the `status` command.
    pub async fn get_sync_state(
        &self,
        contract_address: &str,
    ) -> Result<Option<SyncStateRow>, StorageError> {
        self.check_open()?;
        let row = sqlx::query(
            "SELECT last_block, last_sync, status FROM sync_state WHERE contract_address = ?",
        )
        .bind(contract_address.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| SyncStateRow {
            last_block: r.get::<i64, _>("last_block") as u64,
            last_sync: r.get("last_sync"),
            status: r.get("status"),
        }))
    }

    /// Total persisted events for one contract.
    pub async fn count_events(&self, contract_address: &str) -> Result<u64, StorageError> {
        self.check_open()?;
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM events WHERE contract_address = ?")
            .bind(contract_address.to_lowercase())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    /// Atomically upsert `sync_state` and insert-ignore `events`. Either
    /// both changes land or neither does. Returns the number of event rows
    /// actually inserted.
    pub async fn commit(
        &self,
        contract_address: &str,
        chain_id: u64,
        last_block: u64,
        events: &[DecodedEvent],
    ) -> Result<u64, StorageError> {
        self.check_open()?;
        let address = contract_address.to_lowercase();
        let now = Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sync_state (contract_address, chain_id, last_block, last_sync, status)
             VALUES (?, ?, ?, ?, 'active')
             ON CONFLICT(contract_address) DO UPDATE SET
                last_block = excluded.last_block,
                last_sync  = excluded.last_sync",
        )
        .bind(&address)
        .bind(chain_id as i64)
        .bind(last_block as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut inserted = 0u64;
        for event in events {
            inserted += insert_one(&mut tx, event, now).await?;
        }

        tx.commit().await?;
        debug!(contract_address = %address, last_block, inserted, "committed");
        Ok(inserted)
    }

    pub async fn query(&self, filter: QueryFilter) -> Result<Vec<DecodedEvent>, StorageError> {
        self.check_open()?;

        let mut sql = String::from(
            "SELECT contract_address, block_number, block_timestamp, transaction_hash,
                    log_index, event_name, event_data
             FROM events WHERE 1=1",
        );
        if filter.contract_address.is_some() {
            sql.push_str(" AND contract_address = ?");
        }
        if filter.event_name.is_some() {
            sql.push_str(" AND event_name = ?");
        }
        if filter.from_block.is_some() {
            sql.push_str(" AND block_number >= ?");
        }
        if filter.to_block.is_some() {
            sql.push_str(" AND block_number <= ?");
        }
        sql.push_str(" ORDER BY block_number ASC, log_index ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(addr) = &filter.contract_address {
            query = query.bind(addr.to_lowercase());
        }
        if let Some(name) = &filter.event_name {
            query = query.bind(name.clone());
        }
        if let Some(from) = filter.from_block {
            query = query.bind(from as i64);
        }
        if let Some(to) = filter.to_block {
            query = query.bind(to as i64);
        }
        query = query
            .bind(filter.effective_limit())
            .bind(filter.offset.unwrap_or(0) as i64);

        let rows = query.fetch_all(&self.pool).await?;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_data_str: String = row.get("event_data");
            let event_data = serde_json::from_str(&event_data_str)
                .map_err(|e| StorageError::Query(format!("corrupt event_data: {e}")))?;
            events.push(DecodedEvent {
                contract_address: row.get("contract_address"),
                block_number: row.get::<i64, _>("block_number") as u64,
                block_timestamp: row.get("block_timestamp"),
                transaction_hash: row.get("transaction_hash"),
                log_index: row.get::<i64, _>("log_index") as u32,
                event_name: row.get("event_name"),
                event_data,
            });
        }
        Ok(events)
    }

    pub async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::SeqCst);
        self.pool.close().await;
        Ok(())
    }
}

async fn insert_one(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    event: &DecodedEvent,
    indexed_at: i64,
) -> Result<u64, StorageError> {
    let event_data = serde_json::to_string(&event.event_data)
        .map_err(|e| StorageError::Query(format!("event_data serialization failed: {e}")))?;

    let result = sqlx::query(
        "INSERT OR IGNORE INTO events
         (contract_address, block_number, block_timestamp, transaction_hash, log_index,
          event_name, event_data, indexed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(event.contract_address.to_lowercase())
    .bind(event.block_number as i64)
    .bind(event.block_timestamp)
    .bind(&event.transaction_hash)
    .bind(event.log_index as i64)
    .bind(&event.event_name)
    .bind(event_data)
    .bind(indexed_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(block: u64, log_index: u32, tx_hash: &str) -> DecodedEvent {
        DecodedEvent {
            contract_address: "0xAbCdEf0000000000000000000000000000000000".into(),
            block_number: block,
            block_timestamp: 1_700_000_000,
            transaction_hash: tx_hash.into(),
            log_index,
            event_name: "Transfer".into(),
            event_data: json!({"from": "0x1", "to": "0x2", "value": "100"}),
        }
    }

    #[tokio::test]
    async fn insert_batch_discards_duplicates() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let events = vec![sample(100, 0, "0xaaa"), sample(100, 0, "0xaaa")];
        let inserted = store.insert_batch(&events).await.unwrap();
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn commit_couples_sync_state_and_events() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let events = vec![sample(100, 0, "0xaaa"), sample(101, 0, "0xbbb")];
        let inserted = store.commit("0xabcdef", 1, 101, &events).await.unwrap();
        assert_eq!(inserted, 2);

        let last = store.get_last_synced_block("0xabcdef").await.unwrap();
        assert_eq!(last, Some(101));
    }

    #[tokio::test]
    async fn commit_is_atomic_across_calls_progress_monotone() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit("0xabcdef", 1, 100, &[sample(100, 0, "0xaaa")]).await.unwrap();
        store.commit("0xabcdef", 1, 200, &[sample(200, 0, "0xbbb")]).await.unwrap();

        let last = store.get_last_synced_block("0xabcdef").await.unwrap();
        assert_eq!(last, Some(200));
    }

    #[tokio::test]
    async fn query_orders_by_block_then_log_index() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .insert_batch(&[
                sample(101, 1, "0xccc"),
                sample(100, 1, "0xbbb"),
                sample(100, 0, "0xaaa"),
            ])
            .await
            .unwrap();

        let results = store.query(QueryFilter::new()).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].transaction_hash, "0xaaa");
        assert_eq!(results[1].transaction_hash, "0xbbb");
        assert_eq!(results[2].transaction_hash, "0xccc");
    }

    #[tokio::test]
    async fn query_filters_by_block_range() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .insert_batch(&[sample(100, 0, "0xaaa"), sample(200, 0, "0xbbb"), sample(300, 0, "0xccc")])
            .await
            .unwrap();

        let results = store
            .query(QueryFilter::new().block_range(150, 250))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].transaction_hash, "0xbbb");
    }

    #[tokio::test]
    async fn offset_without_limit_still_applies() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .insert_batch(&[sample(100, 0, "0xaaa"), sample(200, 0, "0xbbb"), sample(300, 0, "0xccc")])
            .await
            .unwrap();

        let results = store.query(QueryFilter::new().offset(1)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].transaction_hash, "0xbbb");
    }

    #[tokio::test]
    async fn sync_state_and_count_reflect_commit() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .commit("0xabcdef", 1, 150, &[sample(100, 0, "0xaaa"), sample(150, 0, "0xbbb")])
            .await
            .unwrap();

        let state = store.get_sync_state("0xabcdef").await.unwrap().unwrap();
        assert_eq!(state.last_block, 150);
        assert_eq!(state.status, "active");

        let count = store.count_events("0xabcdef").await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn closed_storage_rejects_operations() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.close().await.unwrap();
        let result = store.get_last_synced_block("0xabcdef").await;
        assert!(matches!(result, Err(StorageError::Closed)));
    }
}
