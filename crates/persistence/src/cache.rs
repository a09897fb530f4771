//! Technician location caches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use domain::models::TechnicianLocation;
use domain::services::{LocationCache, StoreResult};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{from_json, from_redis};

/// Process-local cache with lazy expiry plus an explicit sweep.
#[derive(Clone, Default)]
pub struct InMemoryLocationCache {
    entries: Arc<RwLock<HashMap<Uuid, (TechnicianLocation, Instant)>>>,
}

impl InMemoryLocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait::async_trait]
impl LocationCache for InMemoryLocationCache {
    async fn put(&self, location: &TechnicianLocation, ttl: Duration) -> StoreResult<()> {
        self.entries.write().await.insert(
            location.technician_id,
            (location.clone(), Instant::now() + ttl),
        );
        Ok(())
    }

    async fn get(&self, technician_id: Uuid) -> StoreResult<Option<TechnicianLocation>> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(&technician_id)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(location, _)| location.clone()))
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(before - entries.len())
    }
}

/// Redis-backed cache; expiry is delegated to `SET ... EX`.
#[derive(Clone)]
pub struct RedisLocationCache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisLocationCache {
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            key_prefix: key_prefix.into(),
        })
    }

    fn key(&self, technician_id: Uuid) -> String {
        format!("{}:tech_location:{}", self.key_prefix, technician_id)
    }
}

#[async_trait::async_trait]
impl LocationCache for RedisLocationCache {
    async fn put(&self, location: &TechnicianLocation, ttl: Duration) -> StoreResult<()> {
        let payload = serde_json::to_string(location).map_err(from_json)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(location.technician_id), payload, ttl.as_secs().max(1))
            .await
            .map_err(from_redis)?;
        Ok(())
    }

    async fn get(&self, technician_id: Uuid) -> StoreResult<Option<TechnicianLocation>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(self.key(technician_id))
            .await
            .map_err(from_redis)?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(from_json))
            .transpose()
    }
}
