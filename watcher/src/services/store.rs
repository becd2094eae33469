//! Persistent bookkeeping for watch subscriptions: which provider resource
//! id maps to which document, which folder path a document lives under, and
//! the TTL lease that keeps multiple processes from registering duplicate
//! webhooks.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("item not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Key/value contract the watcher needs from its backing store.
///
/// `try_set_webhook_flag` is the only cross-process mutual exclusion in the
/// system and must be a single atomic set-if-absent-with-expiry at the
/// storage layer.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Resolve a provider-assigned resource id to the document it tracks.
    async fn get_resource_document(&self, resource_id: &str) -> Result<String, StoreError>;

    async fn set_resource_document(
        &self,
        resource_id: &str,
        document_id: &str,
    ) -> Result<(), StoreError>;

    /// Cached folder path for a document, written during folder syncs.
    async fn get_document_folder(&self, document_id: &str) -> Result<String, StoreError>;

    async fn set_document_folder(&self, document_id: &str, path: &str) -> Result<(), StoreError>;

    /// Take the renewal lease for a document. Returns true only when this
    /// call performed the set; the flag expires on its own after `ttl`.
    async fn try_set_webhook_flag(
        &self,
        document_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}

fn resource_key(resource_id: &str) -> String {
    format!("resource:{}", resource_id)
}

fn webhook_key(document_id: &str) -> String {
    format!("webhook-active:{}", document_id)
}

fn folder_key(document_id: &str) -> String {
    format!("folder:{}", document_id)
}

/// Redis-backed store, the normal deployment.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        value.ok_or(StoreError::NotFound)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for RedisStore {
    async fn get_resource_document(&self, resource_id: &str) -> Result<String, StoreError> {
        self.get(&resource_key(resource_id)).await
    }

    async fn set_resource_document(
        &self,
        resource_id: &str,
        document_id: &str,
    ) -> Result<(), StoreError> {
        self.set(&resource_key(resource_id), document_id).await
    }

    async fn get_document_folder(&self, document_id: &str) -> Result<String, StoreError> {
        self.get(&folder_key(document_id)).await
    }

    async fn set_document_folder(&self, document_id: &str, path: &str) -> Result<(), StoreError> {
        self.set(&folder_key(document_id), path).await
    }

    async fn try_set_webhook_flag(
        &self,
        document_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();

        // SET NX EX is atomic server-side; the reply is OK when the key was
        // set and nil when it already existed. Redis rejects EX 0.
        let reply: Option<String> = redis::cmd("SET")
            .arg(webhook_key(document_id))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }
}

#[derive(Default)]
struct MemoryInner {
    resources: HashMap<String, String>,
    folders: HashMap<String, String>,
    flags: HashMap<String, Instant>,
}

/// In-process store with the same contract, used in tests and as the
/// fallback when Redis is unreachable. The lease only excludes tasks inside
/// this process.
#[derive(Default)]
pub struct MemoryStore {
    inner: parking_lot::Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get_resource_document(&self, resource_id: &str) -> Result<String, StoreError> {
        self.inner
            .lock()
            .resources
            .get(resource_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn set_resource_document(
        &self,
        resource_id: &str,
        document_id: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .resources
            .insert(resource_id.to_string(), document_id.to_string());
        Ok(())
    }

    async fn get_document_folder(&self, document_id: &str) -> Result<String, StoreError> {
        self.inner
            .lock()
            .folders
            .get(document_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn set_document_folder(&self, document_id: &str, path: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .folders
            .insert(document_id.to_string(), path.to_string());
        Ok(())
    }

    async fn try_set_webhook_flag(
        &self,
        document_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match inner.flags.get(document_id) {
            Some(expires_at) if *expires_at > now => Ok(false),
            _ => {
                inner.flags.insert(document_id.to_string(), now + ttl);
                Ok(true)
            }
        }
    }
}
