use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use crate::cache::models::session::SessionRecord;
use crate::cache::{SessionError, SessionStore};

/// Redis 会话存储
pub struct RedisSessionStore {
    redis: Arc<RedisClient>,
}

impl RedisSessionStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    fn key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let result: Option<String> = conn.get(Self::key(session_id)).await?;
        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let json = serde_json::to_string(record)?;
        let ttl = (record.expires_at - chrono::Utc::now().timestamp()).max(1) as u64;
        let _: () = conn.set_ex(Self::key(&record.session_id), json, ttl).await?;

        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let _: () = conn.del(Self::key(session_id)).await?;

        Ok(())
    }
}

/// 内存会话存储，供嵌入方和测试使用
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.records.lock().expect("session map poisoned")
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.lock().get(session_id).cloned())
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        self.lock()
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        self.lock().remove(session_id);
        Ok(())
    }
}
