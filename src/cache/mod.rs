// 会话缓存模块
// 会话按 Cookie 中的标识寻址，记录本身存放在后端存储里

pub mod models;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
pub use models::session::{Session, SessionRecord, USER_KEY};
pub use operations::session::{MemorySessionStore, RedisSessionStore};

use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("redis 操作失败: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("会话编码失败: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 会话存储后端
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError>;
    async fn save(&self, record: &SessionRecord) -> Result<(), SessionError>;
    async fn remove(&self, session_id: &str) -> Result<(), SessionError>;
}
