use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::cache::Session;

/// 本地已知的 OpenID 身份，以声明标识为主键
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct UserRecord {
    pub claimed_id: String,
    pub server_url: String,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// 登录完成时 upsert 用的数据
#[derive(Debug, Clone)]
pub struct NewUser {
    pub claimed_id: String,
    pub server_url: String,
    pub nickname: Option<String>,
    pub email: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum UserStoreError {
    #[error("数据库操作失败: {0}")]
    Database(#[from] sqlx::Error),
}

/// 用户持久化后端
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert(&self, user: NewUser) -> Result<UserRecord, UserStoreError>;
    async fn find(&self, claimed_id: &str) -> Result<Option<UserRecord>, UserStoreError>;
}

impl UserRecord {
    /// 按会话里的引用读出用户；引用缺失、损坏或指向不存在的记录都按匿名处理
    pub async fn from_session(
        store: &dyn UserStore,
        session: &Session,
    ) -> Result<Option<UserRecord>, UserStoreError> {
        match session.user() {
            Some(claimed_id) => store.find(&claimed_id).await,
            None => Ok(None),
        }
    }
}

/// Postgres 用户存储
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn upsert(&self, user: NewUser) -> Result<UserRecord, UserStoreError> {
        // 提供方没发的属性不覆盖已有值
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO openid_users (claimed_id, server_url, nickname, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (claimed_id)
            DO UPDATE SET
                server_url = EXCLUDED.server_url,
                nickname = COALESCE(EXCLUDED.nickname, openid_users.nickname),
                email = COALESCE(EXCLUDED.email, openid_users.email),
                last_login = NOW()
            RETURNING claimed_id, server_url, nickname, email, created_at, last_login
            "#,
        )
        .bind(&user.claimed_id)
        .bind(&user.server_url)
        .bind(&user.nickname)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find(&self, claimed_id: &str) -> Result<Option<UserRecord>, UserStoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT claimed_id, server_url, nickname, email, created_at, last_login
            FROM openid_users
            WHERE claimed_id = $1
            "#,
        )
        .bind(claimed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

/// 内存用户存储，供嵌入方和测试使用
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, UserRecord>> {
        self.users.lock().expect("user map poisoned")
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert(&self, user: NewUser) -> Result<UserRecord, UserStoreError> {
        let now = Utc::now();
        let mut users = self.lock();
        let record = match users.get(&user.claimed_id) {
            Some(existing) => UserRecord {
                claimed_id: user.claimed_id.clone(),
                server_url: user.server_url,
                nickname: user.nickname.or_else(|| existing.nickname.clone()),
                email: user.email.or_else(|| existing.email.clone()),
                created_at: existing.created_at,
                last_login: now,
            },
            None => UserRecord {
                claimed_id: user.claimed_id.clone(),
                server_url: user.server_url,
                nickname: user.nickname,
                email: user.email,
                created_at: now,
                last_login: now,
            },
        };
        users.insert(user.claimed_id, record.clone());
        Ok(record)
    }

    async fn find(&self, claimed_id: &str) -> Result<Option<UserRecord>, UserStoreError> {
        Ok(self.lock().get(claimed_id).cloned())
    }
}
