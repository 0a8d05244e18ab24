use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 会话里保存已登录用户引用的键
pub const USER_KEY: &str = "openid.user";

/// 持久化的会话记录
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionRecord {
    pub session_id: String,
    pub data: HashMap<String, Value>,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug)]
struct SessionInner {
    session_id: String,
    data: HashMap<String, Value>,
    created_at: i64,
    fresh: bool,
    dirty: bool,
}

/// 请求作用域的会话上下文
///
/// 处理器通过类型化访问器读写，写入会打上脏标记；
/// 中间件在响应前统一提交脏会话，未被写过的会话不会落盘。
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                session_id: Uuid::new_v4().to_string(),
                data: HashMap::new(),
                created_at: chrono::Utc::now().timestamp(),
                fresh: true,
                dirty: false,
            })),
        }
    }

    pub fn from_record(record: SessionRecord) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                session_id: record.session_id,
                data: record.data,
                created_at: record.created_at,
                fresh: false,
                dirty: false,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("session mutex poisoned")
    }

    pub fn id(&self) -> String {
        self.lock().session_id.clone()
    }

    /// 本次请求新建的会话（Cookie 尚未下发）
    pub fn is_fresh(&self) -> bool {
        self.lock().fresh
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().data.get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        let mut inner = self.lock();
        inner.data.insert(key.to_string(), value);
        inner.dirty = true;
    }

    /// 删除一个键，只有键确实存在时才算一次修改
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let existed = inner.data.remove(key).is_some();
        inner.dirty |= existed;
        existed
    }

    /// 已登录用户的声明标识；存的不是字符串时视为未登录
    pub fn user(&self) -> Option<String> {
        match self.get(USER_KEY) {
            Some(Value::String(claimed_id)) => Some(claimed_id),
            _ => None,
        }
    }

    pub fn set_user(&self, claimed_id: &str) {
        self.insert(USER_KEY, Value::String(claimed_id.to_string()));
    }

    pub fn clear_user(&self) -> bool {
        self.remove(USER_KEY)
    }

    pub fn to_record(&self, ttl: Duration) -> SessionRecord {
        let inner = self.lock();
        SessionRecord {
            session_id: inner.session_id.clone(),
            data: inner.data.clone(),
            created_at: inner.created_at,
            expires_at: chrono::Utc::now().timestamp() + ttl.as_secs() as i64,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
