use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{http::header, response::Response};

use crate::{
    AppState,
    cache::{MemorySessionStore, Session, SessionStore},
    models::user::{MemoryUserStore, UserStore},
    openid::{
        AuthRequest, CompletionResponse, Consumer, ConsumerError, Endpoint, consumer::PENDING_KEY,
    },
};

pub(crate) const OP_ENDPOINT: &str = "https://op.example/endpoint";

/// 脚本化的消费方替身：begin 固定发现 OP_ENDPOINT，complete 返回预置结果
pub(crate) struct MockConsumer {
    response: Mutex<Option<CompletionResponse>>,
    begin_fails: bool,
}

impl MockConsumer {
    pub(crate) fn new() -> Self {
        Self {
            response: Mutex::new(None),
            begin_fails: false,
        }
    }

    pub(crate) fn completing(response: CompletionResponse) -> Self {
        Self {
            response: Mutex::new(Some(response)),
            begin_fails: false,
        }
    }

    /// begin 一律按发现失败处理
    pub(crate) fn failing_discovery() -> Self {
        Self {
            response: Mutex::new(None),
            begin_fails: true,
        }
    }
}

#[async_trait]
impl Consumer for MockConsumer {
    async fn begin(
        &self,
        session: &Session,
        claimed_id: &str,
    ) -> Result<AuthRequest, ConsumerError> {
        if self.begin_fails {
            return Err(ConsumerError::Discovery(format!(
                "页面未声明 OpenID 提供方: {claimed_id}"
            )));
        }
        let endpoint = Endpoint {
            claimed_id: claimed_id.to_string(),
            local_id: None,
            server_url: OP_ENDPOINT.to_string(),
        };
        let value =
            serde_json::to_value(&endpoint).map_err(|e| ConsumerError::Protocol(e.to_string()))?;
        session.insert(PENDING_KEY, value);
        Ok(AuthRequest::new(endpoint))
    }

    async fn complete(
        &self,
        _session: &Session,
        _params: &HashMap<String, String>,
        _current_url: &str,
    ) -> CompletionResponse {
        self.response
            .lock()
            .expect("mock consumer poisoned")
            .clone()
            .unwrap_or_else(|| CompletionResponse::failure("mock 没有预置结果"))
    }
}

pub(crate) fn test_state(
    consumer: Arc<dyn Consumer>,
) -> (AppState, Arc<MemorySessionStore>, Arc<MemoryUserStore>) {
    let sessions = Arc::new(MemorySessionStore::new());
    let users = Arc::new(MemoryUserStore::new());
    let state = AppState {
        config: crate::config::tests::test_config(),
        sessions: sessions.clone() as Arc<dyn SessionStore>,
        users: users.clone() as Arc<dyn UserStore>,
        consumer,
    };
    (state, sessions, users)
}

/// 从 Set-Cookie 头里取出会话标识
pub(crate) fn session_id_from(response: &Response) -> Option<String> {
    let cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = cookie.split(';').next()?;
    let (_, value) = pair.split_once('=')?;
    Some(value.to_string())
}
