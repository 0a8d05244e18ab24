// OpenID 2.0 消费方接口
// 处理器只依赖这里的 trait 和数据类型，协议实现可以整体替换

pub mod consumer;
pub mod sreg;

pub use consumer::DirectConsumer;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::Session;
use sreg::SregRequest;

pub const OPENID2_NS: &str = "http://specs.openid.net/auth/2.0";

/// 发现得到的提供方端点
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Endpoint {
    pub claimed_id: String,
    pub local_id: Option<String>,
    pub server_url: String,
}

/// 待发往提供方的认证请求
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub endpoint: Endpoint,
    sreg: Option<SregRequest>,
}

impl AuthRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            sreg: None,
        }
    }

    pub fn add_sreg(&mut self, request: SregRequest) {
        self.sreg = Some(request);
    }

    /// 构造发往提供方的 checkid_setup 跳转地址
    pub fn redirect_url(&self, realm: &str, return_to: &str) -> Result<String, ConsumerError> {
        let mut url = Url::parse(&self.endpoint.server_url)
            .map_err(|e| ConsumerError::Protocol(format!("提供方端点不是合法 URL: {e}")))?;

        let identity = self
            .endpoint
            .local_id
            .as_deref()
            .unwrap_or(&self.endpoint.claimed_id);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("openid.ns", OPENID2_NS);
            query.append_pair("openid.mode", "checkid_setup");
            query.append_pair("openid.claimed_id", &self.endpoint.claimed_id);
            query.append_pair("openid.identity", identity);
            query.append_pair("openid.return_to", return_to);
            query.append_pair("openid.realm", realm);
            if let Some(sreg) = &self.sreg {
                for (key, value) in sreg.params() {
                    query.append_pair(&key, &value);
                }
            }
        }

        Ok(url.into())
    }
}

/// 回调校验的结果状态
///
/// Success/Failure/Cancel 是协议内定义的结果；SetupNeeded 在本服务的
/// 登录流程里不该出现，按异常状态处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Success,
    Failure,
    Cancel,
    SetupNeeded,
}

/// 回调校验的完整结果
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub status: CompletionStatus,
    pub endpoint: Option<Endpoint>,
    pub sreg: HashMap<String, String>,
    pub message: Option<String>,
}

impl CompletionResponse {
    pub fn success(endpoint: Endpoint, sreg: HashMap<String, String>) -> Self {
        Self {
            status: CompletionStatus::Success,
            endpoint: Some(endpoint),
            sreg,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: CompletionStatus::Failure,
            endpoint: None,
            sreg: HashMap::new(),
            message: Some(message.into()),
        }
    }

    pub fn cancel() -> Self {
        Self {
            status: CompletionStatus::Cancel,
            endpoint: None,
            sreg: HashMap::new(),
            message: None,
        }
    }

    pub fn setup_needed() -> Self {
        Self {
            status: CompletionStatus::SetupNeeded,
            endpoint: None,
            sreg: HashMap::new(),
            message: None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConsumerError {
    #[error("发现失败: {0}")]
    Discovery(String),
    #[error("请求提供方失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("协议错误: {0}")]
    Protocol(String),
}

/// OpenID 消费方
#[async_trait]
pub trait Consumer: Send + Sync {
    /// 对声明标识发起认证；发现/关联失败走错误通道
    async fn begin(
        &self,
        session: &Session,
        claimed_id: &str,
    ) -> Result<AuthRequest, ConsumerError>;

    /// 校验提供方回调；协议内定义的负面结果编码在返回值里
    async fn complete(
        &self,
        session: &Session,
        params: &HashMap<String, String>,
        current_url: &str,
    ) -> CompletionResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            claimed_id: "https://alice.example/".into(),
            local_id: None,
            server_url: "https://op.example/endpoint".into(),
        }
    }

    #[test]
    fn redirect_url_carries_core_fields() {
        let mut request = AuthRequest::new(endpoint());
        request.add_sreg(SregRequest::required(&["nickname", "email"]));

        let url = request
            .redirect_url(
                "http://rp.example",
                "http://rp.example/_openid/finish?continue=%2Fnext",
            )
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert!(url.starts_with("https://op.example/endpoint?"));
        assert_eq!(pairs["openid.ns"], OPENID2_NS);
        assert_eq!(pairs["openid.mode"], "checkid_setup");
        assert_eq!(pairs["openid.claimed_id"], "https://alice.example/");
        assert_eq!(pairs["openid.identity"], "https://alice.example/");
        assert_eq!(
            pairs["openid.return_to"],
            "http://rp.example/_openid/finish?continue=%2Fnext"
        );
        assert_eq!(pairs["openid.realm"], "http://rp.example");
        assert_eq!(pairs["openid.ns.sreg"], sreg::SREG_NS);
        assert_eq!(pairs["openid.sreg.required"], "nickname,email");
    }

    #[test]
    fn redirect_url_prefers_local_id() {
        let request = AuthRequest::new(Endpoint {
            local_id: Some("https://op.example/user/alice".into()),
            ..endpoint()
        });

        let url = request
            .redirect_url("http://rp.example", "http://rp.example/_openid/finish")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert_eq!(pairs["openid.identity"], "https://op.example/user/alice");
        assert_eq!(pairs["openid.claimed_id"], "https://alice.example/");
    }

    #[test]
    fn redirect_url_rejects_bad_endpoint() {
        let request = AuthRequest::new(Endpoint {
            server_url: "not a url".into(),
            ..endpoint()
        });
        assert!(request.redirect_url("http://rp.example", "http://rp.example/f").is_err());
    }
}
