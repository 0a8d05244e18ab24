use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use tracing::error;
use url::Url;

use super::{
    CompletionResponse, Consumer, ConsumerError, Endpoint, sreg, AuthRequest,
};
use crate::cache::Session;

/// 消费方在会话里暂存待校验端点的键
pub const PENDING_KEY: &str = "openid.consumer.endpoint";

/// 无关联模式的 OpenID 2.0 消费方
///
/// 发现只支持 HTML link 方式，断言校验走 check_authentication 直连验证，
/// 自身不保存任何关联状态。
pub struct DirectConsumer {
    http: reqwest::Client,
}

impl DirectConsumer {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// 规整用户输入的标识：补 scheme、去 fragment
    fn normalize_identifier(raw: &str) -> String {
        let mut id = raw.trim().to_string();
        if !id.contains("://") {
            id = format!("http://{id}");
        }
        if let Some(pos) = id.find('#') {
            id.truncate(pos);
        }
        id
    }

    /// HTML link 发现，兼容 1.1 的旧 rel 名称
    async fn discover(&self, claimed_id: &str) -> Result<Endpoint, ConsumerError> {
        let body = self.http.get(claimed_id).send().await?.text().await?;

        let server_url = find_link_href(&body, "openid2.provider")
            .or_else(|| find_link_href(&body, "openid.server"))
            .ok_or_else(|| {
                ConsumerError::Discovery(format!("页面未声明 OpenID 提供方: {claimed_id}"))
            })?;
        let local_id =
            find_link_href(&body, "openid2.local_id").or_else(|| find_link_href(&body, "openid.delegate"));

        Ok(Endpoint {
            claimed_id: claimed_id.to_string(),
            local_id,
            server_url,
        })
    }

    /// 直连验证：把断言参数原样发回提供方
    async fn check_authentication(
        &self,
        endpoint: &Endpoint,
        params: &HashMap<String, String>,
    ) -> Result<bool, ConsumerError> {
        let mut form: Vec<(String, String)> = params
            .iter()
            .filter(|(key, _)| key.starts_with("openid.") && key.as_str() != "openid.mode")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        form.push(("openid.mode".to_string(), "check_authentication".to_string()));

        let body = self
            .http
            .post(&endpoint.server_url)
            .form(&form)
            .send()
            .await?
            .text()
            .await?;

        Ok(parse_key_values(&body).get("is_valid").map(String::as_str) == Some("true"))
    }

    async fn verify_id_res(
        &self,
        session: &Session,
        params: &HashMap<String, String>,
        current_url: &str,
    ) -> CompletionResponse {
        // 1.x 的 immediate 模式用 user_setup_url 表示需要人工介入
        if params.contains_key("openid.user_setup_url") {
            return CompletionResponse::setup_needed();
        }

        let Some(pending) = session
            .get(PENDING_KEY)
            .and_then(|value| serde_json::from_value::<Endpoint>(value).ok())
        else {
            return CompletionResponse::failure("会话里没有待完成的认证请求");
        };

        let Some(return_to) = params.get("openid.return_to") else {
            return CompletionResponse::failure("回调缺少 openid.return_to");
        };
        if !return_to_matches(return_to, current_url) {
            return CompletionResponse::failure("openid.return_to 与回调地址不一致");
        }

        match params.get("openid.claimed_id") {
            Some(claimed) if strip_fragment(claimed) == strip_fragment(&pending.claimed_id) => {}
            _ => return CompletionResponse::failure("提供方断言的身份与发起时不一致"),
        }

        match self.check_authentication(&pending, params).await {
            Ok(true) => {
                session.remove(PENDING_KEY);
                CompletionResponse::success(pending, sreg::extract(params))
            }
            Ok(false) => CompletionResponse::failure("提供方拒绝了断言签名"),
            Err(e) => {
                error!("check_authentication request failed: {}", e);
                CompletionResponse::failure("无法连接提供方校验断言")
            }
        }
    }
}

impl Default for DirectConsumer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Consumer for DirectConsumer {
    async fn begin(
        &self,
        session: &Session,
        claimed_id: &str,
    ) -> Result<AuthRequest, ConsumerError> {
        let claimed_id = Self::normalize_identifier(claimed_id);
        let endpoint = self.discover(&claimed_id).await?;

        // 暂存端点，回调时校验提供方没有偷换身份
        let value = serde_json::to_value(&endpoint)
            .map_err(|e| ConsumerError::Protocol(e.to_string()))?;
        session.insert(PENDING_KEY, value);

        Ok(AuthRequest::new(endpoint))
    }

    async fn complete(
        &self,
        session: &Session,
        params: &HashMap<String, String>,
        current_url: &str,
    ) -> CompletionResponse {
        let mode = params.get("openid.mode").map(String::as_str).unwrap_or("");
        match mode {
            "id_res" => self.verify_id_res(session, params, current_url).await,
            "cancel" => CompletionResponse::cancel(),
            "setup_needed" => CompletionResponse::setup_needed(),
            "error" => CompletionResponse::failure(
                params
                    .get("openid.error")
                    .cloned()
                    .unwrap_or_else(|| "提供方返回错误".to_string()),
            ),
            other => CompletionResponse::failure(format!("无法处理的 openid.mode: {other:?}")),
        }
    }
}

/// 在 <link> 标签里按 rel 找 href，rel/href 顺序不定
fn find_link_href(html: &str, rel: &str) -> Option<String> {
    let link_re = Regex::new(r"(?is)<link\s[^>]*>").ok()?;
    let rel_re = Regex::new(&format!(
        r#"(?is)rel\s*=\s*["'][^"']*\b{}\b[^"']*["']"#,
        regex::escape(rel)
    ))
    .ok()?;
    let href_re = Regex::new(r#"(?is)href\s*=\s*["']([^"']+)["']"#).ok()?;

    for tag in link_re.find_iter(html) {
        let tag = tag.as_str();
        if rel_re.is_match(tag) {
            if let Some(caps) = href_re.captures(tag) {
                return Some(caps[1].to_string());
            }
        }
    }
    None
}

/// 解析提供方的 key:value 响应体
fn parse_key_values(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn strip_fragment(id: &str) -> &str {
    id.split('#').next().unwrap_or(id)
}

/// return_to 必须指向当前回调地址，且其查询参数原样出现在回调里
fn return_to_matches(return_to: &str, current_url: &str) -> bool {
    let (Ok(expected), Ok(actual)) = (Url::parse(return_to), Url::parse(current_url)) else {
        return false;
    };
    if expected.scheme() != actual.scheme()
        || expected.host_str() != actual.host_str()
        || expected.port_or_known_default() != actual.port_or_known_default()
        || expected.path() != actual.path()
    {
        return false;
    }

    let actual_pairs: Vec<(String, String)> = actual.query_pairs().into_owned().collect();
    expected
        .query_pairs()
        .into_owned()
        .all(|pair| actual_pairs.contains(&pair))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_discovery_ignores_attribute_order() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/style.css">
            <link href="https://op.example/endpoint" rel="openid2.provider">
            <link rel="openid2.local_id" href="https://op.example/user/alice">
        </head></html>"#;

        assert_eq!(
            find_link_href(html, "openid2.provider").as_deref(),
            Some("https://op.example/endpoint")
        );
        assert_eq!(
            find_link_href(html, "openid2.local_id").as_deref(),
            Some("https://op.example/user/alice")
        );
        assert_eq!(find_link_href(html, "openid.server"), None);
    }

    #[test]
    fn link_discovery_accepts_combined_rel() {
        let html =
            r#"<link rel="openid.server openid2.provider" href="https://op.example/endpoint">"#;
        assert_eq!(
            find_link_href(html, "openid2.provider").as_deref(),
            Some("https://op.example/endpoint")
        );
        assert_eq!(
            find_link_href(html, "openid.server").as_deref(),
            Some("https://op.example/endpoint")
        );
    }

    #[test]
    fn identifier_normalization() {
        assert_eq!(
            DirectConsumer::normalize_identifier(" alice.example "),
            "http://alice.example"
        );
        assert_eq!(
            DirectConsumer::normalize_identifier("https://alice.example/#me"),
            "https://alice.example/"
        );
    }

    #[test]
    fn key_value_body_parsing() {
        let body = "ns:http://specs.openid.net/auth/2.0\nis_valid:true\n";
        let parsed = parse_key_values(body);
        assert_eq!(parsed["is_valid"], "true");
        assert_eq!(parsed["ns"], "http://specs.openid.net/auth/2.0");
    }

    #[test]
    fn return_to_verification() {
        let return_to = "http://rp.example/_openid/finish?continue=%2Fnext";
        // 回调地址多出的 openid.* 参数不影响匹配
        assert!(return_to_matches(
            return_to,
            "http://rp.example/_openid/finish?continue=%2Fnext&openid.mode=id_res"
        ));
        assert!(!return_to_matches(
            return_to,
            "http://rp.example/other?continue=%2Fnext"
        ));
        assert!(!return_to_matches(
            return_to,
            "http://evil.example/_openid/finish?continue=%2Fnext"
        ));
        assert!(!return_to_matches(
            return_to,
            "http://rp.example/_openid/finish?continue=%2Felsewhere"
        ));
    }

    #[tokio::test]
    async fn complete_maps_provider_modes() {
        let consumer = DirectConsumer::new();
        let session = Session::new();

        let mut params = HashMap::new();
        params.insert("openid.mode".to_string(), "cancel".to_string());
        let response = consumer
            .complete(&session, &params, "http://rp.example/_openid/finish")
            .await;
        assert_eq!(response.status, super::super::CompletionStatus::Cancel);

        params.insert("openid.mode".to_string(), "error".to_string());
        params.insert("openid.error".to_string(), "internal".to_string());
        let response = consumer
            .complete(&session, &params, "http://rp.example/_openid/finish")
            .await;
        assert_eq!(response.status, super::super::CompletionStatus::Failure);
        assert_eq!(response.message.as_deref(), Some("internal"));

        // 会话里没有待校验端点时 id_res 直接判失败
        params.insert("openid.mode".to_string(), "id_res".to_string());
        let response = consumer
            .complete(&session, &params, "http://rp.example/_openid/finish")
            .await;
        assert_eq!(response.status, super::super::CompletionStatus::Failure);
        assert!(!session.is_dirty());
    }
}
