use std::collections::HashMap;

use axum::{
    Extension,
    extract::{Query, State},
    http::{HeaderMap, Uri, header},
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::{
    AppState,
    cache::Session,
    error::AppError,
    models::user::NewUser,
    openid::{CompletionStatus, ConsumerError, sreg::SregRequest},
    utils::{found, host_url, safe_continue},
};

use super::model::{self, LoginQuery, LogoutQuery};

/// 登录入口：没带标识就渲染表单，否则把用户转去提供方认证
#[axum::debug_handler]
pub async fn begin_login(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AppError> {
    let continue_url = safe_continue(query.continue_url.as_deref());

    let openid_url = match query.openid_url.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => {
            return Ok(
                Html(model::login_page(&state.config.login_path, &continue_url)).into_response(),
            );
        }
    };

    // 发现失败直接冒泡成 500
    let mut request = state.consumer.begin(&session, openid_url).await?;
    request.add_sreg(SregRequest::required(&["nickname", "email"]));

    let base = host_url(&state.config, &headers);
    let mut return_to = url::Url::parse(&format!("{}{}", base, state.config.finish_path))
        .map_err(|e| ConsumerError::Protocol(format!("回调地址无效: {e}")))?;
    return_to
        .query_pairs_mut()
        .append_pair("continue", &continue_url);

    let redirect = request.redirect_url(&base, return_to.as_str())?;
    Ok(found(&redirect))
}

/// 提供方回调：校验断言，成功则落库、写会话、跳回原页面
#[axum::debug_handler]
pub async fn finish_login(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let current_url = format!("{}{}", host_url(&state.config, &headers), uri);
    let response = state.consumer.complete(&session, &params, &current_url).await;
    let continue_url = safe_continue(params.get("continue").map(String::as_str));

    match response.status {
        CompletionStatus::Success => {
            let endpoint = response
                .endpoint
                .clone()
                .ok_or_else(|| ConsumerError::Protocol("成功结果缺少端点信息".to_string()))?;
            let user = state
                .users
                .upsert(NewUser {
                    claimed_id: endpoint.claimed_id,
                    server_url: endpoint.server_url,
                    nickname: response.sreg.get("nickname").cloned(),
                    email: response.sreg.get("email").cloned(),
                })
                .await?;
            session.set_user(&user.claimed_id);
            Ok(found(&continue_url))
        }
        CompletionStatus::Failure | CompletionStatus::Cancel => Ok(Html(model::failure_page(
            &response,
            &state.config.login_path,
            &continue_url,
        ))
        .into_response()),
        CompletionStatus::SetupNeeded => {
            error!("Unexpected OpenID completion: {:?}", response);
            Ok(Html(model::error_page("认证流程进入了意外状态")).into_response())
        }
    }
}

/// 退出登录：Referer 同源才直接退出，否则出确认页
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    Query(query): Query<LogoutQuery>,
) -> Response {
    let continue_url = safe_continue(query.continue_url.as_deref());

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    let referer = headers
        .get(header::REFERER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    // Referer 缺失或不同源都按不可信处理
    let same_origin = !host.is_empty()
        && (referer.starts_with(&format!("http://{host}"))
            || referer.starts_with(&format!("https://{host}")));

    if same_origin {
        session.clear_user();
        found(&continue_url)
    } else {
        // 确认链接回到本端点，点击后 Referer 即为同源
        let confirm_url = format!(
            "?continue={}",
            url::form_urlencoded::byte_serialize(continue_url.as_bytes()).collect::<String>()
        );
        Html(model::logout_page(&confirm_url, &continue_url)).into_response()
    }
}
