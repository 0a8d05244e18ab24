use serde::Deserialize;

use crate::openid::CompletionResponse;
use crate::utils::render;

/// 登录入口的查询参数
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub openid_url: Option<String>,
    #[serde(rename = "continue")]
    pub continue_url: Option<String>,
}

/// 退出登录的查询参数
#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    #[serde(rename = "continue")]
    pub continue_url: Option<String>,
}

const LOGIN_TEMPLATE: &str = include_str!("../../../templates/login.html");
const FAILURE_TEMPLATE: &str = include_str!("../../../templates/failure.html");
const ERROR_TEMPLATE: &str = include_str!("../../../templates/error.html");
const LOGOUT_TEMPLATE: &str = include_str!("../../../templates/logout.html");

/// 登录表单
pub fn login_page(login_url: &str, continue_url: &str) -> String {
    render(
        LOGIN_TEMPLATE,
        &[("login_url", login_url), ("continue", continue_url)],
    )
}

/// 认证失败或被取消的页面
pub fn failure_page(
    response: &CompletionResponse,
    login_url: &str,
    continue_url: &str,
) -> String {
    let message = response.message.as_deref().unwrap_or("认证未完成");
    render(
        FAILURE_TEMPLATE,
        &[
            ("message", message),
            ("login_url", login_url),
            ("continue", continue_url),
        ],
    )
}

/// 通用错误页
pub fn error_page(detail: &str) -> String {
    render(ERROR_TEMPLATE, &[("detail", detail)])
}

/// 跨站退出时的确认页
pub fn logout_page(confirm_url: &str, cancel_url: &str) -> String {
    render(
        LOGOUT_TEMPLATE,
        &[("confirm_url", confirm_url), ("cancel_url", cancel_url)],
    )
}
