use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{AppState, cache::Session, error::AppError};

/// 会话中间件
///
/// 按 Cookie 取回（或新建）会话挂到请求扩展上；处理器返回后统一提交
/// 脏会话，没被写过的会话不落盘也不下发 Cookie。
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let session = match jar.get(&state.config.session_cookie) {
        Some(cookie) => match state.sessions.load(cookie.value()).await? {
            Some(record) if record.expires_at > chrono::Utc::now().timestamp() => {
                Session::from_record(record)
            }
            _ => Session::new(),
        },
        None => Session::new(),
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if session.is_dirty() {
        state
            .sessions
            .save(&session.to_record(state.config.session_ttl()))
            .await?;

        if session.is_fresh() {
            let cookie = Cookie::build((state.config.session_cookie.clone(), session.id()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            if let Ok(value) = cookie.to_string().parse() {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
    }

    Ok(response)
}
