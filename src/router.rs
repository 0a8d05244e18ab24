use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};

use crate::{
    AppState,
    middleware::{log_errors, session_middleware},
    routes,
};

/// 按配置的路径组装路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // 登录流程路由
        .route(
            &state.config.login_path,
            get(routes::auth::begin_login).post(routes::auth::begin_login),
        )
        .route(&state.config.finish_path, get(routes::auth::finish_login))
        .route(&state.config.logout_path, get(routes::auth::logout))
        // 静态资源路由
        .route(
            &format!("{}/{{*file}}", state.config.static_path),
            get(routes::assets::serve),
        )
        // 会话中间件和日志中间件
        .layer(from_fn_with_state(state.clone(), session_middleware))
        .layer(from_fn(log_errors))
        .with_state(state)
}
