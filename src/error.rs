use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::cache::SessionError;
use crate::models::user::UserStoreError;
use crate::openid::ConsumerError;
use crate::routes::auth::model;

#[derive(Debug)]
pub enum AppError {
    OpenId(ConsumerError),
    Session(SessionError),
    Users(UserStoreError),
}

impl From<ConsumerError> for AppError {
    fn from(err: ConsumerError) -> Self {
        AppError::OpenId(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<UserStoreError> for AppError {
    fn from(err: UserStoreError) -> Self {
        AppError::Users(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = match &self {
            AppError::OpenId(e) => {
                tracing::error!("OpenID flow failed: {}", e);
                "身份认证流程出错"
            }
            AppError::Session(e) => {
                tracing::error!("Session store failed: {}", e);
                "会话服务不可用"
            }
            AppError::Users(e) => {
                tracing::error!("User store failed: {}", e);
                "用户服务不可用"
            }
        };

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(model::error_page(detail)),
        )
            .into_response()
    }
}
