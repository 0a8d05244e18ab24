use std::sync::Arc;

use cache::SessionStore;
use config::Config;
use models::user::UserStore;
use openid::Consumer;

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod openid;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub consumer: Arc<dyn Consumer>,
}
