use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub session_cookie: String,
    pub session_ttl_secs: u64,
    pub login_path: String,
    pub finish_path: String,
    pub logout_path: String,
    pub static_path: String,
    pub static_dir: PathBuf,
    pub external_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let session_ttl = env::var("SESSION_TTL")
            .unwrap_or_default()
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(24);
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            session_cookie: env::var("SESSION_COOKIE").unwrap_or_else(|_| "openid_session".into()),
            session_ttl_secs: session_ttl * 3600,
            login_path: env::var("OPENID_LOGIN_PATH").unwrap_or_else(|_| "/_openid/login".into()),
            finish_path: env::var("OPENID_FINISH_PATH")
                .unwrap_or_else(|_| "/_openid/finish".into()),
            logout_path: env::var("OPENID_LOGOUT_PATH")
                .unwrap_or_else(|_| "/_openid/logout".into()),
            static_path: env::var("OPENID_STATIC_PATH")
                .unwrap_or_else(|_| "/_openid/static".into()),
            static_dir: env::var("OPENID_STATIC_DIR")
                .unwrap_or_else(|_| "resources".into())
                .into(),
            external_base_url: env::var("EXTERNAL_BASE_URL").ok(),
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
