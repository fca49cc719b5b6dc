//! Connection settings read from the environment.
//!
//! ```text
//! DB_HOST=localhost
//! DB_PORT=5432
//! DB_USER=app
//! DB_PASSWORD=secret
//! DB_NAME=app
//! DB_SSLMODE=disable   # optional
//! ```

use crate::error::{OrmError, OrmResult};
use url::Url;

const DEFAULT_SSLMODE: &str = "disable";

/// PostgreSQL connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .finish()
    }
}

impl DbConfig {
    /// Read settings from the process environment, loading `.env` first if present.
    ///
    /// All missing variables are reported together in one [`OrmError::Config`].
    pub fn from_env() -> OrmResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OrmResult<Self> {
        let mut missing = Vec::new();
        let mut require = |key: &'static str| match lookup(key) {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                missing.push(key);
                String::new()
            }
        };

        let host = require("DB_HOST");
        let port = require("DB_PORT");
        let user = require("DB_USER");
        let password = require("DB_PASSWORD");
        let dbname = require("DB_NAME");

        if !missing.is_empty() {
            return Err(OrmError::config(format!(
                "missing environment variables: {}",
                missing.join(", ")
            )));
        }

        let port = port.trim().parse::<u16>().map_err(|e| {
            OrmError::config(format!("DB_PORT must be a port number, got '{port}': {e}"))
        })?;
        let sslmode = lookup("DB_SSLMODE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SSLMODE.to_string());

        Ok(Self {
            host,
            port,
            user,
            password,
            dbname,
            sslmode,
        })
    }

    /// Render a `postgres://` connection URL.
    pub fn to_url(&self) -> OrmResult<String> {
        let mut url = Url::parse(&format!("postgres://{}:{}", self.host, self.port))
            .map_err(|e| OrmError::config(format!("invalid DB_HOST '{}': {e}", self.host)))?;
        url.set_username(&self.user)
            .map_err(|_| OrmError::config("DB_USER cannot be set on this URL"))?;
        url.set_password(Some(self.password.as_str()))
            .map_err(|_| OrmError::config("DB_PASSWORD cannot be set on this URL"))?;
        url.set_path(&format!("/{}", self.dbname));
        url.query_pairs_mut().append_pair("sslmode", &self.sslmode);
        Ok(url.into())
    }

    /// Build a driver configuration.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(&self.dbname);
        // Modes the driver does not model (verify-ca, verify-full) keep its default.
        if let Some(mode) = ssl_mode(&self.sslmode) {
            config.ssl_mode(mode);
        }
        config
    }
}

fn ssl_mode(value: &str) -> Option<tokio_postgres::config::SslMode> {
    use tokio_postgres::config::SslMode;
    match value {
        "disable" => Some(SslMode::Disable),
        "prefer" => Some(SslMode::Prefer),
        "require" => Some(SslMode::Require),
        _ => None,
    }
}
