//! Pool-backed entry point.

use crate::config::DbConfig;
use crate::decode;
use crate::error::OrmResult;
use crate::pool::create_pool_from_config;
use crate::record::Record;
use crate::report::{self, ExecReport};
use crate::upsert;
use deadpool_postgres::Pool;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_postgres::types::ToSql;

/// A connection pool with the decode, upsert and report operations attached.
///
/// Each call checks one client out of the pool for its duration.
///
/// # Example
///
/// ```ignore
/// let db = pgmap::Database::connect_env()?;
///
/// let mut user = User { id: 0, name: Some("Ana".into()), ..Default::default() };
/// db.upsert("users", &mut user, None).await?;
///
/// let mut users: Vec<User> = Vec::new();
/// db.decode_many("SELECT * FROM users", &mut users, &[]).await?;
/// ```
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    /// Wrap an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build from `DB_*` environment variables (see [`DbConfig::from_env`]).
    pub fn connect_env() -> OrmResult<Self> {
        Self::from_config(&DbConfig::from_env()?)
    }

    pub fn from_config(config: &DbConfig) -> OrmResult<Self> {
        let pool = create_pool_from_config(config)?;
        tracing::info!(
            target: "pgmap.sql",
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            "connection pool ready"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// See [`decode::decode_one`].
    pub async fn decode_one<T>(
        &self,
        sql: &str,
        target: &mut T,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<()>
    where
        T: Record + Serialize + DeserializeOwned,
    {
        let client = self.pool.get().await?;
        decode::decode_one(&client, sql, target, params).await
    }

    /// See [`decode::decode_many`].
    pub async fn decode_many<T>(
        &self,
        sql: &str,
        target: &mut Vec<T>,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<()>
    where
        T: Record + Serialize + DeserializeOwned + Default,
    {
        let client = self.pool.get().await?;
        decode::decode_many(&client, sql, target, params).await
    }

    /// See [`upsert::upsert`].
    pub async fn upsert<R: Record>(
        &self,
        table: &str,
        record: &mut R,
        previous: Option<&R>,
    ) -> OrmResult<i64> {
        let client = self.pool.get().await?;
        upsert::upsert(&client, table, record, previous).await
    }

    /// See [`report::exec_report`]. Pool failures are reported like statement failures.
    pub async fn exec_report(
        &self,
        sql: &str,
        name: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> ExecReport {
        match self.pool.get().await {
            Ok(client) => report::exec_report(&client, sql, name, params).await,
            Err(e) => {
                tracing::warn!(target: "pgmap.sql", name, error = %e, "no connection available");
                ExecReport::failed(name)
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("status", &self.pool.status())
            .finish()
    }
}
