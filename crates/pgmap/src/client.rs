//! Store boundary: the query capability the mapper runs against.

use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A trait that unifies database clients and transactions.
///
/// Decoding and upserting accept anything implementing this trait, so calls
/// compose with a plain connection, a transaction, or a pooled client alike.
/// Driver errors are returned untouched; each caller classifies them
/// ([`OrmError::Query`](crate::OrmError::Query) on the read path,
/// [`OrmError::Execution`](crate::OrmError::Execution) on the write path).
pub trait GenericClient: Send + Sync {
    /// Execute a statement and return all rows.
    ///
    /// Writes go through here too, so `RETURNING` rows can be read back.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = Result<Vec<Row>, tokio_postgres::Error>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        tokio_postgres::Client::query(self, sql, params).await
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        tokio_postgres::Transaction::query(self, sql, params).await
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        GenericClient::query(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::ClientWrapper {
    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        GenericClient::query(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Transaction<'_> {
    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        GenericClient::query(&**self, sql, params).await
    }
}
