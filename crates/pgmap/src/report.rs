//! Run a statement and summarize the outcome instead of failing.

use crate::client::GenericClient;
use serde::Serialize;
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};

/// Outcome of [`exec_report`], suitable for returning straight to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecReport {
    pub id: i64,
    pub message: String,
}

impl ExecReport {
    pub fn success(name: &str, id: i64) -> Self {
        Self {
            id,
            message: format!("{name} success"),
        }
    }

    pub fn failed(name: &str) -> Self {
        Self {
            id: 0,
            message: format!("{name} failed"),
        }
    }

    pub fn is_success(&self) -> bool {
        self.message.ends_with(" success")
    }
}

/// Execute `sql` and report `"<name> success"` or `"<name> failed"`.
///
/// When the statement returns rows (e.g. `... RETURNING id`), `id` is the
/// first column of the first row if it is an integer, else zero. Failures are
/// logged and never returned.
pub async fn exec_report(
    conn: &impl GenericClient,
    sql: &str,
    name: &str,
    params: &[&(dyn ToSql + Sync)],
) -> ExecReport {
    tracing::debug!(target: "pgmap.sql", name, param_count = params.len(), sql = %sql, "exec");
    match conn.query(sql, params).await {
        Ok(rows) => {
            tracing::trace!(target: "pgmap.sql", name, rows = rows.len(), "exec ok");
            ExecReport::success(name, rows.first().map_or(0, leading_id))
        }
        Err(e) => {
            tracing::warn!(target: "pgmap.sql", name, error = %e, sql = %sql, "exec failed");
            ExecReport::failed(name)
        }
    }
}

fn leading_id(row: &Row) -> i64 {
    let Some(column) = row.columns().first() else {
        return 0;
    };
    let id = match *column.type_() {
        Type::INT2 => row.try_get::<_, Option<i16>>(0).map(|v| v.map(i64::from)),
        Type::INT4 => row.try_get::<_, Option<i32>>(0).map(|v| v.map(i64::from)),
        Type::INT8 => row.try_get::<_, Option<i64>>(0),
        _ => return 0,
    };
    id.ok().flatten().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_follow_name() {
        let ok = ExecReport::success("create user", 5);
        assert_eq!(ok.message, "create user success");
        assert_eq!(ok.id, 5);
        assert!(ok.is_success());

        let failed = ExecReport::failed("create user");
        assert_eq!(failed.message, "create user failed");
        assert_eq!(failed.id, 0);
        assert!(!failed.is_success());
    }

    #[test]
    fn serializes_as_plain_object() {
        let json = serde_json::to_value(ExecReport::success("delete", 0)).unwrap();
        assert_eq!(json, serde_json::json!({"id": 0, "message": "delete success"}));
    }
}
