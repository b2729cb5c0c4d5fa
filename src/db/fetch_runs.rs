use crate::errors::ServerError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pairs_total: Option<i64>,
    pub pairs_failed: Option<i64>,
    pub candidates_fetched: Option<i64>,
    pub new_rows: Option<i64>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Totals written when a cycle finishes.
#[derive(Debug, Clone, Default)]
pub struct RunTotals {
    pub pairs_total: usize,
    pub pairs_failed: usize,
    pub candidates_fetched: usize,
    pub new_rows: usize,
}

pub fn start_fetch_run(conn: &Connection, now: DateTime<Utc>) -> Result<i64, ServerError> {
    conn.execute(
        "INSERT INTO fetch_runs (started_at, success) VALUES (?, 0)",
        params![now],
    )
    .map_err(|e| ServerError::DbError(e.to_string()))?;
    Ok(conn.last_insert_rowid())
}

pub fn end_fetch_run(
    conn: &Connection,
    run_id: i64,
    now: DateTime<Utc>,
    totals: &RunTotals,
    error: Option<String>,
) -> Result<(), ServerError> {
    conn.execute(
        "UPDATE fetch_runs SET finished_at = ?, pairs_total = ?, pairs_failed = ?, candidates_fetched = ?, new_rows = ?, success = ?, error_message = ? WHERE id = ?",
        params![
            now,
            totals.pairs_total,
            totals.pairs_failed,
            totals.candidates_fetched,
            totals.new_rows,
            error.is_none(),
            error,
            run_id
        ],
    )
    .map_err(|e| ServerError::DbError(e.to_string()))?;
    Ok(())
}

pub fn get_recent_fetch_runs(conn: &Connection) -> Result<Vec<FetchRun>, ServerError> {
    let mut stmt = conn
        .prepare("SELECT id, started_at, finished_at, pairs_total, pairs_failed, candidates_fetched, new_rows, success, error_message FROM fetch_runs ORDER BY started_at DESC, id DESC LIMIT 50")
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(FetchRun {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                pairs_total: row.get(3)?,
                pairs_failed: row.get(4)?,
                candidates_fetched: row.get(5)?,
                new_rows: row.get(6)?,
                success: row.get(7)?,
                error_message: row.get(8)?,
            })
        })
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let mut runs = Vec::new();
    for r in rows {
        runs.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
    }
    Ok(runs)
}
