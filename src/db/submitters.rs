// src/db/submitters.rs
use crate::domain::Submitter;
use crate::errors::ServerError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Register (or re-register) a submitter. The display name follows the latest
/// call; `registered_at` keeps the first contact.
pub fn upsert_submitter(
    conn: &Connection,
    id: i64,
    display_name: &str,
    now: DateTime<Utc>,
) -> Result<Submitter, ServerError> {
    conn.execute(
        r#"
        insert into submitters (id, display_name, registered_at)
        values (?1, ?2, ?3)
        on conflict(id) do update set display_name = excluded.display_name
        "#,
        params![id, display_name, now],
    )
    .map_err(|e| ServerError::DbError(format!("upsert submitter failed: {e}")))?;

    get_submitter(conn, id)?.ok_or(ServerError::InternalError)
}

/// Make sure a row exists without touching an existing display name.
pub fn ensure_submitter(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<(), ServerError> {
    conn.execute(
        "insert or ignore into submitters (id, display_name, registered_at) values (?1, ?2, ?3)",
        params![id, format!("user {id}"), now],
    )
    .map_err(|e| ServerError::DbError(format!("insert submitter failed: {e}")))?;
    Ok(())
}

pub fn get_submitter(conn: &Connection, id: i64) -> Result<Option<Submitter>, ServerError> {
    conn.query_row(
        "select id, display_name, registered_at from submitters where id = ?",
        params![id],
        |r| {
            Ok(Submitter {
                id: r.get(0)?,
                display_name: r.get(1)?,
                registered_at: r.get(2)?,
            })
        },
    )
    .optional()
    .map_err(|e| ServerError::DbError(format!("select submitter failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&std::fs::read_to_string("sql/schema.sql").unwrap())
            .unwrap();
        conn
    }

    #[test]
    fn registration_is_idempotent() {
        let conn = conn();
        let t0 = Utc::now();
        let first = upsert_submitter(&conn, 5, "Anna", t0).unwrap();
        let again = upsert_submitter(&conn, 5, "Anna K.", t0 + Duration::days(1)).unwrap();

        assert_eq!(first.registered_at, again.registered_at);
        assert_eq!(again.display_name, "Anna K.");

        let n: i64 = conn
            .query_row("select count(*) from submitters", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn ensure_keeps_existing_name() {
        let conn = conn();
        let now = Utc::now();
        upsert_submitter(&conn, 9, "Ivan", now).unwrap();
        ensure_submitter(&conn, 9, now).unwrap();
        ensure_submitter(&conn, 10, now).unwrap();

        assert_eq!(get_submitter(&conn, 9).unwrap().unwrap().display_name, "Ivan");
        assert_eq!(get_submitter(&conn, 10).unwrap().unwrap().display_name, "user 10");
        assert!(get_submitter(&conn, 11).unwrap().is_none());
    }
}
