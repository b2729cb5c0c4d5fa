use crate::db::connection::Database;
use crate::domain::listing::{Candidate, Listing, RoomCount, SearchFilter, Source};
use crate::errors::ServerError;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const LISTING_COLUMNS: &str = r#"
    identity_url, source, city, price, rooms, address, image_ref, title,
    description, area, owner_ref, is_new, first_seen_at, last_seen_at
"#;

/// Result of pushing one batch of candidates into the catalog.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows that did not exist before.
    pub inserted: usize,
    /// Rows that existed and had their mutable fields + last_seen_at refreshed.
    pub refreshed: usize,
    /// Rows skipped because they failed to persist.
    pub failed: usize,
}

fn check_candidate(c: &Candidate) -> Result<(), ServerError> {
    if c.identity_url.trim().is_empty() {
        return Err(ServerError::BadRequest("empty identity_url".into()));
    }
    if c.city.trim().is_empty() {
        return Err(ServerError::BadRequest("empty city".into()));
    }
    if c.price.is_some_and(|p| p < 0) {
        return Err(ServerError::BadRequest("negative price".into()));
    }
    Ok(())
}

/// Insert-or-update one candidate in its own transaction.
/// Returns `true` when the row is new.
pub fn upsert_candidate(
    conn: &mut Connection,
    c: &Candidate,
    now: DateTime<Utc>,
) -> Result<bool, ServerError> {
    let tx = conn.transaction()?;
    let inserted = write_candidate(&tx, c, now)?;
    tx.commit()?;
    Ok(inserted)
}

/// Insert-or-update on whatever connection/transaction the caller holds.
pub fn write_candidate(
    conn: &Connection,
    c: &Candidate,
    now: DateTime<Utc>,
) -> Result<bool, ServerError> {
    check_candidate(c)?;

    let inserted = conn.execute(
        r#"
        INSERT INTO listings (
            identity_url, source, city, price, rooms, address, image_ref, title,
            description, area, owner_ref, is_new, first_seen_at, last_seen_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, ?12, ?12)
        ON CONFLICT(identity_url) DO NOTHING
        "#,
        params![
            c.identity_url,
            c.source.key(),
            c.city,
            c.price,
            c.rooms.as_str(),
            c.address,
            c.image_ref,
            c.title,
            c.description,
            c.area,
            c.owner_ref,
            now,
        ],
    )?;

    if inserted == 0 {
        // Only the fields a re-sighting may legitimately change.
        conn.execute(
            r#"
            UPDATE listings SET
                price = ?2,
                address = ?3,
                image_ref = ?4,
                description = ?5,
                last_seen_at = max(last_seen_at, ?6)
            WHERE identity_url = ?1
            "#,
            params![c.identity_url, c.price, c.address, c.image_ref, c.description, now],
        )?;
    }

    Ok(inserted == 1)
}

/// Upsert a whole batch. Every row commits on its own, so one bad row is
/// logged and skipped instead of rolling back its neighbours.
pub fn upsert_batch(
    db: &Database,
    candidates: &[Candidate],
    now: DateTime<Utc>,
) -> Result<BatchOutcome, ServerError> {
    db.with_conn(|conn| {
        let mut outcome = BatchOutcome::default();
        for c in candidates {
            match upsert_candidate(conn, c, now) {
                Ok(true) => outcome.inserted += 1,
                Ok(false) => outcome.refreshed += 1,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        identity_url = %c.identity_url,
                        source = %c.source,
                        error = %e,
                        "skipping candidate that failed to persist"
                    );
                }
            }
        }
        tracing::info!(
            total = candidates.len(),
            inserted = outcome.inserted,
            refreshed = outcome.refreshed,
            failed = outcome.failed,
            "catalog batch upserted"
        );
        Ok(outcome)
    })
}

fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let source_key: String = row.get(1)?;
    let source = Source::from_key(&source_key).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown source {source_key}").into(),
        )
    })?;
    let rooms: String = row.get(4)?;

    Ok(Listing {
        identity_url: row.get(0)?,
        source,
        city: row.get(2)?,
        price: row.get(3)?,
        room_count: RoomCount::from_db(&rooms),
        address: row.get(5)?,
        image_ref: row.get(6)?,
        title: row.get(7)?,
        description: row.get(8)?,
        area: row.get(9)?,
        owner_ref: row.get(10)?,
        is_new: row.get(11)?,
        first_seen_at: row.get(12)?,
        last_seen_at: row.get(13)?,
    })
}

/// WHERE clause (without the keyword) and its bound values for a filter + source.
fn filter_clause(filter: &SearchFilter, source: Source) -> (String, Vec<Value>) {
    let mut clauses = vec!["source = ?".to_string()];
    let mut values = vec![Value::Text(source.key().to_string())];

    if let Some(city) = &filter.city {
        clauses.push("city = ?".into());
        values.push(Value::Text(city.clone()));
    }
    if let Some(min) = filter.min_price {
        clauses.push("price >= ?".into());
        values.push(Value::Integer(min));
    }
    if let Some(max) = filter.max_price {
        clauses.push("price <= ?".into());
        values.push(Value::Integer(max));
    }
    match filter.rooms {
        None => {}
        Some(RoomCount::FourPlus) => {
            clauses.push(
                "(rooms = '4+' OR (rooms GLOB '[0-9]*' AND CAST(rooms AS INTEGER) >= 4))".into(),
            );
        }
        Some(r) => {
            clauses.push("rooms = ?".into());
            values.push(Value::Text(r.as_str().to_string()));
        }
    }

    (clauses.join(" AND "), values)
}

/// SQLite reads a negative LIMIT/OFFSET as "none", so never let a cast wrap.
fn sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// One page of a single source, newest sighting first.
pub fn page_for_source(
    conn: &Connection,
    filter: &SearchFilter,
    source: Source,
    offset: usize,
    limit: usize,
) -> Result<Vec<Listing>, ServerError> {
    let (clause, mut values) = filter_clause(filter, source);
    values.push(Value::Integer(sql_int(limit)));
    values.push(Value::Integer(sql_int(offset)));

    let sql = format!(
        "SELECT {LISTING_COLUMNS} FROM listings WHERE {clause}
         ORDER BY last_seen_at DESC, rowid DESC
         LIMIT ? OFFSET ?"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), row_to_listing)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Whether the source has at least one matching row at or past `offset`.
pub fn has_rows_from(
    conn: &Connection,
    filter: &SearchFilter,
    source: Source,
    offset: usize,
) -> Result<bool, ServerError> {
    let (clause, mut values) = filter_clause(filter, source);
    values.push(Value::Integer(sql_int(offset)));

    let sql = format!("SELECT 1 FROM listings WHERE {clause} LIMIT 1 OFFSET ?");
    let found = conn
        .query_row(&sql, params_from_iter(values), |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub fn get_listing(conn: &Connection, identity_url: &str) -> Result<Option<Listing>, ServerError> {
    let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE identity_url = ?");
    Ok(conn
        .query_row(&sql, params![identity_url], row_to_listing)
        .optional()?)
}

pub fn count_listings(conn: &Connection) -> Result<i64, ServerError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM listings", [], |r| r.get(0))?)
}

/// Listings the client has not marked as viewed yet.
pub fn count_new(conn: &Connection) -> Result<i64, ServerError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM listings WHERE is_new = 1", [], |r| {
        r.get(0)
    })?)
}

pub fn mark_all_viewed(conn: &Connection) -> Result<usize, ServerError> {
    Ok(conn.execute("UPDATE listings SET is_new = 0 WHERE is_new = 1", [])?)
}

pub fn listings_by_owner(conn: &Connection, owner: i64) -> Result<Vec<Listing>, ServerError> {
    let sql = format!(
        "SELECT {LISTING_COLUMNS} FROM listings
         WHERE owner_ref = ? AND source = 'user'
         ORDER BY first_seen_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner], row_to_listing)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
