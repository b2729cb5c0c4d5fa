// src/db/submissions.rs
use crate::db::listings::write_candidate;
use crate::db::submitters::ensure_submitter;
use crate::domain::listing::RoomCount;
use crate::domain::submission::{ModerationAction, NewSubmission, PendingSubmission, SubmissionStatus};
use crate::errors::ServerError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

const SUBMISSION_COLUMNS: &str = "id, submitter_ref, title, description, price, rooms, area, city, \
                                  address, image_filenames, submitted_at, status";

fn row_to_submission(r: &Row<'_>) -> rusqlite::Result<PendingSubmission> {
    let rooms: String = r.get(5)?;
    let images_json: String = r.get(9)?;
    let status: String = r.get(11)?;

    let image_filenames: Vec<String> = serde_json::from_str(&images_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let status = SubmissionStatus::from_db(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            11,
            rusqlite::types::Type::Text,
            format!("unknown status {status}").into(),
        )
    })?;

    Ok(PendingSubmission {
        id: r.get(0)?,
        submitter_ref: r.get(1)?,
        title: r.get(2)?,
        description: r.get(3)?,
        price: r.get(4)?,
        room_count: RoomCount::from_db(&rooms),
        area: r.get(6)?,
        city: r.get(7)?,
        address: r.get(8)?,
        image_filenames,
        submitted_at: r.get(10)?,
        status,
    })
}

/// Store a validated submission as `pending`. The submitter row is created on
/// first contact inside the same transaction.
pub fn insert_submission(
    conn: &mut Connection,
    s: &NewSubmission,
    image_filenames: &[String],
    now: DateTime<Utc>,
) -> Result<i64, ServerError> {
    let images_json = serde_json::to_string(image_filenames)
        .map_err(|e| ServerError::DbError(format!("encode image list failed: {e}")))?;

    let tx = conn
        .transaction()
        .map_err(|e| ServerError::DbError(format!("begin tx failed: {e}")))?;

    ensure_submitter(&tx, s.submitter_ref, now)?;

    tx.execute(
        r#"
        insert into pending_submissions (
            submitter_ref, title, description, price, rooms, area, city, address,
            image_filenames, submitted_at, status
        ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending')
        "#,
        params![
            s.submitter_ref,
            s.title,
            s.description,
            s.price,
            s.room_count.as_str(),
            s.area,
            s.city,
            s.address,
            images_json,
            now,
        ],
    )
    .map_err(|e| ServerError::DbError(format!("insert submission failed: {e}")))?;
    let id = tx.last_insert_rowid();

    tx.commit()
        .map_err(|e| ServerError::DbError(format!("commit tx failed: {e}")))?;
    Ok(id)
}

pub fn get_submission(conn: &Connection, id: i64) -> Result<Option<PendingSubmission>, ServerError> {
    let sql = format!("select {SUBMISSION_COLUMNS} from pending_submissions where id = ?");
    conn.query_row(&sql, params![id], row_to_submission)
        .optional()
        .map_err(|e| ServerError::DbError(format!("select submission failed: {e}")))
}

/// Pending submissions, oldest first (moderation queue order).
pub fn list_pending(conn: &Connection) -> Result<Vec<PendingSubmission>, ServerError> {
    let sql = format!(
        "select {SUBMISSION_COLUMNS} from pending_submissions
         where status = 'pending' order by submitted_at asc, id asc"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| ServerError::DbError(e.to_string()))?;
    let rows = stmt
        .query_map([], row_to_submission)
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
    }
    Ok(out)
}

/// Apply a moderation decision to a pending submission:
/// - must exist and still be `pending`
/// - approval also writes the catalog listing, in the same transaction
///
/// Returns the submission with its new status, or `Ok(None)` when there was
/// nothing pending to decide. Runs as an IMMEDIATE transaction and guards the
/// update on `status = 'pending'`, so concurrent moderators cannot both win.
pub fn decide_submission(
    conn: &mut Connection,
    id: i64,
    action: ModerationAction,
    moderator_id: i64,
    public_base_url: &str,
    now: DateTime<Utc>,
) -> Result<Option<PendingSubmission>, ServerError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| ServerError::DbError(format!("begin tx failed: {e}")))?;

    let sql = format!("select {SUBMISSION_COLUMNS} from pending_submissions where id = ?");
    let row = tx
        .query_row(&sql, params![id], row_to_submission)
        .optional()
        .map_err(|e| ServerError::DbError(format!("select submission in tx failed: {e}")))?;

    let Some(mut submission) = row else {
        tx.rollback().ok();
        return Ok(None);
    };
    if submission.status != SubmissionStatus::Pending {
        tx.rollback().ok();
        return Ok(None);
    }

    let target = action.target_status();
    let updated = tx
        .execute(
            "update pending_submissions set status = ?1, decided_at = ?2, decided_by = ?3
             where id = ?4 and status = 'pending'",
            params![target.as_str(), now, moderator_id, id],
        )
        .map_err(|e| ServerError::DbError(format!("update submission status failed: {e}")))?;

    if updated != 1 {
        tx.rollback().ok();
        return Ok(None);
    }

    if action == ModerationAction::Approve {
        let candidate = submission.to_candidate(public_base_url);
        write_candidate(&tx, &candidate, now)?;
    }

    tx.commit()
        .map_err(|e| ServerError::DbError(format!("commit tx failed: {e}")))?;

    submission.status = target;
    Ok(Some(submission))
}
