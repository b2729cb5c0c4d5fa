// src/moderation.rs
//
// User submissions in, moderator decisions out. Notifications are only sent
// after the database work has committed.

use crate::db::submissions::{decide_submission, insert_submission};
use crate::domain::submission::{ModerationAction, PendingSubmission, SubmissionForm};
use crate::errors::{FieldErrors, ServerError};
use crate::notify::notify_each;
use crate::state::AppState;
use crate::uploads::{allowed_extension, ImageStoreError};
use chrono::{DateTime, Utc};

/// One file from the `images` multipart field.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

fn check_images(images: &[UploadedImage], max_images: usize, errors: &mut FieldErrors) {
    if images.len() > max_images {
        errors.insert("images".into(), format!("at most {max_images} images allowed"));
        return;
    }
    if let Some(bad) = images.iter().find(|i| allowed_extension(&i.file_name).is_none()) {
        errors.insert(
            "images".into(),
            format!("{} is not an allowed image type", bad.file_name),
        );
    } else if images.iter().any(|i| i.bytes.is_empty()) {
        errors.insert("images".into(), "empty file".into());
    }
}

fn drop_images(state: &AppState, refs: &[String]) {
    for r in refs {
        if let Err(e) = state.images.remove(r) {
            tracing::warn!(image = %r, error = %e, "could not remove stored image");
        }
    }
}

/// Validate, store images, persist as `pending` and tell the moderators.
/// Nothing is left behind when any step fails.
pub fn submit(
    state: &AppState,
    form: &SubmissionForm,
    images: &[UploadedImage],
    now: DateTime<Utc>,
) -> Result<i64, ServerError> {
    let cfg = &state.config;
    let mut errors = FieldErrors::new();
    let validated = form.validate(|c| cfg.is_known_city(c));
    check_images(images, cfg.max_images, &mut errors);

    let new = match validated {
        Ok(n) if errors.is_empty() => n,
        Ok(_) => return Err(ServerError::Validation(errors)),
        Err(mut field_errors) => {
            field_errors.append(&mut errors);
            return Err(ServerError::Validation(field_errors));
        }
    };

    let mut stored = Vec::with_capacity(images.len());
    for img in images {
        match state.images.store(&img.file_name, &img.bytes) {
            Ok(r) => stored.push(r),
            Err(e) => {
                drop_images(state, &stored);
                return Err(match e {
                    ImageStoreError::NotAllowed(_) | ImageStoreError::Empty => {
                        let mut errors = FieldErrors::new();
                        errors.insert("images".into(), e.to_string());
                        ServerError::Validation(errors)
                    }
                    other => {
                        tracing::error!(error = %other, "image storage failed");
                        ServerError::InternalError
                    }
                });
            }
        }
    }

    let inserted = state
        .db
        .with_conn(|conn| insert_submission(conn, &new, &stored, now));
    let id = match inserted {
        Ok(id) => id,
        Err(e) => {
            drop_images(state, &stored);
            return Err(e);
        }
    };

    tracing::info!(submission_id = id, submitter = new.submitter_ref, images = stored.len(), "submission stored");

    let text = format!(
        "New listing #{id} awaiting moderation: {} ({}, ${}, {} rooms)",
        new.title, new.city, new.price, new.room_count
    );
    notify_each(state.notifier.as_ref(), &cfg.moderator_ids, &text);

    Ok(id)
}

/// Apply a moderator decision. Non-moderators get `Forbidden`; anything that is
/// not currently pending is `NotFound`. Either way nothing changes.
pub fn moderate(
    state: &AppState,
    submission_id: i64,
    action: ModerationAction,
    moderator_id: i64,
    now: DateTime<Utc>,
) -> Result<PendingSubmission, ServerError> {
    if !state.config.is_moderator(moderator_id) {
        tracing::warn!(moderator_id, submission_id, "moderation attempt by non-moderator");
        return Err(ServerError::Forbidden);
    }

    let base = state.config.public_base_url.as_str();
    let decided = state
        .db
        .with_conn(|conn| decide_submission(conn, submission_id, action, moderator_id, base, now))?;
    let Some(submission) = decided else {
        tracing::info!(submission_id, "nothing pending to decide");
        return Err(ServerError::NotFound);
    };

    tracing::info!(submission_id, moderator_id, status = submission.status.as_str(), "submission decided");

    let text = match action {
        ModerationAction::Approve => format!(
            "Your listing \"{}\" was approved: {}",
            submission.title,
            submission.identity_url(base)
        ),
        ModerationAction::Reject => format!("Your listing \"{}\" was rejected.", submission.title),
    };
    notify_each(state.notifier.as_ref(), &[submission.submitter_ref], &text);

    Ok(submission)
}
