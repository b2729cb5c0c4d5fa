use crate::db::fetch_runs::get_recent_fetch_runs;
use crate::db::listings::{count_listings, count_new, listings_by_owner, mark_all_viewed};
use crate::db::submissions::list_pending;
use crate::db::submitters::upsert_submitter;
use crate::domain::listing::{RoomCount, SearchFilter};
use crate::domain::submission::{ModerationAction, SubmissionForm};
use crate::errors::ServerError;
use crate::moderation::{self, UploadedImage};
use crate::query::{query_listings, SourceOffsets};
use crate::responses::{file_response, json_response, json_status, ResultResp};
use crate::state::AppState;
use crate::uploads::{content_type_for, ImageStoreError, UPLOAD_PREFIX};
use astra::Request;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::Read;

/// Request bodies above this are refused before parsing.
const MAX_BODY_BYTES: u64 = 20 * 1024 * 1024;
const DISPLAY_NAME_MAX_CHARS: usize = 100;

pub fn handle(req: Request, state: &AppState) -> ResultResp {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    tracing::debug!(%method, %path, "request");

    match (method.as_str(), path.as_str()) {
        ("GET", "/health") => {
            let listings = state.db.with_conn(|conn| count_listings(conn))?;
            json_response(&json!({ "status": "ok", "listings": listings }))
        }

        ("GET", "/api/listings") => get_listings(&req, state),
        ("GET", "/api/listings/new_count") => {
            let count = state.db.with_conn(|conn| count_new(conn))?;
            json_response(&json!({ "count": count }))
        }
        ("POST", "/api/listings/mark_viewed") => {
            let updated = state.db.with_conn(|conn| mark_all_viewed(conn))?;
            json_response(&json!({ "updated": updated }))
        }

        ("POST", "/api/submissions") => post_submission(req, state),
        ("POST", "/api/submitters") => post_submitter(req, state),
        ("GET", p) if p.starts_with("/api/submitters/") => {
            let raw = p
                .strip_prefix("/api/submitters/")
                .and_then(|rest| rest.strip_suffix("/listings"))
                .filter(|id| !id.is_empty())
                .ok_or(ServerError::NotFound)?;
            let owner: i64 = raw
                .parse()
                .map_err(|_| ServerError::BadRequest(format!("invalid submitter id: {raw}")))?;
            let items = state.db.with_conn(|conn| listings_by_owner(conn, owner))?;
            json_response(&json!({ "items": items }))
        }

        ("POST", "/api/moderation") => post_moderation(req, state),
        ("GET", "/api/moderation/pending") => {
            require_moderator_param(&req, state)?;
            let items = state.db.with_conn(|conn| list_pending(conn))?;
            json_response(&json!({ "items": items }))
        }

        ("POST", "/api/fetch_cycle") => post_fetch_cycle(req, state),
        ("GET", "/api/fetch_runs") => {
            require_moderator_param(&req, state)?;
            let items = state.db.with_conn(|conn| get_recent_fetch_runs(conn))?;
            let running = state.orchestrator.is_running();
            json_response(&json!({ "items": items, "running": running }))
        }

        ("GET", p) if p.starts_with(UPLOAD_PREFIX) => {
            let name = &p[UPLOAD_PREFIX.len()..];
            match state.images.load(name) {
                Ok(bytes) => file_response(bytes, content_type_for(name)),
                Err(ImageStoreError::Missing) => Err(ServerError::NotFound),
                Err(e) => {
                    tracing::error!(file = name, error = %e, "could not read upload");
                    Err(ServerError::InternalError)
                }
            }
        }

        _ => Err(ServerError::NotFound),
    }
}

// ---------- listings ----------

fn get_listings(req: &Request, state: &AppState) -> ResultResp {
    let params = parse_query(req);
    let filter = SearchFilter {
        city: param(&params, "city", "city").map(str::to_lowercase),
        min_price: parse_param(&params, "minPrice", "min_price")?,
        max_price: parse_param(&params, "maxPrice", "max_price")?,
        rooms: match param(&params, "rooms", "room_count") {
            None => None,
            Some(raw) => match RoomCount::parse_token(raw) {
                Some(r) if r != RoomCount::Unknown => Some(r),
                _ => return Err(ServerError::BadRequest(format!("invalid rooms value: {raw}"))),
            },
        },
    };
    let offsets = SourceOffsets {
        kufar: parse_offset(&params, "kufarOffset", "kufar_offset")?,
        onliner: parse_offset(&params, "onlinerOffset", "onliner_offset")?,
        user: parse_offset(&params, "userOffset", "user_offset")?,
    };

    let page = query_listings(&state.db, &filter, offsets, state.config.pages)?;
    json_response(&page)
}

/// Offsets must fit SQLite's signed 64-bit OFFSET.
fn parse_offset(params: &HashMap<String, String>, name: &str, alias: &str) -> Result<usize, ServerError> {
    let offset: usize = parse_param(params, name, alias)?.unwrap_or(0);
    if i64::try_from(offset).is_err() {
        return Err(ServerError::BadRequest(format!("{name} out of range: {offset}")));
    }
    Ok(offset)
}

// ---------- submissions ----------

fn post_submission(req: Request, state: &AppState) -> ResultResp {
    let content_type = header(&req, "content-type").unwrap_or_default();
    let boundary = multer::parse_boundary(&content_type)
        .map_err(|_| ServerError::BadRequest("expected multipart/form-data".into()))?;
    let body = read_body(req)?;

    let (form, images) = parse_submission_multipart(body, boundary)?;
    let id = moderation::submit(state, &form, &images, Utc::now())?;

    json_status(201, &json!({ "status": "pending", "submissionId": id }))
}

fn parse_submission_multipart(
    body: Vec<u8>,
    boundary: String,
) -> Result<(SubmissionForm, Vec<UploadedImage>), ServerError> {
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(Bytes::from(body)) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    futures::executor::block_on(async move {
        let mut form = SubmissionForm::default();
        let mut images = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "images" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                // browsers send an empty part when no file was picked
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                images.push(UploadedImage {
                    file_name,
                    bytes: bytes.to_vec(),
                });
                continue;
            }

            let text = field.text().await.map_err(bad_multipart)?;
            let slot = match name.as_str() {
                "submitterId" | "submitter_id" | "user_id" => &mut form.submitter_id,
                "title" => &mut form.title,
                "description" => &mut form.description,
                "price" => &mut form.price,
                "rooms" => &mut form.rooms,
                "area" => &mut form.area,
                "city" => &mut form.city,
                "address" => &mut form.address,
                _ => continue,
            };
            *slot = Some(text);
        }
        Ok::<_, ServerError>((form, images))
    })
}

fn bad_multipart(e: multer::Error) -> ServerError {
    ServerError::BadRequest(format!("malformed multipart body: {e}"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitterBody {
    #[serde(alias = "submitter_id")]
    submitter_id: i64,
    #[serde(default, alias = "display_name")]
    display_name: Option<String>,
}

fn post_submitter(req: Request, state: &AppState) -> ResultResp {
    let body: SubmitterBody = read_json(req)?;
    let name = body
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| n.chars().take(DISPLAY_NAME_MAX_CHARS).collect::<String>())
        .unwrap_or_else(|| format!("user {}", body.submitter_id));

    let submitter = state
        .db
        .with_conn(|conn| upsert_submitter(conn, body.submitter_id, &name, Utc::now()))?;
    tracing::info!(submitter = submitter.id, "submitter registered");

    json_response(&json!({ "status": "ok", "submitterId": submitter.id }))
}

// ---------- moderation ----------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModerationBody {
    #[serde(alias = "submission_id")]
    submission_id: i64,
    action: String,
    #[serde(alias = "moderator_id")]
    moderator_id: i64,
}

fn post_moderation(req: Request, state: &AppState) -> ResultResp {
    let body: ModerationBody = read_json(req)?;
    let action = ModerationAction::parse(&body.action)
        .ok_or_else(|| ServerError::BadRequest(format!("unknown action: {}", body.action)))?;

    let decided = moderation::moderate(state, body.submission_id, action, body.moderator_id, Utc::now())?;
    json_response(&json!({
        "message": format!("Submission {} {}", decided.id, decided.status.as_str()),
        "submissionId": decided.id,
        "status": decided.status,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModeratorBody {
    #[serde(alias = "moderator_id")]
    moderator_id: i64,
}

fn post_fetch_cycle(req: Request, state: &AppState) -> ResultResp {
    let body: ModeratorBody = read_json(req)?;
    if !state.config.is_moderator(body.moderator_id) {
        return Err(ServerError::Forbidden);
    }
    if !state.orchestrator.spawn_cycle() {
        return Err(ServerError::Busy);
    }
    tracing::info!(moderator_id = body.moderator_id, "fetch cycle triggered manually");
    json_status(202, &json!({ "status": "started" }))
}

fn require_moderator_param(req: &Request, state: &AppState) -> Result<i64, ServerError> {
    let params = parse_query(req);
    let id: i64 = parse_param(&params, "moderatorId", "moderator_id")?.ok_or(ServerError::Forbidden)?;
    if !state.config.is_moderator(id) {
        return Err(ServerError::Forbidden);
    }
    Ok(id)
}

// ---------- request helpers ----------

fn header(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn read_body(req: Request) -> Result<Vec<u8>, ServerError> {
    let mut buf = Vec::new();
    req.into_body()
        .reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut buf)
        .map_err(|e| ServerError::BadRequest(format!("could not read body: {e}")))?;
    if buf.len() as u64 > MAX_BODY_BYTES {
        return Err(ServerError::BadRequest("request body too large".into()));
    }
    Ok(buf)
}

fn read_json<T: serde::de::DeserializeOwned>(req: Request) -> Result<T, ServerError> {
    let body = read_body(req)?;
    serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(format!("invalid JSON body: {e}")))
}

fn parse_query(req: &Request) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Non-blank value under the camelCase name or its snake_case alias.
fn param<'a>(params: &'a HashMap<String, String>, name: &str, alias: &str) -> Option<&'a str> {
    params
        .get(name)
        .or_else(|| params.get(alias))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_param<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    name: &str,
    alias: &str,
) -> Result<Option<T>, ServerError> {
    match param(params, name, alias) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ServerError::BadRequest(format!("invalid {name}: {raw}"))),
    }
}
