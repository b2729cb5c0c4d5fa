use crate::errors::ServerError;
use crate::responses::json::json_status;
use astra::Response;
use serde_json::json;

pub type ResultResp = Result<Response, ServerError>;

/// Convert a ServerError into `{error, message?, details?}` with the matching status.
pub fn error_response(err: ServerError) -> Response {
    let status = err.status();
    let body = match &err {
        ServerError::Validation(details) => json!({ "error": err.kind(), "details": details }),
        ServerError::BadRequest(msg) => json!({ "error": err.kind(), "message": msg }),
        ServerError::DbError(msg) => {
            tracing::error!(error = %msg, "database error while handling request");
            json!({ "error": err.kind(), "message": "Internal Server Error" })
        }
        ServerError::InternalError => {
            tracing::error!("internal error while handling request");
            json!({ "error": err.kind(), "message": "Internal Server Error" })
        }
        _ => json!({ "error": err.kind(), "message": err.to_string() }),
    };

    json_status(status, &body).unwrap_or_else(|_| {
        let mut resp = Response::new(astra::Body::from("{\"error\":\"internal\"}"));
        *resp.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
        resp
    })
}
