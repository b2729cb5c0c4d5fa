use crate::db::submissions::get_submission;
use crate::domain::submission::SubmissionStatus;
use crate::tests::utils::{body_json, test_app, MODERATOR};
use serde_json::json;
use std::io::Read;

const FIELDS: &[(&str, &str)] = &[
    ("submitterId", "321"),
    ("title", "Two rooms by the river"),
    ("description", "Furnished"),
    ("price", "480"),
    ("rooms", "2"),
    ("area", "52,5"),
    ("city", "grodno"),
    ("address", "Sovetskaya 12"),
];

#[test]
fn multipart_submission_is_stored_pending() {
    let app = test_app();
    let resp = app.post_multipart("/api/submissions", FIELDS, &[("living-room.JPG", b"jpeg bytes")]);
    assert_eq!(resp.status(), 201);

    let body = body_json(resp);
    assert_eq!(body["status"], "pending");
    let id = body["submissionId"].as_i64().unwrap();

    let s = app
        .state
        .db
        .with_conn(|c| get_submission(c, id))
        .unwrap()
        .unwrap();
    assert_eq!(s.status, SubmissionStatus::Pending);
    assert_eq!(s.area, Some(52.5));
    assert_eq!(s.submitter_ref, 321);
    assert_eq!(s.image_filenames.len(), 1);

    // moderators hear about it
    assert_eq!(app.notifier.messages_for(MODERATOR).len(), 1);

    // the stored image is served back
    let image = app.get(&s.image_filenames[0]);
    assert_eq!(image.status(), 200);
    assert_eq!(
        image.headers().get("Content-Type").unwrap().to_str().unwrap(),
        "image/jpeg"
    );
    let mut bytes = Vec::new();
    image.into_body().reader().read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes, b"jpeg bytes");
}

#[test]
fn validation_errors_list_fields() {
    let app = test_app();
    let fields = [("submitterId", "321"), ("price", "-10"), ("rooms", "two"), ("city", "paris")];
    let resp = app.post_multipart("/api/submissions", &fields, &[("notes.txt", b"hi")]);
    assert_eq!(resp.status(), 400);

    let body = body_json(resp);
    assert_eq!(body["error"], "validation");
    for field in ["price", "rooms", "city", "title", "images"] {
        assert!(body["details"][field].is_string(), "missing detail for {field}: {body}");
    }
    assert_eq!(app.notifier.count(), 0);
}

#[test]
fn non_multipart_submission_is_bad_request() {
    let app = test_app();
    let resp = app.post_json("/api/submissions", json!({ "title": "x" }));
    assert_eq!(resp.status(), 400);
    assert_eq!(body_json(resp)["error"], "bad_request");
}

#[test]
fn submitter_registration() {
    let app = test_app();
    let resp = app.post_json("/api/submitters", json!({ "submitterId": 77, "displayName": "Olga" }));
    assert_eq!(resp.status(), 200);
    let body = body_json(resp);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["submitterId"], 77);

    // repeat registration is fine
    let again = app.post_json("/api/submitters", json!({ "submitter_id": 77, "display_name": "Olga K" }));
    assert_eq!(again.status(), 200);

    let missing = app.post_json("/api/submitters", json!({ "displayName": "nobody" }));
    assert_eq!(missing.status(), 400);
}

#[test]
fn missing_image_is_not_found() {
    let app = test_app();
    assert_eq!(app.get("/uploads/deadbeef.png").status(), 404);
    assert_eq!(app.get("/uploads/..%2Fapp.sqlite3").status(), 404);
}
