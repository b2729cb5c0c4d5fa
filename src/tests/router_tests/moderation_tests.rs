use crate::tests::utils::{body_json, test_app, TestApp, MODERATOR};
use serde_json::json;

fn submit(app: &TestApp) -> i64 {
    let fields = [
        ("submitterId", "808"),
        ("title", "Studio near BSU"),
        ("price", "300"),
        ("rooms", "studio"),
        ("city", "minsk"),
    ];
    let resp = app.post_multipart("/api/submissions", &fields, &[]);
    assert_eq!(resp.status(), 201);
    body_json(resp)["submissionId"].as_i64().unwrap()
}

#[test]
fn approve_publishes_listing() {
    let app = test_app();
    let id = submit(&app);

    let pending = body_json(app.get(&format!("/api/moderation/pending?moderatorId={MODERATOR}")));
    assert_eq!(pending["items"][0]["id"], id);

    let resp = app.post_json(
        "/api/moderation",
        json!({ "submissionId": id, "action": "approve", "moderatorId": MODERATOR }),
    );
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp)["status"], "approved");

    let page = body_json(app.get("/api/listings"));
    let item = &page["items"][0];
    assert_eq!(item["source"], "user");
    assert_eq!(item["identityUrl"], format!("https://rent.test/listing_{id}"));
    assert_eq!(item["roomCount"], "studio");
    assert_eq!(item["ownerRef"], 808);

    let mine = body_json(app.get("/api/submitters/808/listings"));
    assert_eq!(mine["items"].as_array().unwrap().len(), 1);

    assert_eq!(app.notifier.messages_for(808).len(), 1);

    // second decision finds nothing pending
    let again = app.post_json(
        "/api/moderation",
        json!({ "submissionId": id, "action": "approve", "moderatorId": MODERATOR }),
    );
    assert_eq!(again.status(), 404);
    assert_eq!(body_json(again)["error"], "not_found");
    assert_eq!(body_json(app.get("/api/listings"))["items"].as_array().unwrap().len(), 1);
}

#[test]
fn non_moderator_is_forbidden() {
    let app = test_app();
    let id = submit(&app);

    let resp = app.post_json(
        "/api/moderation",
        json!({ "submissionId": id, "action": "reject", "moderatorId": 808 }),
    );
    assert_eq!(resp.status(), 403);
    assert_eq!(body_json(resp)["error"], "forbidden");

    assert_eq!(app.get("/api/moderation/pending?moderatorId=808").status(), 403);
    assert_eq!(app.get("/api/moderation/pending").status(), 403);
    // still pending
    let pending = body_json(app.get(&format!("/api/moderation/pending?moderatorId={MODERATOR}")));
    assert_eq!(pending["items"].as_array().unwrap().len(), 1);
}

#[test]
fn reject_and_bad_actions() {
    let app = test_app();
    let id = submit(&app);

    let bad = app.post_json(
        "/api/moderation",
        json!({ "submissionId": id, "action": "archive", "moderatorId": MODERATOR }),
    );
    assert_eq!(bad.status(), 400);

    let resp = app.post_json(
        "/api/moderation",
        json!({ "submissionId": id, "action": "reject", "moderatorId": MODERATOR }),
    );
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp)["status"], "rejected");
    assert_eq!(body_json(app.get("/api/listings"))["items"].as_array().unwrap().len(), 0);
}
