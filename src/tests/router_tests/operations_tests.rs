use crate::domain::listing::{Candidate, RoomCount, SearchFilter, Source};
use crate::scraper::{FetchError, SourceAdapter};
use crate::tests::utils::{body_json, candidate, test_app, test_app_with, MODERATOR};
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Sleeps, then returns one candidate per city.
struct SlowAdapter;

impl SourceAdapter for SlowAdapter {
    fn source(&self) -> Source {
        Source::Kufar
    }

    fn fetch(&self, city: &str, _filter: &SearchFilter, _deadline: Instant) -> Result<Vec<Candidate>, FetchError> {
        thread::sleep(Duration::from_millis(150));
        Ok(vec![candidate(
            Source::Kufar,
            &format!("k/{city}"),
            city,
            Some(400),
            RoomCount::Two,
        )])
    }
}

fn wait_until_idle(app: &crate::tests::utils::TestApp) {
    for _ in 0..100 {
        if !app.state.orchestrator.is_running() {
            return;
        }
        thread::sleep(Duration::from_millis(30));
    }
    panic!("fetch cycle did not finish");
}

#[test]
fn manual_cycle_runs_once_at_a_time() {
    let app = test_app_with(vec![Arc::new(SlowAdapter) as Arc<dyn SourceAdapter>]);

    let resp = app.post_json("/api/fetch_cycle", json!({ "moderatorId": MODERATOR }));
    assert_eq!(resp.status(), 202);

    let busy = app.post_json("/api/fetch_cycle", json!({ "moderatorId": MODERATOR }));
    assert_eq!(busy.status(), 409);
    assert_eq!(body_json(busy)["error"], "busy");

    wait_until_idle(&app);

    let runs = body_json(app.get(&format!("/api/fetch_runs?moderatorId={MODERATOR}")));
    let run = &runs["items"][0];
    assert_eq!(run["success"], true);
    assert_eq!(run["newRows"], app.state.config.cities.len());

    let page = body_json(app.get("/api/listings?city=minsk"));
    assert_eq!(page["items"][0]["identityUrl"], "k/minsk");
}

#[test]
fn operations_need_a_moderator() {
    let app = test_app();
    assert_eq!(
        app.post_json("/api/fetch_cycle", json!({ "moderatorId": 1 })).status(),
        403
    );
    assert_eq!(app.get("/api/fetch_runs?moderatorId=1").status(), 403);
    assert_eq!(app.get("/api/fetch_runs?moderatorId=abc").status(), 400);
    assert_eq!(
        app.post_json("/api/fetch_cycle", json!({ "nobody": true })).status(),
        400
    );
}
