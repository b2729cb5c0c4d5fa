use crate::domain::listing::{RoomCount, Source};
use crate::tests::utils::{body_json, candidate, test_app};
use chrono::{Duration, TimeZone, Utc};

#[test]
fn health_is_ok() {
    let app = test_app();
    let resp = app.get("/health");
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp)["status"], "ok");
}

#[test]
fn listings_paginate_per_source() {
    let app = test_app();
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    for i in 0..12 {
        let c = candidate(Source::Kufar, &format!("k/{i}"), "minsk", Some(300 + i), RoomCount::Two);
        app.seed(&[c], base + Duration::minutes(i));
    }
    app.seed(
        &[candidate(Source::Onliner, "o/1", "minsk", Some(400), RoomCount::One)],
        base,
    );

    let first = body_json(app.get("/api/listings"));
    assert_eq!(first["items"].as_array().unwrap().len(), 8);
    assert_eq!(first["perSourceNextOffsets"]["kufar"], 7);
    assert_eq!(first["perSourceNextOffsets"]["onliner"], 1);
    assert_eq!(first["perSourceNextOffsets"]["user"], 0);
    assert_eq!(first["hasMore"], true);
    assert_eq!(first["items"][0]["identityUrl"], "k/11");
    assert_eq!(first["items"][7]["source"], "onliner");

    let second = body_json(app.get("/api/listings?kufarOffset=7&onlinerOffset=1"));
    assert_eq!(second["items"].as_array().unwrap().len(), 5);
    assert_eq!(second["perSourceNextOffsets"]["kufar"], 12);
    assert_eq!(second["hasMore"], false);
}

#[test]
fn listings_filters_and_aliases() {
    let app = test_app();
    let now = Utc::now();
    app.seed(
        &[
            candidate(Source::Kufar, "k/cheap", "minsk", Some(150), RoomCount::Two),
            candidate(Source::Kufar, "k/ok", "minsk", Some(350), RoomCount::Two),
            candidate(Source::Kufar, "k/brest", "brest", Some(350), RoomCount::Two),
            candidate(Source::Onliner, "o/big", "minsk", Some(350), RoomCount::FourPlus),
            candidate(Source::Onliner, "o/noprice", "minsk", None, RoomCount::Two),
        ],
        now,
    );

    let page = body_json(app.get("/api/listings?city=Minsk&min_price=200&maxPrice=500&rooms=2"));
    let urls: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["identityUrl"].as_str().unwrap())
        .collect();
    assert_eq!(urls, vec!["k/ok"]);

    let big = body_json(app.get("/api/listings?rooms=6"));
    assert_eq!(big["items"][0]["identityUrl"], "o/big");
    assert_eq!(big["items"][0]["roomCount"], "4+");
}

#[test]
fn bad_query_values_are_rejected() {
    let app = test_app();
    let resp = app.get("/api/listings?minPrice=cheap");
    assert_eq!(resp.status(), 400);
    assert_eq!(body_json(resp)["error"], "bad_request");

    assert_eq!(app.get("/api/listings?rooms=many").status(), 400);
    assert_eq!(app.get("/api/listings?kufarOffset=-1").status(), 400);
}

#[test]
fn out_of_range_offset_is_rejected() {
    let app = test_app();
    app.seed(
        &[candidate(Source::Kufar, "k/1", "minsk", Some(300), RoomCount::One)],
        Utc::now(),
    );

    let resp = app.get("/api/listings?kufarOffset=18446744073709551615");
    assert_eq!(resp.status(), 400);
    assert_eq!(body_json(resp)["error"], "bad_request");
    assert_eq!(app.get("/api/listings?user_offset=9223372036854775808").status(), 400);

    let last = body_json(app.get("/api/listings?kufarOffset=9223372036854775807"));
    assert_eq!(last["items"].as_array().unwrap().len(), 0);
    assert_eq!(last["hasMore"], false);
}

#[test]
fn new_count_and_mark_viewed() {
    let app = test_app();
    app.seed(
        &[
            candidate(Source::Kufar, "k/1", "minsk", Some(1), RoomCount::One),
            candidate(Source::Kufar, "k/2", "minsk", Some(2), RoomCount::One),
        ],
        Utc::now(),
    );

    assert_eq!(body_json(app.get("/api/listings/new_count"))["count"], 2);

    let resp = app.post_json("/api/listings/mark_viewed", serde_json::json!({}));
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp)["updated"], 2);
    assert_eq!(body_json(app.get("/api/listings/new_count"))["count"], 0);
}

#[test]
fn unknown_route_is_not_found() {
    let app = test_app();
    let resp = app.get("/api/nope");
    assert_eq!(resp.status(), 404);
    assert_eq!(body_json(resp)["error"], "not_found");
}

#[test]
fn submitter_listings_path_without_id() {
    let app = test_app();
    let resp = app.get("/api/submitters/listings");
    assert_eq!(resp.status(), 404);
    assert_eq!(body_json(resp)["error"], "not_found");

    assert_eq!(app.get("/api/submitters//listings").status(), 404);
    assert_eq!(app.get("/api/submitters/42").status(), 404);
    assert_eq!(app.get("/api/submitters/abc/listings").status(), 400);
}
