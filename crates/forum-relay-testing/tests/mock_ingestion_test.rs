use forum_relay_testing::{CallMatcher, MockIngestion, MockResponse};
use http::StatusCode;
use serde_json::json;

async fn post(server: &MockIngestion, kind: &str, key: &str, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/v1/{}", server.base_url(), kind))
        .basic_auth(key, Some(""))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn records_calls_with_decoded_write_key() {
    let server = MockIngestion::start().await;

    let response = post(
        &server,
        "track",
        "wk_live",
        json!({"type": "track", "userId": "7", "event": "Discourse Post Liked"}),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), r#"{"success":true}"#);

    let calls = server.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, "track");
    assert_eq!(calls[0].write_key.as_deref(), Some("wk_live"));
    assert_eq!(calls[0].event_name(), Some("Discourse Post Liked"));
    assert!(!calls[0].matched);
    assert_eq!(server.unmatched_calls().len(), 1);
}

#[tokio::test]
async fn scripted_responses_and_verification() {
    let server = MockIngestion::start().await;

    server
        .expect(CallMatcher::identify().write_key("wk"))
        .respond_with(MockResponse::error(StatusCode::UNAUTHORIZED, "bad key"))
        .once();
    server.expect(CallMatcher::page()).never();
    server
        .expect(CallMatcher::track().field("/properties/topic_id", 3))
        .times(2);

    let identify = post(&server, "identify", "wk", json!({"type": "identify", "userId": "1"})).await;
    assert_eq!(identify.status(), StatusCode::UNAUTHORIZED.as_u16());

    for _ in 0..2 {
        let track = post(
            &server,
            "track",
            "wk",
            json!({"type": "track", "userId": "1", "event": "x", "properties": {"topic_id": 3}}),
        )
        .await;
        assert_eq!(track.status(), 200);
    }

    server.verify();
    assert!(server.unmatched_calls().is_empty());
    assert_eq!(server.calls().len(), 3);
}

#[tokio::test]
async fn later_expectations_override_earlier_ones() {
    let server = MockIngestion::start().await;

    server
        .expect(CallMatcher::track())
        .respond_with(MockResponse::new())
        .times(0);
    server
        .expect(CallMatcher::track())
        .respond_with(MockResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "boom"))
        .once();

    let response = post(&server, "track", "wk", json!({"type": "track"})).await;
    assert_eq!(response.status(), 500);
    server.verify();
}

#[tokio::test]
#[should_panic(expected = "expected")]
async fn verify_panics_on_unmet_expectation() {
    let server = MockIngestion::start().await;
    server.expect(CallMatcher::track()).once();
    server.verify();
}

#[tokio::test]
async fn reset_clears_recorded_calls() {
    let server = MockIngestion::start().await;
    post(&server, "page", "wk", json!({"type": "page", "name": "about#index"})).await;
    assert_eq!(server.calls().len(), 1);
    server.reset_calls();
    assert!(server.calls().is_empty());
}
