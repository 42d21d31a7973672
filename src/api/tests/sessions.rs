use super::*;

fn start_body(session_id: &str, count: usize) -> Value {
    json!({
        "tabId": 1,
        "sessionId": session_id,
        "scan": scan_result("Gallery", candidates(count)),
        "selected": candidates(count),
    })
}

#[tokio::test]
async fn test_start_session_acknowledges_and_runs() {
    let (h, app) = test_app(DownloadConfig::default());

    let response = app
        .oneshot(post_json("/sessions", start_body("s-api", 2)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true }));

    let handle = h.coordinator.current_session().await.unwrap();
    assert_eq!(handle.id().as_str(), "s-api");
    handle.wait_finished().await;

    assert_eq!(
        h.storage.paths().await,
        vec!["Gallery/1.png", "Gallery/2.png", "Gallery/metadata.json"]
    );
}

#[tokio::test]
async fn test_start_session_rejects_empty_id() {
    let (h, app) = test_app(DownloadConfig::default());

    let response = app
        .oneshot(post_json("/sessions", start_body("", 1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"]["code"],
        "invalid_request"
    );
    assert!(h.coordinator.current_session().await.is_none());
}

#[tokio::test]
async fn test_start_session_without_selection_field() {
    let (h, app) = test_app(DownloadConfig::default());

    let body = json!({
        "tabId": 1,
        "sessionId": "s-empty",
        "scan": scan_result("Gallery", vec![]),
    });
    let response = app.oneshot(post_json("/sessions", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let handle = h.coordinator.current_session().await.unwrap();
    handle.wait_finished().await;
    assert_eq!(h.storage.paths().await, vec!["Gallery/metadata.json"]);
}

#[tokio::test]
async fn test_current_session_404_without_session() {
    let (_h, app) = test_app(DownloadConfig::default());

    let response = app.oneshot(get("/sessions/current")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "no_session");
}

#[tokio::test]
async fn test_current_session_snapshot() {
    let (h, app) = test_app(DownloadConfig::default());

    let handle = h
        .coordinator
        .start_session(
            crate::types::TabId(1),
            crate::types::SessionId::new("s-snap"),
            scan_result("Gallery", candidates(3)),
            candidates(3),
        )
        .await
        .unwrap();
    handle.wait_finished().await;

    let response = app.oneshot(get("/sessions/current")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["sessionId"], "s-snap");
    assert_eq!(body["total"], 3);
    assert_eq!(body["done"], 3);
    assert_eq!(body["finished"], true);
}

#[tokio::test]
async fn test_cancel_without_session_is_ok() {
    let (_h, app) = test_app(DownloadConfig::default());

    let response = app
        .oneshot(post_json("/sessions/cancel", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true }));
}

#[tokio::test]
async fn test_cancel_flips_current_session() {
    let (h, app) = test_app(DownloadConfig::default());

    let handle = h
        .coordinator
        .start_session(
            crate::types::TabId(1),
            crate::types::SessionId::new("s-cancel"),
            scan_result("Gallery", vec![]),
            vec![],
        )
        .await
        .unwrap();

    let response = app
        .oneshot(post_json("/sessions/cancel", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(handle.is_cancelled());
}
