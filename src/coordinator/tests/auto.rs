use super::*;
use crate::types::TabId;

fn auto_settings() -> DownloadConfig {
    DownloadConfig {
        auto_download: true,
        ..DownloadConfig::default()
    }
}

#[tokio::test]
async fn test_page_load_ignored_when_auto_download_disabled() {
    let h = harness(DownloadConfig::default());
    h.scanner
        .publish(TabId(1), scan_result("Gallery", candidates(2)))
        .await;

    let started = h
        .coordinator
        .page_loaded(TabId(1), "https://example.com/gallery")
        .await
        .unwrap();

    assert!(started.is_none());
    assert!(h.coordinator.current_session().await.is_none());
}

#[tokio::test]
async fn test_page_load_starts_session_over_all_candidates() {
    let h = harness(auto_settings());
    h.scanner
        .publish(TabId(7), scan_result("Gallery", candidates(3)))
        .await;

    let session = h
        .coordinator
        .page_loaded(TabId(7), "https://example.com/gallery")
        .await
        .unwrap()
        .unwrap();
    session.wait_finished().await;

    assert!(session.id().as_str().starts_with("auto-7-"));
    let millis: i64 = session.id().as_str()["auto-7-".len()..].parse().unwrap();
    assert!(millis > 0);
    assert_eq!(session.total(), 3);
    assert_eq!(session.progress().await.done, 3);
}

#[tokio::test]
async fn test_same_url_is_auto_downloaded_once_per_tab() {
    let h = harness(auto_settings());
    h.scanner
        .publish(TabId(7), scan_result("Gallery", candidates(1)))
        .await;
    h.scanner
        .publish(TabId(8), scan_result("Gallery", candidates(1)))
        .await;
    let url = "https://example.com/gallery";

    assert!(h.coordinator.page_loaded(TabId(7), url).await.unwrap().is_some());
    assert!(h.coordinator.page_loaded(TabId(7), url).await.unwrap().is_none());
    // Other tabs and other URLs are independent
    assert!(h.coordinator.page_loaded(TabId(8), url).await.unwrap().is_some());
    assert!(
        h.coordinator
            .page_loaded(TabId(7), "https://example.com/other")
            .await
            .unwrap()
            .is_some()
    );

    h.coordinator.forget_tab(TabId(7)).await;
    assert!(
        h.coordinator
            .page_loaded(TabId(7), "https://example.com/other")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_failed_scan_is_not_retried_for_same_url() {
    let h = harness(auto_settings());
    let url = "https://example.com/gallery";

    assert!(h.coordinator.page_loaded(TabId(2), url).await.is_err());

    h.scanner
        .publish(TabId(2), scan_result("Gallery", candidates(1)))
        .await;
    assert!(h.coordinator.page_loaded(TabId(2), url).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_url_is_ignored() {
    let h = harness(auto_settings());
    assert!(h.coordinator.page_loaded(TabId(2), "").await.unwrap().is_none());
}
