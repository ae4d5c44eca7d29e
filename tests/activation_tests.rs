mod common;

use serde_json::json;
use wiremock::matchers::{any, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use fla::LicenseError;

const ACTIVATE_PATH: &str = "/v1/plugins/1524/activate.json";
const DEACTIVATE_PATH: &str = "/v1/plugins/1524/deactivate.json";

#[tokio::test]
async fn activation_persists_the_install() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ACTIVATE_PATH))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "license_key": LICENSE_KEY,
            "uid": site_uid(),
            "url": SITE_URL,
            "version": "1.0.0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(install_response()))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    assert!(!manager.is_activated().await);

    assert!(manager.activate(LICENSE_KEY).await.unwrap());
    assert!(manager.is_activated().await);
    assert_eq!(manager.get_license_key().await, LICENSE_KEY);
    assert_eq!(manager.get_plan_name().await, "pro");

    let record = stored(&store).await;
    assert_eq!(record["install_id"], "77");
    assert_eq!(record["uid"], site_uid());
    assert_eq!(record["status"], "activated");
    assert_eq!(record["install"]["site_id"], 4242);
}

#[tokio::test]
async fn activation_payload_has_no_product_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ACTIVATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(install_response()))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _store) = manager_for(&server);
    manager.activate(LICENSE_KEY).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("product_id").is_none());
    assert!(body.get("install_id").is_none());
}

#[tokio::test]
async fn empty_key_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    assert!(!manager.activate("").await.unwrap());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn response_without_install_id_is_not_an_activation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ACTIVATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    assert!(!manager.activate(LICENSE_KEY).await.unwrap());
    assert!(!manager.is_activated().await);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn api_error_is_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ACTIVATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "license_expired", "message": "License expired", "http": 400}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    let err = manager.activate(LICENSE_KEY).await.unwrap_err();
    assert_eq!(err.api_code(), Some("license_expired"));
    assert!(err.to_string().contains("License expired"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn non_json_failure_becomes_top_level_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ACTIVATE_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad gateway</html>"))
        .mount(&server)
        .await;

    let (manager, _store) = manager_for(&server);
    let err = manager.activate(LICENSE_KEY).await.unwrap_err();
    assert_eq!(err.api_code(), Some("http_502"));
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    // Discard port; nothing listens there.
    config.api.base_url = "http://127.0.0.1:9".to_string();
    let manager = fla::LicenseManager::new(
        &config,
        std::sync::Arc::new(fla::store::MemoryStore::new()),
    )
    .unwrap();

    let err = manager.activate(LICENSE_KEY).await.unwrap_err();
    assert!(matches!(err, LicenseError::NetworkError(_)));
}

#[tokio::test]
async fn reactivation_reuses_the_stored_install() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ACTIVATE_PATH))
        .and(body_partial_json(json!({"install_id": 77})))
        .respond_with(ResponseTemplate::new(200).set_body_json(install_response()))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    let mut record = activated_record(&site_uid());
    record["status"] = json!("deactivated");
    record["license_key"] = json!("");
    seed(&store, &record).await;

    assert!(manager.activate(LICENSE_KEY).await.unwrap());
    assert!(manager.is_activated().await);
}

#[tokio::test]
async fn deactivation_scrubs_the_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEACTIVATE_PATH))
        .and(body_partial_json(json!({
            "uid": site_uid(),
            "install_id": 77,
            "license_key": LICENSE_KEY,
            "url": SITE_URL
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77})))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    seed(&store, &activated_record(&site_uid())).await;

    assert!(manager.deactivate().await.unwrap());
    assert!(!manager.is_activated().await);
    assert_eq!(manager.get_license_key().await, "");
    assert_eq!(manager.get_plan_name().await, "");

    let record = stored(&store).await;
    assert_eq!(record["license_key"], "");
    assert_eq!(record["install_id"], "77");
    assert_eq!(record["uid"], site_uid());
    assert_eq!(record["status"], "deactivated");
}

#[tokio::test]
async fn deactivation_refuses_another_sites_record() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    seed(&store, &activated_record("0123456789abcdef0123456789abcdef")).await;

    assert!(!manager.deactivate().await.unwrap());
    assert_eq!(stored(&store).await["license_key"], LICENSE_KEY);
}

#[tokio::test]
async fn deactivation_refuses_incomplete_records() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    assert!(!manager.deactivate().await.unwrap());

    for field in ["install_id", "uid", "license_key"] {
        let mut record = activated_record(&site_uid());
        record[field] = json!("");
        seed(&store, &record).await;
        assert!(!manager.deactivate().await.unwrap(), "missing {field}");
    }
}

#[tokio::test]
async fn deactivation_without_id_keeps_the_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEACTIVATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    seed(&store, &activated_record(&site_uid())).await;

    assert!(!manager.deactivate().await.unwrap());
    assert!(manager.is_activated().await);
}

#[tokio::test]
async fn rejected_deactivation_keeps_the_activation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEACTIVATE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "install_not_found", "message": "Install not found", "http": 403}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    seed(&store, &activated_record(&site_uid())).await;

    let err = manager.deactivate().await.unwrap_err();
    assert_eq!(err.api_code(), Some("install_not_found"));

    assert!(manager.is_activated().await);
    let record = stored(&store).await;
    assert_eq!(record["license_key"], LICENSE_KEY);
    assert_eq!(record["status"], "activated");
}

#[tokio::test]
async fn sync_requires_an_activation() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (manager, _store) = manager_for(&server);
    assert!(!manager.sync().await.unwrap());
}

#[tokio::test]
async fn sync_deactivates_then_activates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEACTIVATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ACTIVATE_PATH))
        .and(body_partial_json(json!({"license_key": LICENSE_KEY, "install_id": 77})))
        .respond_with(ResponseTemplate::new(200).set_body_json(install_response()))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    seed(&store, &activated_record(&site_uid())).await;

    assert!(manager.sync().await.unwrap());
    assert!(manager.is_activated().await);
    assert_eq!(manager.get_license_key().await, LICENSE_KEY);
}

#[tokio::test]
async fn sync_leaves_site_deactivated_when_reactivation_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEACTIVATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ACTIVATE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "license_expired", "message": "License expired"}
        })))
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server);
    seed(&store, &activated_record(&site_uid())).await;

    let err = manager.sync().await.unwrap_err();
    assert_eq!(err.api_code(), Some("license_expired"));
    assert!(!manager.is_activated().await);
    assert_eq!(stored(&store).await["license_key"], "");
}
