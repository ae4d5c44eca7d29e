//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::MockServer;

use fla::config::FlaConfig;
use fla::site::SiteIdentity;
use fla::store::{MemoryStore, OptionStore};
use fla::LicenseManager;

pub const OPTION_NAME: &str = "wpi_activation_data";
pub const SITE_URL: &str = "https://example.com";
pub const LICENSE_KEY: &str = "sk_live_abcdef123";

pub fn config_for(server: &MockServer) -> FlaConfig {
    let mut config = FlaConfig::default();
    config.api.base_url = server.uri();
    config.plugin.plugin_id = "1524".to_string();
    config.plugin.slug = "my-plugin".to_string();
    config.plugin.basename = "my-plugin/my-plugin.php".to_string();
    config.plugin.name = "My Plugin".to_string();
    config.plugin.author = "Acme".to_string();
    config.plugin.version = "1.0.0".to_string();
    config.site.url = SITE_URL.to_string();
    config.site.platform_version = "6.5".to_string();
    config.site.language_version = "8.2".to_string();
    config.storage.backend = "memory".to_string();
    config
}

pub fn site_uid() -> String {
    SiteIdentity::new(SITE_URL, 1).unwrap().uid()
}

pub fn manager_for(server: &MockServer) -> (Arc<LicenseManager>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let manager = LicenseManager::new(&config_for(server), store.clone()).unwrap();
    (Arc::new(manager), store)
}

/// Server reply to a successful activation.
pub fn install_response() -> Value {
    json!({
        "install_id": 77,
        "install_public_key": "pk_77",
        "install_secret_key": "sk_77",
        "license_plan_name": "pro",
        "site_id": 4242
    })
}

/// Stored record of an activated install for `uid`.
pub fn activated_record(uid: &str) -> Value {
    json!({
        "license_key": LICENSE_KEY,
        "uid": uid,
        "url": SITE_URL,
        "version": "1.0.0",
        "install_id": "77",
        "status": "activated",
        "created_at": "2026-01-01T00:00:00Z",
        "install": {
            "install_public_key": "pk_77",
            "install_secret_key": "sk_77",
            "license_plan_name": "pro"
        }
    })
}

pub async fn seed(store: &MemoryStore, record: &Value) {
    store.set(OPTION_NAME, &record.to_string()).await.unwrap();
}

pub async fn stored(store: &MemoryStore) -> Value {
    let raw = store.get(OPTION_NAME).await.unwrap().expect("record stored");
    serde_json::from_str(&raw).unwrap()
}

/// Matches requests whose `Authorization` header verifies against the keys.
pub struct SignedBy {
    pub id: &'static str,
    pub public_key: &'static str,
    pub secret_key: &'static str,
}

impl wiremock::Match for SignedBy {
    fn matches(&self, request: &wiremock::Request) -> bool {
        use fla::api::signature::{canonical_string, sign_string, AuthScheme};

        let header = |name: &str| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let Ok(method) = reqwest::Method::from_bytes(request.method.as_str().as_bytes()) else {
            return false;
        };

        let canonical = canonical_string(
            &method,
            &header("content-md5"),
            &header("date"),
            request.url.path(),
        );
        let expected = format!(
            "{} {}:{}:{}",
            AuthScheme::for_keys(self.public_key, self.secret_key),
            self.id,
            self.public_key,
            sign_string(&canonical, self.secret_key)
        );
        header("authorization") == expected
    }
}

pub fn install_signature() -> SignedBy {
    SignedBy {
        id: "77",
        public_key: "pk_77",
        secret_key: "sk_77",
    }
}
