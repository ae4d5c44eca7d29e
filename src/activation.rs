//! Activation state for one site: activate, deactivate, sync.
//!
//! The whole state is one [`ActivationRecord`] stored under the configured
//! option name and replaced on every transition. There are two states,
//! `activated` and `deactivated`, and only explicit calls move between them.
//!
//! ```rust,ignore
//! let manager = LicenseManager::new(&config, store)?;
//! if manager.activate("sk_live_...").await? {
//!     println!("plan: {}", manager.get_plan_name().await);
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::api::{AuthenticatedApi, PublicApi, RequestSigner, Scope};
use crate::config::{FlaConfig, PluginConfig};
use crate::errors::{LicenseError, LicenseResult};
use crate::license::{mask_license_key, License};
use crate::logging::{log_license_event, LicenseEvent};
use crate::site::SiteIdentity;
use crate::store::OptionStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationStatus {
    Activated,
    #[default]
    Deactivated,
}

/// Install payload returned by the activation endpoint, kept verbatim.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_plan_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for InstallPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallPayload")
            .field("install_public_key", &self.install_public_key)
            .field("install_secret_key", &"<redacted>")
            .field("license_plan_name", &self.license_plan_name)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Persisted activation state.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationRecord {
    #[serde(default)]
    pub license_key: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "id_string")]
    pub install_id: String,
    #[serde(default)]
    pub status: ActivationStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub install: InstallPayload,
}

impl fmt::Debug for ActivationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationRecord")
            .field("license_key", &mask_license_key(&self.license_key))
            .field("uid", &self.uid)
            .field("url", &self.url)
            .field("version", &self.version)
            .field("install_id", &self.install_id)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("install", &self.install)
            .finish()
    }
}

impl ActivationRecord {
    /// Install id, uid and license key are all present.
    pub fn is_well_formed(&self) -> bool {
        !self.install_id.is_empty() && !self.uid.is_empty() && !self.license_key.is_empty()
    }

    pub fn is_activated(&self) -> bool {
        self.is_well_formed() && self.status == ActivationStatus::Activated
    }
}

/// Server ids arrive as numbers or strings; both are kept as text.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(id_text(&value).unwrap_or_default())
}

/// Owns the activation record for the current site.
pub struct LicenseManager {
    plugin: PluginConfig,
    site: SiteIdentity,
    api: PublicApi,
    store: Arc<dyn OptionStore>,
}

impl fmt::Debug for LicenseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseManager")
            .field("plugin_id", &self.plugin.plugin_id)
            .field("site", &self.site)
            .field("api", &self.api.base_url())
            .finish()
    }
}

impl LicenseManager {
    pub fn new(config: &FlaConfig, store: Arc<dyn OptionStore>) -> LicenseResult<Self> {
        let site = SiteIdentity::from_config(&config.site)?;
        let api = PublicApi::new(&config.api, &config.site.user_agent())?;
        Ok(Self::with_api(config.plugin.clone(), site, api, store))
    }

    pub fn with_api(
        plugin: PluginConfig,
        site: SiteIdentity,
        api: PublicApi,
        store: Arc<dyn OptionStore>,
    ) -> Self {
        Self {
            plugin,
            site,
            api,
            store,
        }
    }

    pub fn plugin(&self) -> &PluginConfig {
        &self.plugin
    }

    pub fn site(&self) -> &SiteIdentity {
        &self.site
    }

    pub fn store(&self) -> &Arc<dyn OptionStore> {
        &self.store
    }

    fn option_name(&self) -> &str {
        &self.plugin.option_name
    }

    fn product_id(&self) -> Option<i64> {
        self.plugin.plugin_id.trim().parse().ok()
    }

    /// Load the stored record. An undecodable record reads as missing.
    pub async fn record(&self) -> LicenseResult<Option<ActivationRecord>> {
        let Some(raw) = self.store.get(self.option_name()).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                log::warn!("Ignoring malformed activation record: {}", e);
                Ok(None)
            }
        }
    }

    async fn save_record(&self, record: &ActivationRecord) -> LicenseResult<()> {
        self.store
            .set(self.option_name(), &serde_json::to_string(record)?)
            .await
    }

    fn rejected(&self, event: LicenseEvent, reason: &str) -> bool {
        log_license_event(event, &self.plugin.plugin_id, Some(reason));
        false
    }

    fn validated(&self, mut license: License, deactivation: bool) -> LicenseResult<Value> {
        let result = if deactivation {
            license.ensure_valid_for_deactivation()
        } else {
            license.ensure_valid_for_activation()
        };
        if let Err(e) = result {
            log_license_event(
                LicenseEvent::ValidationFailed,
                &self.plugin.plugin_id,
                Some(&license.error_message()),
            );
            return Err(e);
        }

        let mut payload = license.to_payload()?;
        // The product id travels in the endpoint path.
        if let Some(map) = payload.as_object_mut() {
            map.remove("product_id");
        }
        Ok(payload)
    }

    /// Exchange `license_key` for an install and persist the result.
    ///
    /// Returns `Ok(false)` for an empty key (nothing is sent) or when the
    /// service answers without an `install_id`. A previously stored install
    /// id is sent along so the service reuses the install; a stored record
    /// that cannot be read is overwritten.
    pub async fn activate(&self, license_key: &str) -> LicenseResult<bool> {
        if license_key.is_empty() {
            return Ok(false);
        }

        let uid = self.site.uid();
        let mut license = License::new();
        license.set_license_key(license_key)?;
        license.set_uid(&uid)?;
        license.set_url(self.site.url())?;
        if let Some(id) = self.product_id().filter(|id| *id != 0) {
            license.set_product_id(id)?;
        }
        match self.record().await {
            Ok(Some(previous)) => {
                if let Some(id) = previous.install_id.parse::<i64>().ok().filter(|id| *id > 0) {
                    license.set_install_id(id)?;
                }
            }
            Ok(None) => {}
            // A record sealed for another site is replaced below.
            Err(e) => log::warn!("Ignoring unreadable activation record: {}", e),
        }

        let mut payload = self.validated(license, false)?;
        if let Some(map) = payload.as_object_mut() {
            map.insert("version".to_string(), Value::from(self.plugin.version.clone()));
        }

        let endpoint = format!("v1/plugins/{}/activate.json", self.plugin.plugin_id.trim());
        let install = PublicApi::validate_response(self.api.post(&endpoint, &payload).await)?;

        let Some(install_id) = install.get("install_id").and_then(id_text) else {
            return Ok(self.rejected(LicenseEvent::ActivationRejected, "no install_id in response"));
        };

        let record = ActivationRecord {
            license_key: license_key.to_string(),
            uid,
            url: self.site.url().to_string(),
            version: self.plugin.version.clone(),
            install_id: install_id.clone(),
            status: ActivationStatus::Activated,
            created_at: Utc::now(),
            install: serde_json::from_value(install)?,
        };
        self.save_record(&record).await?;

        log_license_event(
            LicenseEvent::Activated,
            &self.plugin.plugin_id,
            Some(&format!("install_id={install_id}")),
        );
        Ok(true)
    }

    /// Release the install on the service.
    ///
    /// Returns `Ok(false)` without any request when there is no well-formed
    /// record or the record belongs to a different site. On success the
    /// stored license key is scrubbed; install id and uid stay.
    pub async fn deactivate(&self) -> LicenseResult<bool> {
        let Some(mut record) = self.record().await? else {
            return Ok(self.rejected(LicenseEvent::DeactivationRejected, "no activation record"));
        };
        if !record.is_well_formed() {
            return Ok(self.rejected(LicenseEvent::DeactivationRejected, "incomplete activation record"));
        }
        if record.uid != self.site.uid() {
            return Ok(self.rejected(LicenseEvent::DeactivationRejected, "site uid mismatch"));
        }

        let mut license = License::new();
        license.set_uid(&record.uid)?;
        license.set_license_key(&record.license_key)?;
        license.set_url(self.site.url())?;
        if let Some(id) = self.product_id().filter(|id| *id != 0) {
            license.set_product_id(id)?;
        }
        if let Some(id) = record.install_id.parse::<i64>().ok().filter(|id| *id != 0) {
            license.set_install_id(id)?;
        }
        let payload = self.validated(license, true)?;

        let endpoint = format!("v1/plugins/{}/deactivate.json", self.plugin.plugin_id.trim());
        let deleted = PublicApi::validate_response(self.api.post(&endpoint, &payload).await)?;

        if deleted.get("id").map_or(true, Value::is_null) {
            return Ok(self.rejected(LicenseEvent::DeactivationRejected, "no id in response"));
        }

        record.status = ActivationStatus::Deactivated;
        record.license_key.clear();
        self.save_record(&record).await?;

        log_license_event(
            LicenseEvent::Deactivated,
            &self.plugin.plugin_id,
            Some(&format!("install_id={}", record.install_id)),
        );
        Ok(true)
    }

    /// Deactivate, then activate again with the stored key.
    ///
    /// Not atomic: the deactivation outcome is ignored, and a license that
    /// expired in the meantime will not reactivate, leaving the site
    /// deactivated with its key scrubbed.
    pub async fn sync(&self) -> LicenseResult<bool> {
        if !self.is_activated().await {
            return Ok(false);
        }
        let license_key = self.get_license_key().await;
        if license_key.is_empty() {
            return Ok(false);
        }

        if let Err(e) = self.deactivate().await {
            log::debug!("Deactivation during sync failed: {}", e);
        }

        let activated = self.activate(&license_key).await?;
        if activated {
            log_license_event(LicenseEvent::Synced, &self.plugin.plugin_id, None);
        }
        Ok(activated)
    }

    /// Storage failures count as not activated.
    pub async fn is_activated(&self) -> bool {
        match self.record().await {
            Ok(Some(record)) => record.is_activated(),
            Ok(None) => false,
            Err(e) => {
                log::debug!("Activation record unreadable: {}", e);
                false
            }
        }
    }

    pub async fn get_license_key(&self) -> String {
        match self.record().await {
            Ok(Some(record)) => record.license_key,
            _ => String::new(),
        }
    }

    /// Plan name of the active license, `""` when not activated.
    pub async fn get_plan_name(&self) -> String {
        match self.record().await {
            Ok(Some(record)) if record.is_activated() => {
                record.install.license_plan_name.unwrap_or_default()
            }
            _ => String::new(),
        }
    }

    /// Whether the active plan is `plan`; `matching = false` inverts the test.
    pub async fn is_plan(&self, plan: &str, matching: bool) -> bool {
        let is_match = self.get_plan_name().await == plan;
        is_match == matching
    }

    pub async fn can_use_premium_code(&self) -> bool {
        self.is_activated().await
    }

    /// Remove the activation record.
    pub async fn delete_all_data(&self) -> LicenseResult<()> {
        self.store.delete(self.option_name()).await?;
        log_license_event(LicenseEvent::DataDeleted, &self.plugin.plugin_id, None);
        Ok(())
    }

    /// Install-scoped signed client built from the stored credentials.
    pub async fn install_api(&self) -> LicenseResult<AuthenticatedApi> {
        let record = self
            .record()
            .await?
            .filter(ActivationRecord::is_activated)
            .ok_or_else(|| LicenseError::Precondition("license is not activated".to_string()))?;

        let (Some(public_key), Some(secret_key)) = (
            record.install.install_public_key.filter(|k| !k.is_empty()),
            record.install.install_secret_key.filter(|k| !k.is_empty()),
        ) else {
            return Err(LicenseError::Precondition(
                "install credentials are missing".to_string(),
            ));
        };

        Ok(AuthenticatedApi::new(
            self.api.clone(),
            Scope::Install,
            RequestSigner::new(record.install_id, public_key, secret_key),
        ))
    }
}
