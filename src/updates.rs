//! Signed update checks for an activated plugin.
//!
//! Release metadata comes from the install-scoped `updates/latest.json`
//! endpoint and is cached for a day under `<option_name>_update_data`. The
//! host's update machinery calls in through [`UpdateChecker::check_for_update`],
//! [`UpdateChecker::plugin_information`] and
//! [`UpdateChecker::on_upgrade_complete`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::activation::LicenseManager;
use crate::api::http::is_empty_payload;
use crate::api::AuthenticatedApi;
use crate::config::{FlaConfig, SiteConfig};
use crate::errors::LicenseResult;
use crate::logging::{log_license_event, LicenseEvent};

pub const LATEST_ENDPOINT: &str = "/updates/latest.json";

/// Latest release as reported by the licensing service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub version: String,
    /// Download URL of the release package
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub requires_platform_version: Option<String>,
    #[serde(default)]
    pub requires_programming_language_version: Option<String>,
    #[serde(default)]
    pub tested_up_to_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Details shown in the host's "view details" dialog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginInformation {
    pub slug: String,
    pub name: String,
    pub author: String,
    pub sections: BTreeMap<String, String>,
    pub version: String,
    pub last_updated: Option<String>,
    pub requires: Option<String>,
    pub requires_php: Option<String>,
    pub tested: Option<String>,
    pub download_link: Option<String>,
}

/// Update entry handed to the host when a newer compatible release exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOffer {
    pub slug: String,
    pub plugin: String,
    pub new_version: String,
    pub tested: Option<String>,
    pub package: Option<String>,
}

pub struct UpdateChecker {
    manager: Arc<LicenseManager>,
    site: SiteConfig,
    cache_ttl: Duration,
}

impl UpdateChecker {
    pub fn new(manager: Arc<LicenseManager>, config: &FlaConfig) -> Self {
        Self::with_ttl(
            manager,
            config.site.clone(),
            Duration::from_secs(config.updates.cache_ttl_secs),
        )
    }

    pub fn with_ttl(manager: Arc<LicenseManager>, site: SiteConfig, cache_ttl: Duration) -> Self {
        Self {
            manager,
            site,
            cache_ttl,
        }
    }

    pub fn cache_key(&self) -> String {
        format!("{}_update_data", self.manager.plugin().option_name)
    }

    /// Fetch the latest release; `None` when not activated or when the
    /// service has nothing newer.
    pub async fn get_latest(&self) -> LicenseResult<Option<Release>> {
        if !self.manager.is_activated().await {
            return Ok(None);
        }

        let api = self.manager.install_api().await?;
        let params = json!({
            "is_premium": "true",
            "newer_than": self.manager.plugin().version,
        });
        let body = AuthenticatedApi::validate_response(api.get(LATEST_ENDPOINT, &params).await)?;
        if is_empty_payload(&body) {
            return Ok(None);
        }

        let release: Release = serde_json::from_value(body)?;
        if release.version.is_empty() {
            return Ok(None);
        }

        log_license_event(
            LicenseEvent::UpdateChecked,
            &self.manager.plugin().plugin_id,
            Some(&format!("version={}", release.version)),
        );
        Ok(Some(release))
    }

    /// Cached [`UpdateChecker::get_latest`]; `force_check` drops the cache
    /// first. Only releases are cached, never an empty answer.
    pub async fn get_update_data(&self, force_check: bool) -> LicenseResult<Option<Release>> {
        let store = self.manager.store();
        let key = self.cache_key();

        if force_check {
            store.delete_transient(&key).await?;
        }

        if let Some(cached) = store.get_transient(&key).await? {
            match serde_json::from_str::<Release>(&cached) {
                Ok(release) => return Ok(Some(release)),
                Err(e) => log::debug!("Discarding cached update data: {}", e),
            }
        }

        let latest = self.get_latest().await?;
        if let Some(release) = &latest {
            store
                .set_transient(&key, &serde_json::to_string(release)?, self.cache_ttl)
                .await?;
        }
        Ok(latest)
    }

    /// Drop cached update data once a plugin update has been installed.
    pub async fn on_upgrade_complete(&self, action: &str, kind: &str) -> LicenseResult<bool> {
        if action != "update" || kind != "plugin" {
            return Ok(false);
        }
        self.manager.store().delete_transient(&self.cache_key()).await?;
        log_license_event(
            LicenseEvent::UpdateCachePurged,
            &self.manager.plugin().plugin_id,
            None,
        );
        Ok(true)
    }

    async fn update_data_or_none(&self) -> Option<Release> {
        match self.get_update_data(false).await {
            Ok(release) => release,
            Err(e) => {
                log::debug!("Update data unavailable: {}", e);
                None
            }
        }
    }

    /// Plugin details for our slug; `None` for any other request.
    pub async fn plugin_information(&self, action: &str, slug: &str) -> Option<PluginInformation> {
        let plugin = self.manager.plugin();
        if action != "plugin_information" || slug != plugin.slug {
            return None;
        }
        if !self.manager.is_activated().await {
            return None;
        }
        let release = self.update_data_or_none().await?;

        let mut sections = BTreeMap::new();
        sections.insert(
            "description".to_string(),
            format!("Upgrade {} to latest.", plugin.name),
        );

        Some(PluginInformation {
            slug: plugin.slug.clone(),
            name: plugin.name.clone(),
            author: plugin.author.clone(),
            sections,
            version: release.version,
            last_updated: release.updated.or(release.created),
            requires: release.requires_platform_version,
            requires_php: release.requires_programming_language_version,
            tested: release.tested_up_to_version,
            download_link: release.url,
        })
    }

    /// Offer the cached release when it is newer than the installed version
    /// and its platform and language requirements are met by the host.
    pub async fn check_for_update(&self) -> Option<UpdateOffer> {
        if !self.manager.is_activated().await {
            return None;
        }
        let release = self.update_data_or_none().await?;
        let plugin = self.manager.plugin();

        let newer = compare_versions(&plugin.version, &release.version) == Ordering::Less;
        let platform_ok =
            requirement_met(release.requires_platform_version.as_deref(), &self.site.platform_version);
        let language_ok = requirement_met(
            release.requires_programming_language_version.as_deref(),
            &self.site.language_version,
        );
        if !(newer && platform_ok && language_ok) {
            return None;
        }

        Some(UpdateOffer {
            slug: plugin.slug.clone(),
            plugin: plugin.basename.clone(),
            new_version: release.version,
            tested: release.tested_up_to_version,
            package: release.url,
        })
    }
}

/// A missing or blank requirement is always met.
fn requirement_met(required: Option<&str>, available: &str) -> bool {
    match required.map(str::trim).filter(|r| !r.is_empty()) {
        Some(required) => compare_versions(required, available) != Ordering::Greater,
        None => true,
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Compare dotted versions component by component.
///
/// Components split on `.`, `-` and `+`. Two numeric components compare as
/// numbers, anything else compares as text, and a text component (a
/// pre-release tag) sorts below a numeric one. Missing components count as
/// `0`, so `1.2` equals `1.2.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.trim()
            .split(['.', '-', '+'])
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    };
    let (left, right) = (split(a), split(b));

    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).map_or("0", String::as_str);
        let r = right.get(i).map_or("0", String::as_str);
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_components_compare_as_numbers() {
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "10.0"), Ordering::Less);
    }

    #[test]
    fn missing_components_are_zero() {
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2.0.1", "1.2"), Ordering::Greater);
    }

    #[test]
    fn prerelease_sorts_below_release() {
        assert_eq!(compare_versions("1.0-beta", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0-alpha", "1.0-beta"), Ordering::Less);
    }

    #[test]
    fn requirements() {
        assert!(requirement_met(None, "6.5"));
        assert!(requirement_met(Some(""), "6.5"));
        assert!(requirement_met(Some("6.5"), "6.5"));
        assert!(requirement_met(Some("6.0"), "6.5"));
        assert!(!requirement_met(Some("7.0"), "6.5"));
    }

    #[test]
    fn release_tolerates_nulls_and_extra_fields() {
        let release: Release = serde_json::from_value(json!({
            "version": "1.2.0",
            "url": "https://cdn.example.com/p.zip",
            "updated": null,
            "created": "2026-01-01 00:00:00",
            "requires_platform_version": null,
            "has_free": false
        }))
        .unwrap();

        assert_eq!(release.version, "1.2.0");
        assert_eq!(release.updated, None);
        assert_eq!(release.extra["has_free"], false);
    }

    #[test]
    fn null_version_reads_as_empty() {
        let release: Release =
            serde_json::from_value(json!({"version": null, "url": null})).unwrap();
        assert!(release.version.is_empty());
    }
}
