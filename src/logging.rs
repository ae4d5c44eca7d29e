//! Structured license event logging.
//!
//! Events carry the event name and the plugin id on a span. License keys and
//! secret keys never appear in log output; pass a masked key in `details`
//! when one is needed.
//!
//! ```rust,ignore
//! use fla::logging::{log_license_event, LicenseEvent};
//!
//! log_license_event(LicenseEvent::Activated, "1524", Some("install_id=77"));
//! ```

use tracing::{info, info_span, warn, Level};

use crate::config::LoggingConfig;

/// License state change event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseEvent {
    /// Activation accepted by the service
    Activated,
    /// Activation request sent but no install came back
    ActivationRejected,
    /// Install released on the service
    Deactivated,
    /// Deactivation skipped or refused
    DeactivationRejected,
    /// Deactivate + activate cycle finished
    Synced,
    /// Field validation failed before sending
    ValidationFailed,
    /// Update metadata fetched from the service
    UpdateChecked,
    /// Cached update metadata dropped
    UpdateCachePurged,
    /// All stored license data removed
    DataDeleted,
}

impl std::fmt::Display for LicenseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LicenseEvent::Activated => "activated",
            LicenseEvent::ActivationRejected => "activation_rejected",
            LicenseEvent::Deactivated => "deactivated",
            LicenseEvent::DeactivationRejected => "deactivation_rejected",
            LicenseEvent::Synced => "synced",
            LicenseEvent::ValidationFailed => "validation_failed",
            LicenseEvent::UpdateChecked => "update_checked",
            LicenseEvent::UpdateCachePurged => "update_cache_purged",
            LicenseEvent::DataDeleted => "data_deleted",
        };
        write!(f, "{}", s)
    }
}

impl LicenseEvent {
    fn is_failure(&self) -> bool {
        matches!(
            self,
            LicenseEvent::ActivationRejected
                | LicenseEvent::DeactivationRejected
                | LicenseEvent::ValidationFailed
        )
    }
}

/// Log a license state change.
///
/// # Arguments
///
/// * `event` - The type of license event
/// * `plugin_id` - The licensed plugin's id
/// * `details` - Optional free-form details (never a raw key)
pub fn log_license_event(event: LicenseEvent, plugin_id: &str, details: Option<&str>) {
    let span = info_span!(
        "license_event",
        event = %event,
        plugin_id = %plugin_id,
    );
    let _enter = span.enter();

    if event.is_failure() {
        if let Some(d) = details {
            warn!(reason = %d, "License event occurred");
        } else {
            warn!("License event occurred");
        }
    } else if let Some(d) = details {
        info!(details = %d, "License event occurred");
    } else {
        info!("License event occurred");
    }
}

/// Parse a configured level name; unknown names fall back to `INFO`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global fmt subscriber when logging is enabled.
///
/// Returns `false` when logging is disabled or a subscriber is already set.
/// Records emitted through the `log` facade are bridged into the subscriber.
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.enabled {
        return false;
    }
    tracing_subscriber::fmt()
        .with_max_level(parse_level(&config.level))
        .with_target(false)
        .try_init()
        .is_ok()
}
