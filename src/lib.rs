//! fla - license activation and signed update checks for premium CMS plugins
//!
//! An administrator's license key is exchanged with the licensing service for
//! an *install*; the install credentials are stored per site and later sign
//! requests for release metadata.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fla::{config::FlaConfig, store, site::SiteIdentity, LicenseManager, UpdateChecker};
//!
//! let config = FlaConfig::load()?;
//! let site = SiteIdentity::from_config(&config.site)?;
//! let store = store::from_config(&config.storage, &site)?;
//! let manager = Arc::new(LicenseManager::new(&config, store)?);
//!
//! manager.activate("sk_live_...").await?;
//! let updates = UpdateChecker::new(manager.clone(), &config);
//! if let Some(offer) = updates.check_for_update().await {
//!     println!("{} is available", offer.new_version);
//! }
//! ```

// Core modules
pub mod config;
pub mod encryption;
pub mod errors;
pub mod license;
pub mod logging;
pub mod site;

// Licensing service clients
pub mod api;

// Persistence
pub mod store;

// Activation state and updates
pub mod activation;
pub mod updates;

pub use activation::{ActivationRecord, ActivationStatus, LicenseManager};
pub use errors::{LicenseError, LicenseResult};
pub use license::License;
pub use updates::UpdateChecker;
