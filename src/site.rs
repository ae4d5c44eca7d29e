//! Site identity and the UID that binds an install to one site.
//!
//! The licensing service never receives a stable identifier derived from
//! anything but the site itself: host, numeric blog id, and the path when
//! the site lives below the domain root, hashed into a 32-char hex token.

use md5::{Digest, Md5};
use reqwest::Url;

use crate::config::SiteConfig;
use crate::errors::{LicenseError, LicenseResult};

/// The site a license binding belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity {
    url: String,
    host: String,
    path: Option<String>,
    blog_id: u64,
}

impl SiteIdentity {
    /// Parse and validate a site URL.
    pub fn new(url: &str, blog_id: u64) -> LicenseResult<Self> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| LicenseError::InvalidArgument(format!("invalid site URL '{url}': {e}")))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| LicenseError::InvalidArgument(format!("site URL '{url}' has no host")))?
            .to_string();

        // `Url` normalises a bare origin to "/", which is not a sub-path.
        let path = Some(parsed.path())
            .filter(|p| !p.is_empty() && *p != "/")
            .map(str::to_string);

        Ok(Self {
            url: url.trim().trim_end_matches('/').to_string(),
            host,
            path,
            blog_id,
        })
    }

    pub fn from_config(config: &SiteConfig) -> LicenseResult<Self> {
        Self::new(&config.url, config.blog_id)
    }

    /// Site URL as sent to the licensing service.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn blog_id(&self) -> u64 {
        self.blog_id
    }

    /// Deterministic site fingerprint: `md5("host-blog_id[-path]")`.
    pub fn uid(&self) -> String {
        let blog_id = self.blog_id.to_string();
        let mut parts = vec![self.host.as_str(), blog_id.as_str()];
        if let Some(path) = &self.path {
            parts.push(path);
        }
        hex::encode(Md5::digest(parts.join("-").as_bytes()))
    }
}
