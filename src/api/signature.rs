//! Request signing for the authenticated API.
//!
//! The string to sign is five newline-joined lines:
//!
//! ```text
//! METHOD
//! content-md5        (hex MD5 of the JSON body, empty without a body)
//! content-type       (application/json for POST/PUT, otherwise empty)
//! date               (RFC 2822)
//! /v1/<scope>s/<id>/<endpoint>
//! ```
//!
//! The HMAC-SHA256 of that string, keyed by the secret key, is rendered as
//! lowercase hex, base64-encoded, and made URL-safe (`+` → `-`, `/` → `_`,
//! padding stripped). The base64 step runs over the hex text, not the raw
//! digest bytes; the service verifies exactly that.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use reqwest::Method;
use ring::hmac;
use std::fmt;

/// Content type signed for requests that carry a JSON body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Authorization scheme token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// Distinct public and secret keys.
    Fs,
    /// Public-key-only scheme: the public key doubles as the secret.
    Fsp,
}

impl AuthScheme {
    pub fn for_keys(public_key: &str, secret_key: &str) -> Self {
        if public_key == secret_key {
            AuthScheme::Fsp
        } else {
            AuthScheme::Fs
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Fs => "FS",
            AuthScheme::Fsp => "FSP",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headers produced for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub authorization: String,
    pub content_md5: Option<String>,
}

impl SignedHeaders {
    /// Header name/value pairs, in the order they are sent.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("Date", self.date.clone()),
            ("Authorization", self.authorization.clone()),
        ];
        if let Some(md5) = &self.content_md5 {
            pairs.push(("Content-MD5", md5.clone()));
        }
        pairs
    }
}

/// Credentials of the entity a request is signed for.
#[derive(Clone)]
pub struct RequestSigner {
    id: String,
    public_key: String,
    secret_key: String,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("id", &self.id)
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl RequestSigner {
    pub fn new(
        id: impl Into<String>,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            public_key: public_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scheme(&self) -> AuthScheme {
        AuthScheme::for_keys(&self.public_key, &self.secret_key)
    }

    /// Sign a request at the current time.
    pub fn sign_now(&self, method: &Method, resource_path: &str, body: Option<&str>) -> SignedHeaders {
        self.sign(method, resource_path, body, Utc::now())
    }

    /// Sign a request for an explicit date.
    ///
    /// `body` is the exact JSON text that goes on the wire; `None` or an
    /// empty string means no body and no `Content-MD5`.
    pub fn sign(
        &self,
        method: &Method,
        resource_path: &str,
        body: Option<&str>,
        date: DateTime<Utc>,
    ) -> SignedHeaders {
        let date = date.to_rfc2822();
        let content_md5 = body.filter(|b| !b.is_empty()).map(content_md5);
        let canonical = canonical_string(
            method,
            content_md5.as_deref().unwrap_or_default(),
            &date,
            resource_path,
        );
        let signature = sign_string(&canonical, &self.secret_key);

        SignedHeaders {
            authorization: format!(
                "{} {}:{}:{}",
                self.scheme(),
                self.id,
                self.public_key,
                signature
            ),
            date,
            content_md5,
        }
    }
}

/// Lowercase hex MD5 of a request body.
pub fn content_md5(body: &str) -> String {
    hex::encode(Md5::digest(body.as_bytes()))
}

/// Content type that takes part in the signature for `method`.
pub fn signed_content_type(method: &Method) -> &'static str {
    if *method == Method::POST || *method == Method::PUT {
        JSON_CONTENT_TYPE
    } else {
        ""
    }
}

/// Build the newline-joined string that gets signed.
pub fn canonical_string(method: &Method, content_md5: &str, date: &str, resource_path: &str) -> String {
    [
        method.as_str().to_ascii_uppercase().as_str(),
        content_md5,
        signed_content_type(method),
        date,
        resource_path,
    ]
    .join("\n")
}

/// HMAC-SHA256 over `canonical`, hex, then URL-safe unpadded base64.
pub fn sign_string(canonical: &str, secret_key: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret_key.as_bytes());
    let tag = hmac::sign(&key, canonical.as_bytes());
    URL_SAFE_NO_PAD.encode(hex::encode(tag.as_ref()))
}
