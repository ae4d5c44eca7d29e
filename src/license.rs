//! License entity: normalises and validates license fields before they are
//! sent to the licensing service.
//!
//! Setters validate on assignment and fail with
//! [`LicenseError::InvalidArgument`]. The two completeness predicates gate
//! activation and deactivation payloads and collect every missing field
//! instead of stopping at the first one.
//!
//! Loosely typed input (form fields, key/value pairs) goes through
//! [`License::add`], which looks the key up in an explicit field table; each
//! entry names the sanitizer applied before its typed setter runs.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

use crate::errors::{LicenseError, LicenseResult};

pub const MISSING_LICENSE_KEY: &str = "Missing License Key";
pub const MISSING_PRODUCT_ID: &str = "Missing Product Id";
pub const MISSING_SITE_UID: &str = "Missing Site UID";
pub const MISSING_INSTALL_ID: &str = "Missing InstallId";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct License {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    install_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    license_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip)]
    errors: Vec<String>,
}

/// Sanitizer plus typed setter for one input key.
#[derive(Clone, Copy)]
enum FieldSetter {
    Integer(fn(&mut License, i64) -> LicenseResult<()>),
    Email(fn(&mut License, &str) -> LicenseResult<()>),
    Url(fn(&mut License, &str) -> LicenseResult<()>),
    Text(fn(&mut License, &str) -> LicenseResult<()>),
}

struct FieldSpec {
    key: &'static str,
    setter: FieldSetter,
    is_set: fn(&License) -> bool,
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "license_key",
        setter: FieldSetter::Text(License::set_license_key),
        is_set: |l| !l.license_key().is_empty(),
    },
    FieldSpec {
        key: "product_id",
        setter: FieldSetter::Integer(License::set_product_id),
        is_set: |l| l.product_id.is_some(),
    },
    FieldSpec {
        key: "plugin_id",
        setter: FieldSetter::Integer(License::set_plugin_id),
        is_set: |l| l.product_id.is_some(),
    },
    FieldSpec {
        key: "theme_id",
        setter: FieldSetter::Integer(License::set_theme_id),
        is_set: |l| l.product_id.is_some(),
    },
    FieldSpec {
        key: "user_id",
        setter: FieldSetter::Integer(License::set_user_id),
        is_set: |l| l.user_id.is_some(),
    },
    FieldSpec {
        key: "user_email",
        setter: FieldSetter::Email(License::set_user_email),
        is_set: |l| !l.user_email().is_empty(),
    },
    FieldSpec {
        key: "first_name",
        setter: FieldSetter::Text(License::set_first_name),
        is_set: |l| !l.first_name().is_empty(),
    },
    FieldSpec {
        key: "last_name",
        setter: FieldSetter::Text(License::set_last_name),
        is_set: |l| !l.last_name().is_empty(),
    },
    FieldSpec {
        key: "install_id",
        setter: FieldSetter::Integer(License::set_install_id),
        is_set: |l| l.install_id.is_some(),
    },
    FieldSpec {
        key: "uid",
        setter: FieldSetter::Text(License::set_uid),
        is_set: |l| !l.uid().is_empty(),
    },
    FieldSpec {
        key: "url",
        setter: FieldSetter::Url(License::set_url),
        is_set: |l| !l.url().is_empty(),
    },
];

fn field(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.key == key)
}

impl License {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an entity from key/value pairs; see [`License::add`].
    pub fn from_pairs<I, K, V>(pairs: I) -> LicenseResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut license = Self::new();
        for (key, value) in pairs {
            license.add(key.as_ref(), value.as_ref())?;
        }
        Ok(license)
    }

    /// Sanitize `value` and assign it to the field named `key`.
    ///
    /// Empty values and unknown keys are ignored.
    pub fn add(&mut self, key: &str, value: &str) -> LicenseResult<()> {
        if value.is_empty() {
            return Ok(());
        }
        let Some(spec) = field(key) else {
            return Ok(());
        };
        match spec.setter {
            FieldSetter::Integer(set) => set(self, sanitize_integer(value)),
            FieldSetter::Email(set) => set(self, &sanitize_email(value)),
            FieldSetter::Url(set) => set(self, &sanitize_url(value)),
            FieldSetter::Text(set) => set(self, &sanitize_text(value)),
        }
    }

    /// Like [`License::add`], but only when the field has no value yet.
    pub fn set_if_missing(&mut self, key: &str, value: &str) -> LicenseResult<()> {
        match field(key) {
            Some(spec) if !(spec.is_set)(self) => self.add(key, value),
            _ => Ok(()),
        }
    }

    /// Snake-case map of every assigned field.
    pub fn to_payload(&self) -> LicenseResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    // === Completeness predicates ===

    fn activation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.license_key().is_empty() {
            errors.push(MISSING_LICENSE_KEY.to_string());
        }
        if self.product_id.unwrap_or(0) <= 0 {
            errors.push(MISSING_PRODUCT_ID.to_string());
        }
        errors
    }

    pub fn is_valid_for_activation(&mut self) -> bool {
        self.errors = self.activation_errors();
        self.errors.is_empty()
    }

    pub fn is_valid_for_deactivation(&mut self) -> bool {
        let mut errors = self.activation_errors();
        if self.uid().is_empty() {
            errors.push(MISSING_SITE_UID.to_string());
        }
        if self.install_id.unwrap_or(0) <= 0 {
            errors.push(MISSING_INSTALL_ID.to_string());
        }
        self.errors = errors;
        self.errors.is_empty()
    }

    /// Same as [`License::is_valid_for_activation`], as a `Result`.
    pub fn ensure_valid_for_activation(&mut self) -> LicenseResult<()> {
        if self.is_valid_for_activation() {
            Ok(())
        } else {
            Err(LicenseError::ValidationFailed(self.errors.clone()))
        }
    }

    /// Same as [`License::is_valid_for_deactivation`], as a `Result`.
    pub fn ensure_valid_for_deactivation(&mut self) -> LicenseResult<()> {
        if self.is_valid_for_deactivation() {
            Ok(())
        } else {
            Err(LicenseError::ValidationFailed(self.errors.clone()))
        }
    }

    /// Messages from the last predicate that ran.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn error_message(&self) -> String {
        self.errors.join("\n")
    }

    // === Getters and setters with validation ===

    pub fn license_key(&self) -> &str {
        self.license_key.as_deref().unwrap_or_default()
    }

    pub fn set_license_key(&mut self, license_key: &str) -> LicenseResult<()> {
        validate_string(license_key)?;
        self.license_key = Some(license_key.to_string());
        Ok(())
    }

    pub fn product_id(&self) -> Option<i64> {
        self.product_id
    }

    pub fn set_product_id(&mut self, product_id: i64) -> LicenseResult<()> {
        validate_integer(product_id)?;
        self.product_id = Some(product_id);
        Ok(())
    }

    pub fn set_plugin_id(&mut self, plugin_id: i64) -> LicenseResult<()> {
        self.set_product_id(plugin_id)
    }

    pub fn set_theme_id(&mut self, theme_id: i64) -> LicenseResult<()> {
        self.set_product_id(theme_id)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn set_user_id(&mut self, user_id: i64) -> LicenseResult<()> {
        validate_integer(user_id)?;
        self.user_id = Some(user_id);
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    pub fn set_url(&mut self, url: &str) -> LicenseResult<()> {
        validate_url(url)?;
        self.url = Some(url.to_string());
        Ok(())
    }

    pub fn uid(&self) -> &str {
        self.uid.as_deref().unwrap_or_default()
    }

    pub fn set_uid(&mut self, uid: &str) -> LicenseResult<()> {
        validate_string(uid)?;
        self.uid = Some(uid.to_string());
        Ok(())
    }

    pub fn user_email(&self) -> &str {
        self.user_email.as_deref().unwrap_or_default()
    }

    pub fn set_user_email(&mut self, user_email: &str) -> LicenseResult<()> {
        validate_email(user_email)?;
        self.user_email = Some(user_email.to_string());
        Ok(())
    }

    pub fn first_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or_default()
    }

    pub fn set_first_name(&mut self, first_name: &str) -> LicenseResult<()> {
        validate_string(first_name)?;
        self.first_name = Some(first_name.to_string());
        Ok(())
    }

    pub fn last_name(&self) -> &str {
        self.last_name.as_deref().unwrap_or_default()
    }

    pub fn set_last_name(&mut self, last_name: &str) -> LicenseResult<()> {
        validate_string(last_name)?;
        self.last_name = Some(last_name.to_string());
        Ok(())
    }

    pub fn install_id(&self) -> Option<i64> {
        self.install_id
    }

    pub fn set_install_id(&mut self, install_id: i64) -> LicenseResult<()> {
        validate_integer(install_id)?;
        self.install_id = Some(install_id);
        Ok(())
    }
}

// === Validators ===

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
            .expect("email pattern compiles")
    })
}

fn validate_string(value: &str) -> LicenseResult<()> {
    if value.is_empty() {
        return Err(LicenseError::InvalidArgument(
            "String cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(value: &str) -> LicenseResult<()> {
    if !email_regex().is_match(value) || value.contains("..") {
        return Err(LicenseError::InvalidArgument(
            "Invalid email format".to_string(),
        ));
    }
    Ok(())
}

fn validate_url(value: &str) -> LicenseResult<()> {
    match reqwest::Url::parse(value) {
        Ok(url) if url.has_host() => Ok(()),
        _ => Err(LicenseError::InvalidArgument(
            "Invalid URL format".to_string(),
        )),
    }
}

/// Zero is rejected, the value an unparsable input casts to.
fn validate_integer(value: i64) -> LicenseResult<()> {
    if value == 0 {
        return Err(LicenseError::InvalidArgument(
            "Invalid integer format".to_string(),
        ));
    }
    Ok(())
}

// === Sanitizers ===

/// Leading optional sign and digits; anything unparsable becomes 0.
fn sanitize_integer(value: &str) -> i64 {
    let trimmed = value.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

fn sanitize_email(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.@-".contains(*c))
        .collect()
}

fn sanitize_url(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect()
}

/// Strip markup, collapse whitespace runs, trim.
fn sanitize_text(value: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern compiles"));
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").expect("space pattern compiles"));

    let stripped = tags.replace_all(value, "");
    spaces.replace_all(&stripped, " ").trim().to_string()
}

/// Mask a license key for display: first 6 and last 3 characters stay
/// visible; keys shorter than 9 characters are fully masked.
pub fn mask_license_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let len = chars.len();
    if len < 9 {
        return "*".repeat(len);
    }
    let start: String = chars[..6].iter().collect();
    let end: String = chars[len - 3..].iter().collect();
    format!("{start}{}{end}", "*".repeat(len - 9))
}
