use fla::license::{License, MISSING_INSTALL_ID, MISSING_LICENSE_KEY, MISSING_SITE_UID};
use fla::LicenseError;

#[test]
fn product_without_key_reports_only_the_key() {
    let mut license = License::new();
    license.set_product_id(1524).unwrap();

    assert!(!license.is_valid_for_activation());
    assert_eq!(license.errors(), &[MISSING_LICENSE_KEY.to_string()]);
}

#[test]
fn deactivation_needs_uid_and_positive_install_id() {
    let mut license = License::from_pairs([
        ("plugin_id", "1524"),
        ("license_key", "sk_live_abcdef123"),
        ("install_id", "-1"),
    ])
    .unwrap();

    assert!(license.is_valid_for_activation());
    assert!(!license.is_valid_for_deactivation());
    assert_eq!(
        license.error_message(),
        format!("{MISSING_SITE_UID}\n{MISSING_INSTALL_ID}")
    );

    license.add("uid", "0123456789abcdef0123456789abcdef").unwrap();
    license.add("install_id", "77").unwrap();
    assert!(license.is_valid_for_deactivation());
}

#[test]
fn failed_predicate_converts_to_validation_error() {
    let mut license = License::new();
    let err = license.ensure_valid_for_deactivation().unwrap_err();
    match err {
        LicenseError::ValidationFailed(messages) => assert_eq!(messages.len(), 4),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn form_input_is_sanitized_before_validation() {
    let license = License::from_pairs([
        ("user_email", "  jane.doe@example.com\n"),
        ("first_name", "  Jane \t "),
        ("url", " https://example.com/shop "),
        ("user_id", "42abc"),
    ])
    .unwrap();

    assert_eq!(license.user_email(), "jane.doe@example.com");
    assert_eq!(license.first_name(), "Jane");
    assert_eq!(license.url(), "https://example.com/shop");
    assert_eq!(license.user_id(), Some(42));
}

#[test]
fn invalid_form_input_is_rejected() {
    let err = License::from_pairs([("user_email", "jane@")]).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: Invalid email format");

    let err = License::from_pairs([("theme_id", "zero")]).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: Invalid integer format");
}
