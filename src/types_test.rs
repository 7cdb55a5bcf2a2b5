// Unit tests for types module

use super::*;

#[test]
fn test_viewport_size_parse() {
    // Valid formats
    let size = ViewportSize::parse("1366x768").unwrap();
    assert_eq!(size.width, 1366);
    assert_eq!(size.height, 768);

    let size = ViewportSize::parse("800x600").unwrap();
    assert_eq!(size.width, 800);
    assert_eq!(size.height, 600);

    // Invalid formats
    assert!(ViewportSize::parse("1366").is_err());
    assert!(ViewportSize::parse("1366x").is_err());
    assert!(ViewportSize::parse("x768").is_err());
    assert!(ViewportSize::parse("abc x def").is_err());
    assert!(ViewportSize::parse("1366X768").is_err()); // uppercase X
}

#[test]
fn test_rgb_to_hex_opaque() {
    assert_eq!(rgb_to_hex("rgb(18, 52, 86)"), Some("#123456".to_string()));
    assert_eq!(rgb_to_hex("rgb(0, 0, 0)"), Some("#000000".to_string()));
    assert_eq!(
        rgb_to_hex("rgb(255, 255, 255)"),
        Some("#ffffff".to_string())
    );
}

#[test]
fn test_rgb_to_hex_alpha() {
    assert_eq!(
        rgb_to_hex("rgba(18, 52, 86, 9)"),
        Some("#12345609".to_string())
    );
    // Fully transparent is treated as no color
    assert_eq!(rgb_to_hex("rgba(0, 0, 0, 0)"), None);
}

#[test]
fn test_rgb_to_hex_transparent_sentinel_spacing() {
    // The sentinel is matched verbatim in the browser's spelling; without
    // the spaces the value parses like any other rgba color
    assert_eq!(rgb_to_hex("rgba(0, 0, 0, 0)"), None);
    assert_eq!(rgb_to_hex("rgba(0,0,0,0)"), Some("#00000000".to_string()));
}

#[test]
fn test_rgb_to_hex_unparsable() {
    assert_eq!(rgb_to_hex(""), None);
    assert_eq!(rgb_to_hex("transparent"), None);
    assert_eq!(rgb_to_hex("hsl(120, 50%, 50%)"), None);
    // Out-of-range channels are rejected rather than wrapped
    assert_eq!(rgb_to_hex("rgb(300, 0, 0)"), None);
}

#[test]
fn test_rgb_to_hex_fractional_alpha_integer_prefix() {
    // Only the integer part of the alpha component is captured
    assert_eq!(
        rgb_to_hex("rgba(18, 52, 86, 0.5)"),
        Some("#12345600".to_string())
    );
}

#[test]
fn test_rgb_to_hex_whitespace_variants() {
    // Browsers normalize to a single space, but tolerate none
    assert_eq!(rgb_to_hex("rgb(1,2,3)"), Some("#010203".to_string()));
    assert_eq!(rgb_to_hex("rgb(1,  2,  3)"), Some("#010203".to_string()));
}

#[test]
fn test_dialog_match_stored_form() {
    assert_eq!(DialogMatch::Frame.as_str(), "frame");
    assert_eq!(DialogMatch::Id.as_str(), "id");
    assert_eq!(DialogMatch::Class.as_str(), "class");
    assert_eq!(DialogMatch::None.as_str(), "");

    let record = CookieDialogRecord {
        visit_id: 1,
        kind: DialogMatch::None,
    };
    assert!(!record.found());
    assert_eq!(record.kind.as_str(), "");

    let record = CookieDialogRecord {
        visit_id: 1,
        kind: DialogMatch::Id,
    };
    assert!(record.found());
}

#[test]
fn test_consent_record_empty() {
    let record = ConsentDetectionRecord {
        visit_id: 7,
        allow: None,
        reject: None,
    };
    assert!(record.is_empty());

    let record = ConsentDetectionRecord {
        visit_id: 7,
        allow: Some(UiElement {
            text: "Akkoord".to_string(),
            width: 120,
            height: 40,
            bg_color: "rgb(0, 120, 215)".to_string(),
            bg_color_hex: rgb_to_hex("rgb(0, 120, 215)"),
        }),
        reject: None,
    };
    assert!(!record.is_empty());
    assert_eq!(
        record.allow.as_ref().unwrap().bg_color_hex.as_deref(),
        Some("#0078d7")
    );
}
