use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identity of one page visit, assigned by the caller before the visit starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    /// Unique visit identifier, shared with the external aggregator
    pub visit_id: i64,
    /// Identifier of the browser instance performing the visit
    pub browser_id: i64,
    /// The site URL this visit was scheduled for
    pub site_url: String,
}

/// Browser viewport dimensions
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ViewportSize {
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
}

impl ViewportSize {
    /// Parse viewport size from "WIDTHxHEIGHT" format (e.g., "1366x768")
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('x').collect();
        if parts.len() != 2 {
            anyhow::bail!("Invalid viewport format. Use WIDTHxHEIGHT (e.g., 1366x768)");
        }

        let width = parts[0]
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid width in viewport size"))?;
        let height = parts[1]
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid height in viewport size"))?;

        Ok(ViewportSize { width, height })
    }
}

/// A visible consent-interface element accepted by the candidate filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiElement {
    /// Rendered text content (always shorter than 50 characters)
    pub text: String,
    /// Rendered width in pixels, rounded to the nearest integer
    pub width: u32,
    /// Rendered height in pixels, rounded to the nearest integer
    pub height: u32,
    /// Raw computed background-color string as reported by the browser
    pub bg_color: String,
    /// Hex form of the background color, when the raw string was convertible
    pub bg_color_hex: Option<String>,
}

/// Outcome of a dark-pattern detection pass over one page
#[derive(Debug, Clone)]
pub struct ConsentDetectionRecord {
    pub visit_id: i64,
    /// The accept-style element, if one survived the filter
    pub allow: Option<UiElement>,
    /// The reject-style element, if one survived the filter
    pub reject: Option<UiElement>,
}

impl ConsentDetectionRecord {
    /// True when neither side of the dialog was found
    pub fn is_empty(&self) -> bool {
        self.allow.is_none() && self.reject.is_none()
    }
}

/// Result of a `__tcfapi` ping against the page's consent-management platform
#[derive(Debug, Clone)]
pub struct CmpPingRecord {
    pub visit_id: i64,
    /// CMP vendor id from the ping payload
    pub cmp_id: Option<i64>,
    /// Vendor name resolved from the CMP list, empty when unknown
    pub cmp_name: String,
    /// TCF policy version the CMP reports
    pub policy_version: Option<i64>,
    /// Whether the CMP considers GDPR applicable to this visit
    pub gdpr_applies: Option<bool>,
}

/// How the cookie-dialog detector matched, in cascade order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogMatch {
    /// Matched an iframe, either by src or by inner banner markup
    Frame,
    /// Matched a known element id on the top-level document
    Id,
    /// Matched a known class attribute on the top-level document
    Class,
    /// No dialog found
    None,
}

impl DialogMatch {
    /// Stored form of the match kind; empty exactly when nothing matched
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogMatch::Frame => "frame",
            DialogMatch::Id => "id",
            DialogMatch::Class => "class",
            DialogMatch::None => "",
        }
    }
}

/// Presence verdict for a cookie dialog; one row is written per visit
#[derive(Debug, Clone)]
pub struct CookieDialogRecord {
    pub visit_id: i64,
    pub kind: DialogMatch,
}

impl CookieDialogRecord {
    pub fn found(&self) -> bool {
        self.kind != DialogMatch::None
    }
}

/// Convert a computed CSS color string to hex notation.
///
/// Handles `rgb(r, g, b)` and `rgba(r, g, b, a)` with integer components; a
/// fractional alpha contributes only its integer part. Fully transparent
/// `rgba(0, 0, 0, 0)` and any other syntax (named colors, hsl) yield `None`
/// rather than an error.
pub fn rgb_to_hex(color: &str) -> Option<String> {
    if color == "rgba(0, 0, 0, 0)" {
        return None;
    }

    let rgb = Regex::new(r"rgb\((\d+),\s*(\d+),\s*(\d+)").ok()?;
    if let Some(caps) = rgb.captures(color) {
        let r = caps[1].parse::<u8>().ok()?;
        let g = caps[2].parse::<u8>().ok()?;
        let b = caps[3].parse::<u8>().ok()?;
        return Some(format!("#{:02x}{:02x}{:02x}", r, g, b));
    }

    let rgba = Regex::new(r"rgba\((\d+),\s*(\d+),\s*(\d+),\s*(\d+)").ok()?;
    if let Some(caps) = rgba.captures(color) {
        let r = caps[1].parse::<u8>().ok()?;
        let g = caps[2].parse::<u8>().ok()?;
        let b = caps[3].parse::<u8>().ok()?;
        let a = caps[4].parse::<u8>().ok()?;
        return Some(format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a));
    }

    None
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
