//! # consentprobe
#![allow(clippy::uninlined_format_args)]
//!
//! Browser automation layer for consent-dialog and dark-pattern measurement
//! crawls.
//!
//! Drives a WebDriver-controlled Firefox through a list of sites and records,
//! per visit, whether a cookie consent interface is present, what its accept
//! and reject elements look like, which CMP answers the IAB TCF ping, and
//! optional page captures (screenshots, full-page stitched screenshots, flat
//! and recursive page-source dumps). Results land in a SQLite database next
//! to the captured artifacts.
//!
//! ## Prerequisites
//!
//! A running geckodriver:
//!
//! ```bash
//! geckodriver --port 4444
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Crawl a site list (CSV rank,domain) with the default visit:
//! # load the page, search for consent accept/reject elements, finalize
//! consentprobe crawl sites.csv
//!
//! # Record everything: CMP ping, dialog heuristics, captures
//! consentprobe crawl sites.csv \
//!     --ping-cmp --detect-cookie-dialog \
//!     --screenshot --full-page-screenshot \
//!     --dump-source --recursive-dump-source
//!
//! # Browse three same-site links per visit with bot mitigation gestures
//! consentprobe crawl sites.csv --browse --num-links 3 --bot-mitigation
//!
//! # Search phrases in a different language order
//! consentprobe crawl sites.csv --languages en,nl
//!
//! # Single diagnostic visit against one URL
//! consentprobe visit http://www.example.com --screenshot
//! ```
//!
//! ## Data Layout
//!
//! All output hangs off `--data-dir` (default `crawl-data/`):
//!
//! ```text
//! crawl-data/
//!   crawl-data.sqlite     site_visits, dark_patterns, ping_cmp, cookie_dialog
//!   screenshots/          {visit}-{urlhash}[-suffix].png and parts/
//!   sources/              {visit}-{urlhash}[-suffix].html / .json.gz
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use consentprobe::{Session, SessionConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let session = Session::connect(&SessionConfig {
//!     webdriver_url: "http://localhost:4444".to_string(),
//!     headless: true,
//!     viewport: None,
//! })
//! .await?;
//!
//! session.goto("http://www.example.com").await?;
//! let source = session.page_source().await?;
//! session.close().await?;
//! # drop(source);
//! # Ok(())
//! # }
//! ```

/// Screenshot capture and full-page stitching
pub mod capture;

/// Per-visit command set and dispatcher
pub mod command;

/// Consent, CMP, and cookie-dialog detectors
pub mod detect;

/// Crawl error classification and exit codes
pub mod errors;

/// Heuristic consent-element search
pub mod locator;

/// Phrase lists, dialog markers, and the CMP registry
pub mod resources;

/// WebDriver session control
pub mod session;

/// Visit lifecycle signalling to an aggregator
pub mod signal;

/// Page source dumps, flat and recursive
pub mod snapshot;

/// SQLite result storage
pub mod store;

/// Shared record and measurement types
pub mod types;

pub use command::{Command, CrawlConfig};
pub use errors::CrawlerError;
pub use locator::SearchKind;
pub use resources::Resources;
pub use session::{Session, SessionConfig};
pub use signal::{LifecycleChannel, LifecycleSignal};
pub use snapshot::FrameNode;
pub use store::ResultStore;
pub use types::{
    CmpPingRecord, ConsentDetectionRecord, CookieDialogRecord, DialogMatch, UiElement,
    ViewportSize, Visit,
};
