use anyhow::{Context, Result};
use fantoccini::Locator;
use fantoccini::elements::Element;
use tracing::debug;

use crate::session::Session;
use crate::types::{UiElement, rgb_to_hex};

/// Candidate text at or above this many characters is considered page copy,
/// not a button label
const MAX_TEXT_CHARS: usize = 50;

/// Substrings that mark a phrase match as a negated variant ("do not accept")
const NEGATION_MARKERS: [&str; 3] = ["niet", "not", "..."];

/// An iframe whose src contains one of these is treated as the consent frame
const FRAME_SRC_MARKERS: [&str; 2] = ["cmp", "consent"];

/// Which side of the consent dialog a search targets.
///
/// The two sides are not symmetric: accept searches exclude negated phrasing
/// (a reject button often quotes the accept wording) and fall back to a bare
/// "ok" button, reject searches do neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Accept,
    Reject,
}

impl SearchKind {
    fn excludes_negations(&self) -> bool {
        matches!(self, SearchKind::Accept)
    }

    fn has_ok_fallback(&self) -> bool {
        matches!(self, SearchKind::Accept)
    }
}

/// Run the full locator for one phrase list: the top-level document first,
/// then the consent iframe fallback
pub async fn find_consent_element(
    session: &Session,
    kind: SearchKind,
    phrases: &[String],
) -> Result<Option<UiElement>> {
    if let Some(found) = search_current_context(session, kind, phrases).await? {
        return Ok(Some(found));
    }
    search_in_iframe(session, kind, phrases).await
}

/// Search whatever browsing context is currently active.
///
/// Phrase queries and candidate reads that fail are skipped; only the final
/// accept fallback propagates driver errors, matching the one query that runs
/// outside the per-phrase recovery.
pub async fn search_current_context(
    session: &Session,
    kind: SearchKind,
    phrases: &[String],
) -> Result<Option<UiElement>> {
    for phrase in phrases {
        let candidates = match session
            .client
            .find_all(Locator::XPath(&phrase_xpath(kind, phrase)))
            .await
        {
            Ok(elements) => elements,
            Err(e) => {
                debug!("Phrase query for {:?} failed: {}", phrase, e);
                continue;
            }
        };

        let candidates = if candidates.is_empty() {
            match session
                .client
                .find_all(Locator::XPath(&broadened_xpath(phrase)))
                .await
            {
                Ok(elements) => elements,
                Err(e) => {
                    debug!("Broadened query for {:?} failed: {}", phrase, e);
                    continue;
                }
            }
        } else {
            candidates
        };

        if let Some(found) = first_qualifying(session, candidates).await {
            return Ok(Some(found));
        }
    }

    if kind.has_ok_fallback() {
        let candidates = session
            .client
            .find_all(Locator::XPath(&bare_ok_xpath()))
            .await
            .context("Consent fallback query failed")?;
        if let Some(found) = first_qualifying(session, candidates).await {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

/// Search inside the page's consent iframe. The top-level browsing context is
/// restored on every exit path, including errors; driver errors inside the
/// frame count as nothing found.
pub async fn search_in_iframe(
    session: &Session,
    kind: SearchKind,
    phrases: &[String],
) -> Result<Option<UiElement>> {
    let frame = match pick_consent_iframe(session).await {
        Ok(Some(frame)) => frame,
        Ok(None) => return Ok(None),
        Err(e) => {
            debug!("Frame enumeration failed: {}", e);
            return Ok(None);
        }
    };

    if let Err(e) = session.enter_iframe(frame).await {
        debug!("Could not enter consent iframe: {}", e);
        return Ok(None);
    }

    let found = none_on_error(search_current_context(session, kind, phrases).await);
    session.restore_top().await?;
    Ok(found)
}

/// In-frame search outcomes fold driver errors into "nothing found"
fn none_on_error(result: Result<Option<UiElement>>) -> Option<UiElement> {
    match result {
        Ok(found) => found,
        Err(e) => {
            debug!("In-frame consent search failed: {}", e);
            None
        }
    }
}

/// Pick the iframe most likely to carry the consent dialog: the first whose
/// src names a CMP, else the first iframe on the page
async fn pick_consent_iframe(session: &Session) -> Result<Option<Element>> {
    let frames = session.client.find_all(Locator::Css("iframe")).await?;
    if frames.is_empty() {
        return Ok(None);
    }

    let mut chosen = 0;
    for (idx, frame) in frames.iter().enumerate() {
        let src = frame.attr("src").await.ok().flatten().unwrap_or_default();
        if FRAME_SRC_MARKERS.iter().any(|marker| src.contains(marker)) {
            chosen = idx;
            break;
        }
    }
    Ok(frames.into_iter().nth(chosen))
}

/// First candidate surviving the filter, read errors skipping the candidate
async fn first_qualifying(session: &Session, candidates: Vec<Element>) -> Option<UiElement> {
    for element in candidates {
        match inspect_candidate(session, &element).await {
            Ok(Some(found)) => return Some(found),
            Ok(None) => continue,
            Err(e) => {
                debug!("Candidate read failed: {}", e);
                continue;
            }
        }
    }
    None
}

async fn inspect_candidate(session: &Session, element: &Element) -> Result<Option<UiElement>> {
    let text = element.text().await?;
    let rect = element.rectangle().await?;
    let width = rect.2.round() as i64;
    let height = rect.3.round() as i64;

    if !qualifies(&text, width, height) {
        return Ok(None);
    }

    let bg_color = background_color(session, element).await?;
    Ok(Some(UiElement {
        text,
        width: width as u32,
        height: height as u32,
        bg_color_hex: rgb_to_hex(&bg_color),
        bg_color,
    }))
}

/// The candidate filter: visible area and short, label-like text
fn qualifies(text: &str, width: i64, height: i64) -> bool {
    text.chars().count() < MAX_TEXT_CHARS && width != 0 && height != 0
}

async fn background_color(session: &Session, element: &Element) -> Result<String> {
    let value = session
        .client
        .execute(
            "return getComputedStyle(arguments[0]).backgroundColor;",
            vec![serde_json::to_value(element)?],
        )
        .await
        .context("Failed to read computed background color")?;
    Ok(value.as_str().unwrap_or_default().to_string())
}

/// Wrap an XPath expression in a lowercase fold, so document text matches the
/// lowercase phrase lists regardless of page casing
pub(crate) fn lower(expr: &str) -> String {
    format!(
        "translate({}, 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz')",
        expr
    )
}

fn negation_guard() -> String {
    NEGATION_MARKERS
        .iter()
        .map(|marker| format!("contains({}, '{}')", lower("."), marker))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// XPath union over the element shapes a consent button takes: buttons and
/// links by folded text or aria-label, styled span buttons, input values
fn phrase_xpath(kind: SearchKind, phrase: &str) -> String {
    let lc_dot = lower(".");
    let lc_aria = lower("@aria-label");
    let lc_text = lower("text()");
    let lc_value = lower("@value");

    if kind.excludes_negations() {
        let neg = negation_guard();
        format!(
            "//button[(contains({lc_dot}, \"{phrase}\") or contains({lc_aria}, \"{phrase}\")) and not({neg})]|\
             //button[normalize-space({lc_text})='ok']|\
             //a[contains({lc_dot}, \"{phrase}\") and not({neg})]|\
             //a[normalize-space({lc_text})='ok']|\
             //span[contains(@class,'a-button-inner') and contains({lc_dot}, \"{phrase}\")]|\
             //input[contains({lc_value}, \"{phrase}\")]"
        )
    } else {
        format!(
            "//button[contains({lc_dot}, \"{phrase}\") or contains({lc_aria}, \"{phrase}\")]|\
             //a[contains({lc_dot}, \"{phrase}\")]|\
             //span[contains(@class,'a-button-inner') and contains({lc_dot}, \"{phrase}\")]|\
             //input[contains({lc_value}, \"{phrase}\")]"
        )
    }
}

/// Looser match for dialogs built from bare divs: any short div mentioning
/// the phrase
fn broadened_xpath(phrase: &str) -> String {
    format!(
        "//div[string-length(.) < 20 and contains({}, \"{phrase}\")]",
        lower("text()")
    )
}

/// Last-resort accept match: a button or link whose entire label is "ok"
fn bare_ok_xpath() -> String {
    let lc_dot = lower(".");
    let neg = negation_guard();
    format!(
        "//button[normalize-space({lc_dot})='ok' and not({neg})]|\
         //a[normalize-space({lc_dot})='ok' and not({neg})]"
    )
}

#[cfg(test)]
#[path = "locator_test.rs"]
mod locator_test;
