//! The three per-visit detectors: consent-interface search, TCF CMP ping,
//! and the cookie-dialog cascade.

use std::future::Future;

use anyhow::Result;
use fantoccini::Locator;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::locator::{self, SearchKind};
use crate::resources::Resources;
use crate::session::Session;
use crate::types::{
    CmpPingRecord, ConsentDetectionRecord, CookieDialogRecord, DialogMatch, UiElement, Visit,
};

/// An iframe whose src contains one of these counts as a cookie dialog
const DIALOG_FRAME_MARKERS: [&str; 3] = ["cmp", "consent", "cookie"];

/// Class fragments that mark an element inside a frame as dialog chrome
const DIALOG_CLASS_XPATH: &str =
    "//*[contains(@class,'banner') or contains(@class,'consent') or contains(@class,'cmp')]";

/// Synchronous probe of the IAB TCF v2 API. The ping callback fires before
/// the script returns, so the captured copy is the return value.
const TCF_PING_SCRIPT: &str = "\
    let result = null;
    if (typeof __tcfapi == 'function') {
        window.__tcfapi('ping', 2, function (tcData, success) {
            result = Object.assign({}, tcData);
        });
    }
    return result;";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TcfPingData {
    cmp_id: Option<i64>,
    tcf_policy_version: Option<i64>,
    gdpr_applies: Option<bool>,
}

/// Search the page for accept and reject consent elements, walking the
/// language list until one language matches either side.
///
/// Returns `None` when no language produced a match; the caller writes no
/// row in that case.
pub async fn detect_dark_patterns(
    session: &Session,
    resources: &Resources,
    visit: &Visit,
    languages: &[String],
) -> Result<Option<ConsentDetectionRecord>> {
    let found = first_language_match(languages, |language| async move {
        let phrases = resources.phrase_set(&language)?;
        let allow =
            locator::find_consent_element(session, SearchKind::Accept, &phrases.allow).await?;
        let reject =
            locator::find_consent_element(session, SearchKind::Reject, &phrases.reject).await?;
        Ok((allow, reject))
    })
    .await?;

    Ok(found.map(|(allow, reject)| ConsentDetectionRecord {
        visit_id: visit.visit_id,
        allow,
        reject,
    }))
}

/// Run `search` on each language in order, stopping at the first one that
/// yields an element on either side. Later languages are never consulted
/// once one has matched.
async fn first_language_match<F, Fut>(
    languages: &[String],
    mut search: F,
) -> Result<Option<(Option<UiElement>, Option<UiElement>)>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(Option<UiElement>, Option<UiElement>)>>,
{
    for language in languages {
        let (allow, reject) = search(language.clone()).await?;
        if allow.is_none() && reject.is_none() {
            debug!("No consent interface matched language {:?}", language);
            continue;
        }
        return Ok(Some((allow, reject)));
    }
    Ok(None)
}

/// Ping the page's TCF API and resolve the reported CMP id against the
/// registered CMP list. Pages without a CMP yield no record.
pub async fn ping_cmp(
    session: &Session,
    resources: &Resources,
    visit: &Visit,
) -> Result<Option<CmpPingRecord>> {
    let value = session.execute_with_retry(TCF_PING_SCRIPT).await?;
    if value.is_null() {
        return Ok(None);
    }

    let ping: TcfPingData = match serde_json::from_value(value) {
        Ok(ping) => ping,
        Err(e) => {
            warn!("Unexpected __tcfapi ping payload: {}", e);
            return Ok(None);
        }
    };

    let cmp_name = match ping.cmp_id {
        Some(id) => resources.cmp_name(id)?,
        None => String::new(),
    };

    Ok(Some(CmpPingRecord {
        visit_id: visit.visit_id,
        cmp_id: ping.cmp_id,
        cmp_name,
        policy_version: ping.tcf_policy_version,
        gdpr_applies: ping.gdpr_applies,
    }))
}

/// Three-stage cookie-dialog check: CMP-looking iframes first, then known
/// dialog ids, then known dialog classes. Always produces a record, found
/// or not.
pub async fn detect_cookie_dialog(
    session: &Session,
    resources: &Resources,
    visit: &Visit,
) -> Result<CookieDialogRecord> {
    let mut kind = DialogMatch::None;

    if frame_carries_dialog(session).await {
        kind = DialogMatch::Frame;
    }
    session.restore_top().await?;

    if kind == DialogMatch::None {
        for id in resources.dialog_ids()? {
            if has_match(session, &exact_attr_xpath("@id", &id)).await {
                kind = DialogMatch::Id;
                break;
            }
        }
    }

    if kind == DialogMatch::None {
        for class in resources.dialog_classes()? {
            if has_match(session, &exact_attr_xpath("@class", &class)).await {
                kind = DialogMatch::Class;
                break;
            }
        }
    }

    Ok(CookieDialogRecord {
        visit_id: visit.visit_id,
        kind,
    })
}

/// Walk every iframe: a CMP-like src counts immediately, otherwise enter the
/// frame and look for dialog chrome by class. Frames that refuse entry are
/// skipped. The caller restores the top-level context afterwards.
async fn frame_carries_dialog(session: &Session) -> bool {
    let frames = match session.client.find_all(Locator::Css("iframe")).await {
        Ok(frames) => frames,
        Err(e) => {
            debug!("Frame enumeration failed: {}", e);
            return false;
        }
    };

    for frame in frames {
        if let Err(e) = session.restore_top().await {
            debug!("Could not return to top-level context: {}", e);
            continue;
        }

        let src = frame.attr("src").await.ok().flatten().unwrap_or_default();
        if DIALOG_FRAME_MARKERS.iter().any(|marker| src.contains(marker)) {
            return true;
        }

        if session.enter_iframe(frame).await.is_err() {
            continue;
        }
        match session.client.find_all(Locator::XPath(DIALOG_CLASS_XPATH)).await {
            Ok(elements) if !elements.is_empty() => return true,
            Ok(_) => continue,
            Err(e) => {
                debug!("Dialog chrome probe failed: {}", e);
                continue;
            }
        }
    }
    false
}

async fn has_match(session: &Session, xpath: &str) -> bool {
    match session.client.find_all(Locator::XPath(xpath)).await {
        Ok(elements) => !elements.is_empty(),
        Err(e) => {
            debug!("Dialog probe failed: {}", e);
            false
        }
    }
}

/// Exact match on a case-folded attribute value
fn exact_attr_xpath(attr: &str, value: &str) -> String {
    format!("//*[{}='{value}']", locator::lower(attr))
}

#[cfg(test)]
#[path = "detect_test.rs"]
mod detect_test;
