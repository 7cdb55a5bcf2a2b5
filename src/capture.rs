//! Screenshot capture: viewport shots, scrolling full-page capture, and
//! stitching the captured parts into one tall image.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

use crate::session::Session;

/// Hex digest used to key artifacts by the page they were captured from
pub fn url_hash(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// Artifact file stem: `{visit}-{urlhash}` with an optional `-suffix`
pub fn artifact_stem(visit_id: i64, url: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        format!("{visit_id}-{}", url_hash(url))
    } else {
        format!("{visit_id}-{}-{suffix}", url_hash(url))
    }
}

/// Capture the current viewport into `{stem}.png` under the screenshot
/// directory
pub async fn save_viewport(
    session: &Session,
    visit_id: i64,
    screenshot_dir: &Path,
    suffix: &str,
) -> Result<PathBuf> {
    let url = session.current_url().await?;
    let stem = artifact_stem(visit_id, url.as_str(), suffix);
    let path = screenshot_dir.join(format!("{stem}.png"));

    let png = session.viewport_png().await?;
    fs::write(&path, &png).with_context(|| format!("Failed to write screenshot {:?}", path))?;
    debug!("Saved screenshot {:?}", path);
    Ok(path)
}

/// Capture the whole page by scrolling one viewport at a time, saving each
/// viewport as a part, then stitching the parts into `{stem}.png`.
///
/// The loop stops when the next viewport would pass the bottom of the page
/// or when scrolling no longer moves, whichever comes first.
pub async fn save_full_page(
    session: &Session,
    visit_id: i64,
    screenshot_dir: &Path,
    suffix: &str,
) -> Result<PathBuf> {
    let parts_dir = screenshot_dir.join("parts");
    fs::create_dir_all(&parts_dir)
        .with_context(|| format!("Failed to create parts directory {:?}", parts_dir))?;

    let url = session.current_url().await?;
    let stem = artifact_stem(visit_id, url.as_str(), suffix);

    let max_height = session.page_height().await?;
    let inner_height = session.inner_height().await?;
    let mut current = session.scroll_y().await?;
    let mut previous: i64 = -1;
    let mut part = 0u32;

    save_part(session, &parts_dir, &stem, part, current).await?;

    while current + inner_height < max_height && current != previous {
        if let Err(e) = session.scroll_by_viewport().await {
            warn!("Error scrolling down, screenshot may be misaligned: {}", e);
        }
        part += 1;
        previous = current;
        current = session.scroll_y().await?;
        save_part(session, &parts_dir, &stem, part, current).await?;
    }

    stitch_parts(&parts_dir, screenshot_dir, &stem)
}

async fn save_part(
    session: &Session,
    parts_dir: &Path,
    stem: &str,
    index: u32,
    scroll: i64,
) -> Result<()> {
    let path = parts_dir.join(format!("{stem}-part-{index}-{scroll}.png"));
    let png = session.viewport_png().await?;
    fs::write(&path, &png)
        .with_context(|| format!("Failed to write screenshot part {:?}", path))?;
    Ok(())
}

/// Paste the parts of one full-page capture onto a single canvas at their
/// recorded scroll offsets. Parts are pasted in capture order, so a later
/// part wins the overlap at the bottom of the page.
fn stitch_parts(parts_dir: &Path, screenshot_dir: &Path, stem: &str) -> Result<PathBuf> {
    let prefix = format!("{stem}-part-");
    let mut parts: Vec<(u32, u32, PathBuf)> = Vec::new();
    for entry in fs::read_dir(parts_dir)
        .with_context(|| format!("Failed to list parts directory {:?}", parts_dir))?
    {
        let entry = entry.context("Failed to read parts directory entry")?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some((index, scroll)) = parse_part_name(&name, &prefix) {
            parts.push((index, scroll, entry.path()));
        }
    }
    if parts.is_empty() {
        bail!("No screenshot parts found for {stem}");
    }
    parts.sort_by_key(|(index, _, _)| *index);

    // Canvas dimensions come from the headers alone; the composite height is
    // the deepest scroll offset plus the height of the part taken there
    let mut total_height = 0u32;
    let mut max_width = 0u32;
    let mut max_scroll: Option<u32> = None;
    for (_, scroll, path) in &parts {
        let (width, height) = image::image_dimensions(path)
            .with_context(|| format!("Failed to read screenshot part {:?}", path))?;
        if max_scroll.is_none_or(|m| *scroll > m) {
            max_scroll = Some(*scroll);
            total_height = *scroll + height;
        }
        max_width = max_width.max(width);
    }

    // Decode one part at a time; each is dropped as soon as it is pasted
    let mut canvas = image::RgbaImage::new(max_width, total_height);
    let mut part_names = Vec::with_capacity(parts.len());
    for (_, scroll, path) in &parts {
        let img = image::open(path)
            .with_context(|| format!("Failed to decode screenshot part {:?}", path))?;
        image::imageops::replace(&mut canvas, &img.to_rgba8(), 0, *scroll as i64);
        part_names.push(name_of(path));
    }

    let out_path = screenshot_dir.join(format!("{stem}.png"));
    if let Err(e) = canvas.save(&out_path) {
        error!(
            "Could not save stitched screenshot {:?}: {} (parts: {:?}, size {}x{})",
            out_path, e, part_names, max_width, total_height
        );
    }
    Ok(out_path)
}

/// Parse `{stem}-part-{index}-{scroll}.png` back into its index and scroll
/// offset. Names that do not fit the pattern are ignored.
fn parse_part_name(name: &str, prefix: &str) -> Option<(u32, u32)> {
    let rest = name.strip_prefix(prefix)?.strip_suffix(".png")?;
    let (index, scroll) = rest.split_once('-')?;
    Some((index.parse().ok()?, scroll.parse().ok()?))
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "capture_test.rs"]
mod capture_test;
