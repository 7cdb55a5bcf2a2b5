//! Page source archiving: flat HTML dumps and a compressed recursive dump
//! covering the iframe tree.

use std::collections::HashMap;
use std::fs::File;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::{Context, Result};
use fantoccini::Locator;
use fantoccini::elements::Element;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capture::artifact_stem;
use crate::session::Session;

/// Frames nested deeper than this are not descended into
const MAX_FRAME_DEPTH: usize = 10;

/// One browsing context in the page: its document URL, serialized DOM, and
/// nested iframes keyed by their id attribute (or `frame-<ordinal>` when the
/// iframe carries no id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameNode {
    pub doc_url: String,
    pub source: String,
    pub iframes: HashMap<String, FrameNode>,
}

/// Write the top-level page source to `{stem}.html` under the sources
/// directory
pub async fn dump_page_source(
    session: &Session,
    visit_id: i64,
    sources_dir: &Path,
    suffix: &str,
) -> Result<PathBuf> {
    let url = session.current_url().await?;
    let stem = artifact_stem(visit_id, url.as_str(), suffix);
    let path = sources_dir.join(format!("{stem}.html"));

    let source = session.page_source().await?;
    let mut file =
        File::create(&path).with_context(|| format!("Failed to create source dump {:?}", path))?;
    file.write_all(source.as_bytes())
        .with_context(|| format!("Failed to write source dump {:?}", path))?;
    file.write_all(b"\n")
        .with_context(|| format!("Failed to write source dump {:?}", path))?;

    debug!("Dumped page source to {:?}", path);
    Ok(path)
}

/// Walk the page's frame tree and archive it as gzipped JSON at
/// `{stem}.json.gz` under the sources directory
pub async fn dump_frame_tree(
    session: &Session,
    visit_id: i64,
    sources_dir: &Path,
    suffix: &str,
) -> Result<PathBuf> {
    let url = session.current_url().await?;
    let stem = artifact_stem(visit_id, url.as_str(), suffix);
    let path = sources_dir.join(format!("{stem}.json.gz"));

    let tree = collect_frame_tree(session).await?;
    write_compressed_json(&path, &tree)?;

    debug!("Dumped frame tree to {:?}", path);
    Ok(path)
}

/// Collect the current page as a [`FrameNode`] tree. The top-level browsing
/// context is restored before returning.
pub async fn collect_frame_tree(session: &Session) -> Result<FrameNode> {
    let result = collect_frames(session, 0).await;
    session.restore_top().await?;
    result
}

fn collect_frames<'a>(
    session: &'a Session,
    depth: usize,
) -> Pin<Box<dyn Future<Output = Result<FrameNode>> + 'a>> {
    Box::pin(async move {
        let doc_url = session.document_url().await?;
        let source = session.page_source().await?;
        let mut iframes = HashMap::new();

        if depth < MAX_FRAME_DEPTH {
            let frames = session.client.find_all(Locator::Css("iframe")).await?;
            for (ordinal, frame) in frames.into_iter().enumerate() {
                let mut key = frame_key(&frame, ordinal).await;
                if iframes.contains_key(&key) {
                    key = format!("{key}-{ordinal}");
                }

                // A frame that detached between enumeration and entry is
                // skipped; the context is unchanged in that case
                if let Err(e) = session.enter_iframe(frame).await {
                    debug!("Skipping unreachable frame {:?}: {}", key, e);
                    continue;
                }
                let node = collect_frames(session, depth + 1).await?;
                session.enter_parent_frame().await?;
                iframes.insert(key, node);
            }
        }

        Ok(FrameNode {
            doc_url,
            source,
            iframes,
        })
    })
}

async fn frame_key(frame: &Element, ordinal: usize) -> String {
    match frame.attr("id").await.ok().flatten() {
        Some(id) if !id.is_empty() => id,
        _ => format!("frame-{ordinal}"),
    }
}

fn write_compressed_json(path: &Path, tree: &FrameNode) -> Result<()> {
    let payload = serde_json::to_vec(tree).context("Failed to serialize frame tree")?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create source archive {:?}", path))?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(&payload)
        .with_context(|| format!("Failed to write source archive {:?}", path))?;
    encoder
        .finish()
        .with_context(|| format!("Failed to finish source archive {:?}", path))?;
    Ok(())
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod snapshot_test;
