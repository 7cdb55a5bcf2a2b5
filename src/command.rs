//! The per-visit command set and its dispatcher. A visit is a sequence of
//! commands executed against one browser session; the sequence is derived
//! from the crawl configuration.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use fantoccini::Locator;
use fantoccini::elements::Element;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::resources::Resources;
use crate::session::Session;
use crate::signal::LifecycleChannel;
use crate::store::ResultStore;
use crate::types::Visit;
use crate::{capture, detect, snapshot};

/// Upper bound on waiting for a clicked page to finish loading
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Settle time granted to the page before the closing visit signal
const FINALIZE_SLEEP: u64 = 5;

/// One unit of work within a visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    GetPage {
        url: String,
        sleep: u64,
    },
    Browse {
        url: String,
        num_links: u32,
        sleep: u64,
    },
    SaveScreenshot {
        suffix: String,
    },
    ScreenshotFullPage {
        suffix: String,
    },
    DumpPageSource {
        suffix: String,
    },
    RecursiveDumpPageSource {
        suffix: String,
    },
    DetectDarkPatterns {
        languages: Vec<String>,
    },
    PingCmp,
    DetectCookieDialog,
    Finalize {
        sleep: u64,
    },
}

/// Crawl-wide settings shared by every visit
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub data_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub languages: Vec<String>,
    pub sleep: u64,
    pub browse: bool,
    pub num_links: u32,
    pub bot_mitigation: bool,
    pub screenshot: bool,
    pub full_page_screenshot: bool,
    pub dump_source: bool,
    pub recursive_dump_source: bool,
    pub ping_cmp: bool,
    pub detect_cookie_dialog: bool,
    pub aggregator_addr: Option<String>,
    pub browser_id: i64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("crawl-data"),
            resources_dir: PathBuf::from("resources"),
            languages: vec!["nl".to_string(), "en".to_string()],
            sleep: 3,
            browse: false,
            num_links: 3,
            bot_mitigation: false,
            screenshot: false,
            full_page_screenshot: false,
            dump_source: false,
            recursive_dump_source: false,
            ping_cmp: false,
            detect_cookie_dialog: false,
            aggregator_addr: None,
            browser_id: 0,
        }
    }
}

impl CrawlConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("crawl-data.sqlite")
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.data_dir.join("screenshots")
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.data_dir.join("sources")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.screenshot_dir(),
            self.sources_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create data directory {:?}", dir))?;
        }
        Ok(())
    }

    /// Build the command sequence one site visit runs, in order: navigation,
    /// any configured captures, the detectors, and the closing finalize
    pub fn command_sequence(&self, url: &str) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.browse {
            commands.push(Command::Browse {
                url: url.to_string(),
                num_links: self.num_links,
                sleep: self.sleep,
            });
        } else {
            commands.push(Command::GetPage {
                url: url.to_string(),
                sleep: self.sleep,
            });
        }
        if self.screenshot {
            commands.push(Command::SaveScreenshot {
                suffix: String::new(),
            });
        }
        if self.full_page_screenshot {
            commands.push(Command::ScreenshotFullPage {
                suffix: String::new(),
            });
        }
        if self.dump_source {
            commands.push(Command::DumpPageSource {
                suffix: String::new(),
            });
        }
        if self.recursive_dump_source {
            commands.push(Command::RecursiveDumpPageSource {
                suffix: String::new(),
            });
        }
        commands.push(Command::DetectDarkPatterns {
            languages: self.languages.clone(),
        });
        if self.ping_cmp {
            commands.push(Command::PingCmp);
        }
        if self.detect_cookie_dialog {
            commands.push(Command::DetectCookieDialog);
        }
        commands.push(Command::Finalize {
            sleep: FINALIZE_SLEEP,
        });
        commands
    }
}

/// Execute one command against the visit's session
pub async fn run_command(
    command: &Command,
    visit: &Visit,
    session: &Session,
    config: &CrawlConfig,
    resources: &Resources,
    store: &ResultStore,
    lifecycle: &mut LifecycleChannel,
) -> Result<()> {
    debug!("Executing {:?} for visit {}", command, visit.visit_id);
    match command {
        Command::GetPage { url, sleep } => {
            get_page(session, url, *sleep, config.bot_mitigation).await
        }
        Command::Browse {
            url,
            num_links,
            sleep,
        } => browse(session, url, *num_links, *sleep, config.bot_mitigation).await,
        Command::SaveScreenshot { suffix } => {
            capture::save_viewport(session, visit.visit_id, &config.screenshot_dir(), suffix)
                .await
                .map(|_| ())
        }
        Command::ScreenshotFullPage { suffix } => {
            capture::save_full_page(session, visit.visit_id, &config.screenshot_dir(), suffix)
                .await
                .map(|_| ())
        }
        Command::DumpPageSource { suffix } => {
            snapshot::dump_page_source(session, visit.visit_id, &config.sources_dir(), suffix)
                .await
                .map(|_| ())
        }
        Command::RecursiveDumpPageSource { suffix } => {
            snapshot::dump_frame_tree(session, visit.visit_id, &config.sources_dir(), suffix)
                .await
                .map(|_| ())
        }
        Command::DetectDarkPatterns { languages } => {
            match detect::detect_dark_patterns(session, resources, visit, languages).await? {
                Some(record) => {
                    store
                        .insert_dark_patterns(&record)
                        .context("Failed to write to results database")?;
                    info!("Consent interface recorded for visit {}", visit.visit_id);
                }
                None => info!("No consent interface found for visit {}", visit.visit_id),
            }
            Ok(())
        }
        Command::PingCmp => {
            match detect::ping_cmp(session, resources, visit).await? {
                Some(record) => {
                    store
                        .insert_cmp_ping(&record)
                        .context("Failed to write to results database")?;
                    info!(
                        "CMP ping answered for visit {} (cmp {:?})",
                        visit.visit_id, record.cmp_id
                    );
                }
                None => debug!("No TCF API answered on visit {}", visit.visit_id),
            }
            Ok(())
        }
        Command::DetectCookieDialog => {
            let record = detect::detect_cookie_dialog(session, resources, visit).await?;
            store
                .insert_cookie_dialog(&record)
                .context("Failed to write to results database")?;
            Ok(())
        }
        Command::Finalize { sleep } => {
            // The closing signal goes out even when the tab reset fails
            if let Err(e) = session.tab_restart().await {
                warn!("Tab reset failed while finalizing: {}", e);
            }
            tokio::time::sleep(Duration::from_secs(*sleep)).await;
            lifecycle.visit_finished(visit.visit_id).await;
            Ok(())
        }
    }
}

/// Navigate to a page in a fresh tab and let it settle: dismiss any blocking
/// alert, drop stray popup windows, and optionally run the bot mitigation
/// gestures
pub async fn get_page(session: &Session, url: &str, sleep: u64, bot_mitigation: bool) -> Result<()> {
    session.tab_restart().await?;
    session.goto(url).await?;
    tokio::time::sleep(Duration::from_secs(sleep)).await;
    session.dismiss_alert_if_present().await?;
    session.close_other_windows().await?;
    if bot_mitigation {
        session.bot_mitigation().await?;
    }
    Ok(())
}

/// Load a page, then follow up to `num_links` same-site links, returning to
/// the landing page after each. A link visit that fails is skipped.
pub async fn browse(
    session: &Session,
    url: &str,
    num_links: u32,
    sleep: u64,
    bot_mitigation: bool,
) -> Result<()> {
    get_page(session, url, sleep, bot_mitigation).await?;

    let page_url = Url::parse(url).with_context(|| format!("Invalid site URL {:?}", url))?;
    for _ in 0..num_links {
        let links = collect_internal_links(session, &page_url).await?;
        if links.is_empty() {
            break;
        }
        let pick = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..links.len())
        };
        let link = &links[pick];
        if let Some(href) = link.attr("href").await.ok().flatten() {
            info!("Visiting internal link {}", href);
        }
        if let Err(e) = follow_and_return(session, link, sleep, bot_mitigation).await {
            debug!("Internal link visit failed: {}", e);
        }
    }
    Ok(())
}

/// Displayed anchors that stay on the landing page's site
async fn collect_internal_links(session: &Session, page_url: &Url) -> Result<Vec<Element>> {
    let page_host = normalized_host(page_url);
    if page_host.is_empty() {
        return Ok(Vec::new());
    }

    let anchors = session.client.find_all(Locator::Css("a")).await?;
    let mut links = Vec::new();
    for anchor in anchors {
        let Some(href) = anchor.attr("href").await.ok().flatten() else {
            continue;
        };
        let Ok(target) = page_url.join(&href) else {
            continue;
        };
        if normalized_host(&target) != page_host {
            continue;
        }
        if let Ok(true) = anchor.is_displayed().await {
            links.push(anchor);
        }
    }
    Ok(links)
}

async fn follow_and_return(
    session: &Session,
    link: &Element,
    sleep: u64,
    bot_mitigation: bool,
) -> Result<()> {
    link.click().await.context("Failed to click link")?;
    session.wait_until_loaded(PAGE_LOAD_TIMEOUT).await;
    tokio::time::sleep(Duration::from_secs(sleep.max(1))).await;
    if bot_mitigation {
        session.bot_mitigation().await?;
    }
    session.back().await?;
    session.wait_until_loaded(PAGE_LOAD_TIMEOUT).await;
    Ok(())
}

/// Host comparison used for "same site": hosts are folded to lowercase and
/// a leading www label is ignored
fn normalized_host(url: &Url) -> String {
    url.host_str()
        .map(|host| {
            host.to_ascii_lowercase()
                .trim_start_matches("www.")
                .to_string()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "command_test.rs"]
mod command_test;
