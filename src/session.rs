use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder};
use rand::Rng;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::types::ViewportSize;

/// Attempts before a metric script read is given up on
const SCRIPT_RETRIES: usize = 3;
/// Pointer jitter events dispatched during bot mitigation
const NUM_MOUSE_MOVES: usize = 10;
/// Bounds (in seconds) for the random settle sleep between page loads
const RANDOM_SLEEP_LOW: u64 = 1;
const RANDOM_SLEEP_HIGH: u64 = 7;

/// Connection settings for one crawl session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the WebDriver endpoint (geckodriver)
    pub webdriver_url: String,
    /// Whether to run the browser without a visible window
    pub headless: bool,
    /// Viewport dimensions, when fixed by the crawl configuration
    pub viewport: Option<ViewportSize>,
}

/// One live browser session. All page operations of a visit run through this
/// handle, strictly one at a time.
pub struct Session {
    pub(crate) client: Client,
}

impl Session {
    /// Connect to a running WebDriver and start a browser session
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        info!("Connecting to WebDriver at {}", config.webdriver_url);

        if !Self::is_webdriver_running(&config.webdriver_url).await {
            anyhow::bail!(
                "Cannot connect to WebDriver at {}.\n\
                Please ensure geckodriver is running:\n\
                  geckodriver --port 4444",
                config.webdriver_url
            );
        }

        let mut caps = serde_json::Map::new();
        let mut firefox_opts = serde_json::Map::new();
        let mut args = Vec::new();

        if config.headless {
            args.push("--headless".to_string());
        }

        if let Some(vp) = &config.viewport {
            args.push(format!("--width={}", vp.width));
            args.push(format!("--height={}", vp.height));
        }

        firefox_opts.insert("args".to_string(), json!(args));
        caps.insert("moz:firefoxOptions".to_string(), json!(firefox_opts));

        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&config.webdriver_url)
            .await
            .context("Failed to connect to WebDriver")?;

        if let Some(vp) = config.viewport {
            debug!("Setting viewport to {}x{}", vp.width, vp.height);
            if let Err(e) = client.set_window_size(vp.width, vp.height).await {
                debug!("Note: Could not set window size: {}", e);
            }
        }

        Ok(Session { client })
    }

    async fn is_webdriver_running(url: &str) -> bool {
        let status_url = format!("{}/status", url);

        match reqwest::get(&status_url).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Navigate to a URL. Navigation failures are logged and swallowed so the
    /// post-navigation steps of a visit still run against whatever loaded.
    pub async fn goto(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);

        if let Err(e) = self.client.goto(url).await {
            warn!("Navigation to {} did not complete cleanly: {}", url, e);
        }

        // Wait for the page to be ready
        let wait_script = r#"
            return document.readyState === 'complete';
        "#;

        for _ in 0..20 {
            // Max 2 seconds
            match self.client.execute(wait_script, vec![]).await {
                Ok(val) if val.as_bool().unwrap_or(false) => {
                    break;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        Ok(())
    }

    /// Execute a script, retrying transient failures a few times
    pub async fn execute_with_retry(&self, script: &str) -> Result<serde_json::Value> {
        let mut attempts = 0;
        loop {
            match self.client.execute(script, vec![]).await {
                Ok(value) => return Ok(value),
                Err(e) if attempts + 1 < SCRIPT_RETRIES => {
                    attempts += 1;
                    debug!("Script attempt {} failed, retrying: {}", attempts, e);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e).context("Script execution failed after retries"),
            }
        }
    }

    /// Current top-level document URL
    pub async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    /// URL of the document in the current browsing context, which may be a
    /// frame rather than the top-level page
    pub async fn document_url(&self) -> Result<String> {
        let value = self
            .execute_with_retry("return window.document.URL;")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Serialized markup of the current browsing context
    pub async fn page_source(&self) -> Result<String> {
        self.client
            .source()
            .await
            .context("Failed to read page source")
    }

    /// PNG capture of the current viewport
    pub async fn viewport_png(&self) -> Result<Vec<u8>> {
        self.client
            .screenshot()
            .await
            .context("Failed to capture viewport screenshot")
    }

    pub async fn scroll_y(&self) -> Result<i64> {
        let value = self.execute_with_retry("return window.scrollY;").await?;
        Ok(value.as_f64().map(|v| v.round() as i64).unwrap_or(0))
    }

    pub async fn inner_height(&self) -> Result<i64> {
        let value = self
            .execute_with_retry("return window.innerHeight;")
            .await?;
        Ok(value.as_f64().map(|v| v.round() as i64).unwrap_or(0))
    }

    pub async fn page_height(&self) -> Result<i64> {
        let value = self
            .execute_with_retry("return document.body.scrollHeight;")
            .await?;
        Ok(value.as_f64().map(|v| v.round() as i64).unwrap_or(0))
    }

    /// Scroll down by one viewport height
    pub async fn scroll_by_viewport(&self) -> Result<()> {
        self.execute_with_retry("window.scrollBy(0, window.innerHeight)")
            .await
            .context("Failed to scroll")?;
        Ok(())
    }

    /// Navigate one step back in the session history
    pub async fn back(&self) -> Result<()> {
        self.client.back().await.context("History navigation failed")?;
        Ok(())
    }

    /// Poll the document ready state until the page finishes loading or the
    /// timeout passes. Best effort: an unreadable ready state counts as not
    /// loaded yet.
    pub async fn wait_until_loaded(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(state) = self.client.execute("return document.readyState;", vec![]).await
                && state.as_str() == Some("complete")
            {
                return;
            }
            if Instant::now() >= deadline {
                debug!("Page did not reach readyState complete within {:?}", timeout);
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Close all windows and tabs other than the current one
    pub async fn close_other_windows(&self) -> Result<()> {
        let current = self.client.window().await?;
        let windows = self.client.windows().await?;
        if windows.len() > 1 {
            for window in windows {
                if window != current {
                    self.client.switch_to_window(window).await?;
                    self.client.close_window().await?;
                }
            }
            self.client.switch_to_window(current).await?;
        }
        Ok(())
    }

    /// Kill the current tab and replace it with a fresh one, cutting off any
    /// traffic the old page still had in flight
    pub async fn tab_restart(&self) -> Result<()> {
        self.close_other_windows().await?;

        if self.current_url().await?.to_lowercase() == "about:blank" {
            return Ok(());
        }

        // Open the replacement first: closing the current window would leave
        // the session without a browsing context to issue commands from.
        let new_window = self
            .client
            .new_window(true)
            .await
            .context("Failed to open replacement window")?;
        self.client
            .close_window()
            .await
            .context("Failed to close previous window")?;
        self.client
            .switch_to_window(new_window.handle)
            .await
            .context("Failed to switch to replacement window")?;

        Ok(())
    }

    /// Dismiss a modal alert if one is currently blocking the page
    pub async fn dismiss_alert_if_present(&self) -> Result<()> {
        if self.client.get_alert_text().await.is_ok() {
            debug!("Dismissing modal dialog");
            if let Err(e) = self.client.dismiss_alert().await {
                debug!("Alert vanished before dismissal: {}", e);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Ok(())
    }

    /// Switch the browsing context into an iframe element
    pub async fn enter_iframe(&self, frame: Element) -> Result<()> {
        frame.enter_frame().await.context("Failed to enter iframe")?;
        Ok(())
    }

    /// Switch the browsing context to the parent of the current frame
    pub async fn enter_parent_frame(&self) -> Result<()> {
        self.client
            .clone()
            .enter_parent_frame()
            .await
            .context("Failed to return to parent frame")?;
        Ok(())
    }

    /// Switch the browsing context back to the top-level document
    pub async fn restore_top(&self) -> Result<()> {
        self.client
            .clone()
            .enter_frame(None)
            .await
            .context("Failed to restore top-level browsing context")?;
        Ok(())
    }

    /// Make the visit look less scripted: jitter the pointer, scroll down in
    /// irregular steps, then idle for a random interval
    pub async fn bot_mitigation(&self) -> Result<()> {
        debug!("Running bot mitigation");

        let viewport = self
            .execute_with_retry("return [window.innerWidth, window.innerHeight];")
            .await?;
        let width = viewport
            .get(0)
            .and_then(|v| v.as_f64())
            .unwrap_or(1366.0)
            .round() as i64;
        let height = viewport
            .get(1)
            .and_then(|v| v.as_f64())
            .unwrap_or(768.0)
            .round() as i64;

        let max_x = (width - 1).max(0);
        let max_y = (height - 1).max(0);
        let mut x = width / 2;
        let mut y = height / 2;
        for _ in 0..=NUM_MOUSE_MOVES {
            let script = format!(
                "document.dispatchEvent(new MouseEvent('mousemove', \
                 {{bubbles: true, clientX: {}, clientY: {}}}));",
                x, y
            );
            if let Err(e) = self.client.execute(&script, vec![]).await {
                debug!("Pointer jitter failed: {}", e);
                break;
            }

            let (dx, dy) = {
                let mut rng = rand::thread_rng();
                let max_move: i64 = rng.gen_range(0..=500);
                (
                    rng.gen_range(-max_move..=max_move),
                    rng.gen_range(-max_move..=max_move),
                )
            };
            x = (x + dx).clamp(0, max_x);
            y = (y + dy).clamp(0, max_y);
        }

        loop {
            let (keep_going, step, pause_ms) = {
                let mut rng = rand::thread_rng();
                (
                    rng.r#gen::<f64>() > 0.20,
                    rng.gen_range(10..=210),
                    rng.gen_range(500..=1500),
                )
            };
            if !keep_going {
                break;
            }
            let _ = self
                .client
                .execute(&format!("window.scrollBy(0, {});", step), vec![])
                .await;
            let at_bottom = self
                .execute_with_retry(
                    "return (window.scrollY + window.innerHeight + 100) > document.body.clientHeight;",
                )
                .await
                .map(|v| v.as_bool().unwrap_or(true))
                .unwrap_or(true);
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;
            if at_bottom {
                break;
            }
        }

        let settle = {
            let mut rng = rand::thread_rng();
            rng.gen_range(RANDOM_SLEEP_LOW..RANDOM_SLEEP_HIGH)
        };
        tokio::time::sleep(Duration::from_secs(settle)).await;

        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}
