//! Visit lifecycle signalling to an external aggregator over a
//! line-delimited JSON TCP channel.

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Visit boundary notification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action")]
pub enum LifecycleSignal {
    Initialize { visit_id: i64 },
    Finalize { visit_id: i64 },
}

/// Write half of the aggregator channel.
///
/// The channel degrades instead of failing: an unreachable aggregator or a
/// broken pipe downgrades it to a no-op so the crawl keeps running.
#[derive(Debug)]
pub struct LifecycleChannel {
    stream: Option<TcpStream>,
}

impl LifecycleChannel {
    /// Connect to the aggregator, or run disconnected when no address is
    /// configured or the aggregator is unreachable
    pub async fn connect(addr: Option<&str>) -> Self {
        let Some(addr) = addr else {
            return Self { stream: None };
        };
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!("Connected to aggregator at {}", addr);
                Self {
                    stream: Some(stream),
                }
            }
            Err(e) => {
                warn!(
                    "Aggregator at {} unreachable, visit signals disabled: {}",
                    addr, e
                );
                Self { stream: None }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub async fn visit_started(&mut self, visit_id: i64) {
        self.send(&LifecycleSignal::Initialize { visit_id }).await;
    }

    pub async fn visit_finished(&mut self, visit_id: i64) {
        self.send(&LifecycleSignal::Finalize { visit_id }).await;
    }

    /// Send one signal as a JSON line. A write failure disconnects the
    /// channel; later sends become no-ops.
    pub async fn send(&mut self, signal: &LifecycleSignal) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let line = match serde_json::to_string(signal) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to encode visit signal: {}", e);
                return;
            }
        };
        if let Err(e) = write_line(stream, &line).await {
            warn!("Aggregator write failed, visit signals disabled: {}", e);
            self.stream = None;
        }
    }
}

async fn write_line(stream: &mut TcpStream, line: &str) -> std::io::Result<()> {
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await
}

#[cfg(test)]
#[path = "signal_test.rs"]
mod signal_test;
