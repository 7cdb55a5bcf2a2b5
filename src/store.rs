use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, params};
use thiserror::Error;

use crate::types::{CmpPingRecord, ConsentDetectionRecord, CookieDialogRecord, UiElement, Visit};

const SCHEMA: &str = include_str!("../sql/schema.sql");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open results database {path}: {source}")]
    Open {
        source: rusqlite::Error,
        path: PathBuf,
    },
    #[error("failed to execute statement on results database: {0}")]
    Execute(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// SQLite store holding one row per visit per detector.
///
/// Writes happen strictly sequentially within a visit, so a single connection
/// without pooling is sufficient. WAL mode keeps the database readable by the
/// external aggregator while a crawl is running.
pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    /// Open (or create) the results database and ensure the schema exists
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            source,
            path: path.to_path_buf(),
        })?;
        configure_connection(&conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(ResultStore { conn })
    }

    /// Bookkeeping row written once at the start of each visit
    pub fn record_visit(&self, visit: &Visit) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO site_visits (visit_id, browser_id, site_url, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                visit.visit_id,
                visit.browser_id,
                visit.site_url,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Insert a dark-pattern detection row. A missing side is stored with
    /// empty sentinels so every row has the full column set.
    pub fn insert_dark_patterns(&self, record: &ConsentDetectionRecord) -> StoreResult<()> {
        let (allow_text, allow_width, allow_height, allow_bg, allow_hex) =
            flatten_side(record.allow.as_ref());
        let (reject_text, reject_width, reject_height, reject_bg, reject_hex) =
            flatten_side(record.reject.as_ref());

        self.conn.execute(
            "INSERT INTO dark_patterns VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            params![
                record.visit_id,
                record.allow.is_some() as i64,
                allow_text,
                allow_width,
                allow_height,
                allow_bg,
                allow_hex,
                record.reject.is_some() as i64,
                reject_text,
                reject_width,
                reject_height,
                reject_bg,
                reject_hex,
            ],
        )?;
        Ok(())
    }

    pub fn insert_cmp_ping(&self, record: &CmpPingRecord) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO ping_cmp VALUES (?1,?2,?3,?4,?5)",
            params![
                record.visit_id,
                record.cmp_id,
                record.cmp_name,
                record.policy_version,
                record.gdpr_applies,
            ],
        )?;
        Ok(())
    }

    pub fn insert_cookie_dialog(&self, record: &CookieDialogRecord) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO cookie_dialog VALUES (?1,?2,?3)",
            params![
                record.visit_id,
                record.found() as i64,
                record.kind.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Number of visits recorded so far, for end-of-crawl reporting
    pub fn visit_count(&self) -> StoreResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM site_visits", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = NORMAL;\n\
         PRAGMA busy_timeout = 5000;\n",
    )
}

fn flatten_side(side: Option<&UiElement>) -> (String, i64, i64, String, Option<String>) {
    match side {
        Some(element) => (
            element.text.clone(),
            element.width as i64,
            element.height as i64,
            element.bg_color.clone(),
            element.bg_color_hex.clone(),
        ),
        None => (String::new(), 0, 0, String::new(), None),
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
