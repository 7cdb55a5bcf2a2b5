use std::fmt;

/// Custom error type that includes exit codes
#[derive(Debug)]
pub enum CrawlerError {
    /// Site list or resource file could not be loaded (exit code 2)
    ResourceFailed(String),
    /// Results database could not be opened or written (exit code 3)
    StoreFailed(String),
    /// WebDriver connection failed (exit code 4)
    WebDriverFailed(String),
    /// Operation timeout (exit code 5)
    Timeout(String),
    /// Generic error (exit code 1)
    Other(anyhow::Error),
}

impl CrawlerError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrawlerError::ResourceFailed(_) => 2,
            CrawlerError::StoreFailed(_) => 3,
            CrawlerError::WebDriverFailed(_) => 4,
            CrawlerError::Timeout(_) => 5,
            CrawlerError::Other(_) => 1,
        }
    }
}

impl fmt::Display for CrawlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlerError::ResourceFailed(msg) => {
                write!(f, "Failed to load crawl resources: {}", msg)
            }
            CrawlerError::StoreFailed(msg) => {
                write!(f, "Results database error: {}", msg)
            }
            CrawlerError::WebDriverFailed(msg) => {
                write!(f, "WebDriver connection failed: {}", msg)
            }
            CrawlerError::Timeout(msg) => {
                write!(f, "Operation timed out: {}", msg)
            }
            CrawlerError::Other(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CrawlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CrawlerError::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CrawlerError {
    fn from(err: anyhow::Error) -> Self {
        // Try to detect specific error types from the error message
        let msg = err.to_string();

        if msg.contains("site list") || msg.contains("phrase file") || msg.contains("cmplist") {
            CrawlerError::ResourceFailed(msg)
        } else if msg.contains("results database") || msg.contains("SQLite") {
            CrawlerError::StoreFailed(msg)
        } else if msg.contains("Failed to connect to WebDriver")
            || msg.contains("WebDriver")
            || msg.contains("geckodriver")
        {
            CrawlerError::WebDriverFailed(msg)
        } else if msg.contains("timeout") || msg.contains("timed out") {
            CrawlerError::Timeout(msg)
        } else {
            CrawlerError::Other(err)
        }
    }
}
