use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the failures that can occur while the bot loads its
/// dataset, persists the allow-list, or talks to the messaging API.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Transport level HTTP failures (DNS, TLS, timeouts, body decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Raised when the remote workbook responds with a non-success status.
    #[error("failed to fetch {url}: HTTP {status}")]
    Fetch { url: String, status: u16 },

    /// Raised when the Bot API answers with `ok: false`.
    #[error("Telegram API error in {method}: {description}")]
    Telegram { method: String, description: String },

    /// Raised when lookup text cannot be parsed outside of a chat session.
    #[error("invalid query: {0}")]
    Query(#[from] crate::query::QueryError),

    /// Raised when a workbook cannot be interpreted at all.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
