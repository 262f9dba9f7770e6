// ⚠️ Collaborator errors
// The resolution engine itself never fails: unparseable dates and missing
// fields degrade to None/defaults. Only the outside world (sheets, files,
// the Bot API, configuration) produces these.

use thiserror::Error;

/// Result type for collaborator operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failure or non-success status (sheet export, Bot API)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed CSV export
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Local file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bot API answered `ok: false`
    #[error("Telegram API error: {description}")]
    Telegram { description: String },

    /// Invalid or missing configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}
