pub mod discord;
pub mod rejection_log;

pub use discord::DiscordSink;
pub use rejection_log::RejectionLog;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Transport failure. The URL is stripped because webhook URLs embed their secret.
    #[error("Delivery failed: {0}")]
    Http(String),

    #[error("Sink returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Sink configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        SinkError::Http(e.without_url().to_string())
    }
}
