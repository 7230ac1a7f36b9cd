use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("schedule channel is not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    Send(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("server rejected {action}: {message}")]
    Rejected { action: String, message: String },

    #[error("the schedule changed since the last push; push again instead of retrying")]
    StaleSession,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
