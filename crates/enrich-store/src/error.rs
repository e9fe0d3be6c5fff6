use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("count response carried no usable Content-Range header")]
    MissingCountHeader,

    #[error("no provider with id {0}")]
    UnknownProvider(String),

    #[error("{0}")]
    Other(String),
}
