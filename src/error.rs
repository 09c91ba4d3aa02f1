use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("Symbol must not be empty")]
    InvalidSymbol,

    #[error("Lower bound {lower} must be below upper bound {upper}")]
    InvalidRange { lower: String, upper: String },

    #[error("{0} is already being watched")]
    DuplicateSymbol(String),

    #[error("{0} is not being watched")]
    NotFound(String),

    #[error("No alert at index {index} (history holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("WebSocket error: {0}")]
    WebsocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Event receiver dropped")]
    ReceiverDropped,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Controller is no longer running")]
    ControllerStopped,
}
