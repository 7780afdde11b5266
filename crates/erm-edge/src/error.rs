use std::path::PathBuf;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum EdgeClientError {
    #[error("could not connect to edge-core socket {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("invalid frame from edge-core: {0}")]
    InvalidFrame(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
