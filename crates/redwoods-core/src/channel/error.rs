use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("WebSocket connection error: {0}")]
    Connect(String),

    #[error("WebSocket connection error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}
