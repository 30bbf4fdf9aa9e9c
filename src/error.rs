//! Error handling module.
use thiserror::Error;

/// Listener error enum.
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("WebSocketError: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("TransportError: {0}")]
    TransportError(String),

    #[error("DecodeError: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("UnexpectedError: {0}")]
    UnexpectedError(String),

    #[error("NetworkError: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("DeliveryError: {0}")]
    DeliveryError(String),

    #[error("ConfigError: {0}")]
    ConfigError(String),

    #[error("ReconnectLimitExceeded: gave up after {0} connection attempts")]
    ReconnectLimitExceeded(u32),
}

impl ListenerError {
    /// Errors confined to a single inbound frame: the frame is dropped and the
    /// stream keeps going.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            ListenerError::DecodeError(_) | ListenerError::UnexpectedError(_)
        )
    }

    /// Errors that tear down the current stream connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ListenerError::WebSocketError(_) | ListenerError::TransportError(_)
        )
    }
}
