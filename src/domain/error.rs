use crate::core::packet::PeerId;
use thiserror::Error;

/// UartLink unified error type
#[derive(Error, Debug)]
pub enum UartLinkError {
    #[error("Transport not ready for peer {peer}")]
    TransportUnready { peer: PeerId },

    #[error("Unknown peer {peer}")]
    PeerUnknown { peer: PeerId },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

pub type UartLinkResult<T> = Result<T, UartLinkError>;
