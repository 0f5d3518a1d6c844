use std::io;
use std::time::Duration;

use crate::RpcError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error")]
    Io(#[source] io::Error),
    #[error("Connection Closed")]
    ConnectionClosed,
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),
    #[error("Timeout Error: no reply to '{method}' within {timeout:?}")]
    Timeout {
        method: String,
        /// `None` if the deadline passed before the request got an id.
        id: Option<u32>,
        timeout: Duration,
    },
    #[error("JSON Deserialization Error: {0}")]
    Decode(String),
    #[error("Protocol Error: {0}")]
    Protocol(String),
    #[error("JSON Serialization Error")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(e),
        }
    }
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed)
    }

    /// The daemon-reported error, if this is one.
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            Error::Rpc(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
