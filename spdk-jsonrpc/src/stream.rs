//! Daemon addresses and the streams connecting to them.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::net::{TcpStream, UnixStream};

use crate::error::{Error, Result};

/// Where `spdk_tgt` listens by default.
pub const DEFAULT_SOCKET_PATH: &str = "/var/tmp/spdk.sock";

/// A daemon address.
///
/// Supported formats:
/// - `unix:/path/to/socket` - Unix domain socket
/// - `tcp:host:port` - TCP
/// - `/path/to/socket` - a bare path is a Unix domain socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Unix(PathBuf),
    Tcp(String),
}

impl Default for Address {
    fn default() -> Self {
        Address::Unix(PathBuf::from(DEFAULT_SOCKET_PATH))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(address: &str) -> Result<Self> {
        if let Some(addr) = address.strip_prefix("tcp:") {
            if addr.rfind(':').is_none() {
                return Err(Error::InvalidAddress(address.into()));
            }
            Ok(Address::Tcp(addr.into()))
        } else if let Some(addr) = address.strip_prefix("unix:") {
            if addr.is_empty() {
                return Err(Error::InvalidAddress(address.into()));
            }
            Ok(Address::Unix(addr.into()))
        } else if address.starts_with('/') || address.starts_with('.') {
            Ok(Address::Unix(address.into()))
        } else {
            Err(Error::InvalidAddress(address.into()))
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Unix(path) => write!(f, "unix:{}", path.display()),
            Address::Tcp(addr) => write!(f, "tcp:{}", addr),
        }
    }
}

/// Async stream wrapper for TCP and Unix domain sockets
#[derive(Debug)]
pub enum AsyncStream {
    TCP(TcpStream),
    UNIX(UnixStream),
}

impl AsyncStream {
    pub async fn connect(address: &Address) -> Result<Self> {
        match address {
            Address::Unix(path) => Ok(AsyncStream::UNIX(UnixStream::connect(path).await?)),
            Address::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await?;
                stream.set_nodelay(true)?;
                Ok(AsyncStream::TCP(stream))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_addresses() {
        assert_eq!(
            "unix:/var/tmp/spdk.sock".parse::<Address>().unwrap(),
            Address::Unix("/var/tmp/spdk.sock".into())
        );
        assert_eq!(
            "/run/spdk.sock".parse::<Address>().unwrap(),
            Address::Unix("/run/spdk.sock".into())
        );
        assert_eq!(
            "tcp:127.0.0.1:5260".parse::<Address>().unwrap(),
            Address::Tcp("127.0.0.1:5260".into())
        );
        assert!("tcp:nohost".parse::<Address>().is_err());
        assert!("unix:".parse::<Address>().is_err());
        assert!("spdk.sock".parse::<Address>().is_err());
    }

    #[test]
    fn display_round_trips() {
        let addr = Address::default();
        assert_eq!(addr.to_string(), "unix:/var/tmp/spdk.sock");
        assert_eq!(addr.to_string().parse::<Address>().unwrap(), addr);
    }

    #[tokio::test]
    async fn connect_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let addr = Address::Unix(dir.path().join("missing.sock"));
        assert!(AsyncStream::connect(&addr).await.is_err());
    }
}
