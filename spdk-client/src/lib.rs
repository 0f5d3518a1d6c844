//! Typed clients for the SPDK target.
//!
//! [`SpdkClient`] offers one method per daemon operation. Requests are
//! plain serde structs, results are decoded into the types of the [`bdev`]
//! and [`nvmf`] modules.
//!
//! ```no_run
//! # fn main() -> spdk_client::Result<()> {
//! use spdk_client::SpdkClient;
//!
//! let spdk = SpdkClient::connect(&Default::default())?;
//! let name = spdk.bdev_aio_create("/dev/foo", "aio0", 4096)?;
//! let lvs = spdk.bdev_lvol_create_lvstore(&name, "lvs0", None)?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate serde_derive;

use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spdk_jsonrpc::{blocking, Address, Config};

pub use spdk_jsonrpc::{Error, Result, RpcError};

pub mod bdev;
pub mod nvmf;


/// A connection to one SPDK target.
#[derive(Debug)]
pub struct SpdkClient {
    conn: blocking::Client,
    timeout: Duration,
}

impl SpdkClient {
    /// Connect with the default settings.
    pub fn connect(address: &Address) -> Result<Self> {
        let conn = blocking::Client::connect_with(address, Config::default())?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: blocking::Client) -> Self {
        let timeout = conn.default_timeout();
        SpdkClient { conn, timeout }
    }

    /// Deadline for every following call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The underlying connection, for methods without a typed wrapper.
    pub fn connection(&self) -> &blocking::Client {
        &self.conn
    }

    /// Call `method` and decode its result as `T`.
    ///
    /// A result of another shape is a [`Error::Protocol`].
    pub(crate) fn send_command<P, T>(&self, method: &str, params: P) -> Result<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let result = self.conn.call(method, params, self.timeout)?;
        decode_result(method, &result)
    }
}

pub(crate) fn decode_result<T>(method: &str, result: &Value) -> Result<T>
where
    T: DeserializeOwned,
{
    T::deserialize(result).map_err(|e| {
        debug!("unexpected result of {}: {}", method, result);
        Error::Protocol(format!("invalid result of {}: {}", method, e))
    })
}
