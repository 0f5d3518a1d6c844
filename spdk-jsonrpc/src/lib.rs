//! Client for the JSON-RPC 2.0 control socket of the SPDK target daemon.
//!
//! One connection carries many overlapping calls. Every request gets a
//! correlation id, responses may arrive in any order and are routed back to
//! the caller that issued the matching request.
//!
//! Two tasks drive a connection: a reader decoding the inbound byte stream
//! and a dispatcher owning the table of pending calls and the write half.
//! [`Client`] handles talk to the dispatcher over a queue;
//! [`blocking::Client`] wraps them for synchronous callers.
//!
//! ```no_run
//! # fn main() -> spdk_jsonrpc::Result<()> {
//! use serde_json::json;
//! use spdk_jsonrpc::{blocking, Address};
//!
//! let client = blocking::Client::connect(&"unix:/var/tmp/spdk.sock".parse::<Address>()?)?;
//! let bdevs = client.send("bdev_get_bdevs", json!({}))?;
//! println!("{}", bdevs);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate serde_derive;

pub use crate::client::{Client, Config, PendingReply, DEFAULT_QUEUE_CAPACITY, DEFAULT_TIMEOUT};
pub use crate::error::{Error, Result};
pub use crate::id::IdAllocator;
pub use crate::stream::{Address, AsyncStream, DEFAULT_SOCKET_PATH};
pub use crate::types::{response_id, Request, Response, RpcError, JSONRPC_VERSION};

pub mod blocking;
mod client;
mod dispatcher;
mod error;
pub mod id;
pub mod protocol;
mod reader;
pub mod stream;
mod types;

#[cfg(test)]
mod test;
