//! Synchronous facade over the async [`Client`](crate::Client).
//!
//! The facade owns a small runtime that drives the reader and the
//! dispatcher; every call blocks the calling thread until the outcome is
//! known. Handles may be shared between threads, calls from several threads
//! are multiplexed on the one connection.

use std::os::unix::net::UnixStream;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use crate::client::{self, Config};
use crate::error::Result;
use crate::stream::Address;

#[derive(Debug)]
pub struct Client {
    inner: client::Client,
    runtime: Runtime,
}

fn runtime() -> Result<Runtime> {
    Ok(Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("spdk-jsonrpc")
        .enable_all()
        .build()?)
}

impl Client {
    pub fn connect(address: &Address) -> Result<Self> {
        Self::connect_with(address, Config::default())
    }

    pub fn connect_with(address: &Address, config: Config) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(client::Client::connect_with(address, config))?;
        Ok(Client { inner, runtime })
    }

    /// Take over an already connected socket.
    pub fn from_unix_stream(stream: UnixStream, config: Config) -> Result<Self> {
        let runtime = runtime()?;
        stream.set_nonblocking(true)?;

        let inner = {
            let _guard = runtime.enter();
            let stream = tokio::net::UnixStream::from_std(stream)?;
            let (r, w) = stream.into_split();
            client::Client::with_config(r, w, config)
        };

        Ok(Client { inner, runtime })
    }

    /// Call `method` and block at most `timeout` for its response.
    pub fn call<P>(&self, method: &str, params: P, timeout: Duration) -> Result<Value>
    where
        P: Serialize,
    {
        self.runtime.block_on(self.inner.call(method, params, timeout))
    }

    /// [`Client::call`] with the configured default timeout.
    pub fn send<P>(&self, method: &str, params: P) -> Result<Value>
    where
        P: Serialize,
    {
        self.runtime.block_on(self.inner.send(method, params))
    }

    pub fn shutdown(&self) {
        self.runtime.block_on(self.inner.shutdown())
    }

    pub fn pending_calls(&self) -> Result<usize> {
        self.runtime.block_on(self.inner.pending_calls())
    }

    pub fn orphaned_responses(&self) -> u64 {
        self.inner.orphaned_responses()
    }

    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout()
    }

    /// The async handle driving this facade.
    pub fn as_async(&self) -> &client::Client {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Decoder;
    use crate::Error;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::sync::Arc;
    use std::thread;

    fn config() -> Config {
        Config {
            id_base: Some(100),
            ..Config::default()
        }
    }

    /// Answer `count` requests in order, echoing the method name.
    fn echo_peer(mut peer: UnixStream, count: usize) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let mut decoder = Decoder::new();
            let mut buf = [0u8; 1024];
            let mut answered = 0;
            while answered < count {
                let n = peer.read(&mut buf).unwrap();
                if n == 0 {
                    return;
                }
                decoder.feed(&buf[..n]);
                while let Some(req) = decoder.decode().unwrap() {
                    let reply = json!({"jsonrpc": "2.0", "id": req["id"], "result": req["method"]});
                    peer.write_all(reply.to_string().as_bytes()).unwrap();
                    answered += 1;
                }
            }
        })
    }

    #[test]
    fn blocking_call() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let peer = echo_peer(theirs, 1);

        let client = Client::from_unix_stream(ours, config()).unwrap();
        let result = client.call("spdk_get_version", Value::Null, Duration::from_secs(5)).unwrap();
        assert_eq!(result, json!("spdk_get_version"));
        assert_eq!(client.pending_calls().unwrap(), 0);

        peer.join().unwrap();
    }

    #[test]
    fn blocking_calls_from_many_threads() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let peer = echo_peer(theirs, 8);

        let client = Arc::new(Client::from_unix_stream(ours, config()).unwrap());
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let client = client.clone();
                thread::spawn(move || {
                    let method = format!("method_{}", i);
                    let result = client.send(&method, json!({})).unwrap();
                    assert_eq!(result, json!(method));
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        peer.join().unwrap();
    }

    #[test]
    fn blocking_call_after_shutdown() {
        let (ours, _theirs) = UnixStream::pair().unwrap();
        let client = Client::from_unix_stream(ours, config()).unwrap();

        client.shutdown();
        client.shutdown();

        let e = client.send("bdev_get_bdevs", Value::Null).unwrap_err();
        assert!(matches!(e, Error::ConnectionClosed), "{:?}", e);
    }
}
