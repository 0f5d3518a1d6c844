//! Async client handle.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::dispatcher::{Command, Dispatcher, Stats};
use crate::error::{Error, Result};
use crate::id::IdAllocator;
use crate::reader::read_loop;
use crate::stream::{Address, AsyncStream};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Connection settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the submission and the inbound queue.
    pub queue_capacity: usize,
    /// Deadline used by [`Client::send`].
    pub default_timeout: Duration,
    /// Seed of the id counter; derived from the process id when unset.
    pub id_base: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            default_timeout: DEFAULT_TIMEOUT,
            id_base: None,
        }
    }
}

/// A cheap, cloneable handle to one daemon connection.
///
/// Every clone submits through the same dispatcher task. The connection is
/// closed when the last handle is dropped or on [`Client::shutdown`].
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> spdk_jsonrpc::Result<()> {
/// use serde_json::json;
/// use spdk_jsonrpc::{Address, Client};
/// use std::time::Duration;
///
/// let client = Client::connect(&Address::default()).await?;
/// let name = client
///     .call(
///         "bdev_aio_create",
///         json!({"filename": "/dev/foo", "name": "aio0", "block_size": 4096}),
///         Duration::from_secs(5),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    commands: mpsc::Sender<Command>,
    stats: Arc<Stats>,
    default_timeout: Duration,
}

impl Client {
    pub async fn connect(address: &Address) -> Result<Self> {
        Self::connect_with(address, Config::default()).await
    }

    pub async fn connect_with(address: &Address, config: Config) -> Result<Self> {
        let stream = AsyncStream::connect(address).await?;
        debug!("connected to {}", address);

        Ok(match stream {
            AsyncStream::UNIX(stream) => {
                let (r, w) = stream.into_split();
                Self::with_config(r, w, config)
            }
            AsyncStream::TCP(stream) => {
                let (r, w) = stream.into_split();
                Self::with_config(r, w, config)
            }
        })
    }

    /// Run the client over any bidirectional byte stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(stream: S, config: Config) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (r, w) = tokio::io::split(stream);
        Self::with_config(r, w, config)
    }

    /// Spawn the reader and the dispatcher for the given halves.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_config<R, W>(reader: R, writer: W, config: Config) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let capacity = config.queue_capacity.max(1);
        let (commands_tx, commands_rx) = mpsc::channel(capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let stats = Arc::new(Stats::default());

        let ids = match config.id_base {
            Some(base) => IdAllocator::with_base(base),
            None => IdAllocator::new(),
        };

        let reader = tokio::spawn(read_loop(reader, inbound_tx));
        let dispatcher = Dispatcher::new(writer, ids, commands_rx, inbound_rx, reader, stats.clone());
        tokio::spawn(dispatcher.run());

        Client {
            commands: commands_tx,
            stats,
            default_timeout: config.default_timeout,
        }
    }

    /// Hand a call to the dispatcher without waiting for its response.
    ///
    /// Resolves once the request has an id; await the returned
    /// [`PendingReply`] for the outcome.
    pub async fn submit<P>(&self, method: &str, params: P) -> Result<PendingReply>
    where
        P: Serialize,
    {
        let params = serde_json::to_value(params)?;
        let (assigned, assigned_rx) = oneshot::channel();
        let (sink, rx) = oneshot::channel();

        self.commands
            .send(Command::Submit {
                method: method.into(),
                params,
                assigned,
                sink,
            })
            .await
            .map_err(|_| Error::ConnectionClosed)?;

        match assigned_rx.await {
            Ok(id) => Ok(PendingReply {
                id,
                rx,
                commands: self.commands.clone(),
                settled: false,
            }),
            // refused; the reason is on the sink
            Err(_) => match rx.await {
                Ok(Err(e)) => Err(e),
                _ => Err(Error::ConnectionClosed),
            },
        }
    }

    /// Call `method` and wait at most `timeout` for its outcome.
    ///
    /// The deadline covers queueing the request as well as the wait for the
    /// response. A timeout only stops the local wait, the daemon may still
    /// carry the operation out. A response arriving later is dropped.
    pub async fn call<P>(&self, method: &str, params: P, timeout: Duration) -> Result<Value>
    where
        P: Serialize,
    {
        let mut submitted: Option<PendingReply> = None;

        let outcome = tokio::time::timeout(timeout, async {
            let reply = submitted.insert(self.submit(method, params).await?);
            reply.await
        })
        .await;

        match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                // dropping the reply releases the call; a submission still
                // waiting for its id is discarded by the dispatcher
                let id = submitted.map(|reply| reply.id());
                Err(Error::Timeout {
                    method: method.into(),
                    id,
                    timeout,
                })
            }
        }
    }

    /// [`Client::call`] with the configured default timeout.
    pub async fn send<P>(&self, method: &str, params: P) -> Result<Value>
    where
        P: Serialize,
    {
        self.call(method, params, self.default_timeout).await
    }

    /// Close the connection; every outstanding call fails with
    /// [`Error::ConnectionClosed`]. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// Number of calls still waiting for a response.
    pub async fn pending_calls(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::PendingCount(tx))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }

    /// Responses that matched no waiting call, e.g. late replies of timed
    /// out calls.
    pub fn orphaned_responses(&self) -> u64 {
        self.stats.orphaned.load(Ordering::Relaxed)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

/// The outcome of a submitted call; a future resolving to its result.
///
/// Dropping it before it resolves releases the pending call.
#[derive(Debug)]
pub struct PendingReply {
    id: u32,
    rx: oneshot::Receiver<Result<Value>>,
    commands: mpsc::Sender<Command>,
    settled: bool,
}

impl PendingReply {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Stop waiting and release the pending call in the dispatcher.
    pub fn abandon(self) {
        drop(self)
    }
}

impl Future for PendingReply {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => return Poll::Pending,
        };
        self.settled = true;
        Poll::Ready(outcome.unwrap_or_else(|_| Err(Error::ConnectionClosed)))
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        match self.commands.try_send(Command::Abandon(self.id)) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(command)) => match Handle::try_current() {
                Ok(handle) => {
                    let commands = self.commands.clone();
                    handle.spawn(async move {
                        let _ = commands.send(command).await;
                    });
                }
                Err(_) => warn!("call {} left pending: command queue full", self.id),
            },
        }
    }
}
