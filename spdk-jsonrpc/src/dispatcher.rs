//! The single owner of the pending-call table and of the write half of the
//! connection.
//!
//! Client handles and the connection reader only talk to the dispatcher
//! through bounded queues, so neither the table nor the writer needs a lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::id::IdAllocator;
use crate::protocol::encode_request;
use crate::types::{response_id, Request, Response};

/// Single-use delivery channel of one call.
pub(crate) type Sink = oneshot::Sender<Result<Value>>;

/// Messages from client handles.
#[derive(Debug)]
pub(crate) enum Command {
    Submit {
        method: String,
        params: Value,
        assigned: oneshot::Sender<u32>,
        sink: Sink,
    },
    Abandon(u32),
    PendingCount(oneshot::Sender<usize>),
    Shutdown,
}

/// Messages from the connection reader.
#[derive(Debug)]
pub(crate) enum Inbound {
    Value(Value),
    /// End of stream, or the error that stopped the reader.
    Closed(Option<Error>),
}

#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub(crate) orphaned: AtomicU64,
}

#[derive(Debug)]
struct PendingCall {
    method: String,
    sink: Sink,
}

pub(crate) struct Dispatcher<W> {
    /// `None` once the connection is torn down.
    writer: Option<W>,
    ids: IdAllocator,
    pending: HashMap<u32, PendingCall>,
    commands: mpsc::Receiver<Command>,
    inbound: mpsc::Receiver<Inbound>,
    reader: Option<JoinHandle<()>>,
    stats: Arc<Stats>,
}

impl<W> Dispatcher<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn new(
        writer: W,
        ids: IdAllocator,
        commands: mpsc::Receiver<Command>,
        inbound: mpsc::Receiver<Inbound>,
        reader: JoinHandle<()>,
        stats: Arc<Stats>,
    ) -> Self {
        Dispatcher {
            writer: Some(writer),
            ids,
            pending: HashMap::new(),
            commands,
            inbound,
            reader: Some(reader),
            stats,
        }
    }

    /// Process events one at a time until every client handle is gone.
    pub(crate) async fn run(mut self) {
        let mut reader_done = false;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.teardown(None).await;
                        break;
                    }
                },
                inbound = self.inbound.recv(), if !reader_done => match inbound {
                    Some(Inbound::Value(value)) => self.handle_value(value),
                    Some(Inbound::Closed(reason)) => {
                        reader_done = true;
                        self.teardown(reason).await;
                    }
                    None => {
                        reader_done = true;
                        self.teardown(None).await;
                    }
                },
            }
        }

        debug!("dispatcher finished");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit {
                method,
                params,
                assigned,
                sink,
            } => self.submit(method, params, assigned, sink).await,
            Command::Abandon(id) => {
                if let Some(call) = self.pending.remove(&id) {
                    debug!("abandoned call {} ({})", id, call.method);
                }
            }
            Command::PendingCount(reply) => {
                let _ = reply.send(self.pending.len());
            }
            Command::Shutdown => self.teardown(None).await,
        }
    }

    async fn submit(
        &mut self,
        method: String,
        params: Value,
        assigned: oneshot::Sender<u32>,
        sink: Sink,
    ) {
        let Some(writer) = self.writer.as_mut() else {
            let _ = sink.send(Err(Error::ConnectionClosed));
            return;
        };

        // skip ids still in flight after a wraparound
        let mut id = self.ids.next();
        while self.pending.contains_key(&id) {
            id = self.ids.next();
        }

        let request = Request::new(id, method, params);
        let bytes = match encode_request(&request) {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = sink.send(Err(e));
                return;
            }
        };

        if assigned.send(id).is_err() {
            debug!("caller of {} left before sending", request.method);
            return;
        }

        debug!("-> {}", String::from_utf8_lossy(&bytes).trim_end());
        self.pending.insert(
            id,
            PendingCall {
                method: request.method,
                sink,
            },
        );

        let written = match writer.write_all(&bytes).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            error!("failed to send request {}: {}", id, e);
            if let Some(call) = self.pending.remove(&id) {
                let _ = call.sink.send(Err(e.into()));
            }
            self.teardown(None).await;
        }
    }

    fn handle_value(&mut self, value: Value) {
        let id = match response_id(&value) {
            Ok(id) => id,
            Err(e) => {
                warn!("discarding response: {}", e);
                return;
            }
        };

        let Some(call) = self.pending.remove(&id) else {
            self.stats.orphaned.fetch_add(1, Ordering::Relaxed);
            debug!("discarding response for unknown id {}: {}", id, value);
            return;
        };

        debug!("<- {}", value);
        let outcome = Response::from_value(value).and_then(Response::into_result);
        if call.sink.send(outcome).is_err() {
            self.stats.orphaned.fetch_add(1, Ordering::Relaxed);
            debug!("caller of {} ({}) went away", id, call.method);
        }
    }

    /// Fail every live call and close the connection. Safe to call repeatedly.
    async fn teardown(&mut self, reason: Option<Error>) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };

        match reason {
            Some(e) => error!("closing connection: {}", e),
            None => debug!("closing connection"),
        }

        for (id, call) in self.pending.drain() {
            debug!("call {} ({}) failed: connection closed", id, call.method);
            let _ = call.sink.send(Err(Error::ConnectionClosed));
        }

        if let Err(e) = writer.shutdown().await {
            debug!("shutdown of the write half failed: {}", e);
        }

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
