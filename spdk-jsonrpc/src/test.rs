use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};

use crate::protocol::Decoder;
use crate::*;

/// The daemon side of an in-memory connection.
struct MockPeer<S> {
    stream: S,
    decoder: Decoder,
}

impl<S> MockPeer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(stream: S) -> Self {
        MockPeer {
            stream,
            decoder: Decoder::new(),
        }
    }

    async fn request(&mut self) -> Value {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(value) = self.decoder.decode().unwrap() {
                return value;
            }
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed the connection");
            self.decoder.feed(&buf[..n]);
        }
    }

    async fn reply(&mut self, response: Value) {
        self.raw(response.to_string().as_bytes()).await;
    }

    async fn raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }
}

fn connect() -> (Client, MockPeer<DuplexStream>) {
    let (ours, theirs) = duplex(64 * 1024);
    let client = Client::from_stream(
        ours,
        Config {
            id_base: Some(5000),
            ..Config::default()
        },
    );
    (client, MockPeer::new(theirs))
}

#[tokio::test]
async fn test_out_of_order_replies() {
    let (client, mut peer) = connect();

    let first = client.submit("bdev_get_bdevs", json!({"name": "a"})).await.unwrap();
    let second = client.submit("bdev_get_bdevs", json!({"name": "b"})).await.unwrap();
    assert_eq!(first.id(), 5001);
    assert_eq!(second.id(), 5002);

    let req = peer.request().await;
    assert_eq!(
        req,
        json!({"id": 5001, "jsonrpc": "2.0", "method": "bdev_get_bdevs", "params": {"name": "a"}})
    );
    let req = peer.request().await;
    assert_eq!(req["id"], 5002);

    peer.reply(json!({"jsonrpc": "2.0", "id": 5002, "result": "b"})).await;
    peer.reply(json!({"jsonrpc": "2.0", "id": 5001, "result": "a"})).await;

    assert_eq!(second.await.unwrap(), json!("b"));
    assert_eq!(first.await.unwrap(), json!("a"));
    assert_eq!(client.pending_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_callers() {
    let (client, mut peer) = connect();

    let calls: Vec<_> = (0..10)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let result = client.send("echo", json!({ "n": i })).await.unwrap();
                assert_eq!(result, json!(i));
            })
        })
        .collect();

    let mut requests = Vec::new();
    for _ in 0..10 {
        requests.push(peer.request().await);
    }
    for req in requests.iter().rev() {
        peer.reply(json!({"id": req["id"], "result": req["params"]["n"]})).await;
    }

    for call in calls {
        call.await.unwrap();
    }
}

#[tokio::test]
async fn test_timeout_then_late_reply() {
    let (client, mut peer) = connect();

    let started = Instant::now();
    let e = client
        .call("bdev_lvol_create", json!({"lvol_name": "lv0"}), Duration::from_millis(50))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(50), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "{:?}", elapsed);

    match e {
        Error::Timeout { ref method, id, .. } => {
            assert_eq!(method, "bdev_lvol_create");
            assert_eq!(id, Some(5001));
        }
        ref other => panic!("unexpected {:?}", other),
    }
    assert!(e.is_timeout());
    assert_eq!(client.pending_calls().await.unwrap(), 0);

    let req = peer.request().await;
    peer.reply(json!({"id": req["id"], "result": "late"})).await;

    // the next call is answered after the late reply, so it has been routed
    let next = client.submit("spdk_get_version", Value::Null).await.unwrap();
    let req = peer.request().await;
    assert!(req.get("params").is_none());
    peer.reply(json!({"id": req["id"], "result": {"version": "SPDK v24.01"}})).await;
    assert_eq!(next.await.unwrap()["version"], "SPDK v24.01");

    assert_eq!(client.orphaned_responses(), 1);
    assert_eq!(client.pending_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn test_rpc_error() {
    let (client, mut peer) = connect();

    let call = client.submit("bdev_aio_create", json!({})).await.unwrap();
    let req = peer.request().await;
    peer.reply(json!({
        "jsonrpc": "2.0",
        "id": req["id"],
        "error": {"code": -32602, "message": "invalid params"}
    }))
    .await;

    let e = call.await.unwrap_err();
    assert_eq!(
        e.rpc_error(),
        Some(&RpcError {
            code: -32602,
            message: "invalid params".into()
        })
    );
}

#[tokio::test]
async fn test_bad_envelope_fails_one_call() {
    let (client, mut peer) = connect();

    let bad = client.submit("bdev_raid_get_bdevs", json!({"category": "all"})).await.unwrap();
    let good = client.submit("bdev_raid_get_bdevs", json!({"category": "all"})).await.unwrap();
    let bad_req = peer.request().await;
    let good_req = peer.request().await;

    // neither result nor error
    peer.reply(json!({"jsonrpc": "2.0", "id": bad_req["id"]})).await;
    // no usable id, dropped
    peer.reply(json!({"jsonrpc": "2.0", "result": []})).await;
    peer.reply(json!({"jsonrpc": "2.0", "id": good_req["id"], "result": []})).await;

    assert!(matches!(bad.await, Err(Error::Protocol(_))));
    assert_eq!(good.await.unwrap(), json!([]));
}

#[tokio::test]
async fn test_close_fails_all_outstanding() {
    let (client, mut peer) = connect();

    let mut calls = Vec::new();
    for _ in 0..3 {
        calls.push(client.submit("bdev_get_bdevs", Value::Null).await.unwrap());
    }
    for _ in 0..3 {
        peer.request().await;
    }
    drop(peer);

    for call in calls {
        assert!(call.await.unwrap_err().is_connection_closed());
    }
    assert!(client
        .send("bdev_get_bdevs", Value::Null)
        .await
        .unwrap_err()
        .is_connection_closed());
}

#[tokio::test]
async fn test_garbage_is_fatal() {
    let (client, mut peer) = connect();

    let call = client.submit("bdev_get_bdevs", Value::Null).await.unwrap();
    peer.request().await;
    peer.raw(b"}{ not json").await;

    assert!(call.await.unwrap_err().is_connection_closed());
    assert!(client.pending_calls().await.unwrap() == 0);
}

#[tokio::test]
async fn test_shutdown() {
    let (client, _peer) = connect();

    let call = client.submit("bdev_get_bdevs", Value::Null).await.unwrap();
    client.shutdown().await;
    client.shutdown().await;

    assert!(call.await.unwrap_err().is_connection_closed());
    assert!(client
        .submit("bdev_get_bdevs", Value::Null)
        .await
        .unwrap_err()
        .is_connection_closed());
}

#[tokio::test]
async fn test_unknown_id_is_orphaned() {
    let (client, mut peer) = connect();

    peer.reply(json!({"id": 1, "result": true})).await;

    let call = client.submit("bdev_aio_delete", json!({"name": "aio0"})).await.unwrap();
    let req = peer.request().await;
    peer.reply(json!({"id": req["id"], "result": true})).await;
    assert_eq!(call.await.unwrap(), json!(true));

    assert_eq!(client.orphaned_responses(), 1);
}

#[tokio::test]
async fn test_dropped_reply_releases_call() {
    let (client, mut peer) = connect();

    let call = client.submit("bdev_get_bdevs", Value::Null).await.unwrap();
    drop(call);
    peer.request().await;

    assert_eq!(client.pending_calls().await.unwrap(), 0);
}

/// A peer that stops reading leaves the dispatcher blocked in a write.
fn connect_stalled(queue_capacity: usize) -> (Client, MockPeer<DuplexStream>) {
    let (ours, theirs) = duplex(64);
    let client = Client::from_stream(
        ours,
        Config {
            queue_capacity,
            id_base: Some(5000),
            ..Config::default()
        },
    );
    (client, MockPeer::new(theirs))
}

#[tokio::test]
async fn test_deadline_holds_while_peer_stalls() {
    let (client, _peer) = connect_stalled(16);
    let blob = "x".repeat(4096);
    let deadline = Duration::from_millis(100);

    let e = client.call("bdev_aio_create", json!({ "filename": blob }), deadline).await.unwrap_err();
    assert!(matches!(e, Error::Timeout { id: Some(5001), .. }), "{:?}", e);

    // the dispatcher is still stuck writing the first request
    let started = Instant::now();
    let e = tokio::time::timeout(
        Duration::from_secs(3),
        client.call("bdev_get_bdevs", json!({}), deadline),
    )
    .await
    .expect("call outlived its deadline")
    .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(e, Error::Timeout { id: None, .. }), "{:?}", e);
    assert!(elapsed >= deadline, "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "{:?}", elapsed);
}

#[tokio::test]
async fn test_drop_with_full_queue_releases_call() {
    let (client, mut peer) = connect_stalled(1);
    let blob = "x".repeat(4096);

    let first = client.submit("bdev_aio_create", json!({ "filename": blob })).await.unwrap();
    assert_eq!(first.id(), 5001);

    // occupies the only queue slot while the first request is being written
    let second = {
        let client = client.clone();
        tokio::spawn(async move { client.submit("bdev_get_bdevs", Value::Null).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(first);

    assert_eq!(peer.request().await["id"], 5001);
    assert_eq!(peer.request().await["id"], 5002);
    let second = second.await.unwrap().unwrap();

    assert_eq!(client.pending_calls().await.unwrap(), 1);
    peer.reply(json!({"id": 5002, "result": []})).await;
    assert_eq!(second.await.unwrap(), json!([]));
    assert_eq!(client.pending_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn test_aio_create_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spdk.sock");
    let listener = tokio::net::UnixListener::bind(&path).unwrap();

    let daemon = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut peer = MockPeer::new(stream);

        let req = peer.request().await;
        assert_eq!(req["method"], "bdev_aio_create");
        assert_eq!(
            req["params"],
            json!({"filename": "/dev/foo", "name": "aio0", "block_size": 4096})
        );
        peer.reply(json!({"jsonrpc": "2.0", "id": req["id"], "result": "aio0"})).await;
    });

    let address: Address = format!("unix:{}", path.display()).parse().unwrap();
    let client = Client::connect(&address).await.unwrap();
    let name = client
        .call(
            "bdev_aio_create",
            json!({"filename": "/dev/foo", "name": "aio0", "block_size": 4096}),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(name, json!("aio0"));

    daemon.await.unwrap();
}

#[test]
fn test_client_is_send_sync() {
    static_assertions::assert_impl_all!(Client: Send, Sync, Clone);
    static_assertions::assert_impl_all!(blocking::Client: Send, Sync);
    static_assertions::assert_impl_all!(PendingReply: Send);
}
