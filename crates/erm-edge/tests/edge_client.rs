//! Drives `EdgeClient` against a fake edge-core listening on a Unix socket.

use std::time::Duration;

use erm_core::rpc::METHOD_ADD_RESOURCE;
use erm_core::{ErrorObject, RpcChannel, RpcError};
use erm_edge::client::REQUEST_BUFFER;
use erm_edge::{EdgeClient, EdgeClientError};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::UnixListener;
use tokio_tungstenite::tungstenite::Message;

async fn next_json<S>(ws: &mut S) -> serde_json::Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = ws.next().await.unwrap().unwrap();
        if let Ok(text) = msg.to_text()
            && !text.is_empty()
        {
            return serde_json::from_str(text).unwrap();
        }
    }
}

#[tokio::test]
async fn calls_are_correlated_and_peer_requests_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("edge.sock");
    let listener = UnixListener::bind(&socket).unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let call = next_json(&mut ws).await;
        assert_eq!(call["method"], METHOD_ADD_RESOURCE);
        assert_eq!(call["jsonrpc"], "2.0");
        let reply = json!({"jsonrpc": "2.0", "id": call["id"], "result": "ok"});
        ws.send(Message::text(reply.to_string())).await.unwrap();

        let call = next_json(&mut ws).await;
        let reply = json!({
            "jsonrpc": "2.0",
            "id": call["id"],
            "error": {"code": -32000, "message": "Resource already exists"}
        });
        ws.send(Message::text(reply.to_string())).await.unwrap();

        let request = json!({
            "jsonrpc": "2.0",
            "id": "edge-1",
            "method": "write",
            "params": {"uri": {"objectId": 100, "objectInstanceId": 0, "resourceId": 3}, "value": "aGk="}
        });
        ws.send(Message::text(request.to_string())).await.unwrap();

        next_json(&mut ws).await
    });

    let (client, mut requests) = EdgeClient::connect(&socket, "/1/grm").await.unwrap();

    let result = client.call(METHOD_ADD_RESOURCE, json!({"objects": []})).await.unwrap();
    assert_eq!(result, json!("ok"));

    let err = client.call(METHOD_ADD_RESOURCE, json!({"objects": []})).await.unwrap_err();
    assert!(matches!(err, RpcError::Remote { code: -32000, .. }));

    let request = tokio::time::timeout(Duration::from_secs(5), requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.method, "write");
    assert_eq!(request.id, json!("edge-1"));

    client
        .respond(request.id.clone(), Err(ErrorObject::invalid_params()))
        .await
        .unwrap();

    let response = server.await.unwrap();
    assert_eq!(response["id"], "edge-1");
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn call_completes_while_request_buffer_is_full() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("edge.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let flood = REQUEST_BUFFER + 8;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let call = next_json(&mut ws).await;

        for n in 0..flood {
            let request = json!({
                "jsonrpc": "2.0",
                "id": n,
                "method": "write",
                "params": {"uri": {"objectId": 100, "objectInstanceId": 0, "resourceId": 3}, "value": "aGk="}
            });
            ws.send(Message::text(request.to_string())).await.unwrap();
        }
        let reply = json!({"jsonrpc": "2.0", "id": call["id"], "result": "ok"});
        ws.send(Message::text(reply.to_string())).await.unwrap();
        ws
    });

    let (client, mut requests) = EdgeClient::connect(&socket, "/1/grm").await.unwrap();

    // Nothing drains `requests` until the call returns.
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.call(METHOD_ADD_RESOURCE, json!({"objects": []})),
    )
    .await
    .expect("call blocked behind undrained peer requests")
    .unwrap();
    assert_eq!(result, json!("ok"));

    let mut buffered = Vec::new();
    while let Ok(request) = requests.try_recv() {
        buffered.push(request.id);
    }
    assert_eq!(buffered.len(), REQUEST_BUFFER);
    assert_eq!(buffered[0], json!(0));

    drop(server.await.unwrap());
}

#[tokio::test]
async fn closed_connection_fails_calls_and_ends_request_stream() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("edge.sock");
    let listener = UnixListener::bind(&socket).unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = next_json(&mut ws).await;
        ws.close(None).await.unwrap();
    });

    let (client, mut requests) = EdgeClient::connect(&socket, "/1/grm").await.unwrap();
    let err = client.call("gw_resource_manager_register", json!({"name": "x"})).await.unwrap_err();
    assert!(matches!(err, RpcError::Closed | RpcError::Transport(_)));

    let next = tokio::time::timeout(Duration::from_secs(5), requests.recv()).await.unwrap();
    assert!(next.is_none());
    server.await.unwrap();
}

#[tokio::test]
async fn missing_socket_is_connect_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = EdgeClient::connect(&dir.path().join("absent.sock"), "/1/grm").await;
    assert!(matches!(result, Err(EdgeClientError::Connect { .. })));
}
