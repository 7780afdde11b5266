use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use erm_core::{ErrorObject, PeerRequest, PeerResponse, RpcChannel, RpcError};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::error::EdgeClientError;
use crate::message::{self, Incoming};

/// Peer requests buffered between the socket reader and the dispatch loop.
pub const REQUEST_BUFFER: usize = 32;

type CallResult = Result<serde_json::Value, ErrorObject>;
type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<CallResult>>>>;
type FrameSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// JSON-RPC client for edge-core's gateway resource manager API.
///
/// A background task owns the read half of the websocket. It completes
/// pending calls by id and forwards edge-core's own requests to the receiver
/// returned from [`connect`](Self::connect). When the socket closes, pending
/// calls fail with [`RpcError::Closed`] and the request stream ends.
pub struct EdgeClient {
    sink: tokio::sync::Mutex<FrameSink>,
    pending: PendingCalls,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl EdgeClient {
    /// Open `ws://localhost{api_path}` over the Unix socket at `socket_path`.
    pub async fn connect(
        socket_path: &Path,
        api_path: &str,
    ) -> Result<(Self, mpsc::Receiver<PeerRequest>), EdgeClientError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| EdgeClientError::Connect {
                path: socket_path.to_path_buf(),
                source,
            })?;

        let url = format!("ws://localhost{api_path}");
        let (ws, _response) = tokio_tungstenite::client_async(url.as_str(), stream).await?;

        tracing::info!(
            socket = %socket_path.display(),
            %url,
            "Websocket connection established with edge-core"
        );
        Ok(Self::from_stream(ws))
    }

    /// Wrap an already-upgraded websocket.
    pub fn from_stream<S>(ws: WebSocketStream<S>) -> (Self, mpsc::Receiver<PeerRequest>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let pending = PendingCalls::default();
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_BUFFER);
        let reader = tokio::spawn(read_loop(stream, pending.clone(), requests_tx));

        let client = Self {
            sink: tokio::sync::Mutex::new(Box::pin(sink)),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        };
        (client, requests_rx)
    }

    /// Send a close frame. The reader task stops once edge-core acknowledges.
    pub async fn close(&self) -> Result<(), EdgeClientError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Close(None)).await?;
        Ok(())
    }

    async fn send_frame(&self, frame: String) -> Result<(), RpcError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::text(frame))
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    fn forget(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }
}

impl Drop for EdgeClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl RpcChannel for EdgeClient {
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, RpcError>> + Send + 'a>> {
        Box::pin(async move {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            {
                let mut pending = self
                    .pending
                    .lock()
                    .map_err(|e| RpcError::Transport(e.to_string()))?;
                pending.insert(id, tx);
            }

            tracing::trace!(id, method, "Calling edge-core");
            if let Err(e) = self.send_frame(message::call_frame(id, method, params)).await {
                self.forget(id);
                return Err(e);
            }

            let result = rx.await.map_err(|_| RpcError::Closed)?;
            result.map_err(RpcError::from)
        })
    }

    fn respond<'a>(
        &'a self,
        id: serde_json::Value,
        response: PeerResponse,
    ) -> Pin<Box<dyn Future<Output = Result<(), RpcError>> + Send + 'a>> {
        Box::pin(async move { self.send_frame(message::response_frame(id, response)).await })
    }
}

async fn read_loop<St>(mut stream: St, pending: PendingCalls, requests: mpsc::Sender<PeerRequest>)
where
    St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Websocket read failed");
                break;
            }
        };

        let text = match &frame {
            Message::Close(close) => {
                tracing::info!(?close, "edge-core closed the connection");
                break;
            }
            Message::Text(_) | Message::Binary(_) => match frame.to_text() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding non UTF-8 frame");
                    continue;
                }
            },
            _ => continue,
        };

        match message::classify(text) {
            // Never await here: call responses arrive on this same task.
            Ok(Incoming::Request(request)) => match requests.try_send(request) {
                Ok(()) => {}
                Err(TrySendError::Full(request)) => tracing::warn!(
                    id = %request.id,
                    method = %request.method,
                    "Request buffer full, dropping peer request"
                ),
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Request receiver dropped, discarding peer request")
                }
            },
            Ok(Incoming::Response { id, result }) => {
                let waiter = pending.lock().ok().and_then(|mut p| p.remove(&id));
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(result);
                    }
                    None => tracing::warn!(id, "Response for unknown call id"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "Discarding unparsable frame"),
        }
    }

    // Dropping the waiters fails every outstanding call.
    if let Ok(mut pending) = pending.lock() {
        pending.clear();
    }
}
