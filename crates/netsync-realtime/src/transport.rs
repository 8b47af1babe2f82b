//! Realtime transport: a text-message sink and stream.
//!
//! The listener and heartbeat only see the [`MessageSink`] and
//! [`MessageStream`] traits. [`connect`] provides the websocket
//! implementation; tests substitute in-memory channels.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::error::{TransportError, TransportResult};

/// Outbound half, shared by the listener and the heartbeat.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, text: String) -> TransportResult<()>;

    async fn close(&self) -> TransportResult<()>;
}

/// Inbound half, owned by the receive loop.
#[async_trait]
pub trait MessageStream: Send {
    /// Next text message; `None` once the peer has closed the stream.
    async fn next_message(&mut self) -> Option<TransportResult<String>>;
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsSink {
    inner: Mutex<SplitSink<Socket, Message>>,
}

pub struct WsStream {
    inner: SplitStream<Socket>,
}

/// Dial `<endpoint>?apikey=<key>` with a bearer token and split the
/// socket into its two halves.
pub async fn connect(endpoint: &str, api_key: &str) -> TransportResult<(WsSink, WsStream)> {
    let mut url = Url::parse(endpoint).map_err(|e| TransportError::Endpoint {
        url: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().append_pair("apikey", api_key);

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::Endpoint {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
    let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|e| TransportError::Connect(format!("invalid api key header: {e}")))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (socket, response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    info!(endpoint, status = %response.status(), "connected to realtime server");

    let (sink, stream) = socket.split();
    Ok((
        WsSink {
            inner: Mutex::new(sink),
        },
        WsStream { inner: stream },
    ))
}

#[async_trait]
impl MessageSink for WsSink {
    async fn send(&self, text: String) -> TransportResult<()> {
        self.inner
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&self) -> TransportResult<()> {
        self.inner
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

#[async_trait]
impl MessageStream for WsStream {
    async fn next_message(&mut self) -> Option<TransportResult<String>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "realtime server closed the connection");
                    return None;
                }
                // Ping/pong are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }
}
