//! Transport over [`tokio_tungstenite`].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use snafu::prelude::*;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    self as websocket,
    tungstenite::{
        client::IntoClientRequest,
        http::HeaderValue,
        protocol::{frame::coding::CloseCode as WsCloseCode, CloseFrame},
        Message as WsMessage,
    },
};

use super::{error, Callbacks, Target, Transport, TransportError, TransportHandle};
use crate::ws::{CloseCode, Frame};

pub(crate) type WebsocketClient =
    websocket::WebSocketStream<websocket::MaybeTlsStream<tokio::net::TcpStream>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for [`TungsteniteTransport`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct TungsteniteConfig {
    /// Max time for tcp/tls connect and websocket handshake
    pub connect_timeout: Duration,
    /// Max time to wait peer's close frame after we sent ours, the close is
    /// reported with our own code and reason when it elapsed
    pub close_timeout: Duration,
}

impl Default for TungsteniteConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl TungsteniteConfig {
    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set close timeout
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

/// Websocket transport over tcp, with optional tls.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteTransport {
    config: TungsteniteConfig,
}

impl TungsteniteTransport {
    /// Create transport with given config
    pub fn new(config: TungsteniteConfig) -> Self {
        Self { config }
    }
}

#[derive(Debug)]
struct HandleInner {
    sink: Mutex<Option<SplitSink<WebsocketClient, WsMessage>>>,
    stream: Mutex<Option<SplitStream<WebsocketClient>>>,
    callbacks: Callbacks,
    close_timeout: Duration,
}

/// Connection opened by [`TungsteniteTransport`]
#[derive(Debug)]
pub struct TungsteniteHandle {
    inner: Arc<HandleInner>,
}

impl Transport for TungsteniteTransport {
    type Handle = TungsteniteHandle;

    fn open(&self, target: Target, callbacks: Callbacks) -> Self::Handle {
        let inner = Arc::new(HandleInner {
            sink: Mutex::new(None),
            stream: Mutex::new(None),
            callbacks,
            close_timeout: self.config.close_timeout,
        });

        tokio::spawn(open_background(
            Arc::clone(&inner),
            target,
            self.config.connect_timeout,
        ));

        TungsteniteHandle { inner }
    }
}

async fn open_background(inner: Arc<HandleInner>, target: Target, connect_timeout: Duration) {
    log::debug!("Connecting {}", target);

    let mut request = match target.url().as_str().into_client_request() {
        Ok(request) => request,
        Err(err) => {
            inner
                .callbacks
                .on_complete_with_error(TransportError::Websocket { source: err });
            return;
        }
    };

    if !target.protocols().is_empty() {
        match HeaderValue::from_str(&target.protocols().join(", ")) {
            Ok(value) => {
                request
                    .headers_mut()
                    .insert("Sec-WebSocket-Protocol", value);
            }
            Err(err) => {
                inner
                    .callbacks
                    .on_complete_with_error(TransportError::InvalidRequest {
                        reason: err.to_string(),
                    });
                return;
            }
        }
    }

    let (ws, response) =
        match tokio::time::timeout(connect_timeout, websocket::connect_async(request)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => {
                log::warn!("Connect {} failed: {}", target, err);
                inner
                    .callbacks
                    .on_complete_with_error(TransportError::Websocket { source: err });
                return;
            }
            Err(_) => {
                log::warn!("Connect {} timeout after {:?}", target, connect_timeout);
                inner
                    .callbacks
                    .on_complete_with_error(TransportError::Timeout);
                return;
            }
        };

    let protocol = response
        .headers()
        .get("Sec-WebSocket-Protocol")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    log::debug!("Connected {}, protocol: {:?}", target, protocol);

    let (sink, stream) = ws.split();
    inner.sink.lock().await.replace(sink);
    inner.stream.lock().await.replace(stream);

    inner.callbacks.on_open(protocol);
}

fn split_close_frame(frame: Option<CloseFrame<'_>>) -> (Option<CloseCode>, Option<String>) {
    match frame {
        Some(frame) => {
            let reason = (!frame.reason.is_empty()).then(|| frame.reason.into_owned());
            (Some(u16::from(frame.code).into()), reason)
        }
        None => (None, None),
    }
}

#[async_trait]
impl TransportHandle for TungsteniteHandle {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let mut sink = self.inner.sink.lock().await;
        let sink = sink.as_mut().context(error::ConnectionLost)?;

        let message = match frame {
            Frame::Text(text) => WsMessage::Text(text),
            Frame::Binary(data) => WsMessage::Binary(data.to_vec()),
        };

        sink.send(message).await.context(error::Websocket)
    }

    async fn receive(&self) -> Result<Frame, TransportError> {
        let mut stream = self.inner.stream.lock().await;
        let stream = stream.as_mut().context(error::ConnectionLost)?;

        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Frame::Text(text)),
                Some(Ok(WsMessage::Binary(data))) => return Ok(Frame::Binary(data.into())),
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = split_close_frame(frame);
                    log::debug!("Received close frame, code {:?}, reason {:?}", code, reason);
                    self.inner.callbacks.on_close(code, reason);
                    return error::Closed.fail();
                }
                Some(Ok(message)) => {
                    // ping/pong are answered by tungstenite itself
                    log::trace!("Skip control frame {:?}", message);
                }
                Some(Err(err)) => {
                    let err = TransportError::Websocket { source: err };
                    if !err.is_fatal() {
                        return Err(err);
                    }
                    log::warn!("Websocket stream broken: {}", err);
                    self.inner.callbacks.on_complete_with_error(err);
                    return error::ConnectionLost.fail();
                }
                None => {
                    log::warn!("Websocket stream ended without close frame");
                    self.inner
                        .callbacks
                        .on_complete_with_error(TransportError::ConnectionLost);
                    return error::ConnectionLost.fail();
                }
            }
        }
    }

    async fn close(&self, code: CloseCode, reason: Option<String>) -> Result<(), TransportError> {
        {
            let mut sink = self.inner.sink.lock().await;
            let sink = sink.as_mut().context(error::ConnectionLost)?;

            let frame = CloseFrame {
                code: WsCloseCode::from(u16::from(code)),
                reason: reason.clone().unwrap_or_default().into(),
            };

            log::debug!("Send close frame, code {}, reason {:?}", code, reason);

            sink.send(WsMessage::Close(Some(frame)))
                .await
                .context(error::Websocket)?;
        }

        let callbacks = self.inner.callbacks.clone();
        let close_timeout = self.inner.close_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(close_timeout).await;
            log::trace!("Close handshake timeout, report local close");
            callbacks.on_close(Some(code), reason);
        });

        Ok(())
    }
}
