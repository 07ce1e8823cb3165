mod inner;

use std::{fmt::Debug, sync::Arc, time::Duration};

use bytes::Bytes;
use serde::Serialize;
use snafu::prelude::*;
use tokio::sync::oneshot;

use crate::{
    error,
    ws::{
        message::codec::{Encoder, JsonCodec},
        transport::{
            tungstenite::TungsteniteTransport, Callbacks, Target, Transport, TransportError,
            TransportHandle,
        },
        CloseCode, ConnectionState, Frame, MessageStream, StateEvent, StateEventStream,
    },
    Error, Result,
};
use inner::{drive, Shared};

/// Periodic keepalive setting of a [`Client`], fixed at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HeartbeatConfig {
    /// no heartbeat
    #[default]
    Disabled,
    /// send `payload` every `interval` while connected
    Enabled {
        /// time between two heartbeat frames
        interval: Duration,
        /// heartbeat frame
        payload: Frame,
    },
}

impl HeartbeatConfig {
    /// Send `payload` every `interval`.
    pub fn every<F: Into<Frame>>(interval: Duration, payload: F) -> Self {
        Self::Enabled {
            interval,
            payload: payload.into(),
        }
    }
}

/// Websocket client of a single connection.
///
/// The lifecycle only moves forward, see [`ConnectionState`]. Once
/// disconnected, or after a failed [`connect`](Self::connect), a new client is
/// needed, or use [`ReconnectingClient`](crate::ws::ReconnectingClient).
pub struct Client<T: Transport> {
    transport: Arc<T>,
    shared: Arc<Shared<T::Handle>>,
    messages: Option<MessageStream>,
    events: Option<StateEventStream>,
}

impl Client<TungsteniteTransport> {
    /// Create a client using the default [`TungsteniteTransport`].
    pub fn tungstenite(target: Target) -> Self {
        Self::new(TungsteniteTransport::default(), target)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client of `target`, without heartbeat.
    pub fn new(transport: T, target: Target) -> Self {
        Self::with_heartbeat(transport, target, HeartbeatConfig::Disabled)
    }

    /// Create a client of `target` with heartbeat config.
    pub fn with_heartbeat(transport: T, target: Target, heartbeat: HeartbeatConfig) -> Self {
        let (mut client, messages, events) =
            Self::detached(Arc::new(transport), target, heartbeat);
        client.messages = Some(messages);
        client.events = Some(events);
        client
    }

    /// Create a client whose streams are handed to the caller instead of kept.
    pub(crate) fn detached(
        transport: Arc<T>,
        target: Target,
        heartbeat: HeartbeatConfig,
    ) -> (Self, MessageStream, StateEventStream) {
        let (shared, messages, events) = Shared::new(target, heartbeat);
        let client = Self {
            transport,
            shared: Arc::new(shared),
            messages: None,
            events: None,
        };
        (client, messages, events)
    }

    /// Take the message stream, returns `None` after first call.
    pub fn messages(&mut self) -> Option<MessageStream> {
        self.messages.take()
    }

    /// Take the state event stream, returns `None` after first call.
    pub fn state_events(&mut self) -> Option<StateEventStream> {
        self.events.take()
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Sub protocol negotiated when connected.
    pub async fn protocol(&self) -> Option<String> {
        self.shared.inner.lock().await.protocol.clone()
    }

    /// Open the connection, resolves when the transport opened or failed.
    ///
    /// Fails with [`Error::AlreadyConnectedOrConnecting`] unless state is
    /// [`ConnectionState::NotConnected`]. A transport failure leaves this client
    /// disconnected for good.
    pub async fn connect(&self) -> Result<()> {
        let opened = {
            let mut inner = self.shared.inner.lock().await;

            ensure!(
                self.state() == ConnectionState::NotConnected,
                error::AlreadyConnectedOrConnecting
            );
            let target = inner
                .target
                .take()
                .context(error::AlreadyConnectedOrConnecting)?;

            self.shared.transition(
                &inner,
                ConnectionState::Connecting,
                Some(StateEvent::Connecting),
            );

            let (callbacks, transport_events) = Callbacks::new();
            let (pending, opened) = oneshot::channel();

            log::debug!("Open transport to {}", target);

            inner.pending = Some(pending);
            inner.handle = Some(Arc::new(self.transport.open(target, callbacks.clone())));
            inner.callbacks = Some(callbacks);
            inner.driver = Some(tokio::spawn(drive(
                Arc::clone(&self.shared),
                transport_events,
            )));

            opened
        };

        match opened.await {
            Ok(result) => result.context(error::Transport),
            Err(_) => Err(Error::Transport {
                source: TransportError::ConnectionLost,
            }),
        }
    }

    /// Close with normal closure code and no reason.
    pub async fn disconnect(&self) -> Result<()> {
        self.disconnect_with(CloseCode::Normal, None).await
    }

    /// Close the connection, resolves after state became disconnected.
    ///
    /// Fails with [`Error::NotConnected`] unless state is [`ConnectionState::Connected`].
    pub async fn disconnect_with(&self, code: CloseCode, reason: Option<String>) -> Result<()> {
        let mut state = self.shared.state.subscribe();

        let close = {
            let mut inner = self.shared.inner.lock().await;

            ensure!(self.state().is_connected(), error::NotConnected);
            inner.cancel_heartbeat();

            if inner.closing {
                log::debug!("Close already in progress, wait it");
                None
            } else {
                inner.closing = true;
                match (inner.handle.clone(), inner.callbacks.clone()) {
                    (Some(handle), Some(callbacks)) => Some((handle, callbacks)),
                    _ => None,
                }
            }
        };

        if let Some((handle, callbacks)) = close {
            log::debug!("Close connection, code {}, reason {:?}", code, reason);
            if let Err(err) = handle.close(code, reason).await {
                log::warn!("Close connection failed: {}", err);
                callbacks.on_complete_with_error(err);
            }
        }

        // sender lives in self.shared, never dropped here
        let _ = state
            .wait_for(|state| *state == ConnectionState::Disconnected)
            .await;

        Ok(())
    }

    async fn handle(&self) -> Result<Arc<T::Handle>> {
        let inner = self.shared.inner.lock().await;
        ensure!(self.state().is_connected(), error::NotConnected);
        inner.handle.clone().context(error::NotConnected)
    }

    /// Send a frame, resolves when transport accepted the write.
    ///
    /// Fails with [`Error::NotConnected`] unless state is [`ConnectionState::Connected`].
    pub async fn send<F: Into<Frame>>(&self, frame: F) -> Result<()> {
        let handle = self.handle().await?;
        let frame = frame.into();
        log::trace!("Send {} frame", frame.type_name());
        handle.send(frame).await.context(error::Transport)
    }

    /// Send a text frame.
    pub async fn send_text<S: Into<String>>(&self, text: S) -> Result<()> {
        self.send(Frame::Text(text.into())).await
    }

    /// Send a binary frame.
    pub async fn send_binary<B: Into<Bytes>>(&self, data: B) -> Result<()> {
        self.send(Frame::Binary(data.into())).await
    }

    /// Encode `value` with `encoder` and send it.
    pub async fn send_encoded<V, E>(&self, value: &V, encoder: &E) -> Result<()>
    where
        V: Serialize + ?Sized,
        E: Encoder,
    {
        ensure!(self.state().is_connected(), error::NotConnected);
        let frame = encoder.encode(value).map_err(|err| Error::Encode {
            source: Box::new(err),
        })?;
        self.send(frame).await
    }

    /// Send `value` as a json text frame.
    pub async fn send_json<V: Serialize + ?Sized>(&self, value: &V) -> Result<()> {
        self.send_encoded(value, &JsonCodec::default()).await
    }
}

impl<T: Transport> Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        // background tasks stop on their own when the lock is busy
        self.shared.shutdown.cancel();

        if let Ok(mut inner) = self.shared.inner.try_lock() {
            inner.teardown();
            if let Some(driver) = inner.driver.take() {
                driver.abort();
            }
        }
    }
}
