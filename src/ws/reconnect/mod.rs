//! Client keeping the same streams across connections.

mod factory;
mod relay;

pub use factory::{FactoryError, FixedTarget, TargetFactory};

use std::{
    fmt::Debug,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use serde::Serialize;
use snafu::prelude::*;
use tokio::sync::Mutex;

use crate::{
    error,
    ws::{
        message::{
            codec::Encoder,
            stream::{MessageSender, StateEventSender},
        },
        transport::{tungstenite::TungsteniteTransport, Target, Transport},
        Client, CloseCode, ConnectionState, Frame, HeartbeatConfig, MessageStream,
        StateEventStream,
    },
    Result,
};
use relay::Relays;

/// Current inner connection, replaced on every connect.
pub(crate) struct Slot<T: Transport> {
    generation: u64,
    connection: Option<Arc<Client<T>>>,
    relays: Option<Relays>,
}

fn lock<S>(slot: &StdMutex<S>) -> MutexGuard<'_, S> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forget the inner client of `generation` after its streams ended.
fn release<T: Transport>(slot: &StdMutex<Slot<T>>, generation: u64) {
    let released = {
        let mut slot = lock(slot);
        if slot.generation == generation {
            slot.connection.take()
        } else {
            None
        }
    };

    if released.is_some() {
        log::debug!("Inner connection {} released", generation);
    }
}

/// Websocket client which can connect again after disconnected.
///
/// Every [`connect`](Self::connect) asks the [`TargetFactory`] for a target
/// and opens a fresh [`Client`]. Items of all those clients are relayed to the
/// same pair of streams, which never end while this value is alive.
///
/// No retry is done automatically, call `connect` again when the state event
/// stream reports [`StateEvent::Disconnected`](crate::ws::StateEvent::Disconnected).
pub struct ReconnectingClient<T: Transport, F: TargetFactory> {
    transport: Arc<T>,
    factory: F,
    heartbeat: HeartbeatConfig,
    slot: Arc<StdMutex<Slot<T>>>,
    connect_lock: Mutex<()>,
    outward_messages: MessageSender,
    outward_events: StateEventSender,
    messages: Option<MessageStream>,
    events: Option<StateEventStream>,
}

impl<F: TargetFactory> ReconnectingClient<TungsteniteTransport, F> {
    /// Create a client using the default [`TungsteniteTransport`].
    pub fn tungstenite(factory: F) -> Self {
        Self::new(TungsteniteTransport::default(), factory)
    }
}

impl<T: Transport> ReconnectingClient<T, FixedTarget> {
    /// Create a client connecting to the same target every time.
    pub fn with_target(transport: T, target: Target) -> Self {
        Self::new(transport, FixedTarget(target))
    }
}

impl<T: Transport, F: TargetFactory> ReconnectingClient<T, F> {
    /// Create a client without heartbeat.
    pub fn new(transport: T, factory: F) -> Self {
        Self::with_heartbeat(transport, factory, HeartbeatConfig::Disabled)
    }

    /// Create a client, every inner connection uses the heartbeat config.
    pub fn with_heartbeat(transport: T, factory: F, heartbeat: HeartbeatConfig) -> Self {
        let (outward_messages, messages) = MessageStream::channel();
        let (outward_events, events) = StateEventStream::channel();

        Self {
            transport: Arc::new(transport),
            factory,
            heartbeat,
            slot: Arc::new(StdMutex::new(Slot {
                generation: 0,
                connection: None,
                relays: None,
            })),
            connect_lock: Mutex::new(()),
            outward_messages,
            outward_events,
            messages: Some(messages),
            events: Some(events),
        }
    }

    /// Take the message stream, returns `None` after first call.
    ///
    /// The stream outlives every inner connection. A transport failure of one
    /// connection shows up as an `Err` item, and items of the next connection
    /// follow it.
    pub fn messages(&mut self) -> Option<MessageStream> {
        self.messages.take()
    }

    /// Take the state event stream, returns `None` after first call.
    ///
    /// The stream outlives every inner connection, so it carries the events of
    /// all of them in order.
    pub fn state_events(&mut self) -> Option<StateEventStream> {
        self.events.take()
    }

    /// State of current inner connection, [`ConnectionState::NotConnected`] if none.
    pub fn state(&self) -> ConnectionState {
        match lock(&self.slot).connection {
            None => ConnectionState::NotConnected,
            // created but connect not called yet
            Some(ref client) if client.state() == ConnectionState::NotConnected => {
                ConnectionState::Connecting
            }
            Some(ref client) => client.state(),
        }
    }

    fn client(&self) -> Result<Arc<Client<T>>> {
        lock(&self.slot).connection.clone().context(error::NotConnected)
    }

    /// Open a new inner connection.
    ///
    /// Fails with [`Error::AlreadyConnectedOrConnecting`](crate::Error::AlreadyConnectedOrConnecting)
    /// unless state is [`ConnectionState::NotConnected`] or
    /// [`ConnectionState::Disconnected`]. The target factory is called once.
    pub async fn connect(&self) -> Result<()> {
        let client = {
            let _guard = self.connect_lock.lock().await;

            ensure!(
                matches!(
                    self.state(),
                    ConnectionState::NotConnected | ConnectionState::Disconnected
                ),
                error::AlreadyConnectedOrConnecting
            );

            let previous = lock(&self.slot).relays.take();
            if let Some(relays) = previous {
                log::debug!("Wait relays of previous connection");
                relays.join().await;
            }

            log::debug!("Make target of next connection");
            let target = self
                .factory
                .make_target()
                .await
                .context(error::TargetFactory)?;

            let (client, messages, events) =
                Client::detached(Arc::clone(&self.transport), target, self.heartbeat.clone());
            let client = Arc::new(client);

            let mut slot = lock(&self.slot);
            slot.generation += 1;
            let generation = slot.generation;
            log::debug!("Inner connection {} created", generation);
            slot.relays = Some(Relays::spawn(
                generation,
                &self.slot,
                messages,
                events,
                &self.outward_messages,
                &self.outward_events,
            ));
            slot.connection = Some(Arc::clone(&client));

            client
        };

        client.connect().await
    }

    /// Close with normal closure code and no reason.
    pub async fn disconnect(&self) -> Result<()> {
        self.disconnect_with(CloseCode::Normal, None).await
    }

    /// Close current inner connection, resolves after its relays finished.
    ///
    /// Fails with [`Error::NotConnected`](crate::Error::NotConnected) if there
    /// is no inner connection or it's not connected.
    pub async fn disconnect_with(&self, code: CloseCode, reason: Option<String>) -> Result<()> {
        let (generation, client) = {
            let slot = lock(&self.slot);
            (slot.generation, slot.connection.clone())
        };
        let client = client.context(error::NotConnected)?;

        client.disconnect_with(code, reason).await?;

        let relays = {
            let mut slot = lock(&self.slot);
            if slot.generation == generation {
                slot.connection = None;
                slot.relays.take()
            } else {
                None
            }
        };

        if let Some(relays) = relays {
            relays.join().await;
        }

        Ok(())
    }

    /// Send a frame through current inner connection.
    pub async fn send<B: Into<Frame>>(&self, frame: B) -> Result<()> {
        self.client()?.send(frame).await
    }

    /// Send a text frame.
    pub async fn send_text<S: Into<String>>(&self, text: S) -> Result<()> {
        self.client()?.send_text(text).await
    }

    /// Send a binary frame.
    pub async fn send_binary<B: Into<Bytes>>(&self, data: B) -> Result<()> {
        self.client()?.send_binary(data).await
    }

    /// Encode `value` with `encoder` and send it.
    pub async fn send_encoded<V, E>(&self, value: &V, encoder: &E) -> Result<()>
    where
        V: Serialize + ?Sized,
        E: Encoder,
    {
        self.client()?.send_encoded(value, encoder).await
    }

    /// Send `value` as a json text frame.
    pub async fn send_json<V: Serialize + ?Sized>(&self, value: &V) -> Result<()> {
        self.client()?.send_json(value).await
    }
}

impl<T: Transport, F: TargetFactory> Debug for ReconnectingClient<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingClient")
            .field("state", &self.state())
            .field("generation", &lock(&self.slot).generation)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, F: TargetFactory> Drop for ReconnectingClient<T, F> {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if let Some(relays) = slot.relays.take() {
            relays.abort();
        }
        slot.connection.take();
    }
}
