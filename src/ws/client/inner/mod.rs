mod driver;
mod heartbeat;
mod receiver;

pub(crate) use driver::drive;

use std::sync::Arc;

use tokio::{
    sync::{oneshot, watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::HeartbeatConfig;
use crate::ws::{
    message::stream::{MessageSender, StateEventSender},
    transport::{Callbacks, Target, TransportError, TransportHandle},
    CloseCode, ConnectionState, Frame, Message, MessageStream, StateEvent, StateEventStream,
};
use heartbeat::Heartbeat;

/// State shared between a client and its background tasks.
///
/// `state` is only written while `inner` is locked. `shutdown` stops every
/// background task without taking the lock.
pub(crate) struct Shared<H> {
    pub state: watch::Sender<ConnectionState>,
    pub inner: Mutex<Inner<H>>,
    pub shutdown: CancellationToken,
    heartbeat: HeartbeatConfig,
}

pub(crate) struct Inner<H> {
    pub target: Option<Target>,
    pub handle: Option<Arc<H>>,
    pub callbacks: Option<Callbacks>,
    pub protocol: Option<String>,
    pub pending: Option<oneshot::Sender<Result<(), TransportError>>>,
    pub driver: Option<JoinHandle<()>>,
    pub closing: bool,
    messages: Option<MessageSender>,
    events: Option<StateEventSender>,
    receiver: Option<JoinHandle<()>>,
    heartbeat: Option<Heartbeat>,
}

impl<H> Inner<H> {
    fn emit(&self, event: StateEvent) {
        if let Some(ref events) = self.events {
            log::trace!("Emit state event {:?}", event);
            if events.send(event).is_err() {
                log::trace!("State event stream dropped by receive side");
            }
        }
    }

    fn push(&self, item: Result<Message, TransportError>) {
        if let Some(ref messages) = self.messages {
            if messages.send(item).is_err() {
                log::trace!("Message stream dropped by receive side");
            }
        }
    }

    pub fn cancel_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            log::debug!("Cancel heartbeat");
            heartbeat.cancel();
        }
    }

    /// Cancel background tasks and release transport handle, emits nothing.
    pub fn teardown(&mut self) {
        self.cancel_heartbeat();
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
        self.handle.take();
        self.callbacks.take();
    }
}

impl<H: TransportHandle> Shared<H> {
    pub fn new(target: Target, heartbeat: HeartbeatConfig) -> (Self, MessageStream, StateEventStream) {
        let (messages, message_stream) = MessageStream::channel();
        let (events, event_stream) = StateEventStream::channel();
        let (state, _) = watch::channel(ConnectionState::NotConnected);

        let shared = Self {
            state,
            inner: Mutex::new(Inner {
                target: Some(target),
                handle: None,
                callbacks: None,
                protocol: None,
                pending: None,
                driver: None,
                closing: false,
                messages: Some(messages),
                events: Some(events),
                receiver: None,
                heartbeat: None,
            }),
            shutdown: CancellationToken::new(),
            heartbeat,
        };

        (shared, message_stream, event_stream)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn transition(&self, inner: &Inner<H>, state: ConnectionState, event: Option<StateEvent>) {
        log::debug!("Move to {} state", state);
        self.state.send_replace(state);
        if let Some(event) = event {
            inner.emit(event);
        }
    }

    pub fn opened(&self, inner: &mut Inner<H>, protocol: Option<String>) {
        if self.state() != ConnectionState::Connecting {
            log::warn!("Transport opened in {} state, ignored", self.state());
            return;
        }

        let (handle, callbacks) = match (inner.handle.clone(), inner.callbacks.clone()) {
            (Some(handle), Some(callbacks)) => (handle, callbacks),
            _ => return,
        };

        inner.protocol = protocol;
        self.transition(inner, ConnectionState::Connected, Some(StateEvent::Connected));

        inner.receiver = Some(tokio::spawn(receiver::receive_loop(
            Arc::clone(&handle),
            callbacks.clone(),
            self.shutdown.clone(),
        )));

        if let HeartbeatConfig::Enabled { interval, ref payload } = self.heartbeat {
            inner.cancel_heartbeat();
            inner.heartbeat = Some(Heartbeat::start(
                handle,
                callbacks,
                interval,
                payload.clone(),
                self.shutdown.child_token(),
            ));
        }

        if let Some(pending) = inner.pending.take() {
            let _ = pending.send(Ok(()));
        }
    }

    /// Returns true if the connection ended.
    pub fn received(&self, inner: &mut Inner<H>, result: Result<Frame, TransportError>) -> bool {
        if self.state() != ConnectionState::Connected {
            log::trace!("Drop received item in {} state", self.state());
            return self.state() == ConnectionState::Disconnected;
        }

        match result {
            Ok(frame) => {
                log::trace!("Received {} frame", frame.type_name());
                inner.push(Ok(frame.into()));
                false
            }
            Err(err) if !err.is_fatal() => {
                log::debug!("Received invalid frame: {}", err);
                inner.push(Ok(Message::Invalid(err)));
                false
            }
            Err(err) => self.failed(inner, err),
        }
    }

    /// Returns true if the connection ended.
    pub fn closed(
        &self,
        inner: &mut Inner<H>,
        code: Option<CloseCode>,
        reason: Option<String>,
    ) -> bool {
        match self.state() {
            ConnectionState::Connecting => {
                log::warn!("Transport closed before open, code {:?}", code);
                self.finalize(inner, None, None);
                if let Some(pending) = inner.pending.take() {
                    let _ = pending.send(Err(TransportError::Closed));
                }
                true
            }
            ConnectionState::Connected => {
                log::debug!("Transport closed, code {:?}, reason {:?}", code, reason);
                self.finalize(inner, Some(StateEvent::Disconnected { code, reason }), None);
                true
            }
            ConnectionState::NotConnected => false,
            ConnectionState::Disconnected => true,
        }
    }

    /// Returns true if the connection ended.
    pub fn failed(&self, inner: &mut Inner<H>, err: TransportError) -> bool {
        match self.state() {
            ConnectionState::Connecting => {
                log::warn!("Transport failed before open: {}", err);
                self.finalize(inner, None, None);
                if let Some(pending) = inner.pending.take() {
                    let _ = pending.send(Err(err));
                }
                true
            }
            ConnectionState::Connected => {
                log::warn!("Transport failed: {}", err);
                let event = StateEvent::Disconnected {
                    code: None,
                    reason: None,
                };
                self.finalize(inner, Some(event), Some(err));
                true
            }
            ConnectionState::NotConnected => false,
            ConnectionState::Disconnected => {
                log::trace!("Transport error after disconnected ignored: {}", err);
                true
            }
        }
    }

    /// Message stream always finishes before state event stream.
    fn finalize(&self, inner: &mut Inner<H>, event: Option<StateEvent>, err: Option<TransportError>) {
        if let Some(messages) = inner.messages.take() {
            if let Some(err) = err {
                log::trace!("Finish message stream with error");
                let _ = messages.send(Err(err));
            } else {
                log::trace!("Finish message stream");
            }
        }

        self.transition(inner, ConnectionState::Disconnected, event);

        log::trace!("Finish state event stream");
        inner.events.take();

        inner.teardown();
    }
}
