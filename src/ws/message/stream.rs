use std::task::Poll;

use futures_util::Stream;
use tokio::sync::mpsc;

use super::Message;
use crate::ws::{transport::TransportError, StateEvent};

pub(crate) type MessageSender = mpsc::UnboundedSender<Result<Message, TransportError>>;
pub(crate) type StateEventSender = mpsc::UnboundedSender<StateEvent>;

/// Stream of received messages.
///
/// Ends when the connection ends. If a transport failure caused the end, the
/// last item is that error.
#[derive(Debug)]
pub struct MessageStream {
    pub(crate) rx: mpsc::UnboundedReceiver<Result<Message, TransportError>>,
}

impl MessageStream {
    pub(crate) fn channel() -> (MessageSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

impl Stream for MessageStream {
    type Item = Result<Message, TransportError>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Stream of connection state transitions, always ends right after
/// [`StateEvent::Disconnected`].
#[derive(Debug)]
pub struct StateEventStream {
    pub(crate) rx: mpsc::UnboundedReceiver<StateEvent>,
}

impl StateEventStream {
    pub(crate) fn channel() -> (StateEventSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

impl Stream for StateEventStream {
    type Item = StateEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
