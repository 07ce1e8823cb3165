use std::sync::{Arc, Mutex as StdMutex};

use futures_util::{Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::{release, Slot};
use crate::ws::{
    message::stream::{MessageSender, StateEventSender},
    transport::Transport,
    MessageStream, StateEventStream,
};

/// The two tasks draining one inner client's streams into the outward ones.
pub(super) struct Relays {
    token: CancellationToken,
    messages: JoinHandle<()>,
    events: JoinHandle<()>,
}

impl Relays {
    pub fn spawn<T: Transport>(
        generation: u64,
        slot: &Arc<StdMutex<Slot<T>>>,
        messages: MessageStream,
        events: StateEventStream,
        outward_messages: &MessageSender,
        outward_events: &StateEventSender,
    ) -> Self {
        let token = CancellationToken::new();

        let messages = tokio::spawn({
            let slot = Arc::clone(slot);
            let sink = outward_messages.clone();
            let token = token.clone();
            async move {
                if relay("message", messages, sink, token).await {
                    release(&slot, generation);
                }
            }
        });

        // inner message stream always ends before the state event stream,
        // so the message relay has nothing left to lose when cancelled here
        let events = tokio::spawn({
            let slot = Arc::clone(slot);
            let sink = outward_events.clone();
            let token = token.clone();
            async move {
                if relay("state event", events, sink, token.clone()).await {
                    release(&slot, generation);
                    token.cancel();
                }
            }
        });

        Self {
            token,
            messages,
            events,
        }
    }

    /// Wait both relays drain their ended source, then cancel.
    pub async fn join(self) {
        let Self {
            token,
            messages,
            events,
        } = self;

        if let Err(err) = messages.await {
            log::warn!("Message relay task failed: {}", err);
        }
        if let Err(err) = events.await {
            log::warn!("State event relay task failed: {}", err);
        }

        token.cancel();
    }

    pub fn abort(&self) {
        self.token.cancel();
        self.messages.abort();
        self.events.abort();
    }
}

/// Forward until source ends, returns false if cancelled before that.
async fn relay<S, I>(
    name: &'static str,
    mut source: S,
    sink: mpsc::UnboundedSender<I>,
    token: CancellationToken,
) -> bool
where
    S: Stream<Item = I> + Unpin,
{
    log::trace!("Relay of {} stream start", name);

    loop {
        tokio::select! {
            biased;

            item = source.next() => match item {
                Some(item) => {
                    if sink.send(item).is_err() {
                        log::trace!("Outward {} stream dropped by receive side", name);
                    }
                }
                None => {
                    log::debug!("Inner {} stream ended", name);
                    return true;
                }
            },
            _ = token.cancelled() => {
                log::debug!("Relay of {} stream cancelled", name);
                return false;
            }
        }
    }
}
