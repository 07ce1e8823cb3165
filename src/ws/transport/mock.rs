//! In-memory transport for tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex as StdMutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use super::{Callbacks, Target, Transport, TransportError, TransportHandle};
use crate::ws::{CloseCode, Frame};

/// How a mock connection answers open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenBehavior {
    /// open succeeds
    Accept,
    /// open fails with connection lost
    Refuse,
    /// never report anything
    Hang,
}

#[derive(Debug)]
enum Inbound {
    Item(Result<Frame, TransportError>),
    Close(CloseCode, Option<String>),
}

/// Test side control of one mock connection
#[derive(Debug, Clone)]
pub(crate) struct Remote {
    pub target: Target,
    callbacks: Callbacks,
    inbound: mpsc::UnboundedSender<Inbound>,
    sent: Arc<StdMutex<Vec<Frame>>>,
    fail_sends: Arc<AtomicBool>,
    hold_sends: Arc<AtomicBool>,
    closed: Arc<watch::Sender<bool>>,
    close_echo_delay: Arc<StdMutex<Option<Duration>>>,
}

impl Remote {
    /// peer sends a frame
    pub fn push(&self, frame: impl Into<Frame>) {
        let _ = self.inbound.send(Inbound::Item(Ok(frame.into())));
    }

    /// next receive call yields a non fatal error
    pub fn push_invalid(&self, reason: &str) {
        let _ = self.inbound.send(Inbound::Item(Err(TransportError::InvalidFrame {
            reason: reason.to_string(),
        })));
    }

    /// peer closes the connection, after frames already pushed
    pub fn close(&self, code: CloseCode, reason: Option<&str>) {
        let _ = self
            .inbound
            .send(Inbound::Close(code, reason.map(str::to_string)));
    }

    /// connection drops with an error, right now
    pub fn fail(&self) {
        self.callbacks
            .on_complete_with_error(TransportError::ConnectionLost);
        let _ = self
            .inbound
            .send(Inbound::Item(Err(TransportError::ConnectionLost)));
    }

    /// make following sends fail with connection lost
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// make following sends block until client closes, then fail with closed
    pub fn hold_sends(&self) {
        self.hold_sends.store(true, Ordering::SeqCst);
    }

    /// peer answers client's close frame only after `delay`
    pub fn delay_close_echo(&self, delay: Duration) {
        *self.close_echo_delay.lock().unwrap() = Some(delay);
    }

    /// frames sent by client, heartbeats included
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.lock().unwrap().clone()
    }

    /// client side handle of this connection is gone
    pub fn handle_dropped(&self) -> bool {
        self.inbound.is_closed()
    }

    fn echo_close(&self, code: CloseCode, reason: Option<String>) {
        self.callbacks.on_close(Some(code), reason);
        let _ = self.inbound.send(Inbound::Item(Err(TransportError::Closed)));
    }
}

#[derive(Debug)]
pub(crate) struct MockHandle {
    remote: Remote,
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    echo: bool,
    closes: Arc<StdMutex<Vec<(CloseCode, Option<String>)>>>,
}

#[async_trait]
impl TransportHandle for MockHandle {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.remote.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionLost);
        }
        if self.remote.hold_sends.load(Ordering::SeqCst) {
            let mut closed = self.remote.closed.subscribe();
            let _ = closed.wait_for(|closed| *closed).await;
            return Err(TransportError::Closed);
        }
        self.remote.sent.lock().unwrap().push(frame.clone());
        if self.echo {
            self.remote.push(frame);
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Frame, TransportError> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(Inbound::Item(result)) => result,
            Some(Inbound::Close(code, reason)) => {
                self.remote.callbacks.on_close(Some(code), reason);
                Err(TransportError::Closed)
            }
            None => Err(TransportError::ConnectionLost),
        }
    }

    async fn close(&self, code: CloseCode, reason: Option<String>) -> Result<(), TransportError> {
        self.closes.lock().unwrap().push((code, reason.clone()));
        self.remote.closed.send_replace(true);

        // cooperative peer answers with the same close frame
        let delay = *self.remote.close_echo_delay.lock().unwrap();
        match delay {
            None => self.remote.echo_close(code, reason),
            Some(delay) => {
                let remote = self.remote.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    remote.echo_close(code, reason);
                });
            }
        }
        Ok(())
    }
}

/// Scriptable transport, every open creates a new [`Remote`].
#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    behavior: Arc<StdMutex<OpenBehavior>>,
    echo: bool,
    opens: Arc<AtomicUsize>,
    remotes: Arc<StdMutex<Vec<Remote>>>,
    closes: Arc<StdMutex<Vec<(CloseCode, Option<String>)>>>,
}

impl MockTransport {
    pub fn new(behavior: OpenBehavior) -> Self {
        Self {
            behavior: Arc::new(StdMutex::new(behavior)),
            echo: false,
            opens: Arc::new(AtomicUsize::new(0)),
            remotes: Arc::new(StdMutex::new(Vec::new())),
            closes: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    /// peer echoes every frame back
    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::new(OpenBehavior::Accept)
        }
    }

    pub fn set_behavior(&self, behavior: OpenBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// control of the nth opened connection
    pub fn remote(&self, n: usize) -> Remote {
        self.remotes.lock().unwrap()[n].clone()
    }

    pub fn closes(&self) -> Vec<(CloseCode, Option<String>)> {
        self.closes.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    type Handle = MockHandle;

    fn open(&self, target: Target, callbacks: Callbacks) -> Self::Handle {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let remote = Remote {
            target,
            callbacks: callbacks.clone(),
            inbound: inbound_tx,
            sent: Arc::new(StdMutex::new(Vec::new())),
            fail_sends: Arc::new(AtomicBool::new(false)),
            hold_sends: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(watch::channel(false).0),
            close_echo_delay: Arc::new(StdMutex::new(None)),
        };
        self.remotes.lock().unwrap().push(remote.clone());

        let behavior = *self.behavior.lock().unwrap();
        tokio::spawn(async move {
            match behavior {
                OpenBehavior::Accept => callbacks.on_open(Some("mock".to_string())),
                OpenBehavior::Refuse => {
                    callbacks.on_complete_with_error(TransportError::ConnectionLost)
                }
                OpenBehavior::Hang => {}
            }
        });

        MockHandle {
            remote,
            inbound: Mutex::new(inbound_rx),
            echo: self.echo,
            closes: Arc::clone(&self.closes),
        }
    }
}
