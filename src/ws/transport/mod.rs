//! Transport collaborator contract.
//!
//! A transport performs the real network io and websocket framing. It is
//! callback driven: [`Transport::open`] returns a handle immediately and later
//! reports open, close and fatal errors through the given [`Callbacks`].
//! Frames are read one at a time with [`TransportHandle::receive`], which the
//! caller has to reissue after every completion to keep receiving.

mod target;
pub mod tungstenite;

#[cfg(test)]
pub(crate) mod mock;

pub use target::{ParseTargetError, Target};

use async_trait::async_trait;
use snafu::prelude::*;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Error as WsError;

use super::{CloseCode, Frame};

/// Error reported by a transport
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum TransportError {
    /// underlying websocket stream broken
    #[snafu(display("underlying websocket stream broken: {source}"))]
    Websocket {
        /// source error
        source: WsError,
    },

    /// connection already closed by close handshake
    #[snafu(display("connection closed"))]
    Closed,

    /// connection dropped without close handshake
    #[snafu(display("connection lost"))]
    ConnectionLost,

    /// operation timed out
    #[snafu(display("operation timed out"))]
    Timeout,

    /// received a frame which can't be delivered as a message
    #[snafu(display("received invalid frame: {reason}"))]
    InvalidFrame {
        /// why the frame is invalid
        reason: String,
    },

    /// open request can't be built from target
    #[snafu(display("invalid open request: {reason}"))]
    InvalidRequest {
        /// why the request is invalid
        reason: String,
    },
}

impl TransportError {
    /// Check if this error means the connection can't be used anymore
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Websocket { source } => {
                !matches!(source, WsError::Utf8 | WsError::Capacity(_))
            }
            Self::InvalidFrame { .. } => false,
            _ => true,
        }
    }
}

/// Notification from transport, handed off into the client's serialized context
#[derive(Debug)]
pub(crate) enum TransportEvent {
    Open { protocol: Option<String> },
    Close {
        code: Option<CloseCode>,
        reason: Option<String>,
    },
    Error(TransportError),
    Received(Result<Frame, TransportError>),
}

/// Callback surface given to a transport when opening a connection.
///
/// Calls never block, they only enqueue a notification for the client that
/// owns this connection. Calls after the client stopped listening are ignored.
#[derive(Debug, Clone)]
pub struct Callbacks {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl Callbacks {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn notify(&self, event: TransportEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("Transport callback ignored, client stopped listening");
        }
    }

    /// connection opened, with the negotiated sub protocol
    pub fn on_open(&self, protocol: Option<String>) {
        self.notify(TransportEvent::Open { protocol })
    }

    /// connection closed by close handshake
    pub fn on_close(&self, code: Option<CloseCode>, reason: Option<String>) {
        self.notify(TransportEvent::Close { code, reason })
    }

    /// connection completed with a fatal error
    pub fn on_complete_with_error(&self, error: TransportError) {
        self.notify(TransportEvent::Error(error))
    }

    pub(crate) fn on_receive(&self, result: Result<Frame, TransportError>) -> bool {
        self.tx.send(TransportEvent::Received(result)).is_ok()
    }
}

/// Opens connections to a [`Target`].
pub trait Transport: Send + Sync + 'static {
    /// handle of one opened connection
    type Handle: TransportHandle;

    /// Start opening a connection, the result is reported by `callbacks`.
    ///
    /// Must be called inside a tokio runtime.
    fn open(&self, target: Target, callbacks: Callbacks) -> Self::Handle;
}

/// One connection of a [`Transport`].
#[async_trait]
pub trait TransportHandle: Send + Sync + 'static {
    /// Send a frame, resolves when the transport accepted the write.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Receive next frame, single shot.
    ///
    /// Non fatal errors (see [`TransportError::is_fatal`]) can be followed by
    /// more frames.
    async fn receive(&self) -> Result<Frame, TransportError>;

    /// Start close handshake, completion is reported by [`Callbacks::on_close`].
    async fn close(&self, code: CloseCode, reason: Option<String>) -> Result<(), TransportError>;
}
