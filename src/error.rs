//! crate error types

use snafu::prelude::*;

use super::ws::transport::TransportError;

/// crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate error type
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// connect called when connection is not in a connectable state
    #[snafu(display("connection is already connected or connecting"))]
    AlreadyConnectedOrConnecting,

    /// operation needs a connected connection
    #[snafu(display("connection is not connected"))]
    NotConnected,

    /// transport reported an error
    #[snafu(display("transport failed: {source}"))]
    Transport {
        /// source error
        source: TransportError,
    },

    /// encode value to frame failed
    #[snafu(display("encode payload failed: {source}"))]
    Encode {
        /// source error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// target factory can't produce a connection target
    #[snafu(display("make connection target failed: {source}"))]
    TargetFactory {
        /// source error
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
