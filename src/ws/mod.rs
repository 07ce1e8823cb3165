//! Websocket connection lifecycle, single shot and reconnecting

mod client;
mod message;
mod reconnect;
mod state;
pub mod transport;

pub use client::{Client, HeartbeatConfig};
pub use message::{
    codec::{DecodeError, Decoder, Encoder, JsonCodec},
    Frame, Message, MessageStream, StateEventStream,
};
pub use reconnect::{FactoryError, FixedTarget, ReconnectingClient, TargetFactory};
pub use state::{CloseCode, ConnectionState, StateEvent};
