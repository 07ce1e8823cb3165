//! Payload encode/decode helpers, layered on top of [`Frame`] and [`Message`].

use serde::{de::DeserializeOwned, Serialize};
use snafu::prelude::*;

use super::{Frame, Message};

/// Error when decode a received message into a value
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum DecodeError {
    /// the message is an invalid item, it has no payload
    #[snafu(display("message is invalid, no payload to decode"))]
    InvalidMessage,

    /// payload is not valid json of target type
    #[snafu(display("parse json failed: {source}"))]
    Json {
        /// source error
        source: serde_json::Error,
    },

    /// custom decoder failed
    #[snafu(display("decode payload failed: {source}"))]
    Custom {
        /// source error
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Type implements this trait can turn a value into a frame.
pub trait Encoder {
    /// encode error
    type Error: std::error::Error + Send + Sync + 'static;

    /// encode value to a frame
    fn encode<V: Serialize + ?Sized>(&self, value: &V) -> Result<Frame, Self::Error>;
}

/// Type implements this trait can turn a received message into a value.
pub trait Decoder {
    /// decode message payload to value
    fn decode<V: DeserializeOwned>(&self, message: &Message) -> Result<V, DecodeError>;
}

/// Json codec, encodes to text frame by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec {
    binary: bool,
}

impl JsonCodec {
    /// Codec which encodes json into binary frames.
    pub fn binary() -> Self {
        Self { binary: true }
    }
}

impl Encoder for JsonCodec {
    type Error = serde_json::Error;

    fn encode<V: Serialize + ?Sized>(&self, value: &V) -> Result<Frame, Self::Error> {
        if self.binary {
            Ok(Frame::Binary(serde_json::to_vec(value)?.into()))
        } else {
            Ok(Frame::Text(serde_json::to_string(value)?))
        }
    }
}

impl Decoder for JsonCodec {
    fn decode<V: DeserializeOwned>(&self, message: &Message) -> Result<V, DecodeError> {
        let data: &[u8] = match message {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data,
            Message::Invalid(_) => return error::InvalidMessage.fail(),
        };

        serde_json::from_slice(data).context(error::Json)
    }
}
