//! Websocket frames and received message types.

pub(crate) mod codec;
pub(crate) mod stream;

pub use stream::{MessageStream, StateEventStream};

use bytes::Bytes;
use enum_as_inner::EnumAsInner;

use super::transport::TransportError;
use codec::{DecodeError, Decoder, JsonCodec};

/// One discrete unit of data exchanged over the transport.
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum Frame {
    /// utf-8 text frame
    Text(String),
    /// binary frame
    Binary(Bytes),
}

impl Frame {
    /// Raw payload bytes of this frame.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    /// frame type name, for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for Frame {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data.into())
    }
}

impl From<&'static [u8]> for Frame {
    fn from(data: &'static [u8]) -> Self {
        Self::Binary(Bytes::from_static(data))
    }
}

/// Item received from the connection
#[derive(Debug, EnumAsInner)]
pub enum Message {
    /// text frame
    Text(String),
    /// binary frame
    Binary(Bytes),
    /// the transport delivered something that can't be treated as a valid frame,
    /// the connection is still alive
    Invalid(TransportError),
}

impl Message {
    /// Decode payload into a value with given decoder.
    pub fn decode<V, D>(&self, decoder: &D) -> Result<V, DecodeError>
    where
        V: serde::de::DeserializeOwned,
        D: Decoder + ?Sized,
    {
        decoder.decode(self)
    }

    /// Decode payload as json.
    pub fn json<V: serde::de::DeserializeOwned>(&self) -> Result<V, DecodeError> {
        self.decode(&JsonCodec::default())
    }

    /// message type name, for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Invalid(_) => "invalid",
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Self::Text(text),
            Frame::Binary(data) => Self::Binary(data),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frame_from_payload_forms() {
        assert_eq!(Frame::from("hi"), Frame::Text("hi".to_string()));
        assert_eq!(
            Frame::from(vec![1u8, 2, 3]),
            Frame::Binary(Bytes::from_static(&[1, 2, 3]))
        );
        assert_eq!(Frame::from(&b"ping"[..]).as_bytes(), b"ping");
    }

    #[test]
    fn test_message_from_frame() {
        let msg = Message::from(Frame::Text("hello".to_string()));
        assert_eq!(msg.as_text().unwrap(), "hello");

        let msg = Message::from(Frame::Binary(Bytes::from_static(b"\x00\x01")));
        assert_eq!(msg.into_binary().unwrap().as_ref(), b"\x00\x01");
    }
}
