//! # Sockline
//!
//! Client side websocket connection manager.
//!
//! A [`ws::Client`] turns a callback driven transport into a connection with
//! awaitable `connect`, `disconnect` and `send`, and two ordered streams: the
//! received messages and the state transitions. A [`ws::ReconnectingClient`]
//! opens a fresh client for every connect while keeping the same streams.
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use sockline::ws::{Client, CloseCode};
//!
//! # async fn run() -> sockline::Result<()> {
//! let mut client = Client::tungstenite("wss://echo.example.com/".parse().unwrap());
//! let mut messages = client.messages().unwrap();
//!
//! client.connect().await?;
//! client.send_text("Hello").await?;
//!
//! if let Some(Ok(message)) = messages.next().await {
//!     println!("got {:?}", message);
//! }
//!
//! client
//!     .disconnect_with(CloseCode::GoingAway, Some("See you later".to_string()))
//!     .await
//! # }
//! ```

#![deny(clippy::all)]
#![deny(missing_debug_implementations, missing_docs)]
#![forbid(unsafe_code)]

pub mod ws;

mod error;
pub use error::{Error, Result};
