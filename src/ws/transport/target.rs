use std::{fmt::Display, str::FromStr};

use snafu::prelude::*;
use url::Url;

/// Parse string as connection target error
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ParseTargetError {
    /// the str is not a valid url
    #[snafu(display("{s} is an invalid url: {source}"))]
    InvalidUrl {
        /// string be parsed
        s: String,
        /// source error
        source: url::ParseError,
    },

    /// the parsed url schema is not websocket
    #[snafu(display("the url {s} has invalid schema {schema}, only ws or wss is ok"))]
    InvalidScheme {
        /// the url
        s: String,
        /// invalid schema
        schema: String,
    },

    /// the parsed url has no host
    #[snafu(display("the url {s} has no host"))]
    NoHost {
        /// the url
        s: String,
    },

    /// sub protocol name is not a valid http token
    #[snafu(display("invalid sub protocol {protocol:?}"))]
    InvalidProtocol {
        /// the protocol
        protocol: String,
    },
}

/// Where a connection goes: a websocket url and requested sub protocols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    protocols: Vec<String>,
}

impl Target {
    /// Create target from a parsed url.
    pub fn new(url: Url) -> Result<Self, ParseTargetError> {
        let s = url.as_str();

        ensure!(
            url.scheme() == "wss" || url.scheme() == "ws",
            error::InvalidScheme {
                s,
                schema: url.scheme(),
            }
        );

        ensure!(url.host().is_some(), error::NoHost { s });

        Ok(Self {
            url,
            protocols: Vec::new(),
        })
    }

    /// Request a sub protocol, can be called many times, order is kept.
    pub fn with_protocol<S: Into<String>>(mut self, protocol: S) -> Result<Self, ParseTargetError> {
        let protocol = protocol.into();

        // RFC 6455 requires sub protocol names be http tokens
        let valid = !protocol.is_empty()
            && protocol
                .bytes()
                .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b));
        ensure!(valid, error::InvalidProtocol { protocol });

        self.protocols.push(protocol);
        Ok(self)
    }

    /// target url
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// requested sub protocols
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }
}

impl FromStr for Target {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).with_context(|_| error::InvalidUrl { s })?;
        Self::new(url)
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.url.fmt(f)
    }
}
