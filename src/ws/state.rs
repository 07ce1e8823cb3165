//! Connection lifecycle states and the events emitted on every transition.

use std::fmt::Display;

/// Lifecycle state of a single [`Client`](super::Client).
///
/// Only moves forward: `NotConnected -> Connecting -> Connected -> Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// connect has not been called yet
    NotConnected,
    /// waiting transport to open
    Connecting,
    /// transport opened, frames can be sent and received
    Connected,
    /// terminal state, a new client is needed for another connection
    Disconnected,
}

impl ConnectionState {
    /// Check if the connection is currently usable.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotConnected => "not connected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Observable state transition, emitted once per transition in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// connect started
    Connecting,
    /// transport opened
    Connected,
    /// connection ended, always the last event
    Disconnected {
        /// close code reported by transport, none when connection failed
        code: Option<CloseCode>,
        /// close reason reported by transport
        reason: Option<String>,
    },
}

/// Websocket close code, see RFC 6455 section 7.4.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000, normal closure
    #[default]
    Normal,
    /// 1001, endpoint is going away
    GoingAway,
    /// 1002, protocol error
    Protocol,
    /// 1003, received data type can't be accepted
    Unsupported,
    /// 1006, closed without close frame, never sent on the wire
    Abnormal,
    /// 1007, payload data inconsistent with message type
    Invalid,
    /// 1008, policy violation
    Policy,
    /// 1009, message too big
    Size,
    /// 1010, required extension not negotiated
    Extension,
    /// 1011, unexpected server condition
    Error,
    /// 1012, server restarting
    Restart,
    /// 1013, try again later
    Again,
    /// any other code
    Other(u16),
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::Protocol,
            1003 => Self::Unsupported,
            1006 => Self::Abnormal,
            1007 => Self::Invalid,
            1008 => Self::Policy,
            1009 => Self::Size,
            1010 => Self::Extension,
            1011 => Self::Error,
            1012 => Self::Restart,
            1013 => Self::Again,
            other => Self::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        match code {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::Protocol => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::Abnormal => 1006,
            CloseCode::Invalid => 1007,
            CloseCode::Policy => 1008,
            CloseCode::Size => 1009,
            CloseCode::Extension => 1010,
            CloseCode::Error => 1011,
            CloseCode::Restart => 1012,
            CloseCode::Again => 1013,
            CloseCode::Other(code) => code,
        }
    }
}

impl Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u16::from(*self))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_close_code_registered_values() {
        assert_eq!(CloseCode::from(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from(1001), CloseCode::GoingAway);
        assert_eq!(u16::from(CloseCode::Abnormal), 1006);
        assert_eq!(CloseCode::default(), CloseCode::Normal);
    }

    #[test]
    fn test_close_code_unregistered_value_kept() {
        let code = CloseCode::from(4321);
        assert_eq!(code, CloseCode::Other(4321));
        assert_eq!(u16::from(code), 4321);
        assert_eq!(code.to_string(), "4321");
    }

    #[test]
    fn test_state_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
    }
}
