//! Published connection state.
//!
//! The read loop owns the framer and demultiplexer; after each chunk it
//! copies the observable parts into a [`SessionState`] held behind an
//! `Arc<Mutex<SessionState>>` in the client. Callers only ever read
//! snapshots of it.

use crate::wire::{ClientSync, DeviceInfo};

/// Lifecycle of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// TCP connect in progress.
    Connecting,
    /// Hello sent, waiting for device info and client sync.
    AwaitingHandshake,
    /// Handshake complete, streaming disabled.
    Ready,
    /// Handshake complete, streaming enabled.
    Streaming,
}

impl ConnectionState {
    /// Whether the handshake has completed on this connection.
    pub fn is_ready(self) -> bool {
        matches!(self, ConnectionState::Ready | ConnectionState::Streaming)
    }
}

/// Snapshot of one connection's server-reported state and counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub state: ConnectionState,
    /// Capabilities of the attached device, once received.
    pub device_info: Option<DeviceInfo>,
    /// Most recent client sync record.
    pub sync: Option<ClientSync>,
    /// Whether this client may change device-wide settings.
    pub can_control: bool,
    pub device_center_frequency: u32,
    /// Lowest center frequency the server accepts in the current mode.
    pub minimum_tunable_frequency: u32,
    /// Highest center frequency the server accepts in the current mode.
    pub maximum_tunable_frequency: u32,
    pub dropped_buffers: u64,
    pub message_count: u64,
    /// Bytes received since streaming was last started or stopped.
    pub downstream_bytes: u64,
}

impl SessionState {
    /// Clear everything learned on the current connection.
    pub fn reset(&mut self) {
        *self = SessionState::default();
    }

    pub fn is_connected(&self) -> bool {
        self.state != ConnectionState::Disconnected
    }

    pub fn is_streaming(&self) -> bool {
        self.state == ConnectionState::Streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_default() {
        let s = SessionState::default();
        assert_eq!(s.state, ConnectionState::Disconnected);
        assert!(s.device_info.is_none());
        assert!(s.sync.is_none());
        assert!(!s.can_control);
        assert!(!s.is_connected());
        assert_eq!(s.dropped_buffers, 0);
    }

    #[test]
    fn ready_states() {
        assert!(!ConnectionState::Disconnected.is_ready());
        assert!(!ConnectionState::Connecting.is_ready());
        assert!(!ConnectionState::AwaitingHandshake.is_ready());
        assert!(ConnectionState::Ready.is_ready());
        assert!(ConnectionState::Streaming.is_ready());
    }

    #[test]
    fn reset_returns_to_default() {
        let mut s = SessionState {
            state: ConnectionState::Streaming,
            device_info: Some(DeviceInfo::default()),
            can_control: true,
            dropped_buffers: 12,
            downstream_bytes: 4096,
            ..SessionState::default()
        };
        assert!(s.is_streaming());
        s.reset();
        assert_eq!(s, SessionState::default());
    }
}
