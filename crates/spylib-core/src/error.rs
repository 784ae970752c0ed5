//! Error types for spylib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, protocol
//! violations, handshake failures, and rejected settings are all captured
//! here so callers can decide which ones warrant a reconnect.

/// The error type for all spylib operations.
///
/// The variants fall into four groups:
///
/// - **Transport**: [`Transport`](Error::Transport), [`Io`](Error::Io),
///   [`Timeout`](Error::Timeout), [`NotConnected`](Error::NotConnected),
///   [`ConnectionLost`](Error::ConnectionLost).
/// - **Protocol violations** (fatal, the connection is torn down):
///   [`UnsupportedProtocol`](Error::UnsupportedProtocol),
///   [`BodyTooLarge`](Error::BodyTooLarge), [`Protocol`](Error::Protocol).
/// - **Handshake failures** (recoverable by reconnecting):
///   [`NoDevice`](Error::NoDevice), [`HandshakeTimeout`](Error::HandshakeTimeout).
/// - **Validation** (non-fatal, no state changed):
///   [`InvalidParameter`](Error::InvalidParameter).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (connect refused, socket write failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A malformed message from the server (short fixed record, bad layout).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server speaks a protocol major.minor this client does not support.
    #[error("unsupported protocol version {major}.{minor}")]
    UnsupportedProtocol {
        /// Major version reported by the server.
        major: u8,
        /// Minor version reported by the server.
        minor: u8,
    },

    /// The server declared a message body larger than the configured maximum.
    #[error("message body of {size} bytes exceeds the {max} byte limit")]
    BodyTooLarge {
        /// Declared body size in bytes.
        size: u32,
        /// Configured maximum body size in bytes.
        max: u32,
    },

    /// Timed out connecting or writing to the server.
    #[error("timeout waiting for the server")]
    Timeout,

    /// The server did not deliver device info and client sync in time.
    #[error("server did not send device capability and synchronization info")]
    HandshakeTimeout,

    /// The server is up but reports no attached device.
    #[error("server is up but no device is available")]
    NoDevice,

    /// An out-of-range or unknown value was passed to a setting.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection has been established, or the handshake has not completed.
    #[error("not connected")]
    NotConnected,

    /// The connection was closed while an operation was in progress.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error indicates a misbehaving or incompatible server.
    ///
    /// Protocol violations always terminate the connection.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_) | Error::UnsupportedProtocol { .. } | Error::BodyTooLarge { .. }
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("connection refused".into());
        assert_eq!(e.to_string(), "transport error: connection refused");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("device info body too short".into());
        assert_eq!(e.to_string(), "protocol error: device info body too short");
    }

    #[test]
    fn error_display_unsupported_protocol() {
        let e = Error::UnsupportedProtocol { major: 3, minor: 1 };
        assert_eq!(e.to_string(), "unsupported protocol version 3.1");
    }

    #[test]
    fn error_display_body_too_large() {
        let e = Error::BodyTooLarge {
            size: 2_000_000,
            max: 1_048_576,
        };
        assert_eq!(
            e.to_string(),
            "message body of 2000000 bytes exceeds the 1048576 byte limit"
        );
    }

    #[test]
    fn error_display_handshake() {
        assert_eq!(
            Error::NoDevice.to_string(),
            "server is up but no device is available"
        );
        assert!(Error::HandshakeTimeout.to_string().contains("synchronization"));
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("gain stage 20 exceeds 16".into());
        assert_eq!(e.to_string(), "invalid parameter: gain stage 20 exceeds 16");
    }

    #[test]
    fn error_display_not_connected() {
        assert_eq!(Error::NotConnected.to_string(), "not connected");
        assert_eq!(Error::ConnectionLost.to_string(), "connection lost");
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for the server");
    }

    #[test]
    fn protocol_violation_classification() {
        assert!(Error::Protocol("x".into()).is_protocol_violation());
        assert!(Error::UnsupportedProtocol { major: 1, minor: 0 }.is_protocol_violation());
        assert!(Error::BodyTooLarge { size: 2, max: 1 }.is_protocol_violation());
        assert!(!Error::NoDevice.is_protocol_violation());
        assert!(!Error::HandshakeTimeout.is_protocol_violation());
        assert!(!Error::InvalidParameter("x".into()).is_protocol_violation());
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
