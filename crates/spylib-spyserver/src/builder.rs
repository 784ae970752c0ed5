//! SpyServerBuilder -- fluent builder for connected [`SpyServerClient`]s.
//!
//! Separates configuration from construction so that callers can set up
//! network parameters, stream formats, and timeouts before the TCP
//! connection and handshake take place.
//!
//! # Example
//!
//! ```no_run
//! use spylib_spyserver::builder::SpyServerBuilder;
//! use spylib_spyserver::wire::StreamFormat;
//!
//! # async fn example() -> spylib_core::Result<()> {
//! let client = SpyServerBuilder::new()
//!     .host("192.168.1.50")
//!     .iq_format(StreamFormat::Int16)
//!     .on_event(|event| println!("{:?}", event))
//!     .build()
//!     .await?;
//! client.set_center_frequency(145_500_000).await?;
//! client.start().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use spylib_core::error::{Error, Result};
use spylib_core::events::{EventCallback, SpyEvent};

use crate::client::{BoxedReader, BoxedWriter, ClientOptions, DEFAULT_PORT, SpyServerClient};
use crate::wire::{StreamFormat, StreamMode};

/// Pre-connected async streams for building a client without a real TCP
/// connection, for example the halves of [`tokio::io::duplex()`].
pub struct SpyTransports {
    pub read: BoxedReader,
    pub write: BoxedWriter,
}

/// Fluent builder for [`SpyServerClient`].
///
/// Only the host is required:
///
/// ```ignore
/// let client = SpyServerBuilder::new().host("sdr.local").build().await?;
/// ```
pub struct SpyServerBuilder {
    host: Option<String>,
    port: u16,
    options: ClientOptions,
    on_event: Option<EventCallback>,
}

impl SpyServerBuilder {
    pub fn new() -> Self {
        SpyServerBuilder {
            host: None,
            port: DEFAULT_PORT,
            options: ClientOptions::default(),
            on_event: None,
        }
    }

    /// Set the server's IP address or hostname.
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Set the server TCP port (default: 5555).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the software identification sent in the hello command.
    pub fn software_id(mut self, id: &str) -> Self {
        self.options.software_id = id.to_string();
        self
    }

    /// Set the IQ sample format requested after the handshake (default: Int16).
    pub fn iq_format(mut self, format: StreamFormat) -> Self {
        self.options.iq_format = format;
        self
    }

    /// Set the initial streaming mode (default: IQ only).
    pub fn streaming_mode(mut self, mode: StreamMode) -> Self {
        self.options.streaming_mode = mode;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.options.handshake_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.options.write_timeout = timeout;
        self
    }

    /// Set the largest message body accepted before the connection is
    /// dropped as a protocol violation (default: 1 MiB).
    pub fn max_body_size(mut self, size: u32) -> Self {
        self.options.max_body_size = size;
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.options.read_buffer_size = size.max(1);
        self
    }

    /// Register the consumer callback before the connection opens, so no
    /// event from the handshake is missed.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: FnMut(SpyEvent) + Send + 'static,
    {
        self.on_event = Some(Box::new(callback));
        self
    }

    /// Connect to the server and complete the handshake.
    ///
    /// Requires that [`host()`](Self::host) has been called.
    pub async fn build(self) -> Result<SpyServerClient> {
        let host = self.host.clone().ok_or_else(|| {
            Error::InvalidParameter("host is required: call .host() before .build()".into())
        })?;
        let client = self.into_client(&host);
        client.connect().await?;
        Ok(client)
    }

    /// Complete the handshake over pre-connected streams.
    pub async fn build_with_transports(self, transports: SpyTransports) -> Result<SpyServerClient> {
        let host = self.host.clone().unwrap_or_else(|| "localhost".to_string());
        let client = self.into_client(&host);
        client
            .connect_with_transports(transports.read, transports.write)
            .await?;
        Ok(client)
    }

    fn into_client(self, host: &str) -> SpyServerClient {
        let client = SpyServerClient::new(host, self.port, self.options);
        if let Some(callback) = self.on_event {
            client.set_event_callback(callback);
        }
        client
    }
}

impl Default for SpyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
