//! SpyServer TCP streaming client for spylib.
//!
//! This crate implements the client side of the SpyServer protocol (version
//! 2.0) used to stream IQ samples and FFT frames from a remote SDR over
//! TCP. It provides:
//!
//! - **Wire records** ([`wire`]) -- message and command headers, device
//!   info, client sync, and the protocol enumerations.
//! - **Command codec** ([`codec`]) -- hello, set-setting, and ping commands.
//! - **Framer** ([`framer`]) -- incremental reassembly of server messages
//!   from arbitrarily split TCP reads.
//! - **Demultiplexer** ([`demux`]) -- sample decoding, sequence gap
//!   detection, and handshake tracking.
//! - **Channel parameters** ([`channel`]) -- tuning, decimation, gain, and
//!   FFT display state with range validation.
//! - **SpyServerClient** ([`client`]) -- connection lifecycle, background
//!   read loop, and streaming control.
//! - **SpyServerBuilder** ([`builder`]) -- fluent construction of a
//!   connected client.
//!
//! # Architecture
//!
//! The server sends a continuous byte stream of 20-byte headers followed by
//! bodies. A single read task per connection owns the framer and the
//! demultiplexer and publishes a [`SessionState`](session::SessionState)
//! snapshot after every chunk. Commands are written from the caller's task.
//! Decoded samples reach the application through one callback registered
//! with [`SpyServerClient::set_event_callback`] or
//! [`SpyServerBuilder::on_event`].
//!
//! # Example
//!
//! ```no_run
//! use spylib_spyserver::SpyServerBuilder;
//! use spylib_core::SpyEvent;
//!
//! # async fn example() -> spylib_core::Result<()> {
//! let client = SpyServerBuilder::new()
//!     .host("192.168.1.50")
//!     .on_event(|event| {
//!         if let SpyEvent::SamplesInt16(samples) = event {
//!             println!("{} samples", samples.len());
//!         }
//!     })
//!     .build()
//!     .await?;
//!
//! client.set_center_frequency(100_000_000).await?;
//! client.set_sample_rate(client.available_sample_rates().await[0]).await?;
//! client.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod channel;
pub mod client;
pub mod codec;
pub mod demux;
pub mod framer;
pub mod session;
pub mod wire;

pub use builder::{SpyServerBuilder, SpyTransports};
pub use client::{ClientOptions, DEFAULT_PORT, SpyServerClient};
pub use session::{ConnectionState, SessionState};
pub use wire::{DeviceInfo, DeviceType, StreamFormat, StreamMode};
