//! spylib-core: Core error, event, and sample types for spylib.
//!
//! This crate defines the protocol-agnostic types shared by the SpyServer
//! backend and the test harness. Applications that only consume sample
//! streams can depend on these types without pulling in the network client.
//!
//! # Key types
//!
//! - [`SpyEvent`] -- the discriminated event delivered to the consumer callback
//! - [`ComplexUInt8`] / [`ComplexInt16`] / [`Complex32`] -- IQ sample records
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod samples;

// Re-export key types at crate root for ergonomic `use spylib_core::*`.
pub use error::{Error, Result};
pub use events::{EventCallback, SpyEvent};
pub use samples::{Complex32, ComplexInt16, ComplexUInt8};
