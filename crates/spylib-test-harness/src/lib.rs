//! spylib-test-harness: Test utilities for spylib.
//!
//! This crate provides [`MockSpyServer`], a scripted SpyServer stub that
//! accepts one TCP client, records its commands, and replays canned
//! server frames, so the client can be tested end-to-end without a real
//! SDR attached.

pub mod mock_spyserver;

pub use mock_spyserver::{MockSpyServer, ReceivedCommand, encode_message};
