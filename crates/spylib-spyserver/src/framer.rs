//! Incremental message framer.
//!
//! TCP delivers the server's byte stream in arbitrary chunks. The framer
//! accumulates a 20-byte header, validates it, then accumulates exactly
//! `body_size` bytes before handing a complete [`Message`] to the caller.
//! Output is identical however the stream was split.

use spylib_core::{Error, Result};

use crate::wire::{DEFAULT_MAX_BODY_SIZE, MESSAGE_HEADER_SIZE, MessageHeader, PROTOCOL_VERSION};

/// A complete server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    AcquiringHeader,
    ReadingData(MessageHeader),
}

/// Splits a byte stream into [`Message`]s.
///
/// The protocol version and body size are checked only for headers that
/// announce a body; zero-body messages are delivered as they are. Once a
/// protocol violation is reported the framer refuses further input until
/// [`reset`](MessageFramer::reset) is called.
#[derive(Debug)]
pub struct MessageFramer {
    phase: Phase,
    cursor: usize,
    header_buf: [u8; MESSAGE_HEADER_SIZE],
    body: Vec<u8>,
    max_body_size: u32,
    failed: bool,
}

impl MessageFramer {
    pub fn new(max_body_size: u32) -> Self {
        Self {
            phase: Phase::AcquiringHeader,
            cursor: 0,
            header_buf: [0u8; MESSAGE_HEADER_SIZE],
            body: Vec::new(),
            max_body_size,
            failed: false,
        }
    }

    /// Discard any partial message and clear the failed state.
    pub fn reset(&mut self) {
        self.phase = Phase::AcquiringHeader;
        self.cursor = 0;
        self.body = Vec::new();
        self.failed = false;
    }

    /// Whether a partial header or body is buffered.
    pub fn has_partial(&self) -> bool {
        self.cursor > 0 || matches!(self.phase, Phase::ReadingData(_))
    }

    /// Feed a chunk of received bytes.
    ///
    /// `on_message` is invoked once per completed message, in stream order.
    /// An error from the callback stops framing and is returned as-is.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_message: F) -> Result<()>
    where
        F: FnMut(Message) -> Result<()>,
    {
        if self.failed {
            return Err(Error::Protocol(
                "framer stopped after a protocol violation".into(),
            ));
        }
        let result = self.feed_inner(chunk, &mut on_message);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn feed_inner(
        &mut self,
        mut chunk: &[u8],
        on_message: &mut dyn FnMut(Message) -> Result<()>,
    ) -> Result<()> {
        while !chunk.is_empty() {
            match self.phase {
                Phase::AcquiringHeader => {
                    let take = (MESSAGE_HEADER_SIZE - self.cursor).min(chunk.len());
                    self.header_buf[self.cursor..self.cursor + take]
                        .copy_from_slice(&chunk[..take]);
                    self.cursor += take;
                    chunk = &chunk[take..];

                    if self.cursor < MESSAGE_HEADER_SIZE {
                        continue;
                    }

                    let header = MessageHeader::parse(&self.header_buf);
                    self.cursor = 0;

                    if header.body_size == 0 {
                        on_message(Message {
                            header,
                            body: Vec::new(),
                        })?;
                    } else {
                        self.validate(&header)?;
                        self.body = vec![0u8; header.body_size as usize];
                        self.phase = Phase::ReadingData(header);
                    }
                }
                Phase::ReadingData(header) => {
                    let take = (self.body.len() - self.cursor).min(chunk.len());
                    self.body[self.cursor..self.cursor + take].copy_from_slice(&chunk[..take]);
                    self.cursor += take;
                    chunk = &chunk[take..];

                    if self.cursor == self.body.len() {
                        let body = std::mem::take(&mut self.body);
                        self.phase = Phase::AcquiringHeader;
                        self.cursor = 0;
                        on_message(Message { header, body })?;
                    }
                }
            }
        }
        Ok(())
    }

    fn validate(&self, header: &MessageHeader) -> Result<()> {
        let version = header.protocol_version();
        if !version.is_compatible_with(PROTOCOL_VERSION) {
            tracing::warn!(
                server = %version,
                client = %PROTOCOL_VERSION,
                "Server protocol version mismatch"
            );
            return Err(Error::UnsupportedProtocol {
                major: version.major,
                minor: version.minor,
            });
        }
        if header.body_size > self.max_body_size {
            return Err(Error::BodyTooLarge {
                size: header.body_size,
                max: self.max_body_size,
            });
        }
        Ok(())
    }
}

impl Default for MessageFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
