//! Stream demultiplexer.
//!
//! Turns framed [`Message`]s into typed [`SpyEvent`]s. Sample bodies are
//! decoded according to their message type, control records are stored for
//! the handshake, and data sequence numbers are checked for gaps.

use spylib_core::{Complex32, ComplexInt16, ComplexUInt8, Result, SpyEvent};

use crate::framer::Message;
use crate::wire::{ClientSync, DeviceInfo, DeviceType, MessageType};

/// Control record received from the server, returned to the caller so it
/// can update derived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlUpdate {
    DeviceInfo(DeviceInfo),
    ClientSync(ClientSync),
}

/// Progress of the capability handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// Device info or client sync still outstanding.
    Pending,
    /// Both records received and a device is present.
    Complete,
    /// The server reported an invalid device.
    NoDevice,
}

/// Per-connection decode and sequence-tracking state.
#[derive(Debug, Default)]
pub struct Demultiplexer {
    last_sequence: Option<u32>,
    dropped_buffers: u64,
    message_count: u64,
    device_info: Option<DeviceInfo>,
    sync: Option<ClientSync>,
}

impl Demultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Total buffers reported missing since the connection opened.
    pub fn dropped_buffers(&self) -> u64 {
        self.dropped_buffers
    }

    /// Number of messages processed since the connection opened.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    pub fn sync(&self) -> Option<&ClientSync> {
        self.sync.as_ref()
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        match (&self.device_info, &self.sync) {
            (Some(info), _) if info.device_type == DeviceType::Invalid => {
                HandshakeStatus::NoDevice
            }
            (Some(_), Some(_)) => HandshakeStatus::Complete,
            _ => HandshakeStatus::Pending,
        }
    }

    /// Decode one message, emitting at most one sample or sync event plus
    /// an optional [`SpyEvent::BuffersDropped`] ahead of it.
    ///
    /// A short DeviceInfo or ClientSync body is a protocol error.
    pub fn process(
        &mut self,
        msg: Message,
        emit: &mut dyn FnMut(SpyEvent),
    ) -> Result<Option<ControlUpdate>> {
        self.message_count += 1;
        let header = msg.header;

        if header.message_type.is_sequenced() {
            self.track_sequence(header.sequence_number, emit);
        }

        match header.message_type {
            MessageType::DeviceInfo => {
                let info = DeviceInfo::parse(&msg.body)?;
                tracing::debug!(
                    device = info.device_type.name(),
                    serial = format_args!("{:08X}", info.device_serial),
                    max_sample_rate = info.maximum_sample_rate,
                    decimation_stages = info.decimation_stage_count,
                    "Received device info"
                );
                self.device_info = Some(info);
                return Ok(Some(ControlUpdate::DeviceInfo(info)));
            }
            MessageType::ClientSync => {
                let sync = ClientSync::parse(&msg.body)?;
                tracing::debug!(
                    can_control = sync.can_control,
                    gain = sync.gain,
                    iq_center = sync.iq_center_frequency,
                    "Received client sync"
                );
                self.sync = Some(sync);
                emit(SpyEvent::DeviceSync);
                return Ok(Some(ControlUpdate::ClientSync(sync)));
            }
            MessageType::Pong => {
                tracing::trace!("Pong received");
            }
            MessageType::ReadSetting => {
                tracing::trace!(len = msg.body.len(), "Ignoring read-setting response");
            }
            MessageType::Uint8Iq => {
                emit(SpyEvent::SamplesUInt8(decode_uint8_iq(&msg.body)));
            }
            MessageType::Int16Iq => {
                emit(SpyEvent::SamplesInt16(decode_int16_iq(&msg.body)));
            }
            MessageType::FloatIq => {
                emit(SpyEvent::SamplesFloat(decode_float_iq(&msg.body)));
            }
            MessageType::Uint8Fft => {
                emit(SpyEvent::FftUInt8(msg.body));
            }
            MessageType::Unknown(code) => {
                tracing::trace!(message_type = code, "Ignoring unknown message type");
            }
        }

        Ok(None)
    }

    fn track_sequence(&mut self, seq: u32, emit: &mut dyn FnMut(SpyEvent)) {
        let gap = match self.last_sequence {
            Some(last) => seq.wrapping_sub(last).wrapping_sub(1),
            None => 0,
        };
        self.last_sequence = Some(seq);

        if gap > 0 {
            self.dropped_buffers += u64::from(gap);
            tracing::warn!(
                gap,
                total = self.dropped_buffers,
                "Sequence gap, buffers dropped"
            );
            emit(SpyEvent::BuffersDropped { count: gap });
        }
    }
}

// ---------------------------------------------------------------------------
// Sample decoders
//
// Trailing bytes that do not form a whole sample are discarded.
// ---------------------------------------------------------------------------

/// Decode interleaved unsigned 8-bit I/Q pairs.
pub fn decode_uint8_iq(body: &[u8]) -> Vec<ComplexUInt8> {
    body.chunks_exact(2)
        .map(|c| ComplexUInt8::new(c[0], c[1]))
        .collect()
}

/// Decode interleaved little-endian signed 16-bit I/Q pairs.
pub fn decode_int16_iq(body: &[u8]) -> Vec<ComplexInt16> {
    body.chunks_exact(4)
        .map(|c| {
            ComplexInt16::new(
                i16::from_le_bytes([c[0], c[1]]),
                i16::from_le_bytes([c[2], c[3]]),
            )
        })
        .collect()
}

/// Decode interleaved little-endian 32-bit float I/Q pairs.
pub fn decode_float_iq(body: &[u8]) -> Vec<Complex32> {
    body.chunks_exact(8)
        .map(|c| {
            Complex32::new(
                f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
