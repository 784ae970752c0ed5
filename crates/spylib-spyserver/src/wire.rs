//! SpyServer wire records and enumerations.
//!
//! Everything the client and server exchange is little-endian and
//! fixed-layout. This module defines the headers, the two control records
//! sent by the server during the handshake, and the enumerations used in
//! their fields. It performs no I/O; all functions operate on byte slices.
//!
//! # Layouts
//!
//! ```text
//! Message header (server -> client, 20 bytes):
//!   protocol_id u32 | message_type u32 | stream_type u32 | sequence u32 | body_size u32
//!
//! Command header (client -> server, 8 bytes):
//!   command_type u32 | body_size u32
//! ```

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use spylib_core::{Error, Result};

/// Size of the message header in bytes.
pub const MESSAGE_HEADER_SIZE: usize = 20;

/// Size of the command header in bytes.
pub const COMMAND_HEADER_SIZE: usize = 8;

/// Default upper bound on a message body (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: u32 = 1 << 20;

/// Protocol version spoken by this client.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(2, 0, 1558);

/// Sentinel the server protocol uses for "no valid value".
pub const INVALID_VALUE: u32 = 0xFFFF_FFFF;

/// Widest FFT display the server accepts, in pixels.
pub const MAX_DISPLAY_PIXELS: u32 = 1 << 15;

/// Narrowest FFT display the server accepts, in pixels.
pub const MIN_DISPLAY_PIXELS: u32 = 100;

/// Largest FFT display range in dB.
pub const MAX_FFT_DB_RANGE: i32 = 150;

/// Smallest FFT display range in dB.
pub const MIN_FFT_DB_RANGE: i32 = 10;

/// Largest FFT display offset magnitude in dB.
pub const MAX_FFT_DB_OFFSET: i32 = 100;

/// Stream type bit for the IQ channel.
pub const STREAM_TYPE_IQ: u32 = 1;

/// Stream type bit for the FFT channel.
pub const STREAM_TYPE_FFT: u32 = 4;

/// Minimum DeviceInfo body: the nine fields every server sends.
pub const DEVICE_INFO_MIN_SIZE: usize = 36;

/// DeviceInfo body including the optional trailing fields.
pub const DEVICE_INFO_SIZE: usize = 48;

/// ClientSync body size.
pub const CLIENT_SYNC_SIZE: usize = 36;

// ---------------------------------------------------------------------------
// Protocol version
// ---------------------------------------------------------------------------

/// A packed `major.minor.build` protocol version.
///
/// Only major and minor take part in compatibility checks; the build
/// number is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
}

impl ProtocolVersion {
    pub const fn new(major: u8, minor: u8, build: u16) -> Self {
        Self {
            major,
            minor,
            build,
        }
    }

    /// Pack as `major << 24 | minor << 16 | build`.
    pub const fn packed(self) -> u32 {
        ((self.major as u32) << 24) | ((self.minor as u32) << 16) | self.build as u32
    }

    /// Unpack a `ProtocolID` field.
    pub const fn from_packed(id: u32) -> Self {
        Self {
            major: (id >> 24) as u8,
            minor: (id >> 16) as u8,
            build: id as u16,
        }
    }

    /// Whether two versions share the same major and minor.
    pub fn is_compatible_with(self, other: ProtocolVersion) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Command types sent from client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Hello,
    GetSetting,
    SetSetting,
    Ping,
}

impl CommandType {
    pub fn code(self) -> u32 {
        match self {
            CommandType::Hello => 0,
            CommandType::GetSetting => 1,
            CommandType::SetSetting => 2,
            CommandType::Ping => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(CommandType::Hello),
            1 => Some(CommandType::GetSetting),
            2 => Some(CommandType::SetSetting),
            3 => Some(CommandType::Ping),
            _ => None,
        }
    }
}

/// Server settings addressable with a set-setting command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    StreamingMode,
    StreamingEnabled,
    Gain,
    IqFormat,
    IqFrequency,
    IqDecimation,
    FftFormat,
    FftFrequency,
    FftDecimation,
    FftDbOffset,
    FftDbRange,
    FftDisplayPixels,
}

impl SettingId {
    pub fn code(self) -> u32 {
        match self {
            SettingId::StreamingMode => 0,
            SettingId::StreamingEnabled => 1,
            SettingId::Gain => 2,
            SettingId::IqFormat => 100,
            SettingId::IqFrequency => 101,
            SettingId::IqDecimation => 102,
            SettingId::FftFormat => 200,
            SettingId::FftFrequency => 201,
            SettingId::FftDecimation => 202,
            SettingId::FftDbOffset => 203,
            SettingId::FftDbRange => 204,
            SettingId::FftDisplayPixels => 205,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        let id = match code {
            0 => SettingId::StreamingMode,
            1 => SettingId::StreamingEnabled,
            2 => SettingId::Gain,
            100 => SettingId::IqFormat,
            101 => SettingId::IqFrequency,
            102 => SettingId::IqDecimation,
            200 => SettingId::FftFormat,
            201 => SettingId::FftFrequency,
            202 => SettingId::FftDecimation,
            203 => SettingId::FftDbOffset,
            204 => SettingId::FftDbRange,
            205 => SettingId::FftDisplayPixels,
            _ => return None,
        };
        Some(id)
    }
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    DeviceInfo,
    ClientSync,
    Pong,
    ReadSetting,
    Uint8Iq,
    Int16Iq,
    FloatIq,
    Uint8Fft,
    /// A message type this client does not decode.
    Unknown(u32),
}

impl MessageType {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => MessageType::DeviceInfo,
            1 => MessageType::ClientSync,
            2 => MessageType::Pong,
            3 => MessageType::ReadSetting,
            100 => MessageType::Uint8Iq,
            101 => MessageType::Int16Iq,
            103 => MessageType::FloatIq,
            301 => MessageType::Uint8Fft,
            other => MessageType::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            MessageType::DeviceInfo => 0,
            MessageType::ClientSync => 1,
            MessageType::Pong => 2,
            MessageType::ReadSetting => 3,
            MessageType::Uint8Iq => 100,
            MessageType::Int16Iq => 101,
            MessageType::FloatIq => 103,
            MessageType::Uint8Fft => 301,
            MessageType::Unknown(code) => code,
        }
    }

    /// Whether messages of this type take part in sequence gap tracking.
    ///
    /// The server does not share its data counter with device info, client
    /// sync, or FFT messages.
    pub fn is_sequenced(self) -> bool {
        !matches!(
            self,
            MessageType::DeviceInfo | MessageType::ClientSync | MessageType::Uint8Fft
        )
    }
}

/// Which channels the server streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    #[default]
    IqOnly,
    FftOnly,
    FftIq,
}

impl StreamMode {
    /// Bitmask of [`STREAM_TYPE_IQ`] and [`STREAM_TYPE_FFT`].
    pub fn bits(self) -> u32 {
        match self {
            StreamMode::IqOnly => STREAM_TYPE_IQ,
            StreamMode::FftOnly => STREAM_TYPE_FFT,
            StreamMode::FftIq => STREAM_TYPE_IQ | STREAM_TYPE_FFT,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            STREAM_TYPE_IQ => Some(StreamMode::IqOnly),
            STREAM_TYPE_FFT => Some(StreamMode::FftOnly),
            b if b == STREAM_TYPE_IQ | STREAM_TYPE_FFT => Some(StreamMode::FftIq),
            _ => None,
        }
    }

    pub fn includes_iq(self) -> bool {
        self.bits() & STREAM_TYPE_IQ != 0
    }

    pub fn includes_fft(self) -> bool {
        self.bits() & STREAM_TYPE_FFT != 0
    }
}

/// Sample encodings the server can stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    Uint8,
    #[default]
    Int16,
    Float,
}

impl StreamFormat {
    pub fn code(self) -> u32 {
        match self {
            StreamFormat::Uint8 => 1,
            StreamFormat::Int16 => 2,
            StreamFormat::Float => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(StreamFormat::Uint8),
            2 => Some(StreamFormat::Int16),
            4 => Some(StreamFormat::Float),
            _ => None,
        }
    }
}

/// Receiver hardware attached to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// The server is running but has no usable device.
    #[default]
    Invalid,
    AirspyOne,
    AirspyHf,
    RtlSdr,
    Unknown(u32),
}

impl DeviceType {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => DeviceType::Invalid,
            1 => DeviceType::AirspyOne,
            2 => DeviceType::AirspyHf,
            3 => DeviceType::RtlSdr,
            other => DeviceType::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            DeviceType::Invalid => 0,
            DeviceType::AirspyOne => 1,
            DeviceType::AirspyHf => 2,
            DeviceType::RtlSdr => 3,
            DeviceType::Unknown(code) => code,
        }
    }

    /// Human-readable device family name.
    pub fn name(self) -> &'static str {
        match self {
            DeviceType::Invalid => "Invalid Device",
            DeviceType::AirspyOne => "Airspy Mini / R2",
            DeviceType::AirspyHf => "Airspy HF / HF+",
            DeviceType::RtlSdr => "RTLSDR",
            DeviceType::Unknown(_) => "Unknown Device",
        }
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// Header preceding every server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Packed protocol version of the server.
    pub protocol_id: u32,
    pub message_type: MessageType,
    /// Bitmask of [`STREAM_TYPE_IQ`] / [`STREAM_TYPE_FFT`].
    pub stream_type: u32,
    pub sequence_number: u32,
    /// Number of body bytes following the header.
    pub body_size: u32,
}

impl MessageHeader {
    pub fn parse(data: &[u8; MESSAGE_HEADER_SIZE]) -> Self {
        let mut buf = &data[..];
        Self {
            protocol_id: buf.get_u32_le(),
            message_type: MessageType::from_code(buf.get_u32_le()),
            stream_type: buf.get_u32_le(),
            sequence_number: buf.get_u32_le(),
            body_size: buf.get_u32_le(),
        }
    }

    pub fn encode(&self) -> [u8; MESSAGE_HEADER_SIZE] {
        let mut out = [0u8; MESSAGE_HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.protocol_id);
        buf.put_u32_le(self.message_type.code());
        buf.put_u32_le(self.stream_type);
        buf.put_u32_le(self.sequence_number);
        buf.put_u32_le(self.body_size);
        out
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::from_packed(self.protocol_id)
    }
}

/// Header preceding every client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub command_type: CommandType,
    pub body_size: u32,
}

impl CommandHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < COMMAND_HEADER_SIZE {
            return Err(Error::Protocol(format!(
                "command header too short: {} bytes, expected {}",
                data.len(),
                COMMAND_HEADER_SIZE
            )));
        }
        let mut buf = data;
        let code = buf.get_u32_le();
        let command_type = CommandType::from_code(code)
            .ok_or_else(|| Error::Protocol(format!("unknown command type {}", code)))?;
        Ok(Self {
            command_type,
            body_size: buf.get_u32_le(),
        })
    }

    pub fn put(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.command_type.code());
        buf.put_u32_le(self.body_size);
    }
}

// ---------------------------------------------------------------------------
// Control records
// ---------------------------------------------------------------------------

/// Capabilities of the device attached to the server.
///
/// Sent once per connection as the first step of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub device_serial: u32,
    pub maximum_sample_rate: u32,
    pub maximum_bandwidth: u32,
    /// Number of available decimation-by-two stages.
    pub decimation_stage_count: u32,
    pub gain_stage_count: u32,
    pub maximum_gain_index: u32,
    pub minimum_frequency: u32,
    pub maximum_frequency: u32,
    /// ADC resolution in bits. Zero when the server omits it.
    pub resolution: u32,
    /// Smallest IQ decimation stage the server will honour. Zero when omitted.
    pub minimum_iq_decimation: u32,
    /// Non-zero when the server forces a specific IQ format.
    pub forced_iq_format: u32,
}

impl DeviceInfo {
    /// Decode a DeviceInfo body.
    ///
    /// The first nine fields are mandatory. The three trailing fields are
    /// only sent by newer servers and default to zero when absent.
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < DEVICE_INFO_MIN_SIZE {
            return Err(Error::Protocol(format!(
                "device info body too short: {} bytes, minimum is {}",
                body.len(),
                DEVICE_INFO_MIN_SIZE
            )));
        }

        let mut buf = body;
        let mut info = DeviceInfo {
            device_type: DeviceType::from_code(buf.get_u32_le()),
            device_serial: buf.get_u32_le(),
            maximum_sample_rate: buf.get_u32_le(),
            maximum_bandwidth: buf.get_u32_le(),
            decimation_stage_count: buf.get_u32_le(),
            gain_stage_count: buf.get_u32_le(),
            maximum_gain_index: buf.get_u32_le(),
            minimum_frequency: buf.get_u32_le(),
            maximum_frequency: buf.get_u32_le(),
            ..DeviceInfo::default()
        };

        if buf.remaining() >= 4 {
            info.resolution = buf.get_u32_le();
        }
        if buf.remaining() >= 4 {
            info.minimum_iq_decimation = buf.get_u32_le();
        }
        if buf.remaining() >= 4 {
            info.forced_iq_format = buf.get_u32_le();
        }

        Ok(info)
    }

    /// Encode the full 48-byte record.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(DEVICE_INFO_SIZE);
        buf.put_u32_le(self.device_type.code());
        buf.put_u32_le(self.device_serial);
        buf.put_u32_le(self.maximum_sample_rate);
        buf.put_u32_le(self.maximum_bandwidth);
        buf.put_u32_le(self.decimation_stage_count);
        buf.put_u32_le(self.gain_stage_count);
        buf.put_u32_le(self.maximum_gain_index);
        buf.put_u32_le(self.minimum_frequency);
        buf.put_u32_le(self.maximum_frequency);
        buf.put_u32_le(self.resolution);
        buf.put_u32_le(self.minimum_iq_decimation);
        buf.put_u32_le(self.forced_iq_format);
        buf.to_vec()
    }
}

/// Tuning and control state pushed by the server.
///
/// The first sync completes the handshake; later ones report changes made
/// by whichever client holds control of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientSync {
    /// Whether this client may change device-wide settings.
    pub can_control: bool,
    pub gain: u32,
    pub device_center_frequency: u32,
    pub iq_center_frequency: u32,
    pub fft_center_frequency: u32,
    pub minimum_iq_center_frequency: u32,
    pub maximum_iq_center_frequency: u32,
    pub minimum_fft_center_frequency: u32,
    pub maximum_fft_center_frequency: u32,
}

impl ClientSync {
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < CLIENT_SYNC_SIZE {
            return Err(Error::Protocol(format!(
                "client sync body too short: {} bytes, expected {}",
                body.len(),
                CLIENT_SYNC_SIZE
            )));
        }

        let mut buf = body;
        Ok(ClientSync {
            can_control: buf.get_u32_le() != 0,
            gain: buf.get_u32_le(),
            device_center_frequency: buf.get_u32_le(),
            iq_center_frequency: buf.get_u32_le(),
            fft_center_frequency: buf.get_u32_le(),
            minimum_iq_center_frequency: buf.get_u32_le(),
            maximum_iq_center_frequency: buf.get_u32_le(),
            minimum_fft_center_frequency: buf.get_u32_le(),
            maximum_fft_center_frequency: buf.get_u32_le(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(CLIENT_SYNC_SIZE);
        buf.put_u32_le(self.can_control as u32);
        buf.put_u32_le(self.gain);
        buf.put_u32_le(self.device_center_frequency);
        buf.put_u32_le(self.iq_center_frequency);
        buf.put_u32_le(self.fft_center_frequency);
        buf.put_u32_le(self.minimum_iq_center_frequency);
        buf.put_u32_le(self.maximum_iq_center_frequency);
        buf.put_u32_le(self.minimum_fft_center_frequency);
        buf.put_u32_le(self.maximum_fft_center_frequency);
        buf.to_vec()
    }

    /// Tunable `(min, max)` center frequency for the given stream mode.
    ///
    /// Any mode that includes FFT uses the FFT bounds.
    pub fn tunable_range(&self, mode: StreamMode) -> (u32, u32) {
        if mode.includes_fft() {
            (
                self.minimum_fft_center_frequency,
                self.maximum_fft_center_frequency,
            )
        } else {
            (
                self.minimum_iq_center_frequency,
                self.maximum_iq_center_frequency,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_device_info() -> DeviceInfo {
        DeviceInfo {
            device_type: DeviceType::AirspyOne,
            device_serial: 0xDEAD_BEEF,
            maximum_sample_rate: 6_000_000,
            maximum_bandwidth: 5_000_000,
            decimation_stage_count: 8,
            gain_stage_count: 21,
            maximum_gain_index: 21,
            minimum_frequency: 24_000_000,
            maximum_frequency: 1_800_000_000,
            resolution: 12,
            minimum_iq_decimation: 1,
            forced_iq_format: 0,
        }
    }

    // -- protocol version --

    #[test]
    fn protocol_version_packing() {
        assert_eq!(PROTOCOL_VERSION.packed(), (2 << 24) | 1558);
        let v = ProtocolVersion::from_packed(0x0305_0010);
        assert_eq!(v, ProtocolVersion::new(3, 5, 16));
        assert_eq!(v.to_string(), "3.5.16");
    }

    #[test]
    fn compatibility_ignores_build() {
        let other_build = ProtocolVersion::new(2, 0, 1700);
        assert!(PROTOCOL_VERSION.is_compatible_with(other_build));
        assert!(!PROTOCOL_VERSION.is_compatible_with(ProtocolVersion::new(2, 1, 1558)));
        assert!(!PROTOCOL_VERSION.is_compatible_with(ProtocolVersion::new(1, 0, 1558)));
    }

    // -- enumerations --

    #[test]
    fn message_type_codes() {
        assert_eq!(MessageType::from_code(0), MessageType::DeviceInfo);
        assert_eq!(MessageType::from_code(101), MessageType::Int16Iq);
        assert_eq!(MessageType::from_code(301), MessageType::Uint8Fft);
        assert_eq!(MessageType::from_code(102), MessageType::Unknown(102));
        assert_eq!(MessageType::Unknown(999).code(), 999);
    }

    #[test]
    fn sequenced_message_types() {
        assert!(!MessageType::DeviceInfo.is_sequenced());
        assert!(!MessageType::ClientSync.is_sequenced());
        assert!(!MessageType::Uint8Fft.is_sequenced());
        assert!(MessageType::Int16Iq.is_sequenced());
        assert!(MessageType::Pong.is_sequenced());
        assert!(MessageType::Unknown(500).is_sequenced());
    }

    #[test]
    fn setting_codes_match_server() {
        assert_eq!(SettingId::StreamingMode.code(), 0);
        assert_eq!(SettingId::IqDecimation.code(), 102);
        assert_eq!(SettingId::FftDisplayPixels.code(), 205);
        assert_eq!(SettingId::from_code(203), Some(SettingId::FftDbOffset));
        assert_eq!(SettingId::from_code(7), None);
    }

    #[test]
    fn stream_mode_bits() {
        assert_eq!(StreamMode::IqOnly.bits(), 1);
        assert_eq!(StreamMode::FftOnly.bits(), 4);
        assert_eq!(StreamMode::FftIq.bits(), 5);
        assert_eq!(StreamMode::from_bits(5), Some(StreamMode::FftIq));
        assert_eq!(StreamMode::from_bits(2), None);
        assert!(StreamMode::FftIq.includes_iq());
        assert!(!StreamMode::FftOnly.includes_iq());
        assert!(!StreamMode::IqOnly.includes_fft());
    }

    #[test]
    fn device_names() {
        assert_eq!(DeviceType::from_code(2).name(), "Airspy HF / HF+");
        assert_eq!(DeviceType::Invalid.name(), "Invalid Device");
        assert_eq!(DeviceType::from_code(42), DeviceType::Unknown(42));
    }

    // -- headers --

    #[test]
    fn message_header_layout_is_little_endian() {
        let mut raw = [0u8; MESSAGE_HEADER_SIZE];
        raw[0..4].copy_from_slice(&PROTOCOL_VERSION.packed().to_le_bytes());
        raw[4..8].copy_from_slice(&101u32.to_le_bytes());
        raw[8..12].copy_from_slice(&1u32.to_le_bytes());
        raw[12..16].copy_from_slice(&0x0102_0304u32.to_le_bytes());
        raw[16..20].copy_from_slice(&4096u32.to_le_bytes());

        let header = MessageHeader::parse(&raw);
        assert_eq!(header.protocol_version(), PROTOCOL_VERSION);
        assert_eq!(header.message_type, MessageType::Int16Iq);
        assert_eq!(header.stream_type, STREAM_TYPE_IQ);
        assert_eq!(header.sequence_number, 0x0102_0304);
        assert_eq!(header.body_size, 4096);
        assert_eq!(header.encode(), raw);
    }

    #[test]
    fn command_header_parse() {
        let mut buf = BytesMut::new();
        CommandHeader {
            command_type: CommandType::SetSetting,
            body_size: 8,
        }
        .put(&mut buf);
        assert_eq!(&buf[..], &[2, 0, 0, 0, 8, 0, 0, 0]);

        let header = CommandHeader::parse(&buf).unwrap();
        assert_eq!(header.command_type, CommandType::SetSetting);
        assert_eq!(header.body_size, 8);
    }

    #[test]
    fn command_header_rejects_short_or_unknown() {
        assert!(CommandHeader::parse(&[0u8; 7]).is_err());
        let err = CommandHeader::parse(&[9, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(err.to_string().contains("unknown command type 9"));
    }

    // -- device info --

    #[test]
    fn device_info_full_record() {
        let info = sample_device_info();
        let body = info.encode();
        assert_eq!(body.len(), DEVICE_INFO_SIZE);
        assert_eq!(DeviceInfo::parse(&body).unwrap(), info);
    }

    #[test]
    fn device_info_base_record_defaults_trailing_fields() {
        let body = sample_device_info().encode();
        let parsed = DeviceInfo::parse(&body[..DEVICE_INFO_MIN_SIZE]).unwrap();
        assert_eq!(parsed.device_type, DeviceType::AirspyOne);
        assert_eq!(parsed.decimation_stage_count, 8);
        assert_eq!(parsed.maximum_frequency, 1_800_000_000);
        assert_eq!(parsed.resolution, 0);
        assert_eq!(parsed.minimum_iq_decimation, 0);
        assert_eq!(parsed.forced_iq_format, 0);
    }

    #[test]
    fn device_info_partial_trailing_fields() {
        let body = sample_device_info().encode();
        let parsed = DeviceInfo::parse(&body[..DEVICE_INFO_MIN_SIZE + 6]).unwrap();
        assert_eq!(parsed.resolution, 12);
        assert_eq!(parsed.minimum_iq_decimation, 0);
    }

    #[test]
    fn device_info_too_short() {
        let err = DeviceInfo::parse(&[0u8; 35]).unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(err.to_string().contains("too short"));
    }

    // -- client sync --

    #[test]
    fn client_sync_parse() {
        let sync = ClientSync {
            can_control: true,
            gain: 10,
            device_center_frequency: 100_000_000,
            iq_center_frequency: 100_100_000,
            fft_center_frequency: 99_900_000,
            minimum_iq_center_frequency: 24_000_000,
            maximum_iq_center_frequency: 1_700_000_000,
            minimum_fft_center_frequency: 25_000_000,
            maximum_fft_center_frequency: 1_750_000_000,
        };
        let parsed = ClientSync::parse(&sync.encode()).unwrap();
        assert_eq!(parsed, sync);
    }

    #[test]
    fn client_sync_any_nonzero_grants_control() {
        let mut body = ClientSync::default().encode();
        body[0] = 7;
        assert!(ClientSync::parse(&body).unwrap().can_control);
    }

    #[test]
    fn client_sync_too_short() {
        assert!(ClientSync::parse(&[0u8; 20]).is_err());
    }

    #[test]
    fn tunable_range_follows_stream_mode() {
        let sync = ClientSync {
            minimum_iq_center_frequency: 1,
            maximum_iq_center_frequency: 2,
            minimum_fft_center_frequency: 3,
            maximum_fft_center_frequency: 4,
            ..ClientSync::default()
        };
        assert_eq!(sync.tunable_range(StreamMode::IqOnly), (1, 2));
        assert_eq!(sync.tunable_range(StreamMode::FftOnly), (3, 4));
        assert_eq!(sync.tunable_range(StreamMode::FftIq), (3, 4));
    }
}
