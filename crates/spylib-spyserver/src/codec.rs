//! SpyServer command encoding.
//!
//! Commands flow from client to server as an 8-byte [`CommandHeader`]
//! followed by a body. Three command kinds are used by this client:
//!
//! ```text
//! Hello:       header | protocol_version u32 | software_id bytes (no terminator)
//! SetSetting:  header | setting_id u32 | param u32 ...
//! Ping:        header (empty body)
//! ```
//!
//! All encoding in this module is pure -- no I/O is performed.

use bytes::{BufMut, BytesMut};
use spylib_core::{Error, Result};

use crate::wire::{COMMAND_HEADER_SIZE, CommandHeader, CommandType, ProtocolVersion, SettingId};

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A command ready to be written to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub command_type: CommandType,
    pub body: Vec<u8>,
}

impl Command {
    pub fn new(command_type: CommandType, body: Vec<u8>) -> Self {
        Self { command_type, body }
    }

    /// Encode the header and body into a single buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(COMMAND_HEADER_SIZE + self.body.len());
        CommandHeader {
            command_type: self.command_type,
            body_size: self.body.len() as u32,
        }
        .put(&mut buf);
        buf.put_slice(&self.body);
        buf.to_vec()
    }

    /// Decode one command from the front of `data`.
    ///
    /// Returns the command and the number of bytes consumed, or `None` if
    /// `data` does not yet hold a complete command.
    pub fn decode(data: &[u8]) -> Result<Option<(Command, usize)>> {
        if data.len() < COMMAND_HEADER_SIZE {
            return Ok(None);
        }
        let header = CommandHeader::parse(data)?;
        let total = COMMAND_HEADER_SIZE + header.body_size as usize;
        if data.len() < total {
            return Ok(None);
        }
        let body = data[COMMAND_HEADER_SIZE..total].to_vec();
        Ok(Some((Command::new(header.command_type, body), total)))
    }

    /// Interpret a set-setting body as `(setting, params)`.
    pub fn as_set_setting(&self) -> Result<(SettingId, Vec<u32>)> {
        if self.command_type != CommandType::SetSetting {
            return Err(Error::Protocol(format!(
                "expected a set-setting command, got {:?}",
                self.command_type
            )));
        }
        if self.body.len() < 4 || self.body.len() % 4 != 0 {
            return Err(Error::Protocol(format!(
                "malformed set-setting body of {} bytes",
                self.body.len()
            )));
        }
        let mut words = self
            .body
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]));
        let code = words.next().unwrap_or_default();
        let id = SettingId::from_code(code)
            .ok_or_else(|| Error::Protocol(format!("unknown setting {}", code)))?;
        Ok((id, words.collect()))
    }
}

// ---------------------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------------------

/// Build the hello command that opens every session.
///
/// The software identifier is sent as raw bytes with no terminator.
pub fn cmd_hello(version: ProtocolVersion, software_id: &str) -> Command {
    let mut body = BytesMut::with_capacity(4 + software_id.len());
    body.put_u32_le(version.packed());
    body.put_slice(software_id.as_bytes());
    Command::new(CommandType::Hello, body.to_vec())
}

/// Build a set-setting command.
///
/// An empty parameter list produces an empty body: the setting id itself
/// is omitted and the server ignores the command.
pub fn cmd_set_setting(setting: SettingId, params: &[u32]) -> Command {
    if params.is_empty() {
        return Command::new(CommandType::SetSetting, Vec::new());
    }
    let mut body = BytesMut::with_capacity(4 * (params.len() + 1));
    body.put_u32_le(setting.code());
    for p in params {
        body.put_u32_le(*p);
    }
    Command::new(CommandType::SetSetting, body.to_vec())
}

/// Build a ping command.
pub fn cmd_ping() -> Command {
    Command::new(CommandType::Ping, Vec::new())
}

// ---------------------------------------------------------------------------
// Setting
// ---------------------------------------------------------------------------

/// A single-valued setting change queued for the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: SettingId,
    pub value: u32,
}

impl Setting {
    pub fn new(id: SettingId, value: u32) -> Self {
        Self { id, value }
    }

    pub fn to_command(self) -> Command {
        cmd_set_setting(self.id, &[self.value])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
