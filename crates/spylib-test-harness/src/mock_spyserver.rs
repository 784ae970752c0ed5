//! Scripted SpyServer stub for protocol-level testing.
//!
//! [`MockSpyServer`] listens on a random localhost port and accepts a
//! single client. It decodes every command the client sends and records it
//! on a channel, answers the hello command with a pre-loaded greeting
//! (normally device info followed by client sync), and pushes further
//! frames on demand. The greeting can be sent in small fragments to
//! exercise the client's framer over a real socket.
//!
//! The stub works on raw bytes only and knows nothing about the client
//! crate, so it can be used from that crate's tests without a cycle.
//!
//! # Example
//!
//! ```
//! use spylib_test_harness::mock_spyserver::{MockSpyServer, encode_message, MSG_CLIENT_SYNC};
//!
//! # async fn example() -> spylib_core::Result<()> {
//! let mut server = MockSpyServer::new().await?;
//! server.greet_with(&encode_message(MSG_CLIENT_SYNC, 0, 0, &[0u8; 36]));
//! server.start();
//! // ... connect a client to server.host():server.port() ...
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use spylib_core::error::{Error, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Protocol id the stub stamps on every frame (2.0.1558).
pub const MOCK_PROTOCOL_ID: u32 = (2 << 24) | 1558;

pub const CMD_HELLO: u32 = 0;
pub const CMD_SET_SETTING: u32 = 2;
pub const CMD_PING: u32 = 3;

pub const MSG_DEVICE_INFO: u32 = 0;
pub const MSG_CLIENT_SYNC: u32 = 1;
pub const MSG_PONG: u32 = 2;
pub const MSG_UINT8_IQ: u32 = 100;
pub const MSG_INT16_IQ: u32 = 101;
pub const MSG_UINT8_FFT: u32 = 301;

const COMMAND_HEADER_SIZE: usize = 8;

/// Encode a server message with the stub's protocol id.
pub fn encode_message(message_type: u32, stream_type: u32, sequence: u32, body: &[u8]) -> Vec<u8> {
    encode_message_with_protocol(MOCK_PROTOCOL_ID, message_type, stream_type, sequence, body)
}

/// Encode a server message with an explicit protocol id.
pub fn encode_message_with_protocol(
    protocol_id: u32,
    message_type: u32,
    stream_type: u32,
    sequence: u32,
    body: &[u8],
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(20 + body.len());
    buf.put_u32_le(protocol_id);
    buf.put_u32_le(message_type);
    buf.put_u32_le(stream_type);
    buf.put_u32_le(sequence);
    buf.put_u32_le(body.len() as u32);
    buf.put_slice(body);
    buf.to_vec()
}

/// A command received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedCommand {
    pub command_type: u32,
    pub body: Vec<u8>,
}

impl ReceivedCommand {
    /// Decode a set-setting body as `(setting_id, params)`.
    pub fn setting(&self) -> Option<(u32, Vec<u32>)> {
        if self.command_type != CMD_SET_SETTING || self.body.len() < 4 {
            return None;
        }
        let mut words = self
            .body
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]));
        let id = words.next()?;
        Some((id, words.collect()))
    }
}

/// Pop one complete command off the front of `buf`.
fn take_command(buf: &mut BytesMut) -> Option<ReceivedCommand> {
    if buf.len() < COMMAND_HEADER_SIZE {
        return None;
    }
    let mut header = &buf[..COMMAND_HEADER_SIZE];
    let command_type = header.get_u32_le();
    let body_size = header.get_u32_le() as usize;
    if buf.len() < COMMAND_HEADER_SIZE + body_size {
        return None;
    }
    buf.advance(COMMAND_HEADER_SIZE);
    let body = buf.split_to(body_size).to_vec();
    Some(ReceivedCommand { command_type, body })
}

/// A stub SpyServer for one client connection.
pub struct MockSpyServer {
    addr: String,
    listener: Option<TcpListener>,
    greeting: Vec<u8>,
    fragment_size: Option<usize>,
    commands_rx: mpsc::UnboundedReceiver<ReceivedCommand>,
    commands_tx: Option<mpsc::UnboundedSender<ReceivedCommand>>,
    outbound_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockSpyServer {
    /// Bind a stub server on a random localhost port.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock SpyServer: {}", e)))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Ok(Self {
            addr,
            listener: Some(listener),
            greeting: Vec::new(),
            fragment_size: None,
            commands_rx,
            commands_tx: Some(commands_tx),
            outbound_tx: None,
            server_handle: None,
        })
    }

    /// The `host:port` the stub is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn host(&self) -> &str {
        self.addr.rsplit_once(':').map_or("127.0.0.1", |(h, _)| h)
    }

    pub fn port(&self) -> u16 {
        self.addr
            .rsplit_once(':')
            .and_then(|(_, p)| p.parse().ok())
            .unwrap_or(0)
    }

    /// Append bytes to send once the client's hello arrives.
    pub fn greet_with(&mut self, bytes: &[u8]) {
        self.greeting.extend_from_slice(bytes);
    }

    /// Send the greeting in writes of at most `size` bytes.
    pub fn fragment_greeting(&mut self, size: usize) {
        self.fragment_size = Some(size.max(1));
    }

    /// Accept one client in a background task.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let Some(commands_tx) = self.commands_tx.take() else {
            return;
        };
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound_tx = Some(outbound_tx);

        let greeting = std::mem::take(&mut self.greeting);
        let fragment_size = self.fragment_size;

        self.server_handle = Some(tokio::spawn(async move {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {}", e))?;
            tracing::debug!(peer = %peer, "Mock SpyServer accepted client");
            serve(stream, greeting, fragment_size, commands_tx, outbound_rx).await
        }));
    }

    /// Queue a frame to send to the connected client.
    pub fn send(&self, frame: Vec<u8>) -> Result<()> {
        let tx = self.outbound_tx.as_ref().ok_or(Error::NotConnected)?;
        tx.send(frame).map_err(|_| Error::ConnectionLost)
    }

    /// Wait up to `timeout` for the next command from the client.
    pub async fn next_command(&mut self, timeout: Duration) -> Option<ReceivedCommand> {
        tokio::time::timeout(timeout, self.commands_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Close the client connection.
    pub fn close(&mut self) {
        self.outbound_tx = None;
    }

    /// Close the connection and wait for the server task to finish.
    pub async fn wait(mut self) -> std::result::Result<(), String> {
        self.close();
        match self.server_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?,
            None => Ok(()),
        }
    }
}

async fn serve(
    mut stream: TcpStream,
    greeting: Vec<u8>,
    fragment_size: Option<usize>,
    commands_tx: mpsc::UnboundedSender<ReceivedCommand>,
    mut outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) -> std::result::Result<(), String> {
    let mut inbound = BytesMut::with_capacity(1024);
    let mut read_buf = [0u8; 1024];
    let mut greeted = false;

    loop {
        tokio::select! {
            read = stream.read(&mut read_buf) => {
                let n = read.map_err(|e| format!("read error: {}", e))?;
                if n == 0 {
                    tracing::debug!("Mock SpyServer client disconnected");
                    return Ok(());
                }
                inbound.extend_from_slice(&read_buf[..n]);

                while let Some(command) = take_command(&mut inbound) {
                    tracing::trace!(
                        command_type = command.command_type,
                        body_len = command.body.len(),
                        "Mock SpyServer received command"
                    );
                    let is_hello = command.command_type == CMD_HELLO;
                    let _ = commands_tx.send(command);

                    if is_hello && !greeted {
                        greeted = true;
                        write_fragmented(&mut stream, &greeting, fragment_size).await?;
                    }
                }
            }
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => write_fragmented(&mut stream, &frame, None).await?,
                    None => {
                        let _ = stream.shutdown().await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn write_fragmented(
    stream: &mut TcpStream,
    bytes: &[u8],
    fragment_size: Option<usize>,
) -> std::result::Result<(), String> {
    let size = fragment_size.unwrap_or(bytes.len()).max(1);
    for piece in bytes.chunks(size) {
        stream
            .write_all(piece)
            .await
            .map_err(|e| format!("write error: {}", e))?;
        stream
            .flush()
            .await
            .map_err(|e| format!("flush error: {}", e))?;
        if fragment_size.is_some() {
            tokio::task::yield_now().await;
        }
    }
    Ok(())
}
