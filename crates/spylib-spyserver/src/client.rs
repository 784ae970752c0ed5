//! SpyServer TCP client.
//!
//! [`SpyServerClient`] owns one TCP session with a SpyServer. It sends the
//! hello command, runs a background read loop that frames and decodes the
//! server's byte stream, waits for the capability handshake (device info
//! followed by client sync), and then exposes streaming control and channel
//! tuning to the caller.
//!
//! The read loop is the only writer of framer, demultiplexer, and handshake
//! state. After each received chunk it publishes a [`SessionState`]
//! snapshot, applies client sync records to the channel parameters, and
//! hands decoded [`SpyEvent`]s to the registered callback. Commands are
//! written from the caller's task through a mutex-guarded write half.
//!
//! A transport error or protocol violation ends the read loop. It then
//! closes the socket, resets all session state, and emits
//! [`SpyEvent::Disconnected`] with the reason. There is no automatic
//! reconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use spylib_core::error::{Error, Result};
use spylib_core::events::{EventCallback, SpyEvent};

use crate::channel::ChannelParams;
use crate::codec::{self, Command, Setting};
use crate::demux::{ControlUpdate, Demultiplexer, HandshakeStatus};
use crate::framer::MessageFramer;
use crate::session::{ConnectionState, SessionState};
use crate::wire::{
    DEFAULT_MAX_BODY_SIZE, DeviceInfo, DeviceType, PROTOCOL_VERSION, SettingId, StreamFormat,
    StreamMode,
};

/// Default SpyServer TCP port.
pub const DEFAULT_PORT: u16 = 5555;

/// Default TCP connect timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait for device info and client sync (4 seconds).
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(4);

/// Default bound on a single command write (2 seconds).
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default read buffer size (64 KiB).
const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Read half of a connection, boxed so tests can substitute in-memory streams.
pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send + 'static>;

/// Write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send + 'static>;

/// Options for configuring a SpyServer client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Identification string sent in the hello command.
    pub software_id: String,
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Timeout for receiving device info and client sync after hello.
    pub handshake_timeout: Duration,
    /// Timeout for writing one command.
    pub write_timeout: Duration,
    /// Largest message body accepted from the server.
    pub max_body_size: u32,
    /// Size of the socket read buffer.
    pub read_buffer_size: usize,
    /// IQ sample format requested after the handshake.
    pub iq_format: StreamFormat,
    /// Streaming mode requested after the handshake.
    pub streaming_mode: StreamMode,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            software_id: format!("spylib {}", env!("CARGO_PKG_VERSION")),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            iq_format: StreamFormat::Int16,
            streaming_mode: StreamMode::IqOnly,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the caller-facing client and its read loop.
#[derive(Clone)]
struct Shared {
    writer: Arc<Mutex<Option<BoxedWriter>>>,
    session: Arc<Mutex<SessionState>>,
    channels: Arc<Mutex<ChannelParams>>,
    callback: Arc<std::sync::Mutex<Option<EventCallback>>>,
    connected: Arc<AtomicBool>,
}

impl Shared {
    /// Close the writer and clear everything tied to the connection.
    ///
    /// Safe to call more than once.
    async fn reset(&self) {
        self.connected.store(false, Ordering::SeqCst);
        {
            let mut writer = self.writer.lock().await;
            if let Some(mut w) = writer.take() {
                let _ = w.shutdown().await;
            }
        }
        self.session.lock().await.reset();
        self.channels.lock().await.reset();
    }

    /// Hand events to the consumer callback.
    ///
    /// The callback is taken out of its slot while it runs, so it may call
    /// [`SpyServerClient::set_event_callback`]. A replacement installed
    /// meanwhile is kept and receives the next batch.
    fn dispatch(&self, events: Vec<SpyEvent>) {
        if events.is_empty() {
            return;
        }
        let taken = match self.callback.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(mut cb) = taken else {
            return;
        };
        for event in events {
            cb(event);
        }

        let mut guard = match self.callback.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_none() {
            *guard = Some(cb);
        }
    }
}

/// Write one command, bounded by `timeout`.
async fn write_command(
    writer: &Mutex<Option<BoxedWriter>>,
    command: &Command,
    timeout: Duration,
) -> Result<()> {
    let bytes = command.encode();
    let mut guard = writer.lock().await;
    let w = guard.as_mut().ok_or(Error::NotConnected)?;
    tracing::trace!(
        command = ?command.command_type,
        body_len = command.body.len(),
        "Sending command"
    );

    let write = async {
        w.write_all(&bytes).await?;
        w.flush().await?;
        Ok::<(), std::io::Error>(())
    };
    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::Transport(format!("failed to send command: {}", e))),
        Err(_) => Err(Error::Timeout),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// SpyServer streaming client.
///
/// All methods take `&self`; the client can be shared across tasks in an
/// `Arc`. Connect, reconnect, and disconnect are serialized internally.
pub struct SpyServerClient {
    host: String,
    port: u16,
    options: ClientOptions,

    shared: Shared,

    /// Cancels the current read loop.
    cancel: Mutex<Option<CancellationToken>>,

    /// Background read task handle.
    read_handle: Mutex<Option<JoinHandle<()>>>,

    /// Serializes connect and disconnect.
    lifecycle: Mutex<()>,
}

impl SpyServerClient {
    /// Create an unconnected client for `host:port`.
    pub fn new(host: &str, port: u16, options: ClientOptions) -> Self {
        let channels = ChannelParams::new(options.streaming_mode);
        SpyServerClient {
            host: host.to_string(),
            port,
            options,
            shared: Shared {
                writer: Arc::new(Mutex::new(None)),
                session: Arc::new(Mutex::new(SessionState::default())),
                channels: Arc::new(Mutex::new(channels)),
                callback: Arc::new(std::sync::Mutex::new(None)),
                connected: Arc::new(AtomicBool::new(false)),
            },
            cancel: Mutex::new(None),
            read_handle: Mutex::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Register the consumer callback, replacing any previous one.
    ///
    /// The callback runs on the read loop task. It may itself call this
    /// method; the new callback takes effect from the next received chunk.
    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: FnMut(SpyEvent) + Send + 'static,
    {
        match self.shared.callback.lock() {
            Ok(mut guard) => *guard = Some(Box::new(callback)),
            Err(poisoned) => *poisoned.into_inner() = Some(Box::new(callback)),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Connect over TCP and complete the handshake.
    ///
    /// Returns once device info and client sync have been received and the
    /// initial settings have been sent. Does nothing if already connected.
    pub async fn connect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        self.teardown().await;

        let addr = format!("{}:{}", self.host, self.port);
        tracing::debug!(addr = %addr, "Connecting to SpyServer");
        self.shared.session.lock().await.state = ConnectionState::Connecting;

        let connect = TcpStream::connect(&addr);
        let stream = match tokio::time::timeout(self.options.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.shared.session.lock().await.reset();
                return Err(Error::Transport(format!(
                    "TCP connect to {} failed: {}",
                    addr, e
                )));
            }
            Err(_) => {
                self.shared.session.lock().await.reset();
                return Err(Error::Timeout);
            }
        };

        // Disable Nagle so small setting commands go out immediately.
        let _ = stream.set_nodelay(true);

        let (read_half, write_half) = tokio::io::split(stream);
        self.open(Box::new(read_half), Box::new(write_half)).await?;
        tracing::debug!(addr = %addr, "SpyServer client connected");
        Ok(())
    }

    /// Complete the handshake over pre-connected streams.
    ///
    /// Fails with [`Error::InvalidParameter`] if the client is already
    /// connected.
    pub async fn connect_with_transports(
        &self,
        reader: BoxedReader,
        writer: BoxedWriter,
    ) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_connected() {
            return Err(Error::InvalidParameter(
                "client is already connected".into(),
            ));
        }
        self.teardown().await;
        self.open(reader, writer).await
    }

    async fn open(&self, reader: BoxedReader, writer: BoxedWriter) -> Result<()> {
        {
            let mut session = self.shared.session.lock().await;
            session.reset();
            session.state = ConnectionState::AwaitingHandshake;
        }
        self.shared.channels.lock().await.reset();
        *self.shared.writer.lock().await = Some(writer);
        self.shared.connected.store(true, Ordering::SeqCst);

        let hello = codec::cmd_hello(PROTOCOL_VERSION, &self.options.software_id);
        if let Err(e) = self.send_command(&hello).await {
            self.teardown().await;
            return Err(e);
        }

        let (handshake_tx, handshake_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let read_loop = ReadLoop {
            reader,
            framer: MessageFramer::new(self.options.max_body_size),
            demux: Demultiplexer::new(),
            buffer_size: self.options.read_buffer_size.max(1),
            shared: self.shared.clone(),
            cancel: cancel.clone(),
            handshake: Some(handshake_tx),
        };
        *self.read_handle.lock().await = Some(tokio::spawn(read_loop.run()));
        *self.cancel.lock().await = Some(cancel);

        tracing::debug!("Hello sent, waiting for device info");
        let outcome = match tokio::time::timeout(self.options.handshake_timeout, handshake_rx).await
        {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionLost),
            Err(_) => Err(Error::HandshakeTimeout),
        };
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "SpyServer handshake failed");
            self.teardown().await;
            return Err(e);
        }

        if let Err(e) = self.on_handshake().await {
            self.teardown().await;
            return Err(e);
        }
        Ok(())
    }

    /// Build the rate table and push the initial settings.
    async fn on_handshake(&self) -> Result<()> {
        let snapshot = self.shared.session.lock().await.clone();
        let (Some(info), Some(sync)) = (snapshot.device_info, snapshot.sync) else {
            return Err(Error::ConnectionLost);
        };

        let pending = {
            let mut channels = self.shared.channels.lock().await;
            channels.initialize(&info, &sync);
            channels.queue_initial_settings(self.options.iq_format);
            channels.take_pending()
        };
        self.send_settings(&pending).await?;

        let mut session = self.shared.session.lock().await;
        if session.state != ConnectionState::AwaitingHandshake {
            return Err(Error::ConnectionLost);
        }
        session.state = ConnectionState::Ready;
        tracing::debug!(
            device = info.device_type.name(),
            serial = format_args!("{:08X}", info.device_serial),
            can_control = sync.can_control,
            "SpyServer handshake complete"
        );
        Ok(())
    }

    /// Stop the read loop and reset all connection state.
    async fn teardown(&self) {
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }
        let handle = self.read_handle.lock().await.take();
        if let Some(h) = handle {
            let _ = h.await;
        }
        self.shared.reset().await;
    }

    /// Close the connection. Does nothing if not connected.
    pub async fn disconnect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        tracing::debug!(host = %self.host, port = self.port, "Disconnecting SpyServer client");
        self.teardown().await;
        Ok(())
    }

    /// Whether a connection is open (the handshake may still be pending).
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Streaming
    // -----------------------------------------------------------------------

    /// Enable streaming. Does nothing if already streaming.
    pub async fn start(&self) -> Result<()> {
        self.set_streaming(true).await
    }

    /// Disable streaming. Does nothing if already stopped.
    pub async fn stop(&self) -> Result<()> {
        self.set_streaming(false).await
    }

    async fn set_streaming(&self, enable: bool) -> Result<()> {
        let state = self.shared.session.lock().await.state;
        if !state.is_ready() {
            return Err(Error::NotConnected);
        }
        if (state == ConnectionState::Streaming) == enable {
            return Ok(());
        }

        self.set_setting(SettingId::StreamingEnabled, &[enable as u32])
            .await?;

        let mut session = self.shared.session.lock().await;
        if session.state.is_ready() {
            session.state = if enable {
                ConnectionState::Streaming
            } else {
                ConnectionState::Ready
            };
            session.downstream_bytes = 0;
        }
        tracing::debug!(streaming = enable, "Streaming state changed");
        Ok(())
    }

    pub async fn is_streaming(&self) -> bool {
        self.shared.session.lock().await.is_streaming()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Write a raw command to the server.
    pub async fn send_command(&self, command: &Command) -> Result<()> {
        write_command(&self.shared.writer, command, self.options.write_timeout).await
    }

    /// Send a set-setting command with arbitrary parameters.
    pub async fn set_setting(&self, setting: SettingId, params: &[u32]) -> Result<()> {
        tracing::trace!(setting = ?setting, params = ?params, "Set setting");
        self.send_command(&codec::cmd_set_setting(setting, params))
            .await
    }

    /// Send a keep-alive ping. The server answers with a pong.
    pub async fn ping(&self) -> Result<()> {
        self.send_command(&codec::cmd_ping()).await
    }

    async fn send_settings(&self, settings: &[Setting]) -> Result<()> {
        for s in settings {
            self.set_setting(s.id, &[s.value]).await?;
        }
        Ok(())
    }

    /// Run a channel update after the handshake and send what it queued.
    async fn update_channels<T>(&self, f: impl FnOnce(&mut ChannelParams) -> T) -> Result<T> {
        if !self.shared.session.lock().await.state.is_ready() {
            return Err(Error::NotConnected);
        }
        let (value, pending) = {
            let mut channels = self.shared.channels.lock().await;
            let value = f(&mut *channels);
            (value, channels.take_pending())
        };
        self.send_settings(&pending).await?;
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // IQ channel
    // -----------------------------------------------------------------------

    /// Select one of [`available_sample_rates`](Self::available_sample_rates).
    pub async fn set_sample_rate(&self, rate: u32) -> Result<u32> {
        self.update_channels(|ch| ch.set_sample_rate(rate))
            .await?
            .ok_or_else(|| {
                Error::InvalidParameter(format!("sample rate {} Hz is not available", rate))
            })
    }

    /// Select the IQ sample rate by number of decimation-by-two stages.
    pub async fn set_decimation_stage(&self, stage: u32) -> Result<u32> {
        self.update_channels(|ch| ch.set_decimation_stage(stage))
            .await?
            .ok_or_else(|| {
                Error::InvalidParameter(format!("decimation stage {} is out of range", stage))
            })
    }

    pub async fn set_center_frequency(&self, hz: u32) -> Result<u32> {
        self.update_channels(|ch| ch.set_center_frequency(hz))
            .await
    }

    pub async fn set_gain(&self, stage: u32) -> Result<u32> {
        self.update_channels(|ch| ch.set_gain(stage))
            .await?
            .ok_or_else(|| Error::InvalidParameter(format!("gain stage {} is out of range", stage)))
    }

    /// Change which channels the server streams.
    ///
    /// The published tunable range follows the new mode.
    pub async fn set_streaming_mode(&self, mode: StreamMode) -> Result<StreamMode> {
        let mode = self
            .update_channels(|ch| ch.set_streaming_mode(mode))
            .await?;
        let mut session = self.shared.session.lock().await;
        if let Some(sync) = session.sync {
            let (min, max) = sync.tunable_range(mode);
            session.minimum_tunable_frequency = min;
            session.maximum_tunable_frequency = max;
        }
        Ok(mode)
    }

    pub async fn sample_rate(&self) -> u32 {
        self.shared.channels.lock().await.sample_rate()
    }

    pub async fn decimation_stage(&self) -> u32 {
        self.shared.channels.lock().await.decimation_stage()
    }

    pub async fn center_frequency(&self) -> u32 {
        self.shared.channels.lock().await.center_frequency()
    }

    pub async fn gain(&self) -> u32 {
        self.shared.channels.lock().await.gain()
    }

    pub async fn streaming_mode(&self) -> StreamMode {
        self.shared.channels.lock().await.streaming_mode()
    }

    /// IQ sample rates selectable on this device, indexed by decimation stage.
    pub async fn available_sample_rates(&self) -> Vec<u32> {
        self.shared
            .channels
            .lock()
            .await
            .available_sample_rates()
            .to_vec()
    }

    // -----------------------------------------------------------------------
    // FFT channel
    // -----------------------------------------------------------------------

    pub async fn set_display_center_frequency(&self, hz: u32) -> Result<u32> {
        self.update_channels(|ch| ch.set_display_center_frequency(hz))
            .await
    }

    pub async fn set_display_sample_rate(&self, rate: u32) -> Result<u32> {
        self.update_channels(|ch| ch.set_display_sample_rate(rate))
            .await?
            .ok_or_else(|| {
                Error::InvalidParameter(format!("sample rate {} Hz is not available", rate))
            })
    }

    pub async fn set_display_decimation_stage(&self, stage: u32) -> Result<u32> {
        self.update_channels(|ch| ch.set_display_decimation_stage(stage))
            .await?
            .ok_or_else(|| {
                Error::InvalidParameter(format!("decimation stage {} is out of range", stage))
            })
    }

    pub async fn set_display_offset(&self, db: i32) -> Result<i32> {
        self.update_channels(|ch| ch.set_display_offset(db))
            .await?
            .ok_or_else(|| {
                Error::InvalidParameter(format!("display offset {} dB is out of range", db))
            })
    }

    pub async fn set_display_range(&self, db: i32) -> Result<i32> {
        self.update_channels(|ch| ch.set_display_range(db))
            .await?
            .ok_or_else(|| {
                Error::InvalidParameter(format!("display range {} dB is out of range", db))
            })
    }

    pub async fn set_display_pixels(&self, pixels: u32) -> Result<u32> {
        self.update_channels(|ch| ch.set_display_pixels(pixels))
            .await?
            .ok_or_else(|| {
                Error::InvalidParameter(format!("{} display pixels is out of range", pixels))
            })
    }

    pub async fn display_center_frequency(&self) -> u32 {
        self.shared.channels.lock().await.display_center_frequency()
    }

    pub async fn display_sample_rate(&self) -> u32 {
        self.shared.channels.lock().await.display_sample_rate()
    }

    pub async fn display_decimation_stage(&self) -> u32 {
        self.shared.channels.lock().await.display_decimation_stage()
    }

    /// Usable FFT bandwidth in Hz.
    pub async fn display_bandwidth(&self) -> u32 {
        self.shared.channels.lock().await.display_bandwidth()
    }

    pub async fn display_offset(&self) -> i32 {
        self.shared.channels.lock().await.display_offset()
    }

    pub async fn display_range(&self) -> i32 {
        self.shared.channels.lock().await.display_range()
    }

    pub async fn display_pixels(&self) -> u32 {
        self.shared.channels.lock().await.display_pixels()
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Snapshot of the connection state and counters.
    pub async fn session(&self) -> SessionState {
        self.shared.session.lock().await.clone()
    }

    pub async fn device_info(&self) -> Option<DeviceInfo> {
        self.shared.session.lock().await.device_info
    }

    /// Name of the attached device family.
    pub async fn device_name(&self) -> &'static str {
        self.device_info()
            .await
            .map_or(DeviceType::Invalid, |info| info.device_type)
            .name()
    }

    /// Whether this client may change device-wide settings.
    pub async fn can_control(&self) -> bool {
        self.shared.session.lock().await.can_control
    }

    /// Tunable `(min, max)` center frequency for the current mode.
    pub async fn tunable_range(&self) -> (u32, u32) {
        let s = self.shared.session.lock().await;
        (s.minimum_tunable_frequency, s.maximum_tunable_frequency)
    }

    pub async fn dropped_buffers(&self) -> u64 {
        self.shared.session.lock().await.dropped_buffers
    }
}

// ---------------------------------------------------------------------------
// Read loop
// ---------------------------------------------------------------------------

struct ReadLoop {
    reader: BoxedReader,
    framer: MessageFramer,
    demux: Demultiplexer,
    buffer_size: usize,
    shared: Shared,
    cancel: CancellationToken,
    handshake: Option<oneshot::Sender<Result<()>>>,
}

impl ReadLoop {
    async fn run(mut self) {
        let mut buf = vec![0u8; self.buffer_size];

        let reason = loop {
            let read = tokio::select! {
                _ = self.cancel.cancelled() => break None,
                r = self.reader.read(&mut buf) => r,
            };
            match read {
                Ok(0) => {
                    tracing::debug!("SpyServer closed the connection");
                    break Some(Error::ConnectionLost);
                }
                Ok(n) => {
                    if let Err(e) = self.handle_chunk(&buf[..n]).await {
                        if e.is_protocol_violation() {
                            tracing::warn!(error = %e, "Protocol violation, closing connection");
                        } else {
                            tracing::debug!(error = %e, "Closing connection");
                        }
                        break Some(e);
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "TCP read error");
                    break Some(Error::Transport(format!("read failed: {}", e)));
                }
            }
        };

        self.shutdown(reason).await;
    }

    async fn handle_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let mut events = Vec::new();
        let mut updates = Vec::new();

        let demux = &mut self.demux;
        let framed = self.framer.feed(chunk, |msg| {
            if let Some(update) = demux.process(msg, &mut |ev| events.push(ev))? {
                updates.push(update);
            }
            Ok(())
        });

        let mode = {
            let mut channels = self.shared.channels.lock().await;
            for update in &updates {
                if let ControlUpdate::ClientSync(sync) = update {
                    channels.apply_sync(sync);
                }
            }
            channels.streaming_mode()
        };

        let status = {
            let mut session = self.shared.session.lock().await;
            session.downstream_bytes += chunk.len() as u64;
            session.dropped_buffers = self.demux.dropped_buffers();
            session.message_count = self.demux.message_count();
            session.device_info = self.demux.device_info().copied();
            if let Some(sync) = self.demux.sync() {
                let (min, max) = sync.tunable_range(mode);
                session.sync = Some(*sync);
                session.can_control = sync.can_control;
                session.device_center_frequency = sync.device_center_frequency;
                session.minimum_tunable_frequency = min;
                session.maximum_tunable_frequency = max;
            }
            self.demux.handshake_status()
        };

        if self.handshake.is_some() {
            let outcome = match status {
                HandshakeStatus::Pending => None,
                HandshakeStatus::Complete => Some(Ok(())),
                HandshakeStatus::NoDevice => Some(Err(Error::NoDevice)),
            };
            if let (Some(outcome), Some(tx)) = (outcome, self.handshake.take()) {
                let _ = tx.send(outcome);
            }
        }

        self.shared.dispatch(events);
        framed
    }

    async fn shutdown(mut self, reason: Option<Error>) {
        self.shared.reset().await;
        self.framer.reset();
        self.demux.reset();

        let text = reason.as_ref().map(|e| e.to_string());
        if let Some(tx) = self.handshake.take() {
            let _ = tx.send(Err(reason.unwrap_or(Error::ConnectionLost)));
        }

        self.shared
            .dispatch(vec![SpyEvent::Disconnected { reason: text }]);
        tracing::debug!("SpyServer read loop stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
