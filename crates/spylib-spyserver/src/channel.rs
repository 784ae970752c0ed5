//! IQ and FFT channel parameters.
//!
//! [`ChannelParams`] holds the tuning, decimation, gain, and FFT display
//! state of one session and decides which settings must be sent when a
//! value changes. It performs no I/O: accepted changes are queued as
//! [`Setting`]s and drained by the client with
//! [`take_pending`](ChannelParams::take_pending).
//!
//! Setters return the accepted value, or `None` when the input is out of
//! range. A rejected call leaves all state and the outbox untouched.
//! [`reset`](ChannelParams::reset) returns everything to the defaults
//! used for a new connection, so a reconnect starts from a clean slate.

use crate::codec::Setting;
use crate::wire::{
    ClientSync, DeviceInfo, MAX_DISPLAY_PIXELS, MAX_FFT_DB_OFFSET, MAX_FFT_DB_RANGE,
    MIN_DISPLAY_PIXELS, MIN_FFT_DB_RANGE, SettingId, StreamFormat, StreamMode,
};

/// Default FFT display width in pixels.
pub const DEFAULT_DISPLAY_PIXELS: u32 = 2000;

/// Default FFT display range in dB.
pub const DEFAULT_DISPLAY_RANGE: i32 = 127;

/// Bias applied to the display offset in the post-handshake push.
const INITIAL_OFFSET_BIAS: i32 = 50;

/// Fraction of the FFT sample rate shown as usable display bandwidth.
const DISPLAY_BANDWIDTH_RATIO: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct ChannelParams {
    iq_center_frequency: u32,
    iq_decimation_stage: u32,
    iq_sample_rate: u32,

    fft_center_frequency: u32,
    fft_decimation_stage: u32,
    fft_sample_rate: u32,
    display_offset: i32,
    display_range: i32,
    display_pixels: u32,

    streaming_mode: StreamMode,
    /// Mode restored by [`reset`](Self::reset).
    initial_mode: StreamMode,
    gain: u32,

    available_sample_rates: Vec<u32>,
    decimation_stage_count: u32,
    gain_stage_count: u32,

    pending: Vec<Setting>,
}

impl ChannelParams {
    pub fn new(streaming_mode: StreamMode) -> Self {
        Self {
            iq_center_frequency: 0,
            iq_decimation_stage: 0,
            iq_sample_rate: 0,
            fft_center_frequency: 0,
            fft_decimation_stage: 0,
            fft_sample_rate: 0,
            display_offset: 0,
            display_range: DEFAULT_DISPLAY_RANGE,
            display_pixels: DEFAULT_DISPLAY_PIXELS,
            streaming_mode,
            initial_mode: streaming_mode,
            gain: 0,
            available_sample_rates: Vec::new(),
            decimation_stage_count: 0,
            gain_stage_count: 0,
            pending: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Device lifecycle
    // -----------------------------------------------------------------------

    /// Load device capabilities after a completed handshake and build the
    /// sample-rate table `max_rate / 2^stage`.
    pub fn initialize(&mut self, info: &DeviceInfo, sync: &ClientSync) {
        self.decimation_stage_count = info.decimation_stage_count;
        self.gain_stage_count = info.gain_stage_count;
        self.available_sample_rates = (0..info.decimation_stage_count)
            .map(|stage| {
                info.maximum_sample_rate
                    .checked_shr(stage)
                    .unwrap_or(0)
            })
            .collect();
        self.apply_sync(sync);
    }

    /// Adopt server-side state from a client sync record.
    pub fn apply_sync(&mut self, sync: &ClientSync) {
        self.gain = sync.gain;
        self.fft_center_frequency = sync.fft_center_frequency;
    }

    /// Return to the state of a freshly created manager.
    ///
    /// Tuning, decimation, display settings, and everything learned from
    /// the device are cleared, and the streaming mode reverts to the one
    /// given to [`new`](Self::new).
    pub fn reset(&mut self) {
        *self = ChannelParams::new(self.initial_mode);
    }

    /// Queue the settings pushed once after every handshake.
    pub fn queue_initial_settings(&mut self, iq_format: StreamFormat) {
        self.fft_decimation_stage = 1;
        let initial = [
            Setting::new(SettingId::StreamingMode, self.streaming_mode.bits()),
            Setting::new(SettingId::IqFormat, iq_format.code()),
            Setting::new(SettingId::FftFormat, StreamFormat::Uint8.code()),
            Setting::new(SettingId::FftDisplayPixels, self.display_pixels),
            Setting::new(
                SettingId::FftDbOffset,
                (self.display_offset - INITIAL_OFFSET_BIAS) as u32,
            ),
            Setting::new(SettingId::FftDbRange, self.display_range as u32),
            Setting::new(SettingId::FftDecimation, self.fft_decimation_stage),
        ];
        self.pending.extend(initial);
    }

    /// Drain settings queued since the last call.
    pub fn take_pending(&mut self) -> Vec<Setting> {
        std::mem::take(&mut self.pending)
    }

    fn push(&mut self, id: SettingId, value: u32) {
        self.pending.push(Setting::new(id, value));
    }

    // -----------------------------------------------------------------------
    // IQ channel
    // -----------------------------------------------------------------------

    /// Select the IQ sample rate by exact match against the rate table.
    pub fn set_sample_rate(&mut self, rate: u32) -> Option<u32> {
        let stage = self.available_sample_rates.iter().position(|&r| r == rate)? as u32;
        self.iq_decimation_stage = stage;
        self.iq_sample_rate = rate;
        self.push(SettingId::IqDecimation, stage);

        if self.streaming_mode.includes_fft() && self.fft_sample_rate == 0 {
            self.set_display_sample_rate(rate);
        }
        Some(rate)
    }

    /// Select the IQ sample rate by decimation stage.
    pub fn set_decimation_stage(&mut self, stage: u32) -> Option<u32> {
        let rate = *self.available_sample_rates.get(stage as usize)?;
        self.iq_decimation_stage = stage;
        self.iq_sample_rate = rate;
        self.push(SettingId::IqDecimation, stage);
        Some(stage)
    }

    pub fn set_center_frequency(&mut self, hz: u32) -> u32 {
        if self.iq_center_frequency != hz {
            self.iq_center_frequency = hz;
            self.push(SettingId::IqFrequency, hz);
            if self.streaming_mode.includes_fft() && self.fft_center_frequency == 0 {
                self.set_display_center_frequency(hz);
            }
        }
        self.iq_center_frequency
    }

    pub fn set_gain(&mut self, stage: u32) -> Option<u32> {
        if stage > self.gain_stage_count {
            return None;
        }
        self.gain = stage;
        self.push(SettingId::Gain, stage);
        Some(stage)
    }

    /// Change which channels the server streams.
    pub fn set_streaming_mode(&mut self, mode: StreamMode) -> StreamMode {
        if self.streaming_mode != mode {
            self.streaming_mode = mode;
            self.push(SettingId::StreamingMode, mode.bits());

            if mode.includes_fft() {
                if self.fft_center_frequency == 0 {
                    self.set_display_center_frequency(self.iq_center_frequency);
                }
                self.push(SettingId::FftDecimation, self.fft_decimation_stage);
            }
        }
        self.streaming_mode
    }

    // -----------------------------------------------------------------------
    // FFT channel
    // -----------------------------------------------------------------------

    pub fn set_display_center_frequency(&mut self, hz: u32) -> u32 {
        if self.fft_center_frequency != hz {
            self.fft_center_frequency = hz;
            self.push(SettingId::FftFrequency, hz);
        }
        self.fft_center_frequency
    }

    pub fn set_display_sample_rate(&mut self, rate: u32) -> Option<u32> {
        let stage = self.available_sample_rates.iter().position(|&r| r == rate)? as u32;
        self.fft_decimation_stage = stage;
        self.fft_sample_rate = rate;
        self.push(SettingId::FftDecimation, stage);
        Some(rate)
    }

    pub fn set_display_decimation_stage(&mut self, stage: u32) -> Option<u32> {
        let rate = *self.available_sample_rates.get(stage as usize)?;
        self.fft_decimation_stage = stage;
        self.fft_sample_rate = rate;
        self.push(SettingId::FftDecimation, stage);
        Some(stage)
    }

    /// Display offset in dB, within `±100`.
    pub fn set_display_offset(&mut self, db: i32) -> Option<i32> {
        if db.abs() > MAX_FFT_DB_OFFSET {
            return None;
        }
        if self.display_offset != db {
            self.display_offset = db;
            self.push(SettingId::FftDbOffset, db as u32);
        }
        Some(db)
    }

    /// Display range in dB, within `10..=150`.
    pub fn set_display_range(&mut self, db: i32) -> Option<i32> {
        if !(MIN_FFT_DB_RANGE..=MAX_FFT_DB_RANGE).contains(&db) {
            return None;
        }
        if self.display_range != db {
            self.display_range = db;
            self.push(SettingId::FftDbRange, db as u32);
        }
        Some(db)
    }

    pub fn set_display_pixels(&mut self, pixels: u32) -> Option<u32> {
        if !(MIN_DISPLAY_PIXELS..=MAX_DISPLAY_PIXELS).contains(&pixels) {
            return None;
        }
        if self.display_pixels != pixels {
            self.display_pixels = pixels;
            self.push(SettingId::FftDisplayPixels, pixels);
        }
        Some(pixels)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn center_frequency(&self) -> u32 {
        self.iq_center_frequency
    }

    pub fn sample_rate(&self) -> u32 {
        self.iq_sample_rate
    }

    pub fn decimation_stage(&self) -> u32 {
        self.iq_decimation_stage
    }

    pub fn display_center_frequency(&self) -> u32 {
        self.fft_center_frequency
    }

    pub fn display_sample_rate(&self) -> u32 {
        self.fft_sample_rate
    }

    pub fn display_decimation_stage(&self) -> u32 {
        self.fft_decimation_stage
    }

    /// Usable FFT bandwidth in Hz: 80% of the FFT sample rate.
    pub fn display_bandwidth(&self) -> u32 {
        (self.fft_sample_rate as f64 * DISPLAY_BANDWIDTH_RATIO) as u32
    }

    pub fn display_offset(&self) -> i32 {
        self.display_offset
    }

    pub fn display_range(&self) -> i32 {
        self.display_range
    }

    pub fn display_pixels(&self) -> u32 {
        self.display_pixels
    }

    pub fn streaming_mode(&self) -> StreamMode {
        self.streaming_mode
    }

    pub fn gain(&self) -> u32 {
        self.gain
    }

    pub fn gain_stage_count(&self) -> u32 {
        self.gain_stage_count
    }

    pub fn available_sample_rates(&self) -> &[u32] {
        &self.available_sample_rates
    }
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self::new(StreamMode::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::DeviceType;

    fn device(stages: u32, max_rate: u32) -> DeviceInfo {
        DeviceInfo {
            device_type: DeviceType::AirspyOne,
            maximum_sample_rate: max_rate,
            decimation_stage_count: stages,
            gain_stage_count: 16,
            ..DeviceInfo::default()
        }
    }

    fn ready(mode: StreamMode) -> ChannelParams {
        let mut ch = ChannelParams::new(mode);
        ch.initialize(&device(4, 20_000_000), &ClientSync::default());
        ch
    }

    #[test]
    fn rate_table_halves_per_stage() {
        let ch = ready(StreamMode::IqOnly);
        assert_eq!(
            ch.available_sample_rates(),
            &[20_000_000, 10_000_000, 5_000_000, 2_500_000]
        );
    }

    #[test]
    fn set_sample_rate_hit() {
        let mut ch = ready(StreamMode::IqOnly);
        assert_eq!(ch.set_sample_rate(5_000_000), Some(5_000_000));
        assert_eq!(ch.decimation_stage(), 2);
        assert_eq!(ch.sample_rate(), 5_000_000);
        assert_eq!(
            ch.take_pending(),
            vec![Setting::new(SettingId::IqDecimation, 2)]
        );
    }

    #[test]
    fn set_sample_rate_miss_changes_nothing() {
        let mut ch = ready(StreamMode::IqOnly);
        assert_eq!(ch.set_sample_rate(3_000_000), None);
        assert_eq!(ch.sample_rate(), 0);
        assert!(ch.take_pending().is_empty());
    }

    #[test]
    fn sample_rate_is_mirrored_to_fft_once() {
        let mut ch = ready(StreamMode::FftIq);
        ch.set_sample_rate(10_000_000);
        assert_eq!(ch.display_sample_rate(), 10_000_000);
        assert_eq!(
            ch.take_pending(),
            vec![
                Setting::new(SettingId::IqDecimation, 1),
                Setting::new(SettingId::FftDecimation, 1),
            ]
        );

        ch.set_sample_rate(5_000_000);
        assert_eq!(ch.display_sample_rate(), 10_000_000);
        assert_eq!(ch.take_pending().len(), 1);
    }

    #[test]
    fn decimation_stage_bounds() {
        let mut ch = ready(StreamMode::IqOnly);
        assert_eq!(ch.set_decimation_stage(3), Some(3));
        assert_eq!(ch.sample_rate(), 2_500_000);
        assert_eq!(ch.set_decimation_stage(4), None);
        assert_eq!(ch.sample_rate(), 2_500_000);
        assert_eq!(ch.take_pending().len(), 1);
    }

    #[test]
    fn center_frequency_is_idempotent() {
        let mut ch = ready(StreamMode::IqOnly);
        ch.set_center_frequency(100_000_000);
        ch.set_center_frequency(100_000_000);
        assert_eq!(
            ch.take_pending(),
            vec![Setting::new(SettingId::IqFrequency, 100_000_000)]
        );
    }

    #[test]
    fn center_frequency_mirrors_to_unset_fft() {
        let mut ch = ready(StreamMode::FftOnly);
        ch.set_center_frequency(7_000_000);
        assert_eq!(ch.display_center_frequency(), 7_000_000);
        assert_eq!(
            ch.take_pending(),
            vec![
                Setting::new(SettingId::IqFrequency, 7_000_000),
                Setting::new(SettingId::FftFrequency, 7_000_000),
            ]
        );

        ch.set_center_frequency(8_000_000);
        assert_eq!(ch.display_center_frequency(), 7_000_000);
    }

    #[test]
    fn gain_rejects_stage_above_count() {
        let mut ch = ready(StreamMode::IqOnly);
        assert_eq!(ch.set_gain(17), None);
        assert!(ch.take_pending().is_empty());
        assert_eq!(ch.set_gain(16), Some(16));
        assert_eq!(ch.gain(), 16);
        assert_eq!(ch.take_pending(), vec![Setting::new(SettingId::Gain, 16)]);
    }

    #[test]
    fn streaming_mode_change_resends_fft_decimation() {
        let mut ch = ready(StreamMode::IqOnly);
        ch.set_center_frequency(1_000_000);
        ch.take_pending();

        assert_eq!(ch.set_streaming_mode(StreamMode::FftIq), StreamMode::FftIq);
        assert_eq!(
            ch.take_pending(),
            vec![
                Setting::new(SettingId::StreamingMode, 5),
                Setting::new(SettingId::FftFrequency, 1_000_000),
                Setting::new(SettingId::FftDecimation, 0),
            ]
        );

        ch.set_streaming_mode(StreamMode::FftIq);
        assert!(ch.take_pending().is_empty());
    }

    #[test]
    fn display_bounds() {
        let mut ch = ready(StreamMode::FftOnly);
        assert_eq!(ch.set_display_pixels(99), None);
        assert_eq!(ch.set_display_pixels(32_769), None);
        assert_eq!(ch.set_display_pixels(1024), Some(1024));
        assert_eq!(ch.set_display_range(9), None);
        assert_eq!(ch.set_display_range(151), None);
        assert_eq!(ch.set_display_range(100), Some(100));
        assert_eq!(ch.set_display_offset(-101), None);
        assert_eq!(ch.set_display_offset(-20), Some(-20));
        assert_eq!(
            ch.take_pending(),
            vec![
                Setting::new(SettingId::FftDisplayPixels, 1024),
                Setting::new(SettingId::FftDbRange, 100),
                Setting::new(SettingId::FftDbOffset, (-20i32) as u32),
            ]
        );
    }

    #[test]
    fn unchanged_display_values_send_nothing() {
        let mut ch = ready(StreamMode::FftOnly);
        assert_eq!(ch.set_display_pixels(DEFAULT_DISPLAY_PIXELS), Some(2000));
        assert_eq!(ch.set_display_range(DEFAULT_DISPLAY_RANGE), Some(127));
        assert_eq!(ch.set_display_offset(0), Some(0));
        assert!(ch.take_pending().is_empty());
    }

    #[test]
    fn display_bandwidth_is_eighty_percent() {
        let mut ch = ready(StreamMode::FftOnly);
        assert_eq!(ch.display_bandwidth(), 0);
        ch.set_display_decimation_stage(1);
        assert_eq!(ch.display_bandwidth(), 8_000_000);
    }

    #[test]
    fn initial_settings_order() {
        let mut ch = ChannelParams::new(StreamMode::FftIq);
        ch.queue_initial_settings(StreamFormat::Int16);
        let ids: Vec<_> = ch.take_pending().iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![
                SettingId::StreamingMode,
                SettingId::IqFormat,
                SettingId::FftFormat,
                SettingId::FftDisplayPixels,
                SettingId::FftDbOffset,
                SettingId::FftDbRange,
                SettingId::FftDecimation,
            ]
        );
        assert_eq!(ch.display_decimation_stage(), 1);
    }

    #[test]
    fn initial_offset_carries_bias() {
        let mut ch = ChannelParams::default();
        ch.queue_initial_settings(StreamFormat::Uint8);
        let pending = ch.take_pending();
        assert_eq!(pending[1], Setting::new(SettingId::IqFormat, 1));
        assert_eq!(pending[4].value as i32, -50);
    }

    #[test]
    fn sync_updates_gain_and_fft_center() {
        let mut ch = ready(StreamMode::FftOnly);
        ch.apply_sync(&ClientSync {
            gain: 9,
            fft_center_frequency: 144_000_000,
            ..ClientSync::default()
        });
        assert_eq!(ch.gain(), 9);
        assert_eq!(ch.display_center_frequency(), 144_000_000);
        assert!(ch.take_pending().is_empty());
    }

    #[test]
    fn reset_returns_to_defaults() {
        let mut ch = ready(StreamMode::IqOnly);
        ch.set_center_frequency(50_000_000);
        ch.set_decimation_stage(1).unwrap();
        ch.set_display_pixels(500).unwrap();
        ch.set_display_offset(20).unwrap();
        ch.set_display_range(90).unwrap();
        ch.set_streaming_mode(StreamMode::FftIq);
        ch.reset();

        assert!(ch.available_sample_rates().is_empty());
        assert_eq!(ch.set_gain(1), None);
        assert_eq!(ch.center_frequency(), 0);
        assert_eq!(ch.decimation_stage(), 0);
        assert_eq!(ch.sample_rate(), 0);
        assert_eq!(ch.display_center_frequency(), 0);
        assert_eq!(ch.display_pixels(), DEFAULT_DISPLAY_PIXELS);
        assert_eq!(ch.display_offset(), 0);
        assert_eq!(ch.display_range(), DEFAULT_DISPLAY_RANGE);
        assert_eq!(ch.streaming_mode(), StreamMode::IqOnly);
        assert!(ch.take_pending().is_empty());
    }

    #[test]
    fn same_center_frequency_is_sent_after_reset() {
        let mut ch = ready(StreamMode::IqOnly);
        ch.set_center_frequency(7_100_000);
        ch.take_pending();
        ch.reset();

        assert_eq!(ch.set_center_frequency(7_100_000), 7_100_000);
        assert_eq!(
            ch.take_pending(),
            vec![Setting::new(SettingId::IqFrequency, 7_100_000)]
        );
    }
}
