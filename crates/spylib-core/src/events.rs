//! Consumer event types.
//!
//! Every message the client decodes is delivered to a single registered
//! callback as a [`SpyEvent`]. The enum is closed: each sample format has
//! its own variant carrying a typed payload, so consumers dispatch with a
//! `match` instead of inspecting a type tag and casting.

use crate::samples::{Complex32, ComplexInt16, ComplexUInt8};

/// An event emitted by the client's read loop.
///
/// The callback runs on the read loop task. Slow callbacks delay framing
/// of subsequent messages, so heavy processing should be handed off (for
/// example through a channel).
#[derive(Debug, Clone, PartialEq)]
pub enum SpyEvent {
    /// A client sync record was received. Tuning limits, gain, and control
    /// authority may have changed; query the client for the new values.
    DeviceSync,

    /// A block of 8-bit unsigned IQ samples.
    SamplesUInt8(Vec<ComplexUInt8>),

    /// A block of 16-bit signed IQ samples.
    SamplesInt16(Vec<ComplexInt16>),

    /// A block of 32-bit float IQ samples.
    SamplesFloat(Vec<Complex32>),

    /// One FFT frame of 8-bit magnitude bins, passed through unmodified.
    FftUInt8(Vec<u8>),

    /// A gap in the data sequence numbers was detected.
    BuffersDropped {
        /// Number of buffers missing between the last two data messages.
        count: u32,
    },

    /// The connection ended.
    Disconnected {
        /// Why the read loop stopped, or `None` for a local disconnect.
        reason: Option<String>,
    },
}

impl SpyEvent {
    /// Number of samples (or FFT bins) carried by this event.
    ///
    /// Control events carry no samples and return 0.
    pub fn sample_count(&self) -> usize {
        match self {
            SpyEvent::SamplesUInt8(s) => s.len(),
            SpyEvent::SamplesInt16(s) => s.len(),
            SpyEvent::SamplesFloat(s) => s.len(),
            SpyEvent::FftUInt8(bins) => bins.len(),
            SpyEvent::DeviceSync
            | SpyEvent::BuffersDropped { .. }
            | SpyEvent::Disconnected { .. } => 0,
        }
    }
}

/// The consumer callback registered with a client.
pub type EventCallback = Box<dyn FnMut(SpyEvent) + Send + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_per_variant() {
        assert_eq!(SpyEvent::DeviceSync.sample_count(), 0);
        assert_eq!(
            SpyEvent::SamplesUInt8(vec![ComplexUInt8::default(); 3]).sample_count(),
            3
        );
        assert_eq!(
            SpyEvent::SamplesInt16(vec![ComplexInt16::default(); 5]).sample_count(),
            5
        );
        assert_eq!(
            SpyEvent::SamplesFloat(vec![Complex32::new(0.0, 0.0); 2]).sample_count(),
            2
        );
        assert_eq!(SpyEvent::FftUInt8(vec![0u8; 2000]).sample_count(), 2000);
        assert_eq!(SpyEvent::BuffersDropped { count: 4 }.sample_count(), 0);
    }

    #[test]
    fn callback_accepts_closures() {
        let mut seen = Vec::new();
        {
            let mut cb = |ev: SpyEvent| seen.push(ev);
            cb(SpyEvent::DeviceSync);
        }
        assert_eq!(seen, vec![SpyEvent::DeviceSync]);

        let mut boxed: EventCallback = Box::new(|_ev| {});
        boxed(SpyEvent::Disconnected { reason: None });
    }
}
