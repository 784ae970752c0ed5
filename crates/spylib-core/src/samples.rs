//! IQ sample record types.
//!
//! SpyServer delivers complex baseband samples in one of three wire
//! formats. Each format has a dedicated record type so consumers receive
//! exactly what the server sent, with no implicit conversion:
//!
//! | Wire format | Record | Zero point | Full scale |
//! |-------------|--------|------------|------------|
//! | 8-bit unsigned | [`ComplexUInt8`] | 127 | 0..=255 |
//! | 16-bit signed  | [`ComplexInt16`] | 0   | -32768..=32767 |
//! | 32-bit float   | [`Complex32`]    | 0.0 | -1.0..=1.0 |
//!
//! The integer records provide `to_complex32()` for consumers that want a
//! single normalized representation.

pub use num_complex::Complex32;

/// Offset of the zero level in 8-bit unsigned IQ samples.
pub const UINT8_ZERO_OFFSET: f32 = 127.0;

/// A complex sample with unsigned 8-bit components.
///
/// The zero level sits half-way through the range at 127.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComplexUInt8 {
    /// In-phase component.
    pub real: u8,
    /// Quadrature component.
    pub imag: u8,
}

impl ComplexUInt8 {
    /// Create a sample from its raw components.
    pub const fn new(real: u8, imag: u8) -> Self {
        Self { real, imag }
    }

    /// Convert to a normalized float sample centred on zero.
    pub fn to_complex32(self) -> Complex32 {
        Complex32::new(
            (self.real as f32 - UINT8_ZERO_OFFSET) / 128.0,
            (self.imag as f32 - UINT8_ZERO_OFFSET) / 128.0,
        )
    }
}

/// A complex sample with signed 16-bit components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComplexInt16 {
    /// In-phase component.
    pub real: i16,
    /// Quadrature component.
    pub imag: i16,
}

impl ComplexInt16 {
    /// Create a sample from its raw components.
    pub const fn new(real: i16, imag: i16) -> Self {
        Self { real, imag }
    }

    /// Convert to a normalized float sample in `[-1.0, 1.0)`.
    pub fn to_complex32(self) -> Complex32 {
        Complex32::new(self.real as f32 / 32768.0, self.imag as f32 / 32768.0)
    }
}
