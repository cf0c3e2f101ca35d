//! Sample formats and buffer geometry.
//!
//! This module provides the type-safe descriptions of what a plugin buffer
//! holds: the encoding of one sample ([`SampleFormat`]) and the shape and
//! byte layout of one buffer ([`BufferSize`]).
//!
//! # Design Principles
//!
//! - **Type safety**: enums instead of raw integer format codes
//! - **Zero-cost**: small, `Copy` types, `const` constructors
//! - **Derived layout**: byte extents are computed from the element counts
//!   and the sample width, never accepted as free-standing inputs
//!
//! Values decoded from the plugin side (output geometry, debug buffers) may
//! carry byte extents larger than the derived minimum when the plugin pads
//! its rows or planes; the accessors report whatever the plugin declared.

use std::fmt;

/// Sample encodings a plugin buffer can hold.
///
/// The discriminants are the wire values of the plugin ABI's `SampleType`
/// enum and must not be reordered. "x2" formats are interleaved
/// 2-component samples (e.g. IQ pairs or re/im).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum SampleFormat {
    /// Unsigned 8-bit samples.
    Uint8 = 0,
    /// Unsigned 16-bit samples.
    Uint16 = 1,
    /// Interleaved pairs of unsigned 16-bit components.
    Uint16x2 = 2,
    /// Signed 8-bit samples.
    Int8 = 3,
    /// Signed 16-bit samples.
    Int16 = 4,
    /// Interleaved pairs of signed 16-bit components.
    Int16x2 = 5,
    /// 32-bit float samples.
    Float32 = 6,
    /// Interleaved pairs of 32-bit float components.
    Float32x2 = 7,
    /// Signed 32-bit samples.
    Int32 = 8,
    /// Interleaved pairs of signed 32-bit components.
    Int32x2 = 9,
}

impl SampleFormat {
    /// All formats, in wire-value order.
    pub const ALL: [SampleFormat; 10] = [
        Self::Uint8,
        Self::Uint16,
        Self::Uint16x2,
        Self::Int8,
        Self::Int16,
        Self::Int16x2,
        Self::Float32,
        Self::Float32x2,
        Self::Int32,
        Self::Int32x2,
    ];

    /// Number of interleaved components per sample (1 or 2).
    pub const fn components(self) -> usize {
        match self {
            Self::Uint16x2 | Self::Int16x2 | Self::Float32x2 | Self::Int32x2 => 2,
            _ => 1,
        }
    }

    /// Width of a single component in bytes.
    pub const fn component_bytes(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Uint16x2 | Self::Int16 | Self::Int16x2 => 2,
            Self::Float32 | Self::Float32x2 | Self::Int32 | Self::Int32x2 => 4,
        }
    }

    /// Width of one full sample in bytes, all components included.
    pub const fn sample_bytes(self) -> usize {
        self.component_bytes() * self.components()
    }

    /// The wire value used across the plugin ABI.
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Decode a wire value read back from the plugin.
    pub const fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Uint8),
            1 => Some(Self::Uint16),
            2 => Some(Self::Uint16x2),
            3 => Some(Self::Int8),
            4 => Some(Self::Int16),
            5 => Some(Self::Int16x2),
            6 => Some(Self::Float32),
            7 => Some(Self::Float32x2),
            8 => Some(Self::Int32),
            9 => Some(Self::Int32x2),
            _ => None,
        }
    }

    /// Lowercase textual name ("float32x2" etc).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint16x2 => "uint16x2",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int16x2 => "int16x2",
            Self::Float32 => "float32",
            Self::Float32x2 => "float32x2",
            Self::Int32 => "int32",
            Self::Int32x2 => "int32x2",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape and byte layout of one plugin buffer.
///
/// A buffer has up to three dimensions: `width` samples along the innermost
/// dimension, `height` rows, `depth` planes. The byte extents follow from
/// the element counts and the sample width:
///
/// - `width_len = width × sample_bytes`
/// - `height_len = width_len × height`
/// - `depth_len = depth × height_len`
///
/// The fields are private so a value can never hold extents that contradict
/// its element counts; [`BufferSize::new`] derives them. Sizes reported by
/// the plugin keep the plugin's extents, which may include padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferSize {
    format: SampleFormat,
    width: usize,
    height: usize,
    depth: usize,
    width_len: usize,
    height_len: usize,
    depth_len: usize,
}

impl BufferSize {
    /// Describe an unpadded buffer of `width` × `height` × `depth` samples.
    pub const fn new(format: SampleFormat, width: usize, height: usize, depth: usize) -> Self {
        let width_len = width * format.sample_bytes();
        let height_len = width_len * height;
        let depth_len = depth * height_len;
        Self {
            format,
            width,
            height,
            depth,
            width_len,
            height_len,
            depth_len,
        }
    }

    /// Rebuild a size from plugin-reported fields, extents taken verbatim.
    pub(crate) const fn from_raw_parts(
        format: SampleFormat,
        width: usize,
        height: usize,
        depth: usize,
        width_len: usize,
        height_len: usize,
        depth_len: usize,
    ) -> Self {
        Self {
            format,
            width,
            height,
            depth,
            width_len,
            height_len,
            depth_len,
        }
    }

    /// Sample encoding of this buffer.
    pub const fn format(&self) -> SampleFormat {
        self.format
    }

    /// Samples along the innermost dimension.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Samples along the second dimension.
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Samples along the third dimension.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Bytes along the innermost dimension, padding included.
    pub const fn width_len(&self) -> usize {
        self.width_len
    }

    /// Bytes along the second dimension, padding included.
    pub const fn height_len(&self) -> usize {
        self.height_len
    }

    /// Bytes along the third dimension, padding included.
    pub const fn depth_len(&self) -> usize {
        self.depth_len
    }

    /// Total number of samples.
    pub const fn sample_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Total allocation a host buffer needs for this size, in bytes.
    ///
    /// Equal to [`depth_len`](Self::depth_len); spelled out for call sites
    /// that allocate.
    pub const fn total_bytes(&self) -> usize {
        self.depth_len
    }
}

impl fmt::Display for BufferSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} {} ({} bytes)",
            self.width, self.height, self.depth, self.format, self.depth_len
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_bytes_table() {
        let expected = [1, 2, 4, 1, 2, 4, 4, 8, 4, 8];
        for (format, bytes) in SampleFormat::ALL.iter().zip(expected) {
            assert_eq!(format.sample_bytes(), bytes, "{format}");
        }
    }

    #[test]
    fn test_raw_roundtrip() {
        for format in SampleFormat::ALL {
            assert_eq!(SampleFormat::from_raw(format.as_raw()), Some(format));
        }
        assert_eq!(SampleFormat::from_raw(10), None);
        assert_eq!(SampleFormat::from_raw(-1), None);
    }

    #[test]
    fn test_extents_derived_for_all_formats() {
        for format in SampleFormat::ALL {
            let size = BufferSize::new(format, 7, 5, 3);
            assert_eq!(size.width_len(), 7 * format.sample_bytes());
            assert_eq!(size.height_len(), size.width_len() * 5);
            assert_eq!(size.depth_len(), 3 * size.height_len());
        }
    }

    #[test]
    fn test_float32_line() {
        let size = BufferSize::new(SampleFormat::Float32, 1024, 1, 1);
        assert_eq!(size.width_len(), 4096);
        assert_eq!(size.height_len(), 4096);
        assert_eq!(size.depth_len(), 4096);
        assert_eq!(size.total_bytes(), 4096);
    }

    #[test]
    fn test_int16x2_plane() {
        let size = BufferSize::new(SampleFormat::Int16x2, 8, 4, 1);
        assert_eq!(size.format().sample_bytes(), 4);
        assert_eq!(size.width_len(), 32);
        assert_eq!(size.height_len(), 128);
        assert_eq!(size.depth_len(), 128);
    }

    #[test]
    fn test_zero_dimension_collapses() {
        let size = BufferSize::new(SampleFormat::Int32, 16, 0, 4);
        assert_eq!(size.height_len(), 0);
        assert_eq!(size.depth_len(), 0);
        assert_eq!(size.sample_count(), 0);
    }

    #[test]
    fn test_display() {
        let size = BufferSize::new(SampleFormat::Float32, 1024, 1, 1);
        assert_eq!(size.to_string(), "1024x1x1 float32 (4096 bytes)");
    }
}
