//! Host-memory buffers for the `ProcessMemIO` path.

use crate::format::BufferSize;

/// An owned, contiguous host allocation sized for one plugin buffer.
///
/// Plugins that process host memory expect each buffer to span the full
/// `depth_len` of its configured [`BufferSize`]. `HostBuffer` allocates
/// exactly that, zero-initialized, and keeps the geometry alongside the
/// bytes so call sites don't have to carry both.
///
/// # Example
///
/// ```rust,ignore
/// let out_size = plugin.out_buf_size(0)?;
/// let mut output = HostBuffer::new(out_size);
/// plugin.process_mem_io(&[input.as_slice()], &mut [output.as_mut_slice()])?;
/// ```
#[derive(Clone, Debug)]
pub struct HostBuffer {
    size: BufferSize,
    data: Vec<u8>,
}

impl HostBuffer {
    /// Allocate a zero-initialized buffer for the given geometry.
    pub fn new(size: BufferSize) -> Self {
        Self {
            size,
            data: vec![0; size.total_bytes()],
        }
    }

    /// Allocate a buffer and fill it from `bytes`.
    ///
    /// `bytes` must be exactly [`BufferSize::total_bytes`] long.
    ///
    /// # Panics
    ///
    /// Panics if the length doesn't match the geometry.
    pub fn from_bytes(size: BufferSize, bytes: &[u8]) -> Self {
        assert_eq!(
            bytes.len(),
            size.total_bytes(),
            "byte length does not match buffer geometry"
        );
        Self {
            size,
            data: bytes.to_vec(),
        }
    }

    /// The geometry this buffer was allocated for.
    pub fn size(&self) -> BufferSize {
        self.size
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds zero bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read access to the bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Write access to the bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleFormat;

    #[test]
    fn test_allocation_matches_geometry() {
        let size = BufferSize::new(SampleFormat::Float32, 1024, 1, 1);
        let buf = HostBuffer::new(size);
        assert_eq!(buf.len(), 4096);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
        assert_eq!(buf.size(), size);
    }

    #[test]
    fn test_from_bytes() {
        let size = BufferSize::new(SampleFormat::Uint8, 4, 1, 1);
        let buf = HostBuffer::from_bytes(size, &[1, 2, 3, 4]);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "byte length does not match")]
    fn test_from_bytes_length_mismatch() {
        let size = BufferSize::new(SampleFormat::Uint8, 4, 1, 1);
        let _ = HostBuffer::from_bytes(size, &[1, 2, 3]);
    }
}
