//! Diagnostic access to plugin-internal buffers.
//!
//! Plugins may expose the buffers they allocate internally so a host can
//! inspect intermediate stages of the processing chain. The records are
//! snapshots: the plugin keeps ownership of the named memory, and the
//! handles stay valid only as long as the plugin's prepared state does.

use std::ffi::c_void;

use super::abi::{self, DbgMem, DbgOclMem};
use crate::error::Result;
use crate::format::BufferSize;
use crate::handle::ClMem;

/// A named internal OpenCL buffer exposed by the plugin for inspection.
#[derive(Clone, Debug)]
pub struct DebugClBuffer {
    /// Plugin-assigned name of the buffer.
    pub name: String,
    /// Geometry of the buffer.
    pub size: BufferSize,
    /// The OpenCL memory object. Owned by the plugin; do not release it.
    pub mem: ClMem,
}

/// A named internal host buffer exposed by the plugin for inspection.
#[derive(Clone, Debug)]
pub struct DebugHostBuffer {
    /// Plugin-assigned name of the buffer.
    pub name: String,
    /// Geometry of the buffer.
    pub size: BufferSize,
    /// Pointer to the buffer's bytes. Owned by the plugin; read only.
    pub ptr: *mut c_void,
}

/// Copy the plugin's OpenCL debug list into owned records.
///
/// # Safety
///
/// `records` must be null or point to `len` valid [`DbgOclMem`] entries
/// that stay alive for the duration of the call.
pub(crate) unsafe fn decode_cl_buffers(
    records: *const DbgOclMem,
    len: u32,
) -> Result<Vec<DebugClBuffer>> {
    if records.is_null() || len == 0 {
        return Ok(Vec::new());
    }
    // SAFETY: caller guarantees `records` points to `len` valid entries.
    let raw = unsafe { std::slice::from_raw_parts(records, len as usize) };
    raw.iter()
        .map(|record| {
            Ok(DebugClBuffer {
                // SAFETY: the record's name obeys the same validity contract.
                name: unsafe { abi::decode_name(record.name) },
                size: record.buf_size.to_buffer_size()?,
                mem: record.mem,
            })
        })
        .collect()
}

/// Copy the plugin's host-memory debug list into owned records.
///
/// # Safety
///
/// `records` must be null or point to `len` valid [`DbgMem`] entries that
/// stay alive for the duration of the call.
pub(crate) unsafe fn decode_host_buffers(
    records: *const DbgMem,
    len: u32,
) -> Result<Vec<DebugHostBuffer>> {
    if records.is_null() || len == 0 {
        return Ok(Vec::new());
    }
    // SAFETY: caller guarantees `records` points to `len` valid entries.
    let raw = unsafe { std::slice::from_raw_parts(records, len as usize) };
    raw.iter()
        .map(|record| {
            Ok(DebugHostBuffer {
                // SAFETY: the record's name obeys the same validity contract.
                name: unsafe { abi::decode_name(record.name) },
                size: record.buf_size.to_buffer_size()?,
                ptr: record.ptr,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::format::SampleFormat;

    #[test]
    fn test_null_list_is_empty() {
        let buffers = unsafe { decode_cl_buffers(std::ptr::null(), 7) }.unwrap();
        assert!(buffers.is_empty());
        let buffers = unsafe { decode_host_buffers(std::ptr::null(), 0) }.unwrap();
        assert!(buffers.is_empty());
    }

    #[test]
    fn test_decode_cl_records() {
        let name = c"envelope";
        let records = [DbgOclMem {
            name: name.as_ptr(),
            mem: ClMem::from_raw(0x40 as *mut c_void),
            buf_size: abi::BuffSize::from_buffer_size(&BufferSize::new(
                SampleFormat::Float32x2,
                64,
                8,
                1,
            )),
        }];
        let buffers = unsafe { decode_cl_buffers(records.as_ptr(), 1) }.unwrap();
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].name, "envelope");
        assert_eq!(buffers[0].size.format(), SampleFormat::Float32x2);
        assert_eq!(buffers[0].mem.as_ptr(), 0x40 as *mut c_void);
    }

    #[test]
    fn test_decode_host_record_with_null_name() {
        let mut payload = [0u8; 16];
        let records = [DbgMem {
            name: std::ptr::null(),
            ptr: payload.as_mut_ptr().cast(),
            buf_size: abi::BuffSize::from_buffer_size(&BufferSize::new(
                SampleFormat::Uint8,
                16,
                1,
                1,
            )),
        }];
        let buffers = unsafe { decode_host_buffers(records.as_ptr(), 1) }.unwrap();
        assert_eq!(buffers[0].name, "");
        assert_eq!(buffers[0].size.total_bytes(), 16);
    }

    #[test]
    fn test_bad_sample_format_fails_snapshot() {
        let records = [DbgMem {
            name: std::ptr::null(),
            ptr: std::ptr::null_mut(),
            buf_size: abi::BuffSize {
                sample_type: 99,
                ..abi::BuffSize::default()
            },
        }];
        let err = unsafe { decode_host_buffers(records.as_ptr(), 1) }.unwrap_err();
        assert!(matches!(err, Error::UnknownSampleFormat(99)));
    }
}
