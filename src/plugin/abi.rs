//! C-compatible ABI surface shared with UspPlugin libraries.
//!
//! These types mirror the plugin header's structures field for field; the
//! design keeps the entire `#[repr(C)]` surface in one place so the rest of
//! the crate deals only in the safe types.
//!
//! Handles that cross this boundary (`cl_*` objects, debug pointers) are
//! opaque tokens owned by the external collaborators; see [`crate::handle`].

use std::ffi::{CStr, c_char, c_int, c_void};

use crate::error::{Error, Result};
use crate::format::{BufferSize, SampleFormat};
use crate::handle::{ClCommandQueue, ClContext, ClDeviceId, ClEvent, ClMem};

/// Raw capability descriptor filled in by `GetPluginInfo`.
///
/// Field order matches the C `PluginInfo` struct. The `int` fields are
/// 0/1 flags except the two buffer counts.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct PluginInfo {
    /// Number of input buffers (streams).
    pub num_in_buffers: c_int,
    /// Number of output buffers (streams).
    pub num_out_buffers: c_int,
    /// Whether the plugin uses OpenCL at all.
    pub use_open_cl: c_int,
    /// Whether inputs are OpenCL memory objects.
    pub in_cl_mem: c_int,
    /// Whether outputs are OpenCL memory objects.
    pub out_cl_mem: c_int,
}

/// Raw buffer geometry passed by pointer across the ABI.
///
/// Field order matches the C `BuffSize` struct: the sample type as its wire
/// value, three element counts, three byte extents.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct BuffSize {
    /// Wire value of the sample format.
    pub sample_type: c_int,
    /// Samples along the innermost dimension.
    pub width: usize,
    /// Samples along the second dimension.
    pub height: usize,
    /// Samples along the third dimension.
    pub depth: usize,
    /// Bytes along the innermost dimension (may include padding).
    pub width_len: usize,
    /// Bytes along the second dimension (may include padding).
    pub height_len: usize,
    /// Bytes along the third dimension (may include padding).
    pub depth_len: usize,
}

impl BuffSize {
    /// Encode a safe [`BufferSize`] for the plugin.
    pub fn from_buffer_size(size: &BufferSize) -> Self {
        Self {
            sample_type: size.format().as_raw(),
            width: size.width(),
            height: size.height(),
            depth: size.depth(),
            width_len: size.width_len(),
            height_len: size.height_len(),
            depth_len: size.depth_len(),
        }
    }

    /// Decode a geometry reported by the plugin.
    ///
    /// The plugin's byte extents are kept verbatim; only the sample format
    /// value is validated.
    pub fn to_buffer_size(&self) -> Result<BufferSize> {
        let format = SampleFormat::from_raw(self.sample_type)
            .ok_or(Error::UnknownSampleFormat(self.sample_type))?;
        Ok(BufferSize::from_raw_parts(
            format,
            self.width,
            self.height,
            self.depth,
            self.width_len,
            self.height_len,
            self.depth_len,
        ))
    }
}

/// Raw debug record for an internal OpenCL buffer (`GetDbgOclMem`).
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct DbgOclMem {
    /// Buffer name, NUL-terminated, owned by the plugin.
    pub name: *const c_char,
    /// The OpenCL memory object, owned by the plugin.
    pub mem: ClMem,
    /// Geometry of the buffer.
    pub buf_size: BuffSize,
}

/// Raw debug record for an internal host buffer (`GetDbgMem`).
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct DbgMem {
    /// Buffer name, NUL-terminated, owned by the plugin.
    pub name: *const c_char,
    /// Pointer to the buffer's bytes, owned by the plugin.
    pub ptr: *mut c_void,
    /// Geometry of the buffer.
    pub buf_size: BuffSize,
}

/// Signature of `GetPluginInfo`.
pub type GetPluginInfoFn = unsafe extern "C" fn(info: *mut PluginInfo);
/// Signature of `Initialize`.
pub type InitializeFn = unsafe extern "C" fn(path: *const c_char) -> c_int;
/// Signature of `InitializeCL`.
pub type InitializeClFn =
    unsafe extern "C" fn(ctx: ClContext, device: ClDeviceId, path: *const c_char) -> c_int;
/// Signature of `Cleanup`.
pub type CleanupFn = unsafe extern "C" fn() -> c_int;
/// Signature of `SetParams`.
pub type SetParamsFn = unsafe extern "C" fn(
    float_params: *const f32,
    num_floats: usize,
    int_params: *const c_int,
    num_ints: usize,
) -> c_int;
/// Signature of `SetInBufSize`.
pub type SetInBufSizeFn = unsafe extern "C" fn(size: *mut BuffSize, index: c_int) -> c_int;
/// Signature of `Prepare`.
pub type PrepareFn = unsafe extern "C" fn() -> c_int;
/// Signature of `GetOutBufSize`.
pub type GetOutBufSizeFn = unsafe extern "C" fn(size: *mut BuffSize, index: c_int) -> c_int;
/// Signature of `ProcessCLIO`.
pub type ProcessClIoFn = unsafe extern "C" fn(
    inputs: *mut ClMem,
    num_in: usize,
    outputs: *mut ClMem,
    num_out: usize,
    queue: ClCommandQueue,
    input_ready: ClEvent,
    output_done: *mut ClEvent,
) -> c_int;
/// Signature of `ProcessMemIO`.
pub type ProcessMemIoFn = unsafe extern "C" fn(
    inputs: *mut *mut c_void,
    num_in: usize,
    outputs: *mut *mut c_void,
    num_out: usize,
) -> c_int;
/// Signature of `GetDbgOclMem`.
pub type GetDbgOclMemFn = unsafe extern "C" fn(len: *mut u32) -> *mut DbgOclMem;
/// Signature of `GetDbgMem`.
pub type GetDbgMemFn = unsafe extern "C" fn(len: *mut u32) -> *mut DbgMem;

/// The complete entry-point table of one loaded plugin.
///
/// Every field is resolved once at load time; the `Library` that owns the
/// code is kept alive alongside this table for the handle's lifetime.
#[derive(Clone, Copy)]
pub(crate) struct PluginApi {
    pub get_plugin_info: GetPluginInfoFn,
    pub initialize: InitializeFn,
    pub initialize_cl: InitializeClFn,
    pub cleanup: CleanupFn,
    pub set_params: SetParamsFn,
    pub set_in_buf_size: SetInBufSizeFn,
    pub prepare: PrepareFn,
    pub get_out_buf_size: GetOutBufSizeFn,
    pub process_clio: ProcessClIoFn,
    pub process_mem_io: ProcessMemIoFn,
    pub get_dbg_ocl_mem: GetDbgOclMemFn,
    pub get_dbg_mem: GetDbgMemFn,
}

/// Validated, host-side view of a plugin's capabilities.
///
/// Decoded from the raw [`PluginInfo`] once at load time and cached for the
/// lifetime of the handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PluginCapabilities {
    /// Number of input buffers the plugin consumes per processing step.
    pub num_in_buffers: usize,
    /// Number of output buffers the plugin produces per processing step.
    pub num_out_buffers: usize,
    /// Whether the plugin needs an OpenCL context at initialization.
    pub uses_opencl: bool,
    /// Whether input buffers are OpenCL memory objects.
    pub cl_inputs: bool,
    /// Whether output buffers are OpenCL memory objects.
    pub cl_outputs: bool,
}

impl PluginCapabilities {
    /// Decode and validate a raw capability descriptor.
    pub(crate) fn from_raw(info: &PluginInfo) -> Result<Self> {
        if info.num_in_buffers < 0 || info.num_out_buffers < 0 {
            return Err(Error::InvalidCapabilities("negative buffer count"));
        }
        if (info.in_cl_mem != 0 || info.out_cl_mem != 0) && info.use_open_cl == 0 {
            return Err(Error::InvalidCapabilities(
                "OpenCL buffers declared without OpenCL usage",
            ));
        }
        Ok(Self {
            num_in_buffers: info.num_in_buffers as usize,
            num_out_buffers: info.num_out_buffers as usize,
            uses_opencl: info.use_open_cl != 0,
            cl_inputs: info.in_cl_mem != 0,
            cl_outputs: info.out_cl_mem != 0,
        })
    }

    /// Whether processing goes through `process_clio` (both sides OpenCL).
    pub const fn is_cl_io(&self) -> bool {
        self.cl_inputs && self.cl_outputs
    }

    /// Whether processing goes through `process_mem_io` (neither side OpenCL).
    pub const fn is_mem_io(&self) -> bool {
        !self.cl_inputs && !self.cl_outputs
    }
}

/// Decode a NUL-terminated name owned by the plugin.
///
/// Diagnostic path: a null pointer decodes to an empty name and non-UTF-8
/// bytes decode lossily rather than failing the snapshot.
///
/// # Safety
///
/// `name` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub(crate) unsafe fn decode_name(name: *const c_char) -> String {
    if name.is_null() {
        return String::new();
    }
    // SAFETY: caller guarantees `name` is NUL-terminated and valid.
    unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn test_buff_size_layout() {
        // c_int, then six size_t fields in declared order at natural alignment.
        let word = size_of::<usize>();
        let head = size_of::<c_int>().max(align_of::<usize>());
        assert_eq!(offset_of!(BuffSize, width), head);
        assert_eq!(offset_of!(BuffSize, height), head + word);
        assert_eq!(offset_of!(BuffSize, depth), head + 2 * word);
        assert_eq!(offset_of!(BuffSize, width_len), head + 3 * word);
        assert_eq!(offset_of!(BuffSize, height_len), head + 4 * word);
        assert_eq!(offset_of!(BuffSize, depth_len), head + 5 * word);
        assert_eq!(size_of::<BuffSize>(), head + 6 * word);
    }

    #[test]
    fn test_plugin_info_layout() {
        // Five consecutive C ints.
        assert_eq!(size_of::<PluginInfo>(), 5 * size_of::<c_int>());
        assert_eq!(offset_of!(PluginInfo, out_cl_mem), 4 * size_of::<c_int>());
    }

    #[test]
    fn test_dbg_record_layout() {
        assert_eq!(offset_of!(DbgOclMem, name), 0);
        assert_eq!(offset_of!(DbgOclMem, mem), size_of::<*const c_char>());
        assert_eq!(
            offset_of!(DbgOclMem, buf_size),
            offset_of!(DbgMem, buf_size)
        );
    }

    #[test]
    fn test_buff_size_roundtrip() {
        let size = BufferSize::new(SampleFormat::Int16x2, 8, 4, 1);
        let raw = BuffSize::from_buffer_size(&size);
        assert_eq!(raw.sample_type, 5);
        assert_eq!(raw.width_len, 32);
        assert_eq!(raw.depth_len, 128);
        assert_eq!(raw.to_buffer_size().unwrap(), size);
    }

    #[test]
    fn test_padded_extents_kept_verbatim() {
        let raw = BuffSize {
            sample_type: 6,
            width: 100,
            height: 1,
            depth: 1,
            width_len: 512, // padded beyond 400
            height_len: 512,
            depth_len: 512,
        };
        let size = raw.to_buffer_size().unwrap();
        assert_eq!(size.width(), 100);
        assert_eq!(size.width_len(), 512);
        assert_eq!(size.total_bytes(), 512);
    }

    #[test]
    fn test_unknown_sample_format_rejected() {
        let raw = BuffSize {
            sample_type: 42,
            ..BuffSize::default()
        };
        assert!(matches!(
            raw.to_buffer_size(),
            Err(Error::UnknownSampleFormat(42))
        ));
    }

    #[test]
    fn test_capabilities_decode() {
        let info = PluginInfo {
            num_in_buffers: 2,
            num_out_buffers: 1,
            use_open_cl: 1,
            in_cl_mem: 1,
            out_cl_mem: 1,
        };
        let caps = PluginCapabilities::from_raw(&info).unwrap();
        assert_eq!(caps.num_in_buffers, 2);
        assert!(caps.uses_opencl);
        assert!(caps.is_cl_io());
        assert!(!caps.is_mem_io());
    }

    #[test]
    fn test_capabilities_reject_negative_counts() {
        let info = PluginInfo {
            num_in_buffers: -1,
            ..PluginInfo::default()
        };
        assert!(matches!(
            PluginCapabilities::from_raw(&info),
            Err(Error::InvalidCapabilities(_))
        ));
    }

    #[test]
    fn test_capabilities_reject_cl_buffers_without_cl() {
        let info = PluginInfo {
            num_in_buffers: 1,
            num_out_buffers: 1,
            use_open_cl: 0,
            in_cl_mem: 1,
            out_cl_mem: 1,
        };
        assert!(matches!(
            PluginCapabilities::from_raw(&info),
            Err(Error::InvalidCapabilities(_))
        ));
    }

    #[test]
    fn test_mixed_mode_is_neither_io_flavor() {
        let info = PluginInfo {
            num_in_buffers: 1,
            num_out_buffers: 1,
            use_open_cl: 1,
            in_cl_mem: 1,
            out_cl_mem: 0,
        };
        let caps = PluginCapabilities::from_raw(&info).unwrap();
        assert!(!caps.is_cl_io());
        assert!(!caps.is_mem_io());
    }
}
