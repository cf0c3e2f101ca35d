//! Dynamic plugin loading and the plugin lifecycle.
//!
//! [`UspPlugin`] wraps one loaded plugin library: the library handle, the
//! entry-point table resolved at load time, the cached capabilities, and a
//! small state machine that rejects out-of-order lifecycle calls the native
//! contract leaves undefined. [`PluginLoader`] adds search paths and
//! platform library naming on top.

use libloading::Library;
use smallvec::SmallVec;
use std::ffi::{CString, c_int, c_void};
use std::path::{Path, PathBuf};

use super::abi::{self, PluginApi, PluginCapabilities};
use super::debug::{self, DebugClBuffer, DebugHostBuffer};
use crate::error::{BufferDirection, Error, Result};
use crate::format::BufferSize;
use crate::handle::{ClCommandQueue, ClContext, ClDeviceId, ClEvent, ClMem};

/// Lifecycle position of a loaded plugin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Library loaded, entry points resolved, not yet initialized.
    Loaded,
    /// Initialized; input sizes and parameters may be configured.
    Initialized,
    /// Prepared; output geometry is fixed and processing may run.
    Prepared,
    /// Cleaned up; every further operation fails.
    Released,
}

/// A loaded UspPlugin library.
///
/// The handle owns the shared library and its resolved entry points for its
/// entire lifetime; dropping it unloads the library. The lifecycle is
/// sequential and single-threaded:
///
/// ```rust,ignore
/// let mut plugin = unsafe { UspPlugin::load("plugins/libbmode.so")? };
/// let caps = plugin.capabilities();
///
/// plugin.initialize_cl(ctx, dev, "plugins/")?;
/// plugin.set_in_buf_size(0, BufferSize::new(SampleFormat::Float32, 1024, 1, 1))?;
/// plugin.prepare()?;
///
/// let out_size = plugin.out_buf_size(0)?;
/// let done = plugin.process_clio(&[in_mem], &[out_mem], queue, in_ready)?;
/// // wait on `done`, read the output, repeat...
///
/// plugin.cleanup()?;
/// ```
pub struct UspPlugin {
    /// Keeps the shared library mapped; entry points point into it.
    _library: Library,
    api: PluginApi,
    caps: PluginCapabilities,
    state: State,
    in_sizes: Vec<Option<BufferSize>>,
    out_sizes: Vec<BufferSize>,
}

/// Resolve one entry point and copy out its function pointer.
///
/// # Safety
///
/// `T` must be the function pointer type the plugin actually exports under
/// `symbol`, and the returned pointer must not outlive `library`.
unsafe fn resolve<T: Copy>(library: &Library, symbol: &[u8], name: &'static str) -> Result<T> {
    // SAFETY: caller guarantees the symbol has type T and the library
    // outlives every use of the returned pointer.
    let sym = unsafe { library.get::<T>(symbol) }.map_err(|_| Error::MissingEntryPoint(name))?;
    Ok(*sym)
}

macro_rules! entry_point {
    ($library:expr, $name:literal) => {
        // SAFETY: the alias passed as T matches the exported C signature;
        // the library is owned by the handle under construction.
        unsafe { resolve($library, concat!($name, "\0").as_bytes(), $name) }
    };
}

/// Resolve the full entry-point table, failing on the first missing symbol.
unsafe fn resolve_api(library: &Library) -> Result<PluginApi> {
    Ok(PluginApi {
        get_plugin_info: entry_point!(library, "GetPluginInfo")?,
        initialize: entry_point!(library, "Initialize")?,
        initialize_cl: entry_point!(library, "InitializeCL")?,
        cleanup: entry_point!(library, "Cleanup")?,
        set_params: entry_point!(library, "SetParams")?,
        set_in_buf_size: entry_point!(library, "SetInBufSize")?,
        prepare: entry_point!(library, "Prepare")?,
        get_out_buf_size: entry_point!(library, "GetOutBufSize")?,
        process_clio: entry_point!(library, "ProcessCLIO")?,
        process_mem_io: entry_point!(library, "ProcessMemIO")?,
        get_dbg_ocl_mem: entry_point!(library, "GetDbgOclMem")?,
        get_dbg_mem: entry_point!(library, "GetDbgMem")?,
    })
}

/// Encode a path for the C boundary.
fn c_path(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_encoded_bytes().to_vec())
        .map_err(|_| Error::InvalidPath(path.to_path_buf()))
}

impl UspPlugin {
    /// Load a plugin library and resolve all of its entry points.
    ///
    /// Every entry point is mandatory and bound here, never lazily; the
    /// capability descriptor is queried and validated before the handle is
    /// returned.
    ///
    /// # Safety
    ///
    /// Loading a plugin executes arbitrary code from the library. The
    /// caller must trust that the library implements the UspPlugin ABI:
    /// each exported entry point must have the declared signature and obey
    /// the lifecycle contract.
    pub unsafe fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // SAFETY: loading a dynamic library; caller ensures it is trusted.
        let library =
            unsafe { Library::new(path) }.map_err(|e| Error::LoadFailed(e.to_string()))?;

        // SAFETY: caller guarantees the library implements the plugin ABI.
        let api = unsafe { resolve_api(&library) }?;

        let mut info = abi::PluginInfo::default();
        // SAFETY: entry point resolved from the freshly loaded library; the
        // descriptor struct outlives the call.
        unsafe { (api.get_plugin_info)(&mut info) };
        let caps = PluginCapabilities::from_raw(&info)?;

        tracing::debug!(
            "loaded plugin {}: {} in, {} out, opencl={}",
            path.display(),
            caps.num_in_buffers,
            caps.num_out_buffers,
            caps.uses_opencl
        );
        Ok(Self::from_parts(library, api, caps))
    }

    /// Assemble a handle from already-resolved parts.
    fn from_parts(library: Library, api: PluginApi, caps: PluginCapabilities) -> Self {
        Self {
            _library: library,
            api,
            caps,
            state: State::Loaded,
            in_sizes: vec![None; caps.num_in_buffers],
            out_sizes: Vec::new(),
        }
    }

    /// The plugin's capabilities, as declared at load time.
    ///
    /// Pure query, callable in any state.
    pub fn capabilities(&self) -> PluginCapabilities {
        self.caps
    }

    /// Initialize a plugin that does not use OpenCL.
    ///
    /// `resource_dir` is handed to the plugin so it can locate auxiliary
    /// resources; what counts as valid is plugin-defined.
    pub fn initialize(&mut self, resource_dir: impl AsRef<Path>) -> Result<()> {
        self.ensure_uninitialized()?;
        if self.caps.uses_opencl {
            return Err(Error::InitializerMismatch { needs_opencl: true });
        }
        let path = c_path(resource_dir.as_ref())?;
        // SAFETY: entry point resolved at load; the CString outlives the call.
        let code = unsafe { (self.api.initialize)(path.as_ptr()) };
        if code != 0 {
            return Err(Error::InitFailed { code });
        }
        self.state = State::Initialized;
        tracing::debug!("plugin initialized");
        Ok(())
    }

    /// Initialize a plugin that uses OpenCL.
    ///
    /// The context and device handles are forwarded untouched; the plugin
    /// builds its kernels against them. `resource_dir` as in
    /// [`initialize`](Self::initialize).
    pub fn initialize_cl(
        &mut self,
        context: ClContext,
        device: ClDeviceId,
        resource_dir: impl AsRef<Path>,
    ) -> Result<()> {
        self.ensure_uninitialized()?;
        if !self.caps.uses_opencl {
            return Err(Error::InitializerMismatch {
                needs_opencl: false,
            });
        }
        let path = c_path(resource_dir.as_ref())?;
        // SAFETY: entry point resolved at load; handles are opaque tokens
        // forwarded by value; the CString outlives the call.
        let code = unsafe { (self.api.initialize_cl)(context, device, path.as_ptr()) };
        if code != 0 {
            return Err(Error::InitFailed { code });
        }
        self.state = State::Initialized;
        tracing::debug!("plugin initialized with OpenCL context");
        Ok(())
    }

    /// Supply scalar tuning parameters.
    ///
    /// Optional; either sequence may be empty. Valid between initialization
    /// and [`prepare`](Self::prepare).
    pub fn set_params(&mut self, float_params: &[f32], int_params: &[i32]) -> Result<()> {
        self.ensure_configurable()?;
        // SAFETY: the slices outlive the call and their lengths are passed
        // alongside; the plugin only reads them.
        let code = unsafe {
            (self.api.set_params)(
                float_params.as_ptr(),
                float_params.len(),
                int_params.as_ptr(),
                int_params.len(),
            )
        };
        if code != 0 {
            return Err(Error::ParamsRejected { code });
        }
        Ok(())
    }

    /// Declare the geometry of input buffer `index`.
    ///
    /// Must be called once for every input buffer before
    /// [`prepare`](Self::prepare).
    pub fn set_in_buf_size(&mut self, index: usize, size: BufferSize) -> Result<()> {
        self.ensure_configurable()?;
        if index >= self.caps.num_in_buffers {
            return Err(Error::BufferIndexOutOfRange {
                dir: BufferDirection::Input,
                index,
                count: self.caps.num_in_buffers,
            });
        }
        let mut raw = abi::BuffSize::from_buffer_size(&size);
        // SAFETY: entry point resolved at load; the struct outlives the call.
        let code = unsafe { (self.api.set_in_buf_size)(&mut raw, index as c_int) };
        if code != 0 {
            return Err(Error::ConfigRejected {
                dir: BufferDirection::Input,
                index,
                code,
            });
        }
        self.in_sizes[index] = Some(size);
        Ok(())
    }

    /// Finalize plugin state from the configured input sizes.
    ///
    /// Output geometry is fixed from this point on; this call snapshots it,
    /// so [`out_buf_size`](Self::out_buf_size) answers without touching the
    /// plugin again.
    pub fn prepare(&mut self) -> Result<()> {
        match self.state {
            State::Initialized => {}
            State::Loaded => return Err(Error::NotInitialized),
            State::Prepared => return Err(Error::AlreadyPrepared),
            State::Released => return Err(Error::Released),
        }
        if let Some(missing) = self.in_sizes.iter().position(Option::is_none) {
            return Err(Error::InputNotConfigured(missing));
        }

        // SAFETY: entry point resolved at load.
        let code = unsafe { (self.api.prepare)() };
        if code != 0 {
            return Err(Error::PrepareFailed { code });
        }

        let mut out_sizes = Vec::with_capacity(self.caps.num_out_buffers);
        for index in 0..self.caps.num_out_buffers {
            let mut raw = abi::BuffSize::default();
            // SAFETY: entry point resolved at load; the struct outlives the
            // call and the plugin fills it in.
            let code = unsafe { (self.api.get_out_buf_size)(&mut raw, index as c_int) };
            if code != 0 {
                return Err(Error::ConfigRejected {
                    dir: BufferDirection::Output,
                    index,
                    code,
                });
            }
            out_sizes.push(raw.to_buffer_size()?);
        }
        self.out_sizes = out_sizes;
        self.state = State::Prepared;
        tracing::debug!("plugin prepared, {} output buffer(s)", self.out_sizes.len());
        Ok(())
    }

    /// Geometry of output buffer `index`, fixed at prepare time.
    pub fn out_buf_size(&self, index: usize) -> Result<BufferSize> {
        self.ensure_prepared()?;
        self.out_sizes
            .get(index)
            .copied()
            .ok_or(Error::BufferIndexOutOfRange {
                dir: BufferDirection::Output,
                index,
                count: self.caps.num_out_buffers,
            })
    }

    /// Run one processing step over OpenCL memory objects.
    ///
    /// Enqueues work on `queue`. The plugin's device work waits on
    /// `input_ready` before consuming the inputs, and the returned event is
    /// signaled once the outputs are complete; the caller must wait on it
    /// before reading them. Return of this call does not imply completion
    /// of the enqueued work.
    pub fn process_clio(
        &mut self,
        inputs: &[ClMem],
        outputs: &[ClMem],
        queue: ClCommandQueue,
        input_ready: ClEvent,
    ) -> Result<ClEvent> {
        self.ensure_prepared()?;
        if !self.caps.is_cl_io() {
            return Err(Error::ClIoUnsupported);
        }
        self.check_counts(inputs.len(), outputs.len())?;

        let mut output_done = ClEvent::null();
        // SAFETY: ClMem is a transparent pointer wrapper, so the slices
        // have exactly the layout the plugin expects for cl_mem arrays.
        // Everything passed stays alive across the call; the plugin writes
        // only through `output_done`.
        let code = unsafe {
            (self.api.process_clio)(
                inputs.as_ptr() as *mut ClMem,
                inputs.len(),
                outputs.as_ptr() as *mut ClMem,
                outputs.len(),
                queue,
                input_ready,
                &mut output_done,
            )
        };
        if code != 0 {
            return Err(Error::ProcessFailed { code });
        }
        tracing::trace!("processing step enqueued");
        Ok(output_done)
    }

    /// Run one processing step over host memory, synchronously.
    ///
    /// Each input must hold at least the configured `depth_len` bytes and
    /// each output at least the prepared output `depth_len`; short buffers
    /// are rejected before the plugin is called. On return the outputs are
    /// ready to read.
    pub fn process_mem_io(&mut self, inputs: &[&[u8]], outputs: &mut [&mut [u8]]) -> Result<()> {
        self.ensure_prepared()?;
        if !self.caps.is_mem_io() {
            return Err(Error::MemIoUnsupported);
        }
        self.check_counts(inputs.len(), outputs.len())?;
        for (index, (buf, size)) in inputs.iter().zip(&self.in_sizes).enumerate() {
            if let Some(size) = size {
                if buf.len() < size.depth_len() {
                    return Err(Error::BufferTooSmall {
                        dir: BufferDirection::Input,
                        index,
                        expected: size.depth_len(),
                        actual: buf.len(),
                    });
                }
            }
        }
        for (index, (buf, size)) in outputs.iter().zip(&self.out_sizes).enumerate() {
            if buf.len() < size.depth_len() {
                return Err(Error::BufferTooSmall {
                    dir: BufferDirection::Output,
                    index,
                    expected: size.depth_len(),
                    actual: buf.len(),
                });
            }
        }

        let mut in_ptrs: SmallVec<[*mut c_void; 4]> = inputs
            .iter()
            .map(|buf| buf.as_ptr() as *mut c_void)
            .collect();
        let mut out_ptrs: SmallVec<[*mut c_void; 4]> = outputs
            .iter_mut()
            .map(|buf| buf.as_mut_ptr().cast::<c_void>())
            .collect();
        // SAFETY: the pointer arrays and the buffers they reference outlive
        // the call; lengths were validated against the configured geometry,
        // and the plugin writes only into the output buffers.
        let code = unsafe {
            (self.api.process_mem_io)(
                in_ptrs.as_mut_ptr(),
                in_ptrs.len(),
                out_ptrs.as_mut_ptr(),
                out_ptrs.len(),
            )
        };
        if code != 0 {
            return Err(Error::ProcessFailed { code });
        }
        tracing::trace!("processing step complete");
        Ok(())
    }

    /// Release plugin-internal resources.
    ///
    /// Must be the last operation on the handle; afterwards every operation
    /// fails with [`Error::Released`]. On a handle that was never
    /// initialized there is nothing native to release and the plugin is not
    /// called.
    pub fn cleanup(&mut self) -> Result<()> {
        match self.state {
            State::Released => return Err(Error::Released),
            State::Loaded => {
                self.state = State::Released;
                return Ok(());
            }
            State::Initialized | State::Prepared => {}
        }
        // The handle is released even if the plugin reports a failure; a
        // second cleanup would hit torn-down plugin state.
        self.state = State::Released;
        // SAFETY: entry point resolved at load; the library is still mapped.
        let code = unsafe { (self.api.cleanup)() };
        if code != 0 {
            return Err(Error::CleanupFailed { code });
        }
        tracing::debug!("plugin released");
        Ok(())
    }

    /// Snapshot the plugin's internal OpenCL buffers.
    ///
    /// Diagnostic only, available after [`prepare`](Self::prepare). The
    /// plugin retains ownership of the memory objects.
    pub fn debug_cl_buffers(&self) -> Result<Vec<DebugClBuffer>> {
        self.ensure_prepared()?;
        let mut len: u32 = 0;
        // SAFETY: entry point resolved at load; the plugin returns a
        // pointer into memory it owns, valid until the next lifecycle call,
        // and the entries are copied out immediately below.
        let records = unsafe { (self.api.get_dbg_ocl_mem)(&mut len) };
        // SAFETY: the plugin declared `len` entries at `records`.
        unsafe { debug::decode_cl_buffers(records, len) }
    }

    /// Snapshot the plugin's internal host buffers.
    ///
    /// Diagnostic only, available after [`prepare`](Self::prepare). The
    /// plugin retains ownership of the memory.
    pub fn debug_host_buffers(&self) -> Result<Vec<DebugHostBuffer>> {
        self.ensure_prepared()?;
        let mut len: u32 = 0;
        // SAFETY: as for debug_cl_buffers.
        let records = unsafe { (self.api.get_dbg_mem)(&mut len) };
        // SAFETY: the plugin declared `len` entries at `records`.
        unsafe { debug::decode_host_buffers(records, len) }
    }

    fn ensure_uninitialized(&self) -> Result<()> {
        match self.state {
            State::Loaded => Ok(()),
            State::Released => Err(Error::Released),
            State::Initialized | State::Prepared => Err(Error::AlreadyInitialized),
        }
    }

    fn ensure_configurable(&self) -> Result<()> {
        match self.state {
            State::Initialized => Ok(()),
            State::Loaded => Err(Error::NotInitialized),
            State::Prepared => Err(Error::ConfigAfterPrepare),
            State::Released => Err(Error::Released),
        }
    }

    fn ensure_prepared(&self) -> Result<()> {
        match self.state {
            State::Prepared => Ok(()),
            State::Released => Err(Error::Released),
            State::Loaded | State::Initialized => Err(Error::NotPrepared),
        }
    }

    fn check_counts(&self, inputs: usize, outputs: usize) -> Result<()> {
        if inputs != self.caps.num_in_buffers {
            return Err(Error::BufferCountMismatch {
                dir: BufferDirection::Input,
                expected: self.caps.num_in_buffers,
                actual: inputs,
            });
        }
        if outputs != self.caps.num_out_buffers {
            return Err(Error::BufferCountMismatch {
                dir: BufferDirection::Output,
                expected: self.caps.num_out_buffers,
                actual: outputs,
            });
        }
        Ok(())
    }
}

impl Drop for UspPlugin {
    fn drop(&mut self) {
        if matches!(self.state, State::Initialized | State::Prepared) {
            // SAFETY: entry point resolved at load; the library is still
            // mapped until the Library field drops after this.
            let code = unsafe { (self.api.cleanup)() };
            if code != 0 {
                tracing::warn!("plugin cleanup failed during drop: native code {}", code);
            }
        }
    }
}

impl std::fmt::Debug for UspPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UspPlugin")
            .field("capabilities", &self.caps)
            .field("state", &self.state)
            .finish()
    }
}

/// Plugin loader with search paths and platform library naming.
pub struct PluginLoader {
    /// Search paths for plugins.
    search_paths: Vec<PathBuf>,
}

impl PluginLoader {
    /// Create a new plugin loader with default search paths.
    pub fn new() -> Self {
        Self {
            search_paths: vec![
                // Current directory
                PathBuf::from("."),
                // Standard plugin directories
                PathBuf::from("/usr/lib/usp/plugins"),
                PathBuf::from("/usr/local/lib/usp/plugins"),
            ],
        }
    }

    /// Add a search path for plugins.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Load a plugin from a specific path.
    ///
    /// # Safety
    ///
    /// See [`UspPlugin::load`].
    pub unsafe fn load_from_path(&self, path: impl AsRef<Path>) -> Result<UspPlugin> {
        // SAFETY: forwarded to the caller.
        unsafe { UspPlugin::load(path) }
    }

    /// Load a plugin by name, searching in all search paths.
    ///
    /// The name is given without platform decoration; "bmode" searches for
    /// "libbmode.so" on Linux, "bmode.dll" on Windows, "libbmode.dylib" on
    /// macOS.
    ///
    /// # Safety
    ///
    /// See [`UspPlugin::load`].
    pub unsafe fn load_by_name(&self, name: &str) -> Result<UspPlugin> {
        let file_name = format!(
            "{}{}{}",
            std::env::consts::DLL_PREFIX,
            name,
            std::env::consts::DLL_SUFFIX
        );

        for search_path in &self.search_paths {
            let path = search_path.join(&file_name);
            if path.exists() {
                // SAFETY: forwarded to the caller.
                return unsafe { self.load_from_path(&path) };
            }
        }

        Err(Error::LoadFailed(format!(
            "plugin '{}' not found in search paths",
            name
        )))
    }

    /// Scan a directory for plugin libraries and load all of them.
    ///
    /// # Safety
    ///
    /// See [`UspPlugin::load`].
    pub unsafe fn load_all_from_dir(&self, dir: impl AsRef<Path>) -> Vec<Result<UspPlugin>> {
        let dir = dir.as_ref();
        let mut plugins = Vec::new();

        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension() == Some(std::ffi::OsStr::new(std::env::consts::DLL_EXTENSION))
                {
                    // SAFETY: forwarded to the caller.
                    plugins.push(unsafe { self.load_from_path(&path) });
                }
            }
        }

        plugins
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}
