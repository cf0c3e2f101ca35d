//! Loading and driving UspPlugin processing libraries.
//!
//! A plugin is a shared library that exports a fixed set of C entry points:
//!
//! ```c
//! void GetPluginInfo(PluginInfo* info);
//! int  Initialize(const char* path);
//! int  InitializeCL(cl_context ctx, cl_device_id dev, const char* path);
//! int  Cleanup(void);
//! int  SetParams(float* fp, size_t nfp, int* ip, size_t nip);
//! int  SetInBufSize(BuffSize* size, int index);
//! int  Prepare(void);
//! int  GetOutBufSize(BuffSize* size, int index);
//! int  ProcessCLIO(cl_mem* in, size_t nin, cl_mem* out, size_t nout,
//!                  cl_command_queue queue, cl_event in_ready, cl_event* out_done);
//! int  ProcessMemIO(void* in[], size_t nin, void* out[], size_t nout);
//! DbgOclMem* GetDbgOclMem(uint32_t* len);
//! DbgMem*    GetDbgMem(uint32_t* len);
//! ```
//!
//! Every entry point is mandatory and resolved once at load time. All
//! non-void entry points report failure through a non-zero return code;
//! the binding surfaces the first failure as a typed [`crate::Error`]
//! without masking or retrying it.
//!
//! # Lifecycle
//!
//! ```text
//! load ─> initialize | initialize_cl ─> set_in_buf_size* , set_params?
//!      ─> prepare ─> { out_buf_size, process_clio | process_mem_io,
//!                      debug_cl_buffers, debug_host_buffers }* ─> cleanup
//! ```
//!
//! Out-of-order calls the native contract leaves undefined are rejected by
//! the binding itself; see [`crate::error::Error`].

mod abi;
mod debug;
mod loader;

pub use abi::{
    BuffSize, CleanupFn, DbgMem, DbgOclMem, GetDbgMemFn, GetDbgOclMemFn, GetOutBufSizeFn,
    GetPluginInfoFn, InitializeClFn, InitializeFn, PluginCapabilities, PluginInfo, PrepareFn,
    ProcessClIoFn, ProcessMemIoFn, SetInBufSizeFn, SetParamsFn,
};
pub use debug::{DebugClBuffer, DebugHostBuffer};
pub use loader::{PluginLoader, UspPlugin};
