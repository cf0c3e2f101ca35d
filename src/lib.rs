//! # usphost
//!
//! Host-side driver for **UspPlugin** processing libraries.
//!
//! A UspPlugin is a native shared library implementing a fixed C ABI for
//! streamed signal processing: the host declares input buffer geometry,
//! the plugin prepares its internal state and declares output geometry,
//! then processing steps run over either OpenCL memory objects or plain
//! host memory. This crate does no signal processing itself; it loads the
//! library, binds the entry points, and marshals structures and opaque
//! handles across the boundary.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use usphost::prelude::*;
//!
//! // SAFETY: the plugin library is trusted.
//! let mut plugin = unsafe { UspPlugin::load("plugins/libbmode.so")? };
//!
//! let caps = plugin.capabilities();
//! plugin.initialize_cl(ctx, dev, "plugins/")?;
//! plugin.set_in_buf_size(0, BufferSize::new(SampleFormat::Float32, 1024, 1, 1))?;
//! plugin.prepare()?;
//!
//! let out_size = plugin.out_buf_size(0)?;
//! // allocate out_size.total_bytes() of device memory, fill inputs, then:
//! let done = plugin.process_clio(&[in_mem], &[out_mem], queue, in_ready)?;
//! // wait on `done` before reading the outputs
//!
//! plugin.cleanup()?;
//! ```
//!
//! ## Design
//!
//! - **Fail fast**: all twelve entry points resolve at load time; a missing
//!   symbol is a load error, never a latent crash.
//! - **Opaque hand-off**: OpenCL handles are pointer-width tokens the crate
//!   forwards untouched; it never calls into OpenCL itself.
//! - **Defined misuse**: lifecycle ordering the native contract leaves
//!   undefined (configuring after prepare, processing before it, using a
//!   released handle) is rejected host-side with typed errors.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod format;
pub mod handle;
pub mod host;
pub mod plugin;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{BufferDirection, Error, Phase, Result};
    pub use crate::format::{BufferSize, SampleFormat};
    pub use crate::handle::{ClCommandQueue, ClContext, ClDeviceId, ClEvent, ClMem};
    pub use crate::host::HostBuffer;
    pub use crate::plugin::{
        DebugClBuffer, DebugHostBuffer, PluginCapabilities, PluginLoader, UspPlugin,
    };
}

pub use error::{Error, Result};
