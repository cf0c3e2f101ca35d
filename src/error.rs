//! Error types for usphost.

use std::ffi::c_int;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using usphost's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Lifecycle phase an [`Error`] belongs to.
///
/// Every error maps onto exactly one phase of the plugin lifecycle, whether
/// it was reported by the native plugin or detected by the binding before
/// the call crossed the FFI boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Loading the shared library and resolving entry points.
    Load,
    /// `Initialize` / `InitializeCL`.
    Init,
    /// Buffer and parameter configuration, including geometry queries.
    Config,
    /// `Prepare`.
    Prepare,
    /// `ProcessCLIO` / `ProcessMemIO`.
    Process,
    /// `Cleanup`.
    Cleanup,
}

/// Which side of the plugin a buffer index refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferDirection {
    /// An input buffer.
    Input,
    /// An output buffer.
    Output,
}

impl std::fmt::Display for BufferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Main error type for usphost operations.
///
/// Variants triggered by a non-zero native return carry the raw code,
/// available through [`Error::native_code`]. Variants for caller errors the
/// native contract leaves unspecified are detected by the binding and never
/// reach the plugin.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load the shared library.
    #[error("failed to load plugin library: {0}")]
    LoadFailed(String),

    /// The plugin doesn't export a required entry point.
    #[error("missing plugin entry point: {0}")]
    MissingEntryPoint(&'static str),

    /// The plugin's capability descriptor failed validation.
    #[error("invalid plugin capabilities: {0}")]
    InvalidCapabilities(&'static str),

    /// A resource path cannot be passed across the C boundary.
    #[error("resource path {0:?} contains an interior NUL byte")]
    InvalidPath(PathBuf),

    /// Native initialization returned a non-zero code.
    #[error("plugin initialization failed: native code {code}")]
    InitFailed {
        /// Raw return code from the plugin.
        code: c_int,
    },

    /// The plugin was initialized a second time.
    #[error("plugin is already initialized")]
    AlreadyInitialized,

    /// The initializer variant contradicts the plugin's `UseOpenCL` bit.
    #[error("initializer does not match plugin capabilities (uses_opencl = {needs_opencl})")]
    InitializerMismatch {
        /// Whether the plugin requires OpenCL initialization.
        needs_opencl: bool,
    },

    /// A lifecycle operation ran before `initialize`/`initialize_cl`.
    #[error("plugin is not initialized")]
    NotInitialized,

    /// A buffer index is outside the range the plugin declares.
    #[error("{dir} buffer index {index} out of range (plugin declares {count})")]
    BufferIndexOutOfRange {
        /// Which buffer list the index refers to.
        dir: BufferDirection,
        /// The offending index.
        index: usize,
        /// Number of buffers the plugin declares.
        count: usize,
    },

    /// The plugin rejected a buffer size or geometry query.
    #[error("plugin rejected {dir} buffer {index} configuration: native code {code}")]
    ConfigRejected {
        /// Which buffer list the index refers to.
        dir: BufferDirection,
        /// The buffer index.
        index: usize,
        /// Raw return code from the plugin.
        code: c_int,
    },

    /// The plugin rejected the scalar parameter arrays.
    #[error("plugin rejected parameters: native code {code}")]
    ParamsRejected {
        /// Raw return code from the plugin.
        code: c_int,
    },

    /// Sizes and parameters are frozen once `prepare` has run.
    #[error("buffer configuration is frozen after prepare")]
    ConfigAfterPrepare,

    /// An operation that requires `prepare` ran before it.
    #[error("plugin is not prepared")]
    NotPrepared,

    /// `prepare` was called a second time.
    #[error("plugin is already prepared")]
    AlreadyPrepared,

    /// `prepare` was called before every input buffer was sized.
    #[error("input buffer {0} has no configured size")]
    InputNotConfigured(usize),

    /// Native `Prepare` returned a non-zero code.
    #[error("plugin prepare failed: native code {code}")]
    PrepareFailed {
        /// Raw return code from the plugin.
        code: c_int,
    },

    /// A process call passed the wrong number of buffers.
    #[error("expected {expected} {dir} buffers, got {actual}")]
    BufferCountMismatch {
        /// Which buffer list mismatched.
        dir: BufferDirection,
        /// Count the plugin declares.
        expected: usize,
        /// Count the caller passed.
        actual: usize,
    },

    /// `process_clio` was called but the plugin's buffers are not
    /// OpenCL memory objects.
    #[error("plugin does not process OpenCL memory objects")]
    ClIoUnsupported,

    /// `process_mem_io` was called but the plugin's buffers are not
    /// host memory.
    #[error("plugin does not process host memory buffers")]
    MemIoUnsupported,

    /// A host buffer is smaller than the configured geometry requires.
    #[error("{dir} buffer {index} is too small: {actual} bytes, need {expected}")]
    BufferTooSmall {
        /// Which buffer list the index refers to.
        dir: BufferDirection,
        /// The buffer index.
        index: usize,
        /// Bytes required by the configured geometry.
        expected: usize,
        /// Bytes the caller provided.
        actual: usize,
    },

    /// Native processing returned a non-zero code.
    #[error("plugin processing failed: native code {code}")]
    ProcessFailed {
        /// Raw return code from the plugin.
        code: c_int,
    },

    /// Native `Cleanup` returned a non-zero code.
    #[error("plugin cleanup failed: native code {code}")]
    CleanupFailed {
        /// Raw return code from the plugin.
        code: c_int,
    },

    /// The handle was used after `cleanup`.
    #[error("plugin handle has been released")]
    Released,

    /// The plugin reported a sample format value outside the known set.
    #[error("unknown sample format value {0}")]
    UnknownSampleFormat(c_int),
}

impl Error {
    /// The lifecycle phase this error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            Self::LoadFailed(_) | Self::MissingEntryPoint(_) | Self::InvalidCapabilities(_) => {
                Phase::Load
            }
            Self::InvalidPath(_)
            | Self::InitFailed { .. }
            | Self::AlreadyInitialized
            | Self::InitializerMismatch { .. } => Phase::Init,
            Self::NotInitialized
            | Self::BufferIndexOutOfRange { .. }
            | Self::ConfigRejected { .. }
            | Self::ParamsRejected { .. }
            | Self::ConfigAfterPrepare
            | Self::NotPrepared
            | Self::Released
            | Self::UnknownSampleFormat(_) => Phase::Config,
            Self::AlreadyPrepared | Self::InputNotConfigured(_) | Self::PrepareFailed { .. } => {
                Phase::Prepare
            }
            Self::BufferCountMismatch { .. }
            | Self::ClIoUnsupported
            | Self::MemIoUnsupported
            | Self::BufferTooSmall { .. }
            | Self::ProcessFailed { .. } => Phase::Process,
            Self::CleanupFailed { .. } => Phase::Cleanup,
        }
    }

    /// The raw native return code, for errors reported by the plugin itself.
    pub fn native_code(&self) -> Option<c_int> {
        match self {
            Self::InitFailed { code }
            | Self::ConfigRejected { code, .. }
            | Self::ParamsRejected { code }
            | Self::PrepareFailed { code }
            | Self::ProcessFailed { code }
            | Self::CleanupFailed { code } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_mapping() {
        assert_eq!(Error::LoadFailed("x".into()).phase(), Phase::Load);
        assert_eq!(Error::MissingEntryPoint("Prepare").phase(), Phase::Load);
        assert_eq!(Error::InitFailed { code: -1 }.phase(), Phase::Init);
        assert_eq!(Error::NotPrepared.phase(), Phase::Config);
        assert_eq!(Error::AlreadyPrepared.phase(), Phase::Prepare);
        assert_eq!(Error::ProcessFailed { code: 3 }.phase(), Phase::Process);
        assert_eq!(Error::CleanupFailed { code: 3 }.phase(), Phase::Cleanup);
    }

    #[test]
    fn test_native_code_exposed() {
        assert_eq!(Error::InitFailed { code: -2 }.native_code(), Some(-2));
        assert_eq!(Error::ProcessFailed { code: 9 }.native_code(), Some(9));
        assert_eq!(Error::NotPrepared.native_code(), None);
        assert_eq!(Error::LoadFailed("x".into()).native_code(), None);
    }

    #[test]
    fn test_direction_display() {
        let err = Error::BufferCountMismatch {
            dir: BufferDirection::Input,
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "expected 2 input buffers, got 1");
    }
}
