//! Integration tests for the public plugin-host API.
//!
//! Everything here goes through the crate surface only; the lifecycle state
//! machine has its own tests next to the loader, driven by in-process mock
//! entry points.

use usphost::error::Phase;
use usphost::format::{BufferSize, SampleFormat};
use usphost::host::HostBuffer;
use usphost::plugin::PluginLoader;
use usphost::prelude::*;

// ============================================================================
// Buffer geometry
// ============================================================================

#[test]
fn test_extents_follow_from_counts_for_every_format() {
    for format in SampleFormat::ALL {
        let size = BufferSize::new(format, 33, 9, 2);
        assert_eq!(size.width_len(), 33 * format.sample_bytes());
        assert_eq!(size.height_len(), size.width_len() * 9);
        assert_eq!(size.depth_len(), 2 * size.height_len());
    }
}

#[test]
fn test_float32_scan_line_geometry() {
    let size = BufferSize::new(SampleFormat::Float32, 1024, 1, 1);
    assert_eq!(size.width_len(), 4096);
    assert_eq!(size.height_len(), 4096);
    assert_eq!(size.depth_len(), 4096);
}

#[test]
fn test_iq_plane_geometry() {
    let size = BufferSize::new(SampleFormat::Int16x2, 8, 4, 1);
    assert_eq!(size.format().sample_bytes(), 4);
    assert_eq!(size.width_len(), 32);
    assert_eq!(size.height_len(), 128);
    assert_eq!(size.depth_len(), 128);
}

#[test]
fn test_interleaved_formats_double_the_sample_width() {
    assert_eq!(
        SampleFormat::Int16x2.sample_bytes(),
        2 * SampleFormat::Int16.sample_bytes()
    );
    assert_eq!(
        SampleFormat::Float32x2.sample_bytes(),
        2 * SampleFormat::Float32.sample_bytes()
    );
    assert_eq!(SampleFormat::Int16x2.components(), 2);
    assert_eq!(SampleFormat::Int16.components(), 1);
}

// ============================================================================
// Host buffers
// ============================================================================

#[test]
fn test_host_buffer_allocates_full_depth() {
    let size = BufferSize::new(SampleFormat::Float32x2, 128, 16, 2);
    let buf = HostBuffer::new(size);
    assert_eq!(buf.len(), size.total_bytes());
    assert_eq!(buf.len(), 128 * 8 * 16 * 2);
    assert!(buf.as_slice().iter().all(|&b| b == 0));
}

// ============================================================================
// Loading failures
// ============================================================================

#[test]
fn test_load_missing_library_is_load_phase() {
    let result = unsafe { UspPlugin::load("/nonexistent/libnothing.so") };
    let err = result.err().expect("loading must fail");
    assert!(matches!(err, Error::LoadFailed(_)));
    assert_eq!(err.phase(), Phase::Load);
    assert_eq!(err.native_code(), None);
}

#[test]
fn test_loader_name_search_misses() {
    let loader = PluginLoader::new();
    let result = unsafe { loader.load_by_name("no_such_usp_plugin") };
    assert!(matches!(result, Err(Error::LoadFailed(_))));
}

#[test]
fn test_loader_scans_only_dynamic_libraries() {
    // An empty directory yields no load attempts at all.
    let dir = std::env::temp_dir().join("usphost-empty-scan");
    std::fs::create_dir_all(&dir).unwrap();
    let loader = PluginLoader::new();
    let results = unsafe { loader.load_all_from_dir(&dir) };
    assert!(results.is_empty());
}

// ============================================================================
// Error taxonomy
// ============================================================================

#[test]
fn test_every_native_failure_carries_its_code() {
    let errors = [
        Error::InitFailed { code: -1 },
        Error::ParamsRejected { code: 2 },
        Error::PrepareFailed { code: 3 },
        Error::ProcessFailed { code: 4 },
        Error::CleanupFailed { code: 5 },
    ];
    for err in &errors {
        assert!(err.native_code().is_some(), "{err}");
    }
}

#[test]
fn test_phases_cover_the_lifecycle() {
    assert_eq!(Error::MissingEntryPoint("ProcessCLIO").phase(), Phase::Load);
    assert_eq!(
        Error::InitializerMismatch { needs_opencl: true }.phase(),
        Phase::Init
    );
    assert_eq!(Error::ConfigAfterPrepare.phase(), Phase::Config);
    assert_eq!(Error::InputNotConfigured(0).phase(), Phase::Prepare);
    assert_eq!(
        Error::BufferCountMismatch {
            dir: BufferDirection::Output,
            expected: 1,
            actual: 0,
        }
        .phase(),
        Phase::Process
    );
    assert_eq!(Error::CleanupFailed { code: 1 }.phase(), Phase::Cleanup);
}
