//! Process-wide GDAL setup.
//!
//! GDAL keeps a global driver registry and a global error channel. Both are
//! set up exactly once per process and never torn down by this crate; drivers
//! stay registered for every later query, on every thread.
//!
//! GDAL records the last error per thread even after a handler has seen it,
//! and the `gdal` crate reads that record when a call fails. Call
//! [`reset_errors`] before any call whose failure we report.

use gdal::config;
use gdal::errors::CplErrType;
use gdal::DriverManager;
use std::sync::Once;

static INIT: Once = Once::new();

/// Register all GDAL drivers and route CPL errors into `tracing`.
///
/// Safe to call any number of times from any thread.
pub fn ensure_initialized() {
    INIT.call_once(|| {
        DriverManager::register_all();
        config::set_error_handler(|class, number, message| match class {
            CplErrType::None | CplErrType::Debug => {
                tracing::trace!(target: "gdal", code = number, "{}", message)
            }
            CplErrType::Warning => tracing::warn!(target: "gdal", code = number, "{}", message),
            CplErrType::Failure | CplErrType::Fatal => {
                tracing::debug!(target: "gdal", code = number, "{}", message)
            }
        });
        tracing::debug!("GDAL initialized with {} drivers", DriverManager::count());
    });
}

/// Clear the calling thread's last CPL error.
pub fn reset_errors() {
    unsafe { gdal_sys::CPLErrorReset() };
}
