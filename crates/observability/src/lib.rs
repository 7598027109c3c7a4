//! Tracing/logging setup shared by connector processes and tests.

/// Initialize process-wide tracing using the format selected by
/// `CONNECTOR_LOG_FORMAT` (`json` by default, `pretty` for local runs).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use self::tracing::LogFormat;
