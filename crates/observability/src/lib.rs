//! Shared tracing setup for the relay binaries.

/// Initialize process-wide tracing with settings read from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::TracingConfig::from_env());
}

/// Subscriber configuration (filters, output format).
pub mod tracing;
