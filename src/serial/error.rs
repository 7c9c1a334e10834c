//! Error types for the serial monitor
//!
//! Device errors are recoverable and drive the reconnect loop. Monitor errors
//! are the few conditions that end the process.

use std::io;
use thiserror::Error;

/// A device-level failure: the port could not be opened or an open port faulted.
///
/// These never escape the reconnect loop; they are reported and retried.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Opening the port failed (missing device, busy, permission denied, ...)
    #[error("could not open {port}: {reason}")]
    Open { port: String, reason: String },

    /// An established connection faulted (device removed, I/O error)
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Conditions that stop the monitor itself.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The binary was built without a serial backend
    #[error(
        "serial port support is not available in this build; \
         rebuild with `cargo build --release --features serial`"
    )]
    CapabilityMissing,

    /// Standard output can no longer be written
    #[error("failed to write to console")]
    Console(#[source] io::Error),

    /// The Ctrl+C handler could not be installed
    #[error("failed to install Ctrl+C handler")]
    Signal(#[source] io::Error),
}
