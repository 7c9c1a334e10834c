//! Device access seam for the reconnect loop
//!
//! The monitor only needs to open a port and pull line-sized chunks from it.
//! The serialport backend implements these traits; tests use in-memory fakes.

use super::error::DeviceError;
use super::port::PortConfig;

/// One open connection to a device.
///
/// Dropping the session closes the underlying handle.
pub trait Session {
    /// Read the next chunk of bytes.
    ///
    /// Returns `Ok(None)` when the read timeout elapsed without data. A
    /// returned chunk is never empty.
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, DeviceError>;
}

/// Opens sessions for a port configuration.
pub trait Connector {
    type Session: Session;

    /// Attempt to open the configured port
    fn open(&mut self, config: &PortConfig) -> Result<Self::Session, DeviceError>;
}
