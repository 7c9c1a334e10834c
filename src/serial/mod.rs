//! Serial port monitoring with automatic reconnect
//!
//! This module provides functionality for:
//! - Listing available serial ports
//! - Streaming device output to the console
//! - Reopening the port after resets, replugs and I/O faults

pub mod cancel;
pub mod decode;
pub mod error;
pub mod monitor;
pub mod port;
pub mod session;
pub mod state;

pub use error::MonitorError;
pub use monitor::MonitorConfig;
pub use port::{parse_baud, PortConfig};
