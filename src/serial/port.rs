//! Serial port configuration and connection management
//!
//! Handles port discovery and line-oriented reads from USB-to-serial adapters
//! and native UARTs.

use super::error::DeviceError;
use std::io::{self, ErrorKind, Read};
use std::time::Duration;

#[cfg(feature = "serial")]
use super::session::{Connector, Session};
#[cfg(feature = "serial")]
use anyhow::{Context, Result};
#[cfg(feature = "serial")]
use colored::Colorize;
#[cfg(feature = "serial")]
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Baud rate used when none (or an unusable one) is given
pub const DEFAULT_BAUD: u32 = 115200;

/// Bounded wait for each read; a timeout yields no data, not an error
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest chunk returned before a line terminator is seen
pub const MAX_LINE_LEN: usize = 4096;

/// Configuration for serial port connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, COM8)
    pub port_path: String,
    /// Baud rate (default: 115200)
    pub baud_rate: u32,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl PortConfig {
    /// Create a new configuration with default settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Parse a baud rate argument, falling back to [`DEFAULT_BAUD`].
///
/// Missing, non-numeric and zero values are not errors.
pub fn parse_baud(arg: Option<&str>) -> u32 {
    arg.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&baud| baud > 0)
        .unwrap_or(DEFAULT_BAUD)
}

/// Splits a timed byte stream into line-sized chunks
#[derive(Debug, Default)]
pub struct LineReader {
    pending: Vec<u8>,
}

impl LineReader {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(256),
        }
    }

    /// Read up to and including the next `\n` from `src`.
    ///
    /// A partial line is returned when the read times out or the line grows
    /// past [`MAX_LINE_LEN`]. `Ok(None)` means the timeout passed with nothing
    /// buffered. End of file is a device error: a port that polls ready but
    /// yields no bytes has gone away.
    pub fn read_line<R: Read + ?Sized>(
        &mut self,
        src: &mut R,
    ) -> Result<Option<Vec<u8>>, DeviceError> {
        let mut chunk = [0u8; 256];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                return Ok(Some(self.pending.drain(..=pos).collect()));
            }
            if self.pending.len() >= MAX_LINE_LEN {
                return Ok(self.take_pending());
            }

            match src.read(&mut chunk) {
                Ok(0) => {
                    if self.pending.is_empty() {
                        return Err(DeviceError::Io(io::Error::new(
                            ErrorKind::UnexpectedEof,
                            "device reported end of file",
                        )));
                    }
                    return Ok(self.take_pending());
                }
                Ok(n) => {
                    log::trace!("read {} bytes", n);
                    self.pending.extend_from_slice(&chunk[..n]);
                }
                Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(self.take_pending());
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Hand out what already arrived; the fault resurfaces on the next read
                    if !self.pending.is_empty() {
                        log::debug!("read failed with {} bytes buffered: {}", self.pending.len(), e);
                        return Ok(self.take_pending());
                    }
                    return Err(DeviceError::Io(e));
                }
            }
        }
    }

    fn take_pending(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// An open serial port yielding line-sized chunks
#[cfg(feature = "serial")]
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    lines: LineReader,
}

#[cfg(feature = "serial")]
impl SerialConnection {
    /// Open a serial connection (8N1, no flow control)
    pub fn open(config: &PortConfig) -> Result<Self, DeviceError> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|e| DeviceError::Open {
                port: config.port_path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            port,
            lines: LineReader::new(),
        })
    }
}

#[cfg(feature = "serial")]
impl Session for SerialConnection {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, DeviceError> {
        self.lines.read_line(&mut self.port)
    }
}

/// Opens real serial ports through the `serialport` crate
#[cfg(feature = "serial")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

#[cfg(feature = "serial")]
impl Connector for SerialConnector {
    type Session = SerialConnection;

    fn open(&mut self, config: &PortConfig) -> Result<SerialConnection, DeviceError> {
        SerialConnection::open(config)
    }
}

/// Information about a detected serial port
#[cfg(feature = "serial")]
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub path: String,
    pub port_type: PortType,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

#[cfg(feature = "serial")]
#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    UsbSerial,
    PciSerial,
    Bluetooth,
    Unknown,
}

#[cfg(feature = "serial")]
impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::UsbSerial => write!(f, "USB Serial"),
            PortType::PciSerial => write!(f, "PCI Serial"),
            PortType::Bluetooth => write!(f, "Bluetooth"),
            PortType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// List all available serial ports
#[cfg(feature = "serial")]
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;

    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            serialport::SerialPortType::UsbPort(info) => PortInfo {
                path: p.port_name,
                port_type: PortType::UsbSerial,
                manufacturer: info.manufacturer,
                product: info.product,
                vid: Some(info.vid),
                pid: Some(info.pid),
            },
            other => PortInfo {
                path: p.port_name,
                port_type: match other {
                    serialport::SerialPortType::PciPort => PortType::PciSerial,
                    serialport::SerialPortType::BluetoothPort => PortType::Bluetooth,
                    _ => PortType::Unknown,
                },
                manufacturer: None,
                product: None,
                vid: None,
                pid: None,
            },
        })
        .collect())
}

/// Print formatted list of available serial ports
#[cfg(feature = "serial")]
pub fn print_ports() -> Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("\n{}", "Troubleshooting tips:".cyan().bold());
        println!("  1. Connect the device or USB-to-serial adapter");
        println!("  2. Linux: ls -la /dev/ttyUSB* /dev/ttyACM*");
        println!("  3. Linux: sudo usermod -aG dialout $USER");
        println!("  4. Windows: check Device Manager under \"Ports (COM & LPT)\"");
        return Ok(());
    }

    println!("{}", "Available Serial Ports:".green().bold());
    for port in ports {
        println!("\n  {}", port.path.white().bold());
        println!("    Type: {}", port.port_type);
        if let Some(ref mfg) = port.manufacturer {
            println!("    Manufacturer: {}", mfg);
        }
        if let Some(ref prod) = port.product {
            println!("    Product: {}", prod);
        }
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            println!("    VID:PID: {:04x}:{:04x}", vid, pid);
        }
    }
    println!("\n{}", "Use: serial-monitor <PORT> [BAUD] to start monitoring".yellow());

    Ok(())
}
