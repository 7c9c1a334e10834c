//! Reconnecting serial monitor
//!
//! Streams everything a device prints to the console and keeps doing so across
//! resets and replugs:
//! - Opens the port, retrying forever at a constant backoff
//! - Writes received text as-is (terminators preserved, invalid UTF-8 replaced)
//! - Stops cleanly on Ctrl+C, closing the port on the way out

use super::cancel::CancelToken;
use super::decode::TextDecoder;
use super::error::{DeviceError, MonitorError};
use super::port::PortConfig;
use super::session::{Connector, Session};
use super::state::{Action, LinkEvent, LinkState};
use colored::Colorize;
use std::io::{self, Write};
use std::time::Duration;

/// Wait between a disconnect and the next open attempt
pub const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// Configuration for serial monitoring
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Port configuration
    pub port_config: PortConfig,
    /// Constant delay before reopening after a device error
    pub backoff: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port_config: PortConfig::default(),
            backoff: RECONNECT_BACKOFF,
        }
    }
}

impl MonitorConfig {
    pub fn new(port_config: PortConfig) -> Self {
        Self {
            port_config,
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Result of an open attempt
pub enum OpenOutcome<S> {
    Opened(S),
    DeviceError(DeviceError),
    Cancelled,
}

/// Result of a read on the current session
pub enum ReadOutcome {
    Data(Vec<u8>),
    Timeout,
    DeviceError(DeviceError),
    Cancelled,
}

/// Counters collected over a monitor run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MonitorStats {
    /// Successful opens
    pub connects: usize,
    /// Device errors, including failed opens
    pub disconnects: usize,
    /// Bytes received from the device
    pub bytes: usize,
}

/// Reconnecting line reader over any [`Connector`]
pub struct SerialMonitor<C: Connector, W: Write> {
    config: MonitorConfig,
    connector: C,
    console: W,
    cancel: CancelToken,
    state: LinkState,
    session: Option<C::Session>,
    decoder: TextDecoder,
    mid_line: bool,
    stats: MonitorStats,
}

impl<C: Connector, W: Write> SerialMonitor<C, W> {
    /// Create a new monitor writing to `console`
    pub fn new(config: MonitorConfig, connector: C, console: W, cancel: CancelToken) -> Self {
        Self {
            config,
            connector,
            console,
            cancel,
            state: LinkState::Disconnected,
            session: None,
            decoder: TextDecoder::new(),
            mid_line: false,
            stats: MonitorStats::default(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Run until cancelled.
    ///
    /// Device errors are reported and retried; only a console write failure
    /// ends the run early.
    pub fn run(&mut self) -> Result<MonitorStats, MonitorError> {
        while !self.state.is_terminal() {
            if let Err(e) = self.step() {
                self.close_session();
                return Err(e);
            }
        }
        Ok(self.stats.clone())
    }

    /// Advance the state machine by one suspension point
    fn step(&mut self) -> Result<(), MonitorError> {
        let mut data = None;
        let mut fault = None;

        let event = match self.state {
            LinkState::Disconnected => match self.try_open() {
                OpenOutcome::Opened(session) => {
                    self.session = Some(session);
                    LinkEvent::OpenSucceeded
                }
                OpenOutcome::DeviceError(e) => {
                    fault = Some(e);
                    LinkEvent::DeviceFaulted
                }
                OpenOutcome::Cancelled => LinkEvent::CancelRequested,
            },
            LinkState::Connected => match self.poll_read() {
                ReadOutcome::Data(bytes) => {
                    data = Some(bytes);
                    LinkEvent::ReadReturnedData
                }
                ReadOutcome::Timeout => LinkEvent::ReadTimedOut,
                ReadOutcome::DeviceError(e) => {
                    fault = Some(e);
                    LinkEvent::DeviceFaulted
                }
                ReadOutcome::Cancelled => LinkEvent::CancelRequested,
            },
            LinkState::Stopped => return Ok(()),
        };

        let (next, action) = self.state.on(event);
        if next != self.state {
            log::debug!("{:?} -> {:?} on {:?}", self.state, next, event);
        }
        self.state = next;

        match action {
            Action::AnnounceConnected => {
                self.stats.connects += 1;
                let msg = format!(
                    "connected to {} @ {}",
                    self.config.port_config.port_path, self.config.port_config.baud_rate
                );
                self.notice(&msg)?;
            }
            Action::Emit => {
                if let Some(bytes) = data {
                    self.emit(&bytes)?;
                }
            }
            Action::Backoff => {
                self.end_session()?;
                self.stats.disconnects += 1;
                let detail = fault.map(|e| e.to_string()).unwrap_or_default();
                self.notice(&format!("disconnected: {}", detail))?;
                if self.cancel.sleep(self.config.backoff) {
                    log::debug!("backoff interrupted by cancellation");
                }
            }
            Action::AnnounceStopped => {
                self.end_session()?;
                // Ctrl+C is echoed on the current terminal line
                self.mid_line = true;
                self.notice("stopped by user")?;
            }
            Action::Idle => {}
        }

        Ok(())
    }

    fn try_open(&mut self) -> OpenOutcome<C::Session> {
        if self.cancel.is_cancelled() {
            return OpenOutcome::Cancelled;
        }
        log::debug!(
            "opening {} at {} baud",
            self.config.port_config.port_path,
            self.config.port_config.baud_rate
        );
        match self.connector.open(&self.config.port_config) {
            Ok(session) => OpenOutcome::Opened(session),
            Err(e) => OpenOutcome::DeviceError(e),
        }
    }

    fn poll_read(&mut self) -> ReadOutcome {
        if self.cancel.is_cancelled() {
            return ReadOutcome::Cancelled;
        }
        let Some(session) = self.session.as_mut() else {
            return ReadOutcome::DeviceError(DeviceError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "no open session",
            )));
        };
        match session.read_chunk() {
            Ok(Some(bytes)) if !bytes.is_empty() => ReadOutcome::Data(bytes),
            Ok(_) => ReadOutcome::Timeout,
            Err(e) => ReadOutcome::DeviceError(e),
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<(), MonitorError> {
        self.stats.bytes += bytes.len();
        let text = self.decoder.decode(bytes);
        self.write_text(&text)
    }

    /// Close the session and flush a held-back partial character
    fn end_session(&mut self) -> Result<(), MonitorError> {
        self.close_session();
        if let Some(rest) = self.decoder.finish() {
            self.write_text(&rest)?;
        }
        Ok(())
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session);
            log::debug!("closed {}", self.config.port_config.port_path);
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), MonitorError> {
        if text.is_empty() {
            return Ok(());
        }
        self.console
            .write_all(text.as_bytes())
            .and_then(|_| self.console.flush())
            .map_err(MonitorError::Console)?;
        self.mid_line = !text.ends_with('\n');
        Ok(())
    }

    /// Print a status line, starting on a fresh line
    fn notice(&mut self, msg: &str) -> Result<(), MonitorError> {
        let lead = if self.mid_line { "\n" } else { "" };
        writeln!(self.console, "{}{} {}", lead, "[serial]".cyan().bold(), msg)
            .and_then(|_| self.console.flush())
            .map_err(MonitorError::Console)?;
        self.mid_line = false;
        Ok(())
    }
}

/// Monitor a real serial port until Ctrl+C
#[cfg(feature = "serial")]
pub fn run_monitor(config: MonitorConfig) -> anyhow::Result<MonitorStats> {
    use super::cancel::install_ctrlc_handler;
    use super::port::SerialConnector;
    use anyhow::Context;

    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())
        .map_err(MonitorError::Signal)
        .context("Ctrl+C handling is required to stop the monitor cleanly")?;

    log::info!(
        "monitoring {} at {} baud (backoff {:?}), press Ctrl+C to stop",
        config.port_config.port_path,
        config.port_config.baud_rate,
        config.backoff
    );

    let stdout = io::stdout().lock();
    let mut monitor = SerialMonitor::new(config, SerialConnector, stdout, cancel);
    let stats = monitor.run()?;

    log::info!(
        "{:?}: {} connects, {} disconnects, {} bytes received",
        monitor.state(),
        stats.connects,
        stats.disconnects,
        stats.bytes
    );
    Ok(stats)
}
