//! Serial Monitor
//!
//! A serial console for microcontroller logs that survives the device going
//! away. When the board resets or the cable is reseated, the port is reopened
//! every 500 ms until it comes back, and streaming resumes.
//!
//! # Usage
//!
//! ```bash
//! # Monitor at the default 115200 baud
//! serial-monitor /dev/ttyACM0
//!
//! # Monitor at a specific baud rate
//! serial-monitor COM8 921600
//!
//! # List available serial ports
//! serial-monitor --list
//! ```
//!
//! Press Ctrl+C to stop.

mod serial;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use serial::{parse_baud, MonitorConfig, MonitorError, PortConfig};

/// Serial Monitor
///
/// Streams a serial port to stdout and reconnects automatically
#[derive(Parser)]
#[command(name = "serial-monitor")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Auto-reconnecting serial monitor")]
struct Cli {
    /// Serial port (e.g., /dev/ttyUSB0, /dev/ttyACM0, COM8)
    port: Option<String>,

    /// Baud rate; falls back to 115200 if missing or not a positive number
    #[arg(allow_negative_numbers = true)]
    baud: Option<String>,

    /// Ignored
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    extra: Vec<String>,

    /// List available serial ports and exit
    #[arg(short, long)]
    list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// What a command line asks for
#[derive(Debug)]
enum Plan {
    /// No port given: print usage and exit successfully
    Usage,
    /// Print available ports
    List,
    /// Stream from a port until Ctrl+C
    Monitor(MonitorConfig),
}

fn plan(cli: &Cli) -> Plan {
    if cli.list {
        return Plan::List;
    }

    let Some(port) = cli.port.as_deref() else {
        return Plan::Usage;
    };

    let baud = parse_baud(cli.baud.as_deref());
    if let Some(arg) = cli.baud.as_deref() {
        if arg.trim().parse::<u32>().ok() != Some(baud) {
            log::debug!("baud argument {:?} not usable, using {}", arg, baud);
        }
    }
    if !cli.extra.is_empty() {
        log::debug!("ignoring extra arguments {:?}", cli.extra);
    }

    Plan::Monitor(MonitorConfig::new(PortConfig::new(port).with_baud_rate(baud)))
}

/// Fails when the binary was built without a serial backend
fn check_backend() -> Result<(), MonitorError> {
    if cfg!(feature = "serial") {
        Ok(())
    } else {
        Err(MonitorError::CapabilityMissing)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = check_backend() {
        eprintln!("{} {}", "[ERROR]".red().bold(), e);
        std::process::exit(1);
    }

    execute(plan(&cli))
}

#[cfg(feature = "serial")]
fn execute(plan: Plan) -> Result<()> {
    match plan {
        Plan::Usage => {
            print_usage();
            Ok(())
        }
        Plan::List => serial::port::print_ports(),
        Plan::Monitor(config) => {
            serial::monitor::run_monitor(config)?;
            Ok(())
        }
    }
}

#[cfg(not(feature = "serial"))]
fn execute(_plan: Plan) -> Result<()> {
    Err(MonitorError::CapabilityMissing.into())
}

#[cfg(feature = "serial")]
fn print_usage() {
    println!("Usage: serial-monitor <PORT> [BAUD]");
    println!("Example: serial-monitor COM8 115200");
    println!("         serial-monitor /dev/ttyACM0");
    println!("Use --list to see available ports.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial::port::DEFAULT_BAUD;

    fn plan_for(args: &[&str]) -> Plan {
        let cli = Cli::try_parse_from(args.iter().copied()).expect("arguments should parse");
        plan(&cli)
    }

    fn monitor_config(args: &[&str]) -> MonitorConfig {
        match plan_for(args) {
            Plan::Monitor(config) => config,
            other => panic!("expected monitor plan, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_port_prints_usage() {
        assert!(matches!(plan_for(&["serial-monitor"]), Plan::Usage));
        assert!(matches!(plan_for(&["serial-monitor", "-v"]), Plan::Usage));
    }

    #[test]
    fn test_list_does_not_need_port() {
        assert!(matches!(plan_for(&["serial-monitor", "--list"]), Plan::List));
        assert!(matches!(plan_for(&["serial-monitor", "-l", "COM8"]), Plan::List));
    }

    #[test]
    fn test_port_and_baud() {
        let config = monitor_config(&["serial-monitor", "/dev/ttyACM0", "921600"]);
        assert_eq!(config.port_config.port_path, "/dev/ttyACM0");
        assert_eq!(config.port_config.baud_rate, 921600);
    }

    #[test]
    fn test_baud_defaults_when_omitted() {
        let config = monitor_config(&["serial-monitor", "COM8"]);
        assert_eq!(config.port_config.baud_rate, DEFAULT_BAUD);
    }

    #[test]
    fn test_unusable_baud_behaves_like_omitted() {
        for baud in ["abc", "0", "-9600"] {
            let config = monitor_config(&["serial-monitor", "COM8", baud]);
            assert_eq!(config.port_config.baud_rate, DEFAULT_BAUD, "baud {:?}", baud);
            assert_eq!(config.port_config.port_path, "COM8");
        }
    }

    #[test]
    fn test_extra_arguments_are_ignored() {
        let config = monitor_config(&["serial-monitor", "COM8", "115200", "extra", "--more"]);
        assert_eq!(config.port_config.port_path, "COM8");
        assert_eq!(config.port_config.baud_rate, 115200);
    }

    #[test]
    fn test_backend_matches_build_features() {
        let result = check_backend();
        assert_eq!(result.is_ok(), cfg!(feature = "serial"));
        if let Err(e) = result {
            assert!(matches!(e, MonitorError::CapabilityMissing));
            assert!(e.to_string().contains("--features serial"));
        }
    }
}
