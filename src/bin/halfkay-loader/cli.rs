use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "halfkay-loader")]
#[command(about = "Teensy 4.x flasher CLI (HalfKay)")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Flash a firmware package (.zip) or Intel HEX file to a Teensy in HalfKay mode.
    Flash(FlashArgs),

    /// Ask running firmware to reboot via the 134 baud serial trick.
    Reset(ResetArgs),

    /// List detected HalfKay devices and PJRC USB serial ports.
    List(ListArgs),

    /// Print text the firmware sends through the raw-HID SerEMU interface.
    Monitor(MonitorArgs),
}

#[derive(Parser)]
pub struct FlashArgs {
    /// Firmware package (.zip with a firmware* entry) or Intel HEX file.
    pub firmware: PathBuf,

    /// Wait for a HalfKay device to appear.
    #[arg(long)]
    pub wait: bool,

    /// Max time to wait for device (0 = forever).
    #[arg(long, default_value_t = 0, requires = "wait")]
    pub wait_timeout_ms: u64,

    /// Do not reboot after programming.
    #[arg(long)]
    pub no_reboot: bool,

    /// Emit JSON line events to stdout.
    #[arg(long)]
    pub json: bool,

    /// Include monotonic timestamps in JSON events (milliseconds since process start).
    #[arg(long, requires = "json")]
    pub json_timestamps: bool,

    /// More logs to stderr.
    #[arg(long, short)]
    pub verbose: bool,
}

impl FlashArgs {
    pub fn wait_timeout(&self) -> Option<Duration> {
        if self.wait_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.wait_timeout_ms))
        }
    }
}

#[derive(Parser)]
pub struct ResetArgs {
    /// Reset this serial port instead of the first PJRC port found (e.g. COM6).
    #[arg(long)]
    pub serial_port: Option<String>,

    /// Emit JSON line events to stdout.
    #[arg(long)]
    pub json: bool,

    /// More logs to stderr.
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Parser)]
pub struct ListArgs {
    /// Emit JSON line output.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct MonitorArgs {
    /// Stop after this long (0 = until the device goes away).
    #[arg(long, default_value_t = 0)]
    pub duration_ms: u64,

    /// Emit JSON line events to stdout.
    #[arg(long)]
    pub json: bool,

    /// More logs to stderr.
    #[arg(long, short)]
    pub verbose: bool,
}

impl MonitorArgs {
    pub fn duration(&self) -> Option<Duration> {
        if self.duration_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.duration_ms))
        }
    }
}
