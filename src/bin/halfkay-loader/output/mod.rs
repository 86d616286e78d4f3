use halfkay_loader::hid::HidDeviceSummary;
use halfkay_loader::serial::SerialPortSummary;
use halfkay_loader::sink::ProgressSink;

use crate::cli;

pub mod human;
pub mod json;


#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub verbose: bool,
    pub json_timestamps: bool,
}

/// Front end for one CLI command. Library progress arrives through the
/// `ProgressSink` half; the rest is driven by the command itself.
pub trait Reporter: ProgressSink {
    fn firmware_loaded(&mut self, name: &str, bytes: usize, blocks: usize);
    fn no_device(&mut self);
    fn error(&mut self, code: i32, message: &str);
    fn exit(&mut self, code: i32);
    fn list(&mut self, devices: &[HidDeviceSummary], ports: &[SerialPortSummary]);
    /// Device output, passed through as received.
    fn text(&mut self, text: &str);
    fn finish(&mut self);
}

pub fn make_for_flash(args: &cli::FlashArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose: args.verbose,
        json_timestamps: args.json_timestamps,
    };
    if args.json {
        Box::new(json::JsonOutput::new(opts))
    } else {
        Box::new(human::HumanOutput::new(opts).with_wait(args.wait))
    }
}

pub fn make_for_reset(args: &cli::ResetArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose: args.verbose,
        json_timestamps: false,
    };
    if args.json {
        Box::new(json::JsonOutput::new(opts))
    } else {
        Box::new(human::HumanOutput::new(opts))
    }
}

pub fn make_for_monitor(args: &cli::MonitorArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose: args.verbose,
        json_timestamps: false,
    };
    if args.json {
        Box::new(json::JsonOutput::new(opts))
    } else {
        Box::new(human::HumanOutput::new(opts))
    }
}

pub fn make_for_list(args: &cli::ListArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions::default();
    if args.json {
        Box::new(json::JsonOutput::new(opts))
    } else {
        Box::new(human::HumanOutput::new(opts))
    }
}

pub fn format_device_line(index: usize, d: &HidDeviceSummary) -> String {
    format!("[{index}] halfkay {:04X}:{:04X} {}", d.vid, d.pid, d.path)
}

pub fn format_port_line(index: usize, p: &SerialPortSummary) -> String {
    format!(
        "[{index}] serial  {:04X}:{:04X} {} {}",
        p.vid,
        p.pid,
        p.port_name,
        p.product.as_deref().unwrap_or("")
    )
}
