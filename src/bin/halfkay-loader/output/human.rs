use std::io::{IsTerminal, Write};

use halfkay_loader::hid::HidDeviceSummary;
use halfkay_loader::serial::SerialPortSummary;
use halfkay_loader::sink::{BlockEvent, FlashState, ProgressSink};
use halfkay_loader::teensy41;

use crate::output::{format_device_line, format_port_line, OutputOptions, Reporter};

pub struct HumanOutput {
    opts: OutputOptions,
    is_tty: bool,
    wait_enabled: bool,
    progress_active: bool,
    last_percent: Option<u64>,
}

impl HumanOutput {
    pub fn new(opts: OutputOptions) -> Self {
        Self {
            opts,
            is_tty: std::io::stderr().is_terminal(),
            wait_enabled: false,
            progress_active: false,
            last_percent: None,
        }
    }

    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait_enabled = wait;
        self
    }

    fn finish_line(&mut self) {
        if self.progress_active {
            eprintln!();
            self.progress_active = false;
        }
    }

    fn println(&mut self, msg: &str) {
        self.finish_line();
        eprintln!("{msg}");
    }

    pub(crate) fn percent(value: usize, max: usize) -> u64 {
        ((value as u64).saturating_mul(100) / max.max(1) as u64).min(100)
    }

    fn progress_update(&mut self, percent: u64, addr: usize) {
        if self.opts.verbose {
            return;
        }

        if self.is_tty {
            eprint!(
                "\r  programming {percent:3}% @ 0x{:08X}",
                teensy41::FLEXSPI_BASE as usize + addr
            );
            let _ = std::io::stderr().flush();
            self.progress_active = true;
            self.last_percent = Some(percent);
            return;
        }

        let last = self.last_percent.unwrap_or(0);
        if self.last_percent.is_none() || percent == 100 || percent >= last + 10 {
            self.last_percent = Some(percent);
            self.println(&format!("  programming {percent:3}%"));
        }
    }
}

impl ProgressSink for HumanOutput {
    fn report_progress(&mut self, value: usize, max: usize) {
        let percent = Self::percent(value, max);
        if self.last_percent == Some(percent) && percent != 0 {
            return;
        }
        self.progress_update(percent, value);
    }

    fn log(&mut self, message: &str) {
        self.println(message);
    }

    fn block(&mut self, event: BlockEvent) {
        if !self.opts.verbose {
            return;
        }
        match event {
            BlockEvent::Written { addr, len } => {
                self.println(&format!("program block @ 0x{addr:06X} ({len} bytes)"));
            }
            BlockEvent::Blank { addr } => {
                self.println(&format!("skip blank block @ 0x{addr:06X}"));
            }
        }
    }

    fn state(&mut self, state: FlashState) {
        match state {
            FlashState::DeviceSelecting if self.wait_enabled => {
                self.println("waiting for device... (use --wait-timeout-ms to limit)");
            }
            FlashState::Opened => self.last_percent = None,
            FlashState::Rebooting => self.println("booting device..."),
            FlashState::Closed(_) => self.finish_line(),
            _ => {}
        }
        if self.opts.verbose {
            self.println(&format!("state: {state:?}"));
        }
    }
}

impl Reporter for HumanOutput {
    fn firmware_loaded(&mut self, name: &str, bytes: usize, blocks: usize) {
        self.println(&format!("firmware loaded: {name} {bytes} bytes ({blocks} blocks)"));
    }

    fn no_device(&mut self) {
        self.println(&format!(
            "no device found (HalfKay {:04X}:{:04X} or PJRC USB serial); nothing to do",
            teensy41::VID,
            teensy41::PID_HALFKAY
        ));
    }

    fn error(&mut self, _code: i32, message: &str) {
        self.finish_line();
        eprintln!("error: {message}");
    }

    fn exit(&mut self, code: i32) {
        if self.opts.verbose {
            self.println(&format!("exit code {code}"));
        }
    }

    fn list(&mut self, devices: &[HidDeviceSummary], ports: &[SerialPortSummary]) {
        if devices.is_empty() && ports.is_empty() {
            self.no_device();
            return;
        }
        for (i, d) in devices.iter().enumerate() {
            self.println(&format_device_line(i, d));
        }
        for (i, p) in ports.iter().enumerate() {
            self.println(&format_port_line(devices.len() + i, p));
        }
    }

    fn text(&mut self, text: &str) {
        self.finish_line();
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn finish(&mut self) {
        self.finish_line();
    }
}
