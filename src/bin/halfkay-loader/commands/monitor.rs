use std::time::Instant;

use halfkay_loader::gate::OperationGate;
use halfkay_loader::hid::HidApiSelector;
use halfkay_loader::monitor::{self, MonitorError, MonitorOptions};
use halfkay_loader::sink::ProgressSink;

use crate::cli;
use crate::exit_codes;
use crate::output::Reporter;

/// Routes device text to `Reporter::text` instead of the line log.
struct TextSink<'a> {
    out: &'a mut dyn Reporter,
}

impl ProgressSink for TextSink<'_> {
    fn report_progress(&mut self, value: usize, max: usize) {
        self.out.report_progress(value, max);
    }

    fn log(&mut self, message: &str) {
        self.out.text(message);
    }
}

pub fn run(args: cli::MonitorArgs, out: &mut dyn Reporter) -> i32 {
    let started = Instant::now();
    let limit = args.duration();
    let mut stop = move || limit.is_some_and(|d| started.elapsed() >= d);

    let gate = OperationGate::new();
    let r = monitor::monitor_device(
        &gate,
        &mut HidApiSelector,
        &MonitorOptions::default(),
        &mut TextSink { out: &mut *out },
        &mut stop,
    );

    let code = match r {
        Ok(summary) => {
            tracing::debug!(reports = summary.reports, bytes = summary.bytes, "monitor finished");
            exit_codes::EXIT_OK
        }
        Err(MonitorError::NoDevice) => {
            out.no_device();
            exit_codes::EXIT_OK
        }
        Err(MonitorError::Busy(e)) => {
            out.error(exit_codes::EXIT_BUSY, &e.to_string());
            exit_codes::EXIT_BUSY
        }
        Err(e @ MonitorError::Io { .. }) => {
            out.error(exit_codes::EXIT_MONITOR_FAILED, &e.to_string());
            exit_codes::EXIT_MONITOR_FAILED
        }
    };
    out.exit(code);
    code
}
