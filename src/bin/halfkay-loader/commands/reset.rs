use halfkay_loader::channel::{SerialFilter, ThreadDelay};
use halfkay_loader::gate::OperationGate;
use halfkay_loader::reset::{self, ResetOptions, ResetOutcome};
use halfkay_loader::serial::UsbSerialSelector;

use crate::cli;
use crate::exit_codes;
use crate::output::Reporter;

pub fn run(args: cli::ResetArgs, out: &mut dyn Reporter) -> i32 {
    let opts = ResetOptions {
        filter: SerialFilter {
            port_name: args.serial_port.clone(),
            ..SerialFilter::pjrc()
        },
        ..Default::default()
    };

    let gate = OperationGate::new();
    let outcome = reset::reset_device(
        &gate,
        &mut UsbSerialSelector,
        &opts,
        &mut *out,
        &mut ThreadDelay,
    );

    let code = match outcome {
        ResetOutcome::Reset { .. } => exit_codes::EXIT_OK,
        ResetOutcome::NoDevice => {
            out.no_device();
            exit_codes::EXIT_OK
        }
        ResetOutcome::Busy => exit_codes::EXIT_BUSY,
        ResetOutcome::Failed(_) => exit_codes::EXIT_RESET_FAILED,
    };
    out.exit(code);
    code
}
