use halfkay_loader::channel::{HidFilter, SerialFilter};
use halfkay_loader::{hid, serial};

use crate::cli;
use crate::exit_codes;
use crate::output::Reporter;

pub fn run(_args: cli::ListArgs, out: &mut dyn Reporter) -> i32 {
    let devices = match hid::list_devices(&HidFilter::halfkay()) {
        Ok(d) => d,
        Err(e) => {
            out.error(exit_codes::EXIT_UNEXPECTED, &format!("hid discovery failed: {e}"));
            return exit_codes::EXIT_UNEXPECTED;
        }
    };
    let ports = match serial::list_ports(&SerialFilter::pjrc()) {
        Ok(p) => p,
        Err(e) => {
            out.error(
                exit_codes::EXIT_UNEXPECTED,
                &format!("serial discovery failed: {e}"),
            );
            return exit_codes::EXIT_UNEXPECTED;
        }
    };

    out.list(&devices, &ports);
    exit_codes::EXIT_OK
}
