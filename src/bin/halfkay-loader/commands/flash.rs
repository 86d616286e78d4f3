use halfkay_loader::api::{self, FlashErrorKind, FlashOptions};
use halfkay_loader::channel::ThreadDelay;
use halfkay_loader::gate::OperationGate;
use halfkay_loader::hid::HidApiSelector;
use halfkay_loader::image::MemoryImage;
use halfkay_loader::{hex, package, teensy41};

use crate::cli;
use crate::exit_codes;
use crate::output::Reporter;

pub fn run(args: cli::FlashArgs, out: &mut dyn Reporter) -> i32 {
    let image = match load_image(&args) {
        Ok((name, img)) => {
            out.firmware_loaded(&name, img.len(), img.num_blocks());
            img
        }
        Err(msg) => {
            out.error(exit_codes::EXIT_INVALID_FIRMWARE, &msg);
            return exit_codes::EXIT_INVALID_FIRMWARE;
        }
    };

    let opts = FlashOptions {
        reboot: !args.no_reboot,
        wait: args.wait,
        wait_timeout: args.wait_timeout(),
        ..Default::default()
    };

    let gate = OperationGate::new();
    let r = api::flash_device(
        &gate,
        &mut HidApiSelector,
        &image,
        &opts,
        &mut *out,
        &mut ThreadDelay,
    );

    let code = match r {
        Ok(_) => exit_codes::EXIT_OK,
        Err(e) => match e.kind() {
            FlashErrorKind::NoDevice => {
                out.no_device();
                exit_codes::EXIT_OK
            }
            FlashErrorKind::InvalidImage => exit_codes::EXIT_INVALID_FIRMWARE,
            FlashErrorKind::WriteFailed => exit_codes::EXIT_WRITE_FAILED,
            FlashErrorKind::Busy => exit_codes::EXIT_BUSY,
        },
    };
    out.exit(code);
    code
}

fn load_image(args: &cli::FlashArgs) -> Result<(String, MemoryImage), String> {
    let path = args.firmware.display();
    let pkg = package::load_firmware(&args.firmware).map_err(|e| format!("{path}: {e}"))?;
    let map = hex::parse_hex(&pkg.hex_text).map_err(|e| format!("{}: {e}", pkg.name))?;
    let image = map
        .image_at(teensy41::FLEXSPI_BASE, teensy41::CODE_SIZE)
        .map_err(|e| format!("{}: {e}", pkg.name))?;

    tracing::info!(
        entry = %pkg.name,
        bytes = map.byte_count,
        segments = map.segment_count(),
        "firmware loaded"
    );
    Ok((pkg.name, image))
}
