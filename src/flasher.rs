//! HalfKay block-write loop.
//!
//! Blocks go out strictly in address order, one at a time, each followed by
//! the pause the bootloader needs to erase and program it.

use crate::api::{FlashError, FlashOptions, IoStage};
use crate::channel::{Delay, HidChannel};
use crate::image::MemoryImage;
use crate::report;
use crate::sink::{BlockEvent, FlashState, ProgressSink};
use crate::teensy41;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlashSummary {
    pub blocks_written: usize,
    pub blocks_skipped: usize,
    pub rebooted: bool,
}

/// Programs `image` through an already open HalfKay channel.
pub fn flash_image<C, S>(
    image: &MemoryImage,
    channel: &mut C,
    sink: &mut S,
    opts: &FlashOptions,
    delay: &mut dyn Delay,
) -> Result<FlashSummary, FlashError>
where
    C: HidChannel + ?Sized,
    S: ProgressSink + ?Sized,
{
    image.validate(opts.base_address, opts.capacity)?;

    let len = image.len();
    let mut summary = FlashSummary::default();

    for block in image.blocks() {
        sink.state(FlashState::Flashing { cursor: block.addr });
        sink.report_progress(block.addr, len);

        if block.is_blank() {
            tracing::debug!(addr = block.addr, "page blank");
            sink.block(BlockEvent::Blank { addr: block.addr });
            summary.blocks_skipped += 1;
            continue;
        }

        let pkt = report::block_report(&block);
        channel
            .send_report(teensy41::REPORT_ID, &pkt)
            .map_err(|source| FlashError::Io {
                stage: IoStage::Write { addr: block.addr },
                source,
            })?;

        tracing::debug!(addr = block.addr, last = block.is_short(), "page written");
        sink.block(BlockEvent::Written {
            addr: block.addr,
            len: block.data.len(),
        });
        summary.blocks_written += 1;

        if block.addr == 0 {
            delay.delay(opts.first_block_delay);
        } else {
            delay.delay(opts.block_delay);
        }
    }

    sink.report_progress(len, len);

    if opts.reboot {
        sink.state(FlashState::Rebooting);
        channel
            .send_report(teensy41::REPORT_ID, &report::reboot_report())
            .map_err(|source| FlashError::Io {
                stage: IoStage::Reboot,
                source,
            })?;
        summary.rebooted = true;
    }

    Ok(summary)
}
