use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::channel::{ChannelError, ChannelSession, Delay, HidChannel, HidFilter, HidSelector};
use crate::flasher::{self, FlashSummary};
use crate::gate::{GateError, OperationGate};
use crate::image::{ImageError, MemoryImage};
use crate::sink::{FlashState, Outcome, ProgressSink};
use crate::teensy41;

#[derive(Debug, Clone)]
pub struct FlashOptions {
    pub filter: HidFilter,

    /// Absolute address the image must be anchored at.
    pub base_address: u32,
    /// Largest image the target flash can hold.
    pub capacity: usize,

    /// Minimum pause after the block at offset 0.
    pub first_block_delay: Duration,
    /// Minimum pause after every other written block.
    pub block_delay: Duration,

    /// Send the reboot report after programming.
    pub reboot: bool,

    /// Keep polling until a HalfKay device appears.
    pub wait: bool,
    /// Max time to wait when `wait=true` (None = forever).
    pub wait_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for FlashOptions {
    fn default() -> Self {
        Self {
            filter: HidFilter::halfkay(),
            base_address: teensy41::FLEXSPI_BASE,
            capacity: teensy41::CODE_SIZE,
            first_block_delay: teensy41::FIRST_BLOCK_DELAY,
            block_delay: teensy41::BLOCK_DELAY,
            reboot: true,
            wait: false,
            wait_timeout: None,
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStage {
    Select,
    Open,
    Write { addr: usize },
    Reboot,
    Read,
    Close,
}

impl fmt::Display for IoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoStage::Select => write!(f, "device selection"),
            IoStage::Open => write!(f, "open"),
            IoStage::Write { addr } => write!(f, "write at addr=0x{addr:06X}"),
            IoStage::Reboot => write!(f, "reboot"),
            IoStage::Read => write!(f, "read"),
            IoStage::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlashErrorKind {
    Busy,
    NoDevice,
    InvalidImage,
    WriteFailed,
}

#[derive(Error, Debug)]
pub enum FlashError {
    #[error(transparent)]
    Busy(#[from] GateError),

    #[error("no HalfKay device found")]
    NoDevice,

    #[error("invalid firmware image: {0}")]
    Image(#[from] ImageError),

    #[error("{stage} failed: {source}")]
    Io {
        stage: IoStage,
        #[source]
        source: ChannelError,
    },
}

impl FlashError {
    pub fn kind(&self) -> FlashErrorKind {
        match self {
            FlashError::Busy(_) => FlashErrorKind::Busy,
            FlashError::NoDevice => FlashErrorKind::NoDevice,
            FlashError::Image(_) => FlashErrorKind::InvalidImage,
            FlashError::Io { .. } => FlashErrorKind::WriteFailed,
        }
    }

    /// "No device" ends the operation without counting as a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, FlashError::NoDevice)
    }
}

/// Select, open, program, reboot and close one HalfKay device.
///
/// The device is closed on every path once it has been selected. Every
/// outcome except "no device" produces exactly one terminal log line.
pub fn flash_device<H, S>(
    gate: &OperationGate,
    selector: &mut H,
    image: &MemoryImage,
    opts: &FlashOptions,
    sink: &mut S,
    delay: &mut dyn Delay,
) -> Result<FlashSummary, FlashError>
where
    H: HidSelector,
    S: ProgressSink + ?Sized,
{
    let _ticket = match gate.try_begin() {
        Ok(t) => t,
        Err(e) => {
            let e = FlashError::from(e);
            sink.log(&failure_message(&e));
            return Err(e);
        }
    };

    sink.state(FlashState::Idle);

    if let Err(e) = image.validate(opts.base_address, opts.capacity) {
        let e = FlashError::from(e);
        return Err(finish_failed(sink, e));
    }

    sink.state(FlashState::DeviceSelecting);
    let device = match select_device(selector, opts, delay) {
        Ok(Some(d)) => d,
        Ok(None) => {
            tracing::info!("no HalfKay device selected");
            sink.state(FlashState::Closed(Outcome::Aborted));
            return Err(FlashError::NoDevice);
        }
        Err(source) => {
            let e = FlashError::Io {
                stage: IoStage::Select,
                source,
            };
            return Err(finish_failed(sink, e));
        }
    };

    let mut session = ChannelSession::new(device);
    let label = session.label();
    tracing::info!(device = %label, bytes = image.len(), "flash start");

    let result = run_session(session.get_mut(), image, opts, sink, delay);
    let closed = session.finish();

    let result = match (result, closed) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(source)) => Err(FlashError::Io {
            stage: IoStage::Close,
            source,
        }),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            tracing::warn!(device = %label, error = %close_err, "close failed after error");
            Err(e)
        }
    };

    match result {
        Ok(summary) => {
            tracing::info!(
                device = %label,
                written = summary.blocks_written,
                skipped = summary.blocks_skipped,
                "flash done"
            );
            sink.log("..finished! - have fun!");
            sink.state(FlashState::Closed(Outcome::Success));
            Ok(summary)
        }
        Err(e) => Err(finish_failed(sink, e)),
    }
}

fn run_session<C, S>(
    device: &mut C,
    image: &MemoryImage,
    opts: &FlashOptions,
    sink: &mut S,
    delay: &mut dyn Delay,
) -> Result<FlashSummary, FlashError>
where
    C: HidChannel,
    S: ProgressSink + ?Sized,
{
    device.open().map_err(|source| FlashError::Io {
        stage: IoStage::Open,
        source,
    })?;
    sink.state(FlashState::Opened);
    sink.log(&format!(
        "Flashing firmware ({} bytes, {} blocks), please wait..",
        image.len(),
        image.num_blocks()
    ));

    flasher::flash_image(image, device, sink, opts, delay)
}

fn finish_failed<S: ProgressSink + ?Sized>(sink: &mut S, e: FlashError) -> FlashError {
    tracing::error!(error = %e, "flash failed");
    sink.log(&failure_message(&e));
    sink.state(FlashState::Closed(Outcome::Failed));
    e
}

fn failure_message(e: &FlashError) -> String {
    format!("{e} - please try again.")
}

/// First device matching `opts.filter`, polling while `opts.wait` is set.
pub fn select_device<H: HidSelector>(
    selector: &mut H,
    opts: &FlashOptions,
    delay: &mut dyn Delay,
) -> Result<Option<H::Device>, ChannelError> {
    let mut waited = Duration::ZERO;
    loop {
        if let Some(d) = selector.select(&opts.filter)? {
            return Ok(Some(d));
        }
        if !opts.wait {
            return Ok(None);
        }
        if let Some(t) = opts.wait_timeout {
            if waited >= t {
                return Ok(None);
            }
        }
        delay.delay(opts.poll_interval);
        waited += opts.poll_interval;
    }
}
