//! Soft reboot through the USB serial port.
//!
//! Opening the port at 134 baud asks the running Teensyduino firmware to reset.
//! Reset is best-effort: failures are logged on the sink and returned as an
//! outcome, never as an error.

use std::time::Duration;

use thiserror::Error;

use crate::channel::{
    ChannelError, ChannelSession, Delay, SerialChannel, SerialFilter, SerialSelector,
};
use crate::gate::OperationGate;
use crate::sink::ProgressSink;
use crate::teensy41;

#[derive(Debug, Clone)]
pub struct ResetOptions {
    pub filter: SerialFilter,
    pub baud_rate: u32,
    /// Time the port stays open so the firmware sees the line coding.
    pub settle_delay: Duration,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            filter: SerialFilter::pjrc(),
            baud_rate: teensy41::SOFT_REBOOT_BAUD,
            settle_delay: teensy41::SOFT_REBOOT_SETTLE,
        }
    }
}

#[derive(Error, Debug)]
pub enum ResetError {
    #[error("serial port discovery failed: {0}")]
    Select(#[source] ChannelError),

    #[error("serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: ChannelError,
    },

    #[error("closing serial port '{port}': {source}")]
    Close {
        port: String,
        #[source]
        source: ChannelError,
    },
}

#[derive(Debug)]
pub enum ResetOutcome {
    Reset { port: String },
    NoDevice,
    Busy,
    Failed(ResetError),
}

impl ResetOutcome {
    pub fn is_reset(&self) -> bool {
        matches!(self, ResetOutcome::Reset { .. })
    }
}

pub fn reset_device<P, S>(
    gate: &OperationGate,
    selector: &mut P,
    opts: &ResetOptions,
    sink: &mut S,
    delay: &mut dyn Delay,
) -> ResetOutcome
where
    P: SerialSelector,
    S: ProgressSink + ?Sized,
{
    let _ticket = match gate.try_begin() {
        Ok(t) => t,
        Err(e) => {
            sink.log(&format!("reset skipped: {e}"));
            return ResetOutcome::Busy;
        }
    };

    let port = match selector.select(&opts.filter) {
        Ok(Some(p)) => p,
        Ok(None) => {
            tracing::info!(vid = opts.filter.vendor_id, "no serial port selected");
            return ResetOutcome::NoDevice;
        }
        Err(e) => return failed(sink, ResetError::Select(e)),
    };

    let mut session = ChannelSession::new(port);
    let name = session.label();

    let result = soft_reboot(session.get_mut(), &name, opts, delay);
    let closed = session.finish().map_err(|source| ResetError::Close {
        port: name.clone(),
        source,
    });

    match result.and(closed) {
        Ok(()) => {
            tracing::info!(port = %name, baud = opts.baud_rate, "soft reboot requested");
            sink.log(&format!("..reset! ({name})"));
            ResetOutcome::Reset { port: name }
        }
        Err(e) => failed(sink, e),
    }
}

fn soft_reboot<C: SerialChannel>(
    port: &mut C,
    name: &str,
    opts: &ResetOptions,
    delay: &mut dyn Delay,
) -> Result<(), ResetError> {
    port.open(opts.baud_rate).map_err(|source| ResetError::Open {
        port: name.to_string(),
        source,
    })?;
    delay.delay(opts.settle_delay);
    Ok(())
}

fn failed<S: ProgressSink + ?Sized>(sink: &mut S, e: ResetError) -> ResetOutcome {
    tracing::warn!(error = %e, "reset failed");
    sink.log(&format!("reset failed: {e}"));
    ResetOutcome::Failed(e)
}
