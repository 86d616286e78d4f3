//! Capability traits over the host's HID and serial stacks.
//!
//! The flasher and the reset driver only see these traits, so tests can drive
//! them with simulated devices and a recording [`Delay`].

use std::time::Duration;

use thiserror::Error;

use crate::teensy41;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("hid: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("short write: {got} != {expected}")]
    ShortWrite { got: usize, expected: usize },

    #[error("device is not open")]
    NotOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidFilter {
    pub vendor_id: u16,
    pub product_id: u16,
    /// `(usage_page, usage)` of the interface, for composite devices.
    pub usage: Option<(u16, u16)>,
}

impl HidFilter {
    pub fn halfkay() -> Self {
        Self {
            vendor_id: teensy41::VID,
            product_id: teensy41::PID_HALFKAY,
            usage: None,
        }
    }

    pub fn seremu() -> Self {
        Self {
            vendor_id: teensy41::VID,
            product_id: teensy41::PID_SEREMU,
            usage: Some((teensy41::SEREMU_USAGE_PAGE, teensy41::SEREMU_USAGE)),
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }

    pub fn matches_usage(&self, usage_page: u16, usage: u16) -> bool {
        self.usage.map_or(true, |u| u == (usage_page, usage))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialFilter {
    pub vendor_id: u16,
    /// Pick this port by name instead of the first match.
    ///
    /// Example: "COM6" or "/dev/ttyACM0".
    pub port_name: Option<String>,
}

impl SerialFilter {
    pub fn pjrc() -> Self {
        Self {
            vendor_id: teensy41::VID,
            port_name: None,
        }
    }
}

/// Anything that owns an OS handle and must be closed.
pub trait Channel {
    /// Human-readable identifier (HID path or port name).
    fn label(&self) -> String;

    /// Releases the handle. Closing a channel that never opened is a no-op.
    fn close(&mut self) -> Result<(), ChannelError>;
}

pub trait HidChannel: Channel {
    fn open(&mut self) -> Result<(), ChannelError>;

    fn send_report(&mut self, report_id: u8, report: &[u8]) -> Result<(), ChannelError>;

    /// Reads one input report into `buf`. `Ok(0)` means nothing arrived in time.
    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, ChannelError>;
}

pub trait SerialChannel: Channel {
    fn open(&mut self, baud_rate: u32) -> Result<(), ChannelError>;
}

pub trait HidSelector {
    type Device: HidChannel;

    /// First device matching `filter`, or `None` when nothing is attached.
    fn select(&mut self, filter: &HidFilter) -> Result<Option<Self::Device>, ChannelError>;
}

pub trait SerialSelector {
    type Port: SerialChannel;

    fn select(&mut self, filter: &SerialFilter) -> Result<Option<Self::Port>, ChannelError>;
}

/// Blocking pause between protocol steps.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<F: FnMut(Duration)> Delay for F {
    fn delay(&mut self, duration: Duration) {
        self(duration)
    }
}

/// Exclusive ownership of a selected channel for one operation.
///
/// The channel is closed exactly once: by [`ChannelSession::finish`] on the
/// normal path, or by `Drop` when the session is abandoned.
pub struct ChannelSession<C: Channel> {
    channel: C,
    closed: bool,
}

impl<C: Channel> ChannelSession<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            closed: false,
        }
    }

    pub fn get_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn label(&self) -> String {
        self.channel.label()
    }

    pub fn finish(mut self) -> Result<(), ChannelError> {
        self.closed = true;
        self.channel.close()
    }
}

impl<C: Channel> Drop for ChannelSession<C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.channel.close() {
            tracing::warn!(
                channel = %self.channel.label(),
                error = %e,
                "close failed during unwind"
            );
        }
    }
}
