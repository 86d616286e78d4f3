//! Simulated channels and sinks shared by unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::channel::{
    Channel, ChannelError, HidChannel, HidFilter, HidSelector, SerialChannel, SerialFilter,
    SerialSelector,
};
use crate::image::MemoryImage;
use crate::sink::{BlockEvent, FlashState, ProgressSink};
use crate::teensy41;

pub fn image_of(data: Vec<u8>) -> MemoryImage {
    MemoryImage::new(teensy41::FLEXSPI_BASE, data)
}

fn hid_error(message: &str) -> ChannelError {
    ChannelError::Hid(hidapi::HidError::HidApiError {
        message: message.to_string(),
    })
}

fn serial_error(message: &str) -> ChannelError {
    ChannelError::Serial(serialport::Error::new(
        serialport::ErrorKind::NoDevice,
        message,
    ))
}

/// Sends and delays in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send { addr: [u8; 3] },
    Delay(Duration),
}

#[derive(Debug, Default, Clone)]
pub struct Timeline {
    actions: Rc<RefCell<Vec<Action>>>,
}

impl Timeline {
    pub fn actions(&self) -> Vec<Action> {
        self.actions.borrow().clone()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.actions
            .borrow()
            .iter()
            .filter_map(|a| match a {
                Action::Delay(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    pub fn delay(&self) -> impl FnMut(Duration) {
        let actions = self.actions.clone();
        move |d| actions.borrow_mut().push(Action::Delay(d))
    }
}

#[derive(Debug, Default)]
struct HidState {
    reports: Vec<(u8, Vec<u8>)>,
    input: VecDeque<Vec<u8>>,
    opens: u32,
    closes: u32,
    sends: usize,
    reads: usize,
    is_open: bool,
}

/// Read-only view of a [`FakeHid`] after it has been moved into an operation.
#[derive(Debug, Clone)]
pub struct HidProbe {
    state: Rc<RefCell<HidState>>,
}

impl HidProbe {
    pub fn reports(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.borrow().reports.clone()
    }

    pub fn opens(&self) -> u32 {
        self.state.borrow().opens
    }

    pub fn closes(&self) -> u32 {
        self.state.borrow().closes
    }

    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }
}

pub struct FakeHid {
    state: Rc<RefCell<HidState>>,
    timeline: Timeline,
    fail_send_at: Option<usize>,
    fail_read_at: Option<usize>,
    fail_open: bool,
    fail_close: bool,
}

impl FakeHid {
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            state: Rc::new(RefCell::new(HidState::default())),
            timeline: timeline.clone(),
            fail_send_at: None,
            fail_read_at: None,
            fail_open: false,
            fail_close: false,
        }
    }

    /// Fail the `n`th send (0-based, reboot report included).
    pub fn fail_send_at(mut self, n: usize) -> Self {
        self.fail_send_at = Some(n);
        self
    }

    /// Fail the `n`th read (0-based).
    pub fn fail_read_at(mut self, n: usize) -> Self {
        self.fail_read_at = Some(n);
        self
    }

    /// Queue an input report. Reads past the queue time out with `Ok(0)`.
    pub fn with_input(self, report: &[u8]) -> Self {
        self.state.borrow_mut().input.push_back(report.to_vec());
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn probe(&self) -> HidProbe {
        HidProbe {
            state: self.state.clone(),
        }
    }

    pub fn reports(&self) -> Vec<(u8, Vec<u8>)> {
        self.probe().reports()
    }
}

impl Channel for FakeHid {
    fn label(&self) -> String {
        "fake-halfkay".to_string()
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        let mut st = self.state.borrow_mut();
        st.closes += 1;
        st.is_open = false;
        if self.fail_close {
            return Err(hid_error("close failed"));
        }
        Ok(())
    }
}

impl HidChannel for FakeHid {
    fn open(&mut self) -> Result<(), ChannelError> {
        let mut st = self.state.borrow_mut();
        st.opens += 1;
        if self.fail_open {
            return Err(hid_error("open failed"));
        }
        st.is_open = true;
        Ok(())
    }

    fn send_report(&mut self, report_id: u8, report: &[u8]) -> Result<(), ChannelError> {
        let mut st = self.state.borrow_mut();
        if !st.is_open {
            return Err(ChannelError::NotOpen);
        }
        let n = st.sends;
        st.sends += 1;
        if self.fail_send_at == Some(n) {
            return Err(hid_error("device unplugged"));
        }
        st.reports.push((report_id, report.to_vec()));
        self.timeline.actions.borrow_mut().push(Action::Send {
            addr: [report[0], report[1], report[2]],
        });
        Ok(())
    }

    fn read_report(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, ChannelError> {
        let mut st = self.state.borrow_mut();
        if !st.is_open {
            return Err(ChannelError::NotOpen);
        }
        let n = st.reads;
        st.reads += 1;
        if self.fail_read_at == Some(n) {
            return Err(hid_error("device unplugged"));
        }
        let Some(report) = st.input.pop_front() else {
            return Ok(0);
        };
        let len = report.len().min(buf.len());
        buf[..len].copy_from_slice(&report[..len]);
        Ok(len)
    }
}

pub struct FakeHidSelector {
    device: Option<FakeHid>,
    expected: HidFilter,
    /// `select` returns `None` this many times before yielding the device.
    misses: usize,
    fail: bool,
    pub calls: usize,
}

impl FakeHidSelector {
    pub fn with(device: FakeHid) -> Self {
        Self {
            device: Some(device),
            ..Self::empty()
        }
    }

    pub fn empty() -> Self {
        Self {
            device: None,
            expected: HidFilter::halfkay(),
            misses: 0,
            fail: false,
            calls: 0,
        }
    }

    /// Filter `select` must be called with. Defaults to HalfKay.
    pub fn expecting(mut self, filter: HidFilter) -> Self {
        self.expected = filter;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::empty()
        }
    }

    pub fn after_misses(mut self, misses: usize) -> Self {
        self.misses = misses;
        self
    }
}

impl HidSelector for FakeHidSelector {
    type Device = FakeHid;

    fn select(&mut self, filter: &HidFilter) -> Result<Option<FakeHid>, ChannelError> {
        assert_eq!(*filter, self.expected);
        self.calls += 1;
        if self.fail {
            return Err(hid_error("enumeration failed"));
        }
        if self.calls <= self.misses {
            return Ok(None);
        }
        Ok(self.device.take())
    }
}

#[derive(Debug, Default)]
struct PortState {
    opened_at: Vec<u32>,
    closes: u32,
}

#[derive(Debug, Clone)]
pub struct PortProbe {
    state: Rc<RefCell<PortState>>,
}

impl PortProbe {
    pub fn opened_at(&self) -> Vec<u32> {
        self.state.borrow().opened_at.clone()
    }

    pub fn closes(&self) -> u32 {
        self.state.borrow().closes
    }
}

pub struct FakePort {
    name: String,
    state: Rc<RefCell<PortState>>,
    fail_open: bool,
    fail_close: bool,
}

impl FakePort {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Rc::new(RefCell::new(PortState::default())),
            fail_open: false,
            fail_close: false,
        }
    }

    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn probe(&self) -> PortProbe {
        PortProbe {
            state: self.state.clone(),
        }
    }
}

impl Channel for FakePort {
    fn label(&self) -> String {
        self.name.clone()
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        self.state.borrow_mut().closes += 1;
        if self.fail_close {
            return Err(serial_error("port vanished"));
        }
        Ok(())
    }
}

impl SerialChannel for FakePort {
    fn open(&mut self, baud_rate: u32) -> Result<(), ChannelError> {
        if self.fail_open {
            return Err(serial_error("port busy"));
        }
        self.state.borrow_mut().opened_at.push(baud_rate);
        Ok(())
    }
}

pub struct FakeSerialSelector {
    port: Option<FakePort>,
    fail: bool,
    pub last_filter: Option<SerialFilter>,
}

impl FakeSerialSelector {
    pub fn with(port: FakePort) -> Self {
        Self {
            port: Some(port),
            fail: false,
            last_filter: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            port: None,
            fail: false,
            last_filter: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::empty()
        }
    }
}

impl SerialSelector for FakeSerialSelector {
    type Port = FakePort;

    fn select(&mut self, filter: &SerialFilter) -> Result<Option<FakePort>, ChannelError> {
        self.last_filter = Some(filter.clone());
        if self.fail {
            return Err(serial_error("enumeration failed"));
        }
        Ok(self.port.take())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub progress: Vec<(usize, usize)>,
    pub logs: Vec<String>,
    pub blocks: Vec<BlockEvent>,
    pub states: Vec<FlashState>,
}

impl ProgressSink for RecordingSink {
    fn report_progress(&mut self, value: usize, max: usize) {
        self.progress.push((value, max));
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn block(&mut self, event: BlockEvent) {
        self.blocks.push(event);
    }

    fn state(&mut self, state: FlashState) {
        self.states.push(state);
    }
}
