/// Where an operation stands. `Closed` is reached on every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    Idle,
    DeviceSelecting,
    Opened,
    Flashing { cursor: usize },
    Rebooting,
    Closed(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
    /// No device was selected; nothing happened.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEvent {
    Written { addr: usize, len: usize },
    Blank { addr: usize },
}

/// Receives progress and user-facing messages from flash and reset operations.
///
/// Calls are synchronous and happen on the operation's thread.
pub trait ProgressSink {
    fn report_progress(&mut self, value: usize, max: usize);

    fn log(&mut self, message: &str);

    fn block(&mut self, _event: BlockEvent) {}

    fn state(&mut self, _state: FlashState) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report_progress(&mut self, _value: usize, _max: usize) {}

    fn log(&mut self, _message: &str) {}
}
