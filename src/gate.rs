use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("another flash or reset operation is in progress")]
    Busy,
}

/// Application-level lock: at most one flash or reset runs at a time.
#[derive(Debug, Default)]
pub struct OperationGate {
    busy: AtomicBool,
}

impl OperationGate {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    pub fn try_begin(&self) -> Result<OperationTicket<'_>, GateError> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| GateError::Busy)?;
        Ok(OperationTicket { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one operation; releases the gate on drop.
#[derive(Debug)]
pub struct OperationTicket<'a> {
    gate: &'a OperationGate,
}

impl Drop for OperationTicket<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
