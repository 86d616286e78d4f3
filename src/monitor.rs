//! Streams text from the raw-HID serial emulation (SerEMU) interface.
//!
//! Firmware built without a USB serial port still prints through SerEMU. Each
//! input report carries up to 64 bytes of text, zero padded.

use std::time::Duration;

use thiserror::Error;

use crate::api::IoStage;
use crate::channel::{ChannelError, ChannelSession, HidChannel, HidFilter, HidSelector};
use crate::gate::{GateError, OperationGate};
use crate::sink::ProgressSink;
use crate::teensy41;

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub filter: HidFilter,
    /// Longest single blocking read; `stop` is polled between reads.
    pub read_timeout: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            filter: HidFilter::seremu(),
            read_timeout: teensy41::SEREMU_READ_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub reports: usize,
    pub bytes: usize,
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Busy(#[from] GateError),

    #[error("no SerEMU device found")]
    NoDevice,

    #[error("{stage} failed: {source}")]
    Io {
        stage: IoStage,
        #[source]
        source: ChannelError,
    },
}

/// Opens the first SerEMU interface and forwards its text to `sink.log` until
/// `stop` returns true or the device goes away.
///
/// Reads that time out are not errors. A failed read ends the stream with
/// `IoStage::Read`, which is how an unplugged or rebooting board shows up.
pub fn monitor_device<H, S>(
    gate: &OperationGate,
    selector: &mut H,
    opts: &MonitorOptions,
    sink: &mut S,
    stop: &mut dyn FnMut() -> bool,
) -> Result<MonitorSummary, MonitorError>
where
    H: HidSelector,
    S: ProgressSink + ?Sized,
{
    let _ticket = gate.try_begin()?;

    let device = match selector.select(&opts.filter) {
        Ok(Some(d)) => d,
        Ok(None) => {
            tracing::info!(pid = opts.filter.product_id, "no SerEMU interface selected");
            return Err(MonitorError::NoDevice);
        }
        Err(source) => {
            return Err(MonitorError::Io {
                stage: IoStage::Select,
                source,
            });
        }
    };

    let mut session = ChannelSession::new(device);
    let label = session.label();
    tracing::info!(device = %label, "monitor start");

    let result = stream(session.get_mut(), opts, sink, stop);
    let closed = session.finish().map_err(|source| MonitorError::Io {
        stage: IoStage::Close,
        source,
    });

    let summary = result?;
    closed?;
    tracing::info!(
        device = %label,
        reports = summary.reports,
        bytes = summary.bytes,
        "monitor done"
    );
    Ok(summary)
}

fn stream<C, S>(
    dev: &mut C,
    opts: &MonitorOptions,
    sink: &mut S,
    stop: &mut dyn FnMut() -> bool,
) -> Result<MonitorSummary, MonitorError>
where
    C: HidChannel + ?Sized,
    S: ProgressSink + ?Sized,
{
    dev.open().map_err(|source| MonitorError::Io {
        stage: IoStage::Open,
        source,
    })?;

    let mut summary = MonitorSummary::default();
    let mut buf = [0u8; teensy41::SEREMU_REPORT_SIZE];
    while !stop() {
        let n = dev
            .read_report(&mut buf, opts.read_timeout)
            .map_err(|source| MonitorError::Io {
                stage: IoStage::Read,
                source,
            })?;
        if n == 0 {
            continue;
        }
        summary.reports += 1;

        let text = report_text(&buf[..n]);
        if text.is_empty() {
            continue;
        }
        summary.bytes += text.len();
        sink.log(&text);
    }
    Ok(summary)
}

/// Lossy UTF-8 of a report with its zero padding removed.
pub fn report_text(report: &[u8]) -> String {
    let end = report.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&report[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeHid, FakeHidSelector, RecordingSink, Timeline};

    fn padded(text: &str) -> Vec<u8> {
        let mut r = vec![0u8; teensy41::SEREMU_REPORT_SIZE];
        r[..text.len()].copy_from_slice(text.as_bytes());
        r
    }

    fn after(n: usize) -> impl FnMut() -> bool {
        let mut calls = 0;
        move || {
            calls += 1;
            calls > n
        }
    }

    #[test]
    fn forwards_report_text_to_log() {
        let timeline = Timeline::default();
        let dev = FakeHid::new(&timeline)
            .with_input(&padded("hello\n"))
            .with_input(&padded("world\n"));
        let probe = dev.probe();
        let mut selector = FakeHidSelector::with(dev).expecting(HidFilter::seremu());
        let mut sink = RecordingSink::default();

        let summary = monitor_device(
            &OperationGate::new(),
            &mut selector,
            &MonitorOptions::default(),
            &mut sink,
            &mut after(3),
        )
        .unwrap();

        assert_eq!(sink.logs, vec!["hello\n".to_string(), "world\n".to_string()]);
        assert_eq!(summary, MonitorSummary { reports: 2, bytes: 12 });
        assert_eq!(probe.reads(), 3);
        assert_eq!(probe.opens(), 1);
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn read_failure_ends_stream_and_closes() {
        let timeline = Timeline::default();
        let dev = FakeHid::new(&timeline)
            .with_input(&padded("boot\n"))
            .fail_read_at(1);
        let probe = dev.probe();
        let mut selector = FakeHidSelector::with(dev).expecting(HidFilter::seremu());
        let mut sink = RecordingSink::default();

        let err = monitor_device(
            &OperationGate::new(),
            &mut selector,
            &MonitorOptions::default(),
            &mut sink,
            &mut || false,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            MonitorError::Io {
                stage: IoStage::Read,
                ..
            }
        ));
        assert_eq!(sink.logs, vec!["boot\n".to_string()]);
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn missing_interface_is_no_device() {
        let mut selector = FakeHidSelector::empty().expecting(HidFilter::seremu());
        let mut sink = RecordingSink::default();

        let err = monitor_device(
            &OperationGate::new(),
            &mut selector,
            &MonitorOptions::default(),
            &mut sink,
            &mut || false,
        )
        .unwrap_err();

        assert!(matches!(err, MonitorError::NoDevice));
        assert!(sink.logs.is_empty());
    }

    #[test]
    fn open_failure_still_closes() {
        let timeline = Timeline::default();
        let dev = FakeHid::new(&timeline).fail_open();
        let probe = dev.probe();
        let mut selector = FakeHidSelector::with(dev).expecting(HidFilter::seremu());
        let mut sink = RecordingSink::default();

        let err = monitor_device(
            &OperationGate::new(),
            &mut selector,
            &MonitorOptions::default(),
            &mut sink,
            &mut || false,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            MonitorError::Io {
                stage: IoStage::Open,
                ..
            }
        ));
        assert_eq!(probe.reads(), 0);
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn refuses_while_another_operation_runs() {
        let gate = OperationGate::new();
        let _flashing = gate.try_begin().unwrap();
        let mut selector = FakeHidSelector::empty().expecting(HidFilter::seremu());
        let mut sink = RecordingSink::default();

        let err = monitor_device(
            &gate,
            &mut selector,
            &MonitorOptions::default(),
            &mut sink,
            &mut || false,
        )
        .unwrap_err();

        assert!(matches!(err, MonitorError::Busy(_)));
        assert_eq!(selector.calls, 0);
    }

    #[test]
    fn report_text_strips_padding_and_keeps_invalid_bytes_visible() {
        assert_eq!(report_text(&padded("ok")), "ok");
        assert_eq!(report_text(&[0, 0, 0]), "");
        assert_eq!(report_text(&[b'a', 0xFF, b'b', 0]), "a\u{FFFD}b");
    }
}
