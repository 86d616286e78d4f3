use std::collections::BTreeMap;
use std::time::Instant;

use halfkay_loader::hid::HidDeviceSummary;
use halfkay_loader::serial::SerialPortSummary;
use halfkay_loader::sink::{BlockEvent, FlashState, Outcome, ProgressSink};

use crate::output::{OutputOptions, Reporter};

#[derive(serde::Serialize)]
pub struct JsonEvent {
    schema: u32,
    event: &'static str,
    #[serde(flatten)]
    fields: BTreeMap<&'static str, serde_json::Value>,
}

impl JsonEvent {
    pub fn status(event: &'static str) -> Self {
        Self {
            schema: 1,
            event,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_u64(mut self, k: &'static str, v: u64) -> Self {
        self.fields.insert(k, serde_json::Value::from(v));
        self
    }

    pub fn with_str(mut self, k: &'static str, v: &str) -> Self {
        self.fields.insert(k, serde_json::Value::from(v));
        self
    }

    pub fn with_value(mut self, k: &'static str, v: serde_json::Value) -> Self {
        self.fields.insert(k, v);
        self
    }
}

pub struct JsonOutput {
    opts: OutputOptions,
    start: Instant,
}

impl JsonOutput {
    pub fn new(opts: OutputOptions) -> Self {
        Self {
            opts,
            start: Instant::now(),
        }
    }

    pub(crate) fn render_event_json(&mut self, ev: JsonEvent) -> String {
        let mut ev = ev;
        if self.opts.json_timestamps {
            ev.fields.insert(
                "t_ms",
                serde_json::Value::from(self.start.elapsed().as_millis() as u64),
            );
        }
        serde_json::to_string(&ev).unwrap_or_else(|_| "{}".to_string())
    }

    fn json_event(&mut self, ev: JsonEvent) {
        println!("{}", self.render_event_json(ev));
    }
}

pub fn block_to_json(ev: BlockEvent) -> JsonEvent {
    match ev {
        BlockEvent::Written { addr, len } => JsonEvent::status("block")
            .with_str("kind", "written")
            .with_u64("addr", addr as u64)
            .with_u64("len", len as u64),
        BlockEvent::Blank { addr } => JsonEvent::status("block")
            .with_str("kind", "blank")
            .with_u64("addr", addr as u64),
    }
}

pub fn state_to_json(state: FlashState) -> JsonEvent {
    let ev = JsonEvent::status("state");
    match state {
        FlashState::Idle => ev.with_str("state", "idle"),
        FlashState::DeviceSelecting => ev.with_str("state", "device_selecting"),
        FlashState::Opened => ev.with_str("state", "opened"),
        FlashState::Flashing { cursor } => ev
            .with_str("state", "flashing")
            .with_u64("cursor", cursor as u64),
        FlashState::Rebooting => ev.with_str("state", "rebooting"),
        FlashState::Closed(outcome) => ev.with_str("state", "closed").with_str(
            "outcome",
            match outcome {
                Outcome::Success => "success",
                Outcome::Failed => "failed",
                Outcome::Aborted => "aborted",
            },
        ),
    }
}

pub fn list_to_json(devices: &[HidDeviceSummary], ports: &[SerialPortSummary]) -> JsonEvent {
    let to_values = |v: serde_json::Result<serde_json::Value>| {
        v.unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
    };
    JsonEvent::status("list")
        .with_u64("count", (devices.len() + ports.len()) as u64)
        .with_value("halfkay", to_values(serde_json::to_value(devices)))
        .with_value("serial", to_values(serde_json::to_value(ports)))
}

impl ProgressSink for JsonOutput {
    fn report_progress(&mut self, value: usize, max: usize) {
        self.json_event(
            JsonEvent::status("progress")
                .with_u64("value", value as u64)
                .with_u64("max", max as u64),
        );
    }

    fn log(&mut self, message: &str) {
        self.json_event(JsonEvent::status("log").with_str("message", message));
        if self.opts.verbose {
            eprintln!("{message}");
        }
    }

    fn block(&mut self, event: BlockEvent) {
        self.json_event(block_to_json(event));
    }

    fn state(&mut self, state: FlashState) {
        self.json_event(state_to_json(state));
    }
}

impl Reporter for JsonOutput {
    fn firmware_loaded(&mut self, name: &str, bytes: usize, blocks: usize) {
        self.json_event(
            JsonEvent::status("firmware_loaded")
                .with_str("name", name)
                .with_u64("bytes", bytes as u64)
                .with_u64("blocks", blocks as u64),
        );
    }

    fn no_device(&mut self) {
        self.json_event(JsonEvent::status("no_device"));
    }

    fn error(&mut self, code: i32, message: &str) {
        self.json_event(
            JsonEvent::status("error")
                .with_u64("code", code as u64)
                .with_str("message", message),
        );
        if self.opts.verbose {
            eprintln!("error: {message}");
        }
    }

    fn exit(&mut self, code: i32) {
        self.json_event(JsonEvent::status("exit").with_u64("code", code as u64));
    }

    fn list(&mut self, devices: &[HidDeviceSummary], ports: &[SerialPortSummary]) {
        self.json_event(list_to_json(devices, ports));
    }

    fn text(&mut self, text: &str) {
        self.json_event(JsonEvent::status("text").with_str("text", text));
    }

    fn finish(&mut self) {}
}
