use std::ffi::CString;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};

use crate::channel::{Channel, ChannelError, HidChannel, HidFilter, HidSelector};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HidDeviceSummary {
    pub vid: u16,
    pub pid: u16,
    pub path: String,
}

pub fn list_devices(filter: &HidFilter) -> Result<Vec<HidDeviceSummary>, ChannelError> {
    let api = HidApi::new()?;
    let mut out: Vec<HidDeviceSummary> = Vec::new();
    for d in api.device_list() {
        if filter.matches(d.vendor_id(), d.product_id())
            && filter.matches_usage(d.usage_page(), d.usage())
        {
            out.push(HidDeviceSummary {
                vid: d.vendor_id(),
                pid: d.product_id(),
                path: d.path().to_string_lossy().to_string(),
            });
        }
    }
    Ok(out)
}

/// Selects HID interfaces through the platform hidapi backend.
#[derive(Debug, Default)]
pub struct HidApiSelector;

impl HidSelector for HidApiSelector {
    type Device = HidApiDevice;

    fn select(&mut self, filter: &HidFilter) -> Result<Option<HidApiDevice>, ChannelError> {
        let api = HidApi::new()?;
        let path = api
            .device_list()
            .find(|d| {
                filter.matches(d.vendor_id(), d.product_id())
                    && filter.matches_usage(d.usage_page(), d.usage())
            })
            .map(|d| d.path().to_owned());

        Ok(path.map(|path| HidApiDevice {
            api,
            path,
            dev: None,
        }))
    }
}

pub struct HidApiDevice {
    api: HidApi,
    path: CString,
    dev: Option<HidDevice>,
}

impl Channel for HidApiDevice {
    fn label(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        // hidapi releases the OS handle on drop.
        self.dev.take();
        Ok(())
    }
}

impl HidChannel for HidApiDevice {
    fn open(&mut self) -> Result<(), ChannelError> {
        let dev = self.api.open_path(&self.path)?;
        self.dev = Some(dev);
        Ok(())
    }

    fn send_report(&mut self, report_id: u8, report: &[u8]) -> Result<(), ChannelError> {
        let dev = self.dev.as_ref().ok_or(ChannelError::NotOpen)?;

        let mut buf = Vec::with_capacity(report.len() + 1);
        buf.push(report_id);
        buf.extend_from_slice(report);

        // hidapi has no write timeout; a wedged bootloader blocks here.
        let n = dev.write(&buf)?;
        if n != buf.len() {
            return Err(ChannelError::ShortWrite {
                got: n,
                expected: buf.len(),
            });
        }
        Ok(())
    }

    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, ChannelError> {
        let dev = self.dev.as_ref().ok_or(ChannelError::NotOpen)?;
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        Ok(dev.read_timeout(buf, ms)?)
    }
}
