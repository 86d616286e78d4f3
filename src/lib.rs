//! Teensy 4.x firmware loader for the HalfKay bootloader.
//!
//! [`api::flash_device`] programs a [`image::MemoryImage`] over USB HID;
//! [`reset::reset_device`] asks running firmware to reboot over USB serial;
//! [`monitor::monitor_device`] streams text printed through raw-HID SerEMU.

pub mod api;
pub mod channel;
pub mod flasher;
pub mod gate;
pub mod hex;
pub mod hid;
pub mod image;
pub mod monitor;
pub mod package;
pub mod report;
pub mod reset;
pub mod serial;
pub mod sink;
pub mod teensy41;

#[cfg(test)]
mod test_support;
