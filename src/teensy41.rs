use std::time::Duration;

pub const VID: u16 = 0x16C0;
pub const PID_HALFKAY: u16 = 0x0478;

/// Raw-HID serial emulation interface of firmware built with "USB Type: Raw HID".
pub const PID_SEREMU: u16 = 0x0485;
pub const SEREMU_USAGE_PAGE: u16 = 0xFFC9;
pub const SEREMU_USAGE: u16 = 0x0004;
pub const SEREMU_REPORT_SIZE: usize = 64;

pub const CODE_SIZE: usize = 8_126_464;
pub const BLOCK_SIZE: usize = 1024;
pub const HEADER_SIZE: usize = 64;
pub const PACKET_SIZE: usize = HEADER_SIZE + BLOCK_SIZE; // 1088

pub const FLEXSPI_BASE: u32 = 0x6000_0000;

/// Largest offset the 24-bit address field can carry.
pub const MAX_BLOCK_ADDR: usize = 0xFF_FFFF;

/// HID report id used for every HalfKay report.
pub const REPORT_ID: u8 = 0;

/// Line coding that the Teensyduino USB serial stack treats as a reboot request.
pub const SOFT_REBOOT_BAUD: u32 = 0x86; // 134

/// The first write erases a larger sector and needs a longer pause.
pub const FIRST_BLOCK_DELAY: Duration = Duration::from_millis(3000);
pub const BLOCK_DELAY: Duration = Duration::from_millis(100);
pub const SOFT_REBOOT_SETTLE: Duration = Duration::from_millis(200);
pub const SEREMU_READ_TIMEOUT: Duration = Duration::from_millis(250);
