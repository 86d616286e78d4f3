pub const EXIT_OK: i32 = 0;
pub const EXIT_INVALID_FIRMWARE: i32 = 11;
pub const EXIT_WRITE_FAILED: i32 = 12;
pub const EXIT_BUSY: i32 = 13;
pub const EXIT_RESET_FAILED: i32 = 14;
pub const EXIT_MONITOR_FAILED: i32 = 15;
pub const EXIT_UNEXPECTED: i32 = 20;
