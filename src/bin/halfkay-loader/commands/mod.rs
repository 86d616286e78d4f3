pub mod flash;
pub mod list;
pub mod monitor;
pub mod reset;
