pub mod backup;
pub mod compose;
pub mod error;
pub mod firewall;
pub mod logging;
pub mod menu;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod settings;
pub mod stack;
pub mod sysinfo;

pub use error::{Error, Result};
