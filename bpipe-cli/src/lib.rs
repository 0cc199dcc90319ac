mod utils;

pub mod commands;
pub mod dirs;
pub mod logging;
pub mod test_utils;

pub use utils::exit::{exit, ExitError};
