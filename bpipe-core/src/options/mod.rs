pub mod cli;
pub mod client;
pub mod common;
pub mod server;
pub mod utils;

pub use cli::{Cli, Command};
pub use client::{ClientOptions, ServerEntry};
pub use common::{Options, OptionsChecker, PresetList, ServiceType};
pub use server::ServerOptions;
pub use utils::options_from_file;
