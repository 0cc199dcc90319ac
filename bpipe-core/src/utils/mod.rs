pub mod buffer;
pub mod crypto;
pub mod fmt;
