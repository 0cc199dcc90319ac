use std::{fs::create_dir_all, path::PathBuf};

use dirs::home_dir;

pub struct Dirs;

impl Dirs {
    pub fn init() -> std::io::Result<()> {
        create_dir_all(Self::logs())
    }

    // ~/.bpipe, or ./.bpipe when there is no home directory
    pub fn root() -> PathBuf {
        let mut dir = home_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.push(".bpipe");
        dir
    }

    // ~/.bpipe/logs
    pub fn logs() -> PathBuf {
        let mut dir = Self::root();
        dir.push("logs");
        dir
    }

    // ~/.bpipe/logs/bpipe.log
    pub fn log_file() -> PathBuf {
        let mut dir = Self::logs();
        dir.push("bpipe.log");
        dir
    }
}
