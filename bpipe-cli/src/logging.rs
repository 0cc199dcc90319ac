use anyhow::{Error, Result};
use log::LevelFilter;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use crate::dirs::Dirs;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l})} [{M}] {m}{n}";

/// Log to the console and to ~/.bpipe/logs/bpipe.log.
pub fn init(level: LevelFilter) -> Result<()> {
    Dirs::init().map_err(|err| Error::msg(format!("fail to create {}: {}", Dirs::logs().display(), err)))?;

    let file_path = Dirs::log_file();

    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(&file_path)
        .map_err(|err| Error::msg(format!("fail to open {}: {}", file_path.display(), err)))?;

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(Root::builder().appender("console").appender("file").build(level))
        .map_err(|err| Error::msg(format!("invalid logging config: {}", err)))?;

    log4rs::init_config(config).map_err(|err| Error::msg(format!("fail to init logger: {}", err)))?;

    log::info!("log files are stored at {}", file_path.display());

    Ok(())
}
