use std::process;

/// Exit codes of the bpipe binary.
pub enum ExitError {
    LoggingError,
    ArgumentsError,
    BootstrapError,
}

impl From<ExitError> for i32 {
    fn from(v: ExitError) -> Self {
        match v {
            ExitError::LoggingError => 1,
            ExitError::ArgumentsError => 100,
            ExitError::BootstrapError => 200,
        }
    }
}

pub fn exit(err: ExitError) -> ! {
    process::exit(err.into());
}
