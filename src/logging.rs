use anyhow::{Context, Result};
use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle, WriteMode};
use log::error;

use crate::store::data_dir;

pub fn init(log_spec: &str) -> Result<LoggerHandle> {
    let logger = Logger::try_with_str(log_spec)
        .with_context(|| format!("Invalid log spec '{log_spec}'"))?
        .log_to_file(FileSpec::default().directory(data_dir().join("logs")))
        .write_mode(WriteMode::BufferAndFlush)
        .duplicate_to_stderr(Duplicate::Warn)
        .start()
        .context("Cannot start logger")?;

    let orig_hook = std::panic::take_hook();
    let logger_for_panic = logger.clone();
    std::panic::set_hook(Box::new(move |panic_info| {
        // buffered lines would be lost otherwise
        error!("Panic: {panic_info}");
        logger_for_panic.flush();
        orig_hook(panic_info);
    }));
    Ok(logger)
}
