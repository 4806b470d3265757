use std::io;

use anyhow::{Context, Result};
use gatehouse::console::ConsoleBackend;
use gatehouse::{logging, store};
use log::info;

fn main() -> Result<()> {
    let config = store::load_config().context("Cannot load config")?;
    let logger = logging::init(&config.log_spec)?;
    info!("Store root: {}", config.store_root.display());

    let mut backend = ConsoleBackend::new(&config, io::stdout())?;
    let result = backend.run(io::stdin().lock());
    logger.flush();
    result
}
