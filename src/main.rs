mod ai;
mod app;
mod config;
mod db;
mod domain;
mod feed;
mod infrastructure;
mod tasks;
#[cfg(test)]
mod testing;

use std::env;

use anyhow::{bail, Result};
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    match env::args().nth(1).as_deref() {
        None | Some("run") => {}
        Some("status") => return app::print_status(&config, &paths).await,
        Some(other) => bail!("unknown command {other:?}; expected `run` or `status`"),
    }

    let shutdown = shutdown::Shutdown::new();
    let app = app::WatchApp::initialize(config, &paths, shutdown.clone()).await?;
    shutdown::install_signal_handlers(shutdown, app.check_now_callback());
    app.run().await
}
