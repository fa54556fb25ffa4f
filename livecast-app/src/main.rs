//! Livecast console client entry point.
//!
//! Usage: `livecast [config.json]`

use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    livecast_lib::run(config_path).await
}
