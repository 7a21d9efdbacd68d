use anyhow::Result;
use tracing::info;

use merlon_uci::UciEngine;

fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout belongs to the UCI protocol
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    info!("merlon starting");
    UciEngine::new().run()?;
    Ok(())
}
