//! Watches for the disconnect popup and reconnects.

use anyhow::Result;

use tapper_core::app;
use tapper_core::routine::Routine;

fn main() -> Result<()> {
    app::run(Routine::afk_reconnect())
}
