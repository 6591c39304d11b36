//! Keeps queueing ranked matches, starting the client if needed.

use anyhow::Result;

use tapper_core::app;
use tapper_core::routine::Routine;

fn main() -> Result<()> {
    app::run(Routine::ranked())
}
