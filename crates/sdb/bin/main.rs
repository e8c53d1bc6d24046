#[macro_use]
extern crate tracing;

mod args;
mod cmd;
mod opts;
mod utils;

use args::{SdbArgs, SdbSubcommand};
use clap::Parser;
use eyre::Result;

fn main() -> Result<()> {
    utils::install_error_handler();
    utils::subscriber();
    utils::enable_paint();

    let opts = SdbArgs::parse();

    match opts.cmd {
        SdbSubcommand::Tx(cmd) => utils::block_on(cmd.run()),
        SdbSubcommand::Inspect(cmd) => cmd.run(),
    }
}
