#[macro_use]
extern crate tracing;

mod args;
mod cmd;
mod opts;
mod utils;

use args::{RdbArgs, RdbSubcommand};
use clap::Parser;
use eyre::Result;

fn main() -> Result<()> {
    utils::install_error_handler();
    utils::subscriber();
    utils::enable_paint();

    let opts = RdbArgs::parse();

    match opts.cmd {
        RdbSubcommand::Key(cmd) => cmd.run(),
        RdbSubcommand::Cache(cmd) => cmd.run(),
        RdbSubcommand::Intensities(cmd) => cmd.run(),
    }
}
