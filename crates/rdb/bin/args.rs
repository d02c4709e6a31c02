use crate::cmd::{cache::CacheArgs, intensities::IntensitiesArgs, key::KeyArgs};
use clap::{Parser, Subcommand};

/// RDB: The Remote Ledger Debugger.
#[derive(Parser, Debug)]
#[command(
    name = "rdb",
    version = env!("CARGO_PKG_VERSION"),
    next_display_order = None,
)]
pub struct RdbArgs {
    #[command(subcommand)]
    pub cmd: RdbSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum RdbSubcommand {
    /// Convert register keys between their raw and readable forms.
    #[command(visible_alias = "k")]
    Key(KeyArgs),

    /// Inspect the register cache.
    #[command(visible_alias = "c")]
    Cache(CacheArgs),

    /// Extract the intensity reports from a captured engine log.
    #[command(visible_alias = "i")]
    Intensities(IntensitiesArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        RdbArgs::command().debug_assert();
    }

    #[test]
    fn parse_key_readable() {
        let args = RdbArgs::try_parse_from(["rdb", "key", "readable", "0x01", "2400"]).unwrap();
        assert!(matches!(args.cmd, RdbSubcommand::Key(_)));
    }
}
