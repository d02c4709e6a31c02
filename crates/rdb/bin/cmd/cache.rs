use std::path::Path;

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use rdb_backend::{BlockId, CachingResolver, RegisterKey, RegisterValue};
use yansi::Paint;

use crate::opts::CacheOpts;

/// CLI arguments for `rdb cache`.
#[derive(Clone, Debug, Parser)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub cmd: CacheSubcommand,
}

#[derive(Clone, Debug, Subcommand)]
pub enum CacheSubcommand {
    /// List the registers cached for a block.
    Show {
        /// The block identifier, e.g. a block height.
        block: BlockId,

        #[command(flatten)]
        cache: CacheOpts,
    },
}

impl CacheArgs {
    pub fn run(self) -> Result<()> {
        match self.cmd {
            CacheSubcommand::Show { block, cache } => {
                for line in show(&block, &cache.root()?)? {
                    println!("{line}");
                }
            }
        }
        Ok(())
    }
}

fn show(block: &BlockId, root: &Path) -> Result<Vec<String>> {
    let cache = CachingResolver::open(block, root)
        .wrap_err_with(|| format!("failed to open the register cache of block {block}"))?;

    let entries = cache.entries();
    let mut lines: Vec<_> = entries.iter().map(|(key, value)| entry(key, value)).collect();
    lines.push(format!("{} registers cached for block {block}", entries.len()).bold().to_string());
    Ok(lines)
}

fn entry(key: &RegisterKey, value: &Option<RegisterValue>) -> String {
    match value {
        Some(value) => format!("{key} = {}", hex::encode_prefixed(value)),
        None => format!("{key} = {}", "<absent>".yellow()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rdb_utils::cache::RdbCachePath;

    use super::*;

    #[test]
    fn show_lists_cached_registers() {
        yansi::disable();
        let dir = tempfile::tempdir().unwrap();
        let block = BlockId::from(42);
        let file = RdbCachePath::new(Some(dir.path())).rdb_block_cache_file(&block).unwrap();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "[\"0x01\",\"balance\",\"0001\"]\n[\"0x01\",\"gone\",null]\n").unwrap();

        let lines = show(&block, dir.path()).unwrap();
        assert_eq!(
            lines,
            vec![
                "[0x01]: balance = 0x0001",
                "[0x01]: gone = <absent>",
                "2 registers cached for block 42",
            ]
        );
    }

    #[test]
    fn show_fails_on_malformed_cache() {
        let dir = tempfile::tempdir().unwrap();
        let block = BlockId::from(1);
        let file = RdbCachePath::new(Some(dir.path())).rdb_block_cache_file(&block).unwrap();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "not json\n").unwrap();

        assert!(show(&block, dir.path()).is_err());
    }
}
