use std::path::PathBuf;

use clap::Parser;
use eyre::{OptionExt, Result};
use rdb_utils::cache::RdbCachePath;
use serde::Serialize;

#[derive(Clone, Debug, Default, Serialize, Parser)]
pub struct CacheOpts {
    /// The root directory for the cache. If not provided, the default is `~/.rdb/cache`.
    #[clap(long, env = "RDB_CACHE_ROOT")]
    pub cache_root: Option<PathBuf>,
}

impl CacheOpts {
    pub fn cache_path(&self) -> RdbCachePath {
        RdbCachePath::new(self.cache_root.clone())
    }

    /// The resolved cache root.
    pub fn root(&self) -> Result<PathBuf> {
        self.cache_path().rdb_cache_dir().ok_or_eyre("missing cache_root")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        cache: CacheOpts,
    }

    #[test]
    #[serial]
    fn cache_root_from_env() {
        std::env::set_var("RDB_CACHE_ROOT", "/tmp/rdb-env-cache");
        let cli = Cli::parse_from(["rdb"]);
        std::env::remove_var("RDB_CACHE_ROOT");
        assert_eq!(cli.cache.root().unwrap(), PathBuf::from("/tmp/rdb-env-cache"));
    }

    #[test]
    #[serial]
    fn cache_root_flag_wins() {
        std::env::set_var("RDB_CACHE_ROOT", "/tmp/rdb-env-cache");
        let cli = Cli::parse_from(["rdb", "--cache-root", "/tmp/rdb-flag-cache"]);
        std::env::remove_var("RDB_CACHE_ROOT");
        assert_eq!(cli.cache.root().unwrap(), PathBuf::from("/tmp/rdb-flag-cache"));
    }
}
