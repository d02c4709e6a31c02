use std::path::PathBuf;

/// Name of the per-block register cache file.
pub const REGISTER_CACHE_FILE: &str = "registers.jsonl";

/// Resolves the on-disk locations used by rdb's caches.
#[derive(Debug, Clone, Default)]
pub struct RdbCachePath {
    root: Option<PathBuf>,
}

impl RdbCachePath {
    /// New cache path.
    pub fn new(root: Option<impl Into<PathBuf>>) -> Self {
        Self { root: root.map(Into::into) }
    }

    /// Returns the path to rdb's cache dir: `~/.rdb/cache` by default.
    pub fn rdb_cache_dir(&self) -> Option<PathBuf> {
        self.root.clone().or_else(|| dirs_next::home_dir().map(|p| p.join(".rdb").join("cache")))
    }

    /// Returns the path to rdb register cache dir: `<cache_root>/registers`.
    pub fn rdb_register_cache_dir(&self) -> Option<PathBuf> {
        Some(self.rdb_cache_dir()?.join("registers"))
    }

    /// Returns the path to the cache dir of the `block`:
    /// `<cache_root>/registers/<block>`
    pub fn rdb_block_cache_dir(&self, block: impl AsRef<str>) -> Option<PathBuf> {
        Some(self.rdb_register_cache_dir()?.join(block.as_ref()))
    }

    /// Returns the path to the register cache file of the `block`:
    /// `<cache_root>/registers/<block>/registers.jsonl`
    pub fn rdb_block_cache_file(&self, block: impl AsRef<str>) -> Option<PathBuf> {
        Some(self.rdb_block_cache_dir(block)?.join(REGISTER_CACHE_FILE))
    }
}

/// Whether `name` can be used verbatim as a single path component of a cache or output file.
pub fn is_path_component(name: &str) -> bool {
    !name.is_empty() &&
        name != "." &&
        name != ".." &&
        name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
