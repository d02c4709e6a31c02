use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use rdb_utils::{
    cache::RdbCachePath,
    table::{self, TableError, TableWriter},
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{BoxedResolver, Finalize, ResolveResult, ResolverWrapper};
use crate::{
    block::BlockId,
    error::{FormatError, ReplayError},
    key::{decode_hex, ReadableKey, RegisterKey, RegisterValue},
};

/// One cache file row: `[ownerReadable, keyCell, valueHex | null]`.
type CacheRow = (String, KeyCell, Option<String>);

/// The key column of a cache row.
///
/// Keys with an exact readable form are stored readable. Any other key is stored as
/// `{"hex": "<raw key bytes>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum KeyCell {
    Readable(String),
    Raw { hex: String },
}

impl KeyCell {
    fn encode(key: &RegisterKey) -> (String, Self) {
        if key.has_exact_readable() {
            let ReadableKey { owner, key } = key.to_readable();
            (owner, Self::Readable(key))
        } else {
            (key.owner_hex(), Self::Raw { hex: hex::encode(&key.key) })
        }
    }

    fn decode(owner: String, cell: Self) -> Result<RegisterKey, FormatError> {
        match cell {
            Self::Readable(key) => ReadableKey::new(owner, key).to_mangled(),
            Self::Raw { hex } => Ok(RegisterKey::new(
                decode_hex("register owner", &owner)?,
                decode_hex("register key", &hex)?,
            )),
        }
    }
}

/// Serves registers from a per-block file cache, falling back to the inner resolver on a miss.
///
/// The whole table is loaded when the cache is opened and written back, replacing the previous
/// file, when the cache is finalized. Absent registers are cached too.
#[derive(Debug, Clone)]
pub struct CachingResolver {
    inner: Rc<RefCell<RegisterCache>>,
}

#[derive(Debug)]
struct RegisterCache {
    block: BlockId,
    // `None` keeps the cache in memory only
    path: Option<PathBuf>,
    registers: FxHashMap<RegisterKey, Option<RegisterValue>>,
}

impl CachingResolver {
    /// Open the cache of `block` under `cache_root`.
    ///
    /// A missing cache file yields an empty cache. A malformed row aborts with a
    /// [`FormatError`].
    pub fn open(block: &BlockId, cache_root: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = RdbCachePath::new(Some(cache_root.as_ref()))
            .rdb_block_cache_file(block)
            .ok_or(ReplayError::MissingCacheRoot)?;

        info!("opening register cache: {}", path.display());
        let registers = load(&path)?;
        if registers.is_empty() {
            debug!("register cache is empty: {}", path.display());
        }

        Ok(Self::from_parts(block.clone(), Some(path), registers))
    }

    /// A cache that is never read from or written to disk.
    pub fn in_memory(block: &BlockId) -> Self {
        Self::from_parts(block.clone(), None, FxHashMap::default())
    }

    fn from_parts(
        block: BlockId,
        path: Option<PathBuf>,
        registers: FxHashMap<RegisterKey, Option<RegisterValue>>,
    ) -> Self {
        Self { inner: Rc::new(RefCell::new(RegisterCache { block, path, registers })) }
    }

    pub fn block(&self) -> BlockId {
        self.inner.borrow().block.clone()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.borrow().path.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cached value of `key`: `None` on a miss, `Some(None)` for a cached absent register.
    pub fn get(&self, key: &RegisterKey) -> Option<Option<RegisterValue>> {
        self.inner.borrow().registers.get(key).cloned()
    }

    /// Every cached register, ordered by key.
    pub fn entries(&self) -> Vec<(RegisterKey, Option<RegisterValue>)> {
        let mut entries: Vec<_> = self
            .inner
            .borrow()
            .registers
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl ResolverWrapper for CachingResolver {
    fn wrap(&self, mut inner: BoxedResolver) -> BoxedResolver {
        let cache = Rc::clone(&self.inner);
        Box::new(move |key: &RegisterKey| -> ResolveResult {
            let hit = cache.borrow().registers.get(key).cloned();
            if let Some(value) = hit {
                trace!("register cache hit: {key}");
                return Ok(value);
            }

            let value = inner.resolve(key)?;
            cache.borrow_mut().registers.insert(key.clone(), value.clone());
            Ok(value)
        })
    }
}

impl Finalize for CachingResolver {
    fn component(&self) -> &'static str {
        "register cache"
    }

    fn finalize(&self) -> Result<(), ReplayError> {
        let Some(path) = self.path() else {
            return Ok(());
        };

        let entries = self.entries();
        info!("closing register cache: {} ({} registers)", path.display(), entries.len());

        let persist = || -> Result<(), TableError> {
            let mut writer = TableWriter::create(&path)?;
            for (key, value) in &entries {
                let (owner, cell) = KeyCell::encode(key);
                let row: CacheRow = (owner, cell, value.as_ref().map(hex::encode));
                writer.write_row(&row)?;
            }
            writer.finish()?;
            Ok(())
        };
        persist().map_err(|e| ReplayError::finalize(self.component(), e))
    }
}

fn load(path: &Path) -> Result<FxHashMap<RegisterKey, Option<RegisterValue>>, ReplayError> {
    let rows = match table::read_rows::<CacheRow>(path) {
        Ok(Some(rows)) => rows,
        Ok(None) => {
            info!("register cache does not exist: {}", path.display());
            return Ok(FxHashMap::default());
        }
        Err(TableError::Row { path, line, source }) => {
            return Err(FormatError::Row { path, line, source: source.into() }.into())
        }
        Err(err) => return Err(err.into()),
    };

    let mut registers = FxHashMap::default();
    registers.reserve(rows.len());
    for (line, (owner, key, value)) in rows {
        let row_error = |source: FormatError| FormatError::Row {
            path: path.to_path_buf(),
            line,
            source: source.into(),
        };

        let key = KeyCell::decode(owner, key).map_err(row_error)?;
        let value = value
            .map(|value| decode_hex("register value", &value))
            .transpose()
            .map_err(row_error)?;
        registers.insert(key, value);
    }
    Ok(registers)
}
