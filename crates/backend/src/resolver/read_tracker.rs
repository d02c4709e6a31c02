use std::{cell::RefCell, path::PathBuf, rc::Rc};

use rdb_utils::table::{TableError, TableWriter};

use super::{BoxedResolver, Finalize, ResolveResult, ResolverWrapper};
use crate::{
    error::ReplayError,
    key::{ReadableKey, RegisterKey},
};

/// File name of the read report inside the run directory.
pub const READ_REPORT_FILE: &str = "registers_read.jsonl";

/// A successful register read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadEntry {
    pub key: ReadableKey,
    /// Size of the value read; zero for an absent register.
    pub bytes: usize,
}

/// Records every successful read, in order, and reports them when finalized.
///
/// Slab reads are recorded as entries of their own, they are not folded into the read of the
/// composite value that owns them.
#[derive(Debug, Clone)]
pub struct ReadTracker {
    inner: Rc<RefCell<ReadLog>>,
}

#[derive(Debug)]
struct ReadLog {
    path: PathBuf,
    entries: Vec<ReadEntry>,
}

impl ReadTracker {
    /// A tracker reporting to `<directory>/registers_read.jsonl`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let path = directory.into().join(READ_REPORT_FILE);
        Self { inner: Rc::new(RefCell::new(ReadLog { path, entries: vec![] })) }
    }

    pub fn entries(&self) -> Vec<ReadEntry> {
        self.inner.borrow().entries.clone()
    }

    /// Total number of bytes read so far.
    pub fn total_bytes(&self) -> usize {
        self.inner.borrow().entries.iter().map(|entry| entry.bytes).sum()
    }

    pub fn path(&self) -> PathBuf {
        self.inner.borrow().path.clone()
    }
}

impl ResolverWrapper for ReadTracker {
    fn wrap(&self, mut inner: BoxedResolver) -> BoxedResolver {
        let log = Rc::clone(&self.inner);
        Box::new(move |key: &RegisterKey| -> ResolveResult {
            let value = inner.resolve(key)?;
            let bytes = value.as_ref().map_or(0, Vec::len);
            log.borrow_mut().entries.push(ReadEntry { key: key.to_readable(), bytes });
            Ok(value)
        })
    }
}

impl Finalize for ReadTracker {
    fn component(&self) -> &'static str {
        "read tracker"
    }

    fn finalize(&self) -> Result<(), ReplayError> {
        let log = self.inner.borrow();
        info!(
            reads = log.entries.len(),
            bytes = self.total_bytes(),
            "registers read: {}",
            log.path.display()
        );

        let persist = || -> Result<(), TableError> {
            let mut writer = TableWriter::create(&log.path)?;
            writer.write_row(&["# Sequence", "Owner", "Key", "Bytes"])?;
            for (n, entry) in log.entries.iter().enumerate() {
                writer.write_row(&(n + 1, &entry.key.owner, &entry.key.key, entry.bytes))?;
            }
            writer.finish()?;
            Ok(())
        };
        persist().map_err(|e| ReplayError::finalize(self.component(), e))
    }
}
