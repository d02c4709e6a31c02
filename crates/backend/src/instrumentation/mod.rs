//! Extraction of intensity counters from the engine's diagnostic output.
//!
//! The engine reports its per-kind usage counters as structured JSON log records. The
//! [`InstrumentationCollector`] is handed to the engine as its log sink, keeps the latest
//! snapshot of those counters and writes it out as two reports when the run is finalized.

mod kinds;

pub use kinds::{computation_kind_label, computation_kind_name};

use std::{
    cell::RefCell,
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
    rc::Rc,
};

use rdb_utils::table::{TableError, TableWriter};
use serde::{Deserialize, Serialize};

use crate::{error::ReplayError, resolver::Finalize};

pub const COMPUTATION_REPORT_FILE: &str = "computation_intensities.jsonl";
pub const MEMORY_REPORT_FILE: &str = "memory_intensities.jsonl";

/// `tracing` target under which engine output is forwarded.
pub const ENGINE_LOG_TARGET: &str = "rdb::engine";

/// Marker that a line may hold an intensity record.
const RECORD_MARKER: &str = "computationIntensities";

/// The counter tables of one intensity record, keyed by kind code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intensities {
    pub computation_intensities: BTreeMap<u64, u64>,
    pub memory_intensities: BTreeMap<u64, u64>,
}

impl Intensities {
    /// Parse an intensity record out of a log line.
    ///
    /// Returns `None` for anything that is not a complete record; extra fields of the record
    /// are ignored.
    pub fn parse(line: &str) -> Option<Self> {
        if !line.contains(RECORD_MARKER) {
            return None;
        }
        match serde_json::from_str(line.trim()) {
            Ok(intensities) => Some(intensities),
            Err(e) => {
                trace!("ignoring unparsable intensity record: {e}");
                None
            }
        }
    }

    /// Computation rows `[kindName, intensity]`, ordered by kind code.
    pub fn computation_rows(&self) -> Vec<(String, u64)> {
        self.computation_intensities
            .iter()
            .map(|(kind, intensity)| (computation_kind_label(*kind).into_owned(), *intensity))
            .collect()
    }

    /// Memory rows `[kindCode, intensity]`, ordered by kind code.
    pub fn memory_rows(&self) -> Vec<(String, u64)> {
        self.memory_intensities.iter().map(|(kind, intensity)| (kind.to_string(), *intensity)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.computation_intensities.is_empty() && self.memory_intensities.is_empty()
    }
}

/// Write sink for engine diagnostics that keeps the latest [`Intensities`] snapshot.
///
/// Writes may split lines arbitrarily; a trailing partial line is held back until it is
/// completed or the collector is finalized. Clones share the same snapshot.
#[derive(Debug, Clone)]
pub struct InstrumentationCollector {
    inner: Rc<RefCell<Collected>>,
}

#[derive(Debug)]
struct Collected {
    directory: PathBuf,
    // bytes of the trailing incomplete line
    pending: Vec<u8>,
    snapshot: Intensities,
    records: usize,
}

impl InstrumentationCollector {
    /// A collector reporting into `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Collected {
                directory: directory.into(),
                pending: vec![],
                snapshot: Intensities::default(),
                records: 0,
            })),
        }
    }

    /// Handle one complete line of engine output.
    pub fn handle(&self, line: &str) {
        trace!(target: ENGINE_LOG_TARGET, "{}", line.trim_end());
        if let Some(intensities) = Intensities::parse(line) {
            let mut collected = self.inner.borrow_mut();
            collected.snapshot = intensities;
            collected.records += 1;
        }
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Intensities {
        self.inner.borrow().snapshot.clone()
    }

    /// Number of intensity records seen so far.
    pub fn records(&self) -> usize {
        self.inner.borrow().records
    }

    pub fn directory(&self) -> PathBuf {
        self.inner.borrow().directory.clone()
    }

    /// Handle a held back partial line, if any.
    fn drain_pending(&self) {
        let pending = std::mem::take(&mut self.inner.borrow_mut().pending);
        if !pending.is_empty() {
            self.handle(&String::from_utf8_lossy(&pending));
        }
    }
}

impl io::Write for InstrumentationCollector {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let lines = take_lines(&mut self.inner.borrow_mut().pending, buf);
        for line in &lines {
            self.handle(line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Append `buf` to `pending` and split off every completed line.
///
/// Lines are decoded only once complete, so a character split across writes stays intact.
fn take_lines(pending: &mut Vec<u8>, buf: &[u8]) -> Vec<String> {
    pending.extend_from_slice(buf);
    let Some(end) = pending.iter().rposition(|b| *b == b'\n') else {
        return vec![];
    };

    let rest = pending.split_off(end + 1);
    let complete = std::mem::replace(pending, rest);
    complete
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| String::from_utf8_lossy(line.strip_suffix(b"\r").unwrap_or(line)).into_owned())
        .collect()
}

fn write_report(path: &Path, header: [&str; 2], rows: &[(String, u64)]) -> Result<(), TableError> {
    let mut writer = TableWriter::create(path)?;
    writer.write_row(&header)?;
    for row in rows {
        writer.write_row(row)?;
    }
    writer.finish()?;
    Ok(())
}

impl Finalize for InstrumentationCollector {
    fn component(&self) -> &'static str {
        "instrumentation collector"
    }

    fn finalize(&self) -> Result<(), ReplayError> {
        self.drain_pending();

        let snapshot = self.snapshot();
        let directory = self.directory();
        if snapshot.is_empty() {
            debug!("no intensities reported by the engine");
        }

        let computation = directory.join(COMPUTATION_REPORT_FILE);
        let memory = directory.join(MEMORY_REPORT_FILE);
        info!("computation intensities: {}", computation.display());

        write_report(&computation, ["Computation Kind", "Intensity"], &snapshot.computation_rows())
            .and_then(|_| {
                write_report(&memory, ["Memory Kind", "Intensity"], &snapshot.memory_rows())
            })
            .map_err(|e| ReplayError::finalize(self.component(), e))
    }
}
