//! Tabular text files.
//!
//! Every table rdb reads or writes is stored as JSON lines: one JSON array per
//! row, one row per line. Rows are plain serde types, usually tuples.

use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("i/o error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed row at {}:{line}", path.display())]
    Row {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode row for {}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl TableError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Writes rows to a table file, truncating any previous content.
#[derive(Debug)]
pub struct TableWriter {
    path: PathBuf,
    out: BufWriter<File>,
    rows: usize,
}

impl TableWriter {
    /// Create (or overwrite) the table at `path`, creating parent directories as needed.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, TableError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| TableError::io(&path, e))?;
        }
        let file = File::create(&path).map_err(|e| TableError::io(&path, e))?;
        Ok(Self { path, out: BufWriter::new(file), rows: 0 })
    }

    pub fn write_row<R: Serialize + ?Sized>(&mut self, row: &R) -> Result<(), TableError> {
        serde_json::to_writer(&mut self.out, row)
            .map_err(|source| TableError::Encode { path: self.path.clone(), source })?;
        self.out.write_all(b"\n").map_err(|e| TableError::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush the table and return the number of rows written.
    pub fn finish(mut self) -> Result<usize, TableError> {
        self.out.flush().map_err(|e| TableError::io(&self.path, e))?;
        trace!("wrote {} rows to {:?}", self.rows, self.path);
        Ok(self.rows)
    }
}

/// Read every row of the table at `path`, along with its 1-based line number.
///
/// Returns `None` if the file does not exist. Blank lines are skipped; any other line that does
/// not decode as `R` fails the whole read.
pub fn read_rows<R>(path: impl AsRef<Path>) -> Result<Option<Vec<(usize, R)>>, TableError>
where
    R: DeserializeOwned,
{
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(TableError::io(path, e)),
    };

    let mut rows = vec![];
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| TableError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|source| TableError::Row {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        rows.push((index + 1, row));
    }
    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let rows = read_rows::<(String, u64)>(dir.path().join("nope.jsonl")).unwrap();
        assert!(rows.is_none());
    }

    #[test]
    fn test_writer_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("t.jsonl");

        let mut writer = TableWriter::create(&path).unwrap();
        writer.write_row(&("x", 1u64)).unwrap();
        writer.write_row(&("y", 2u64)).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let mut writer = TableWriter::create(&path).unwrap();
        writer.write_row(&("z", 3u64)).unwrap();
        writer.finish().unwrap();

        let rows = read_rows::<(String, u64)>(&path).unwrap().unwrap();
        assert_eq!(rows, vec![(1, ("z".to_string(), 3))]);
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        fs::write(&path, "[\"a\",1]\n\n[\"b\"]\n").unwrap();

        let err = read_rows::<(String, u64)>(&path).unwrap_err();
        assert!(matches!(err, TableError::Row { line: 3, .. }));
    }
}
