use std::{error::Error as StdError, fmt, path::PathBuf};

use rdb_utils::table::TableError;
use thiserror::Error;

/// Boxed error used at the seams with external collaborators (register source, engine).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Malformed persisted data or key encoding.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid hex in {what}: `{input}`")]
    Hex {
        what: &'static str,
        input: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("malformed row at {}:{line}", path.display())]
    Row {
        path: PathBuf,
        line: usize,
        #[source]
        source: BoxError,
    },

    #[error("invalid block identifier `{0}`")]
    BlockId(String),

    #[error("invalid payload identifier `{0}`")]
    PayloadId(String),
}

/// Errors raised by the replay pipeline itself, as opposed to the payload under test.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("could not reach the register source while reading {key}")]
    Connectivity {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("run cancelled while reading {key}")]
    Cancelled { key: String },

    #[error("deadline exceeded while reading {key}")]
    DeadlineExceeded { key: String },

    #[error("could not resolve the block of transaction {tx}")]
    BlockResolution {
        tx: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("can not merge: view type mismatch (given: {given}, expected: RemoteView)")]
    TypeMismatch { given: &'static str },

    #[error("no cache root configured and no home directory found")]
    MissingCacheRoot,

    #[error(transparent)]
    Storage(#[from] TableError),

    #[error("execution engine failure")]
    Engine(#[source] BoxError),

    #[error("failed to finalize {component}")]
    Finalize {
        component: &'static str,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Multiple(#[from] MultiError),
}

impl ReplayError {
    pub(crate) fn finalize(component: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Finalize { component, source: source.into() }
    }
}

/// A set of errors collected without short-circuiting, e.g. while finalizing a run.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<ReplayError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ReplayError) {
        self.errors.push(error);
    }

    /// Record the error of `result`, if any.
    pub fn record(&mut self, result: Result<(), ReplayError>) {
        if let Err(err) = result {
            self.push(err);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ReplayError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ReplayError> {
        self.errors
    }

    /// `Ok` if nothing was collected, the error itself if exactly one was, the whole set otherwise.
    pub fn into_result(mut self) -> Result<(), ReplayError> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ReplayError::Multiple(self)),
        }
    }
}

impl Extend<ReplayError> for MultiError {
    fn extend<T: IntoIterator<Item = ReplayError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n\t* {error}")?;
            let mut source = error.source();
            while let Some(cause) = source {
                write!(f, ": {cause}")?;
                source = cause.source();
            }
        }
        Ok(())
    }
}

impl StdError for MultiError {}

/// The execution engine's judgement that the payload under test is invalid.
///
/// This is never folded into [`ReplayError`]: a domain error says nothing about the tooling.
#[derive(Debug)]
pub struct DomainError(BoxError);

impl DomainError {
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(error.into())
    }

    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for DomainError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_error_collapses_single() {
        let mut errors = MultiError::new();
        assert!(errors.is_empty());
        errors.push(ReplayError::MissingCacheRoot);
        assert!(matches!(errors.into_result(), Err(ReplayError::MissingCacheRoot)));
    }

    #[test]
    fn test_multi_error_lists_causes() {
        let mut errors = MultiError::new();
        errors.push(ReplayError::finalize("read tracker", "disk full"));
        errors.record(Err(ReplayError::Cancelled { key: "[0x01]: a".to_string() }));
        errors.record(Ok(()));
        assert_eq!(errors.len(), 2);

        let rendered = errors.to_string();
        assert!(rendered.starts_with("2 errors occurred:"));
        assert!(rendered.contains("failed to finalize read tracker: disk full"));
        assert!(rendered.contains("run cancelled while reading [0x01]: a"));
    }
}
