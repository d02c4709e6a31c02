use std::{fmt, str::FromStr};

use rdb_utils::cache::is_path_component;

use crate::error::FormatError;

/// Identifies the ledger snapshot a run executes against, e.g. a block height.
///
/// The identifier names the on-disk register cache, so it is restricted to characters that are
/// safe in a single path component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Result<Self, FormatError> {
        let id = id.into();
        if is_path_component(&id) {
            Ok(Self(id))
        } else {
            Err(FormatError::BlockId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for BlockId {
    fn from(height: u64) -> Self {
        Self(height.to_string())
    }
}

impl FromStr for BlockId {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for BlockId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block information handed to the execution engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockContext {
    pub block: BlockId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id() {
        assert_eq!(BlockId::from(42).as_str(), "42");
        assert_eq!("42".parse::<BlockId>().unwrap(), BlockId::from(42));
        assert!(BlockId::new("../42").is_err());
        assert!(BlockId::new("").is_err());
    }
}
