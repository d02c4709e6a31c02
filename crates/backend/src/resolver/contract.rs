use std::{cell::RefCell, collections::BTreeMap, fs, path::PathBuf, rc::Rc};

use rdb_utils::cache::is_path_component;

use super::{BoxedResolver, Finalize, ResolveResult, ResolverWrapper};
use crate::{
    error::{MultiError, ReplayError},
    key::RegisterKey,
};

/// Key prefix of the registers holding an account's contract code: `code.<ContractName>`.
pub const CONTRACT_CODE_PREFIX: &[u8] = b"code.";

/// Extension of the dumped contract sources.
const CONTRACT_FILE_EXTENSION: &str = "cdc";

/// Captures the source of every contract read during the run and dumps it to
/// `<directory>/<account>/<ContractName>.cdc`.
#[derive(Debug, Clone)]
pub struct ContractCapture {
    inner: Rc<RefCell<CapturedContracts>>,
}

#[derive(Debug)]
struct CapturedContracts {
    directory: PathBuf,
    // account -> contract name -> source
    contracts: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl ContractCapture {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CapturedContracts {
                directory: directory.into(),
                contracts: BTreeMap::new(),
            })),
        }
    }

    /// The captured source of `name` deployed on `account` (readable owner form).
    pub fn source(&self, account: &str, name: &str) -> Option<Vec<u8>> {
        self.inner.borrow().contracts.get(account)?.get(name).cloned()
    }

    /// Number of captured contracts.
    pub fn len(&self) -> usize {
        self.inner.borrow().contracts.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The contract name addressed by `key`, if it is a contract code register.
fn contract_name(key: &RegisterKey) -> Option<&str> {
    let name = key.key.strip_prefix(CONTRACT_CODE_PREFIX)?;
    match std::str::from_utf8(name) {
        Ok(name) if is_path_component(name) => Some(name),
        _ => {
            warn!("not capturing contract with an unusable name: {key}");
            None
        }
    }
}

impl ResolverWrapper for ContractCapture {
    fn wrap(&self, mut inner: BoxedResolver) -> BoxedResolver {
        let captured = Rc::clone(&self.inner);
        Box::new(move |key: &RegisterKey| -> ResolveResult {
            let value = inner.resolve(key)?;

            if let (Some(name), Some(code)) = (contract_name(key), value.as_ref()) {
                trace!("captured contract {name} of {}", key.owner_hex());
                captured
                    .borrow_mut()
                    .contracts
                    .entry(key.owner_hex())
                    .or_default()
                    .insert(name.to_string(), code.clone());
            }

            Ok(value)
        })
    }
}

impl Finalize for ContractCapture {
    fn component(&self) -> &'static str {
        "contract capture"
    }

    fn finalize(&self) -> Result<(), ReplayError> {
        let captured = self.inner.borrow();
        let mut errors = MultiError::new();

        for (account, contracts) in &captured.contracts {
            let dir = captured.directory.join(account);
            for (name, code) in contracts {
                let file = dir.join(format!("{name}.{CONTRACT_FILE_EXTENSION}"));
                debug!("dumping contract {name} of {account}: {}", file.display());
                let written = fs::create_dir_all(&dir).and_then(|_| fs::write(&file, code));
                if let Err(e) = written {
                    errors.push(ReplayError::finalize(self.component(), e));
                }
            }
        }

        errors.into_result()
    }
}
