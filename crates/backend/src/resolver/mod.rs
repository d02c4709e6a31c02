//! Register resolution.
//!
//! A [`RegisterResolver`] answers "what is the value of this register" for the root of a
//! [`RemoteView`](crate::RemoteView). The base resolver fetches from the remote register source;
//! read-side behaviors are layered around it as [`ResolverWrapper`]s. A wrapper calls its inner
//! resolver at most once per lookup, forwards inner errors untouched, and only ever inspects a
//! successful result.
//!
//! Wrappers that accumulate state also implement [`Finalize`], which flushes that state to disk
//! at the end of a run.

mod cache;
mod contract;
mod read_tracker;
mod remote;

pub use cache::CachingResolver;
pub use contract::{ContractCapture, CONTRACT_CODE_PREFIX};
pub use read_tracker::{ReadEntry, ReadTracker, READ_REPORT_FILE};
pub use remote::{remote_resolver, Interrupt, RegisterSource, RunContext};

use crate::{
    error::{MultiError, ReplayError},
    key::{RegisterKey, RegisterValue},
};

/// Outcome of a single register lookup.
pub type ResolveResult = Result<Option<RegisterValue>, ReplayError>;

pub trait RegisterResolver {
    fn resolve(&mut self, key: &RegisterKey) -> ResolveResult;
}

impl<F> RegisterResolver for F
where
    F: FnMut(&RegisterKey) -> ResolveResult,
{
    fn resolve(&mut self, key: &RegisterKey) -> ResolveResult {
        self(key)
    }
}

pub type BoxedResolver = Box<dyn RegisterResolver>;

/// A read-side decorator around a resolver.
pub trait ResolverWrapper {
    fn wrap(&self, inner: BoxedResolver) -> BoxedResolver;
}

/// A component holding run state that must be persisted once the run is over.
pub trait Finalize {
    /// Name used when reporting failures.
    fn component(&self) -> &'static str;

    fn finalize(&self) -> Result<(), ReplayError>;
}

/// Wrap `base` with `layers`, given outermost first.
///
/// On every lookup the layers run in the given order, then `base`.
pub fn compose(base: BoxedResolver, layers: &[&dyn ResolverWrapper]) -> BoxedResolver {
    layers.iter().rev().fold(base, |inner, layer| layer.wrap(inner))
}

/// Finalize every component, collecting failures instead of stopping at the first one.
pub fn finalize_all(components: &[&dyn Finalize]) -> MultiError {
    let mut errors = MultiError::new();
    for component in components {
        if let Err(err) = component.finalize() {
            warn!("failed to finalize {}: {err}", component.component());
            errors.push(err);
        }
    }
    errors
}

/// The decorator chain of a replay run, in its canonical order:
/// cache, then read tracking, then contract capture, then the remote source.
#[derive(Debug, Clone)]
pub struct ResolverChain {
    cache: CachingResolver,
    tracker: ReadTracker,
    contracts: ContractCapture,
}

impl ResolverChain {
    pub fn new(cache: CachingResolver, tracker: ReadTracker, contracts: ContractCapture) -> Self {
        Self { cache, tracker, contracts }
    }

    /// Build the fully decorated resolver around `base`.
    pub fn wrap(&self, base: BoxedResolver) -> BoxedResolver {
        compose(base, &[&self.cache, &self.tracker, &self.contracts])
    }

    /// Finalize every decorator of the chain.
    pub fn finalize(&self) -> MultiError {
        finalize_all(&[&self.cache, &self.tracker, &self.contracts])
    }

    pub fn cache(&self) -> &CachingResolver {
        &self.cache
    }

    pub fn tracker(&self) -> &ReadTracker {
        &self.tracker
    }

    pub fn contracts(&self) -> &ContractCapture {
        &self.contracts
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    type CallLog = Rc<RefCell<Vec<&'static str>>>;

    struct Recorder {
        name: &'static str,
        calls: CallLog,
    }

    impl ResolverWrapper for Recorder {
        fn wrap(&self, mut inner: BoxedResolver) -> BoxedResolver {
            let name = self.name;
            let calls = Rc::clone(&self.calls);
            Box::new(move |key: &RegisterKey| -> ResolveResult {
                calls.borrow_mut().push(name);
                inner.resolve(key)
            })
        }
    }

    struct Failing {
        name: &'static str,
        finalized: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Finalize for Failing {
        fn component(&self) -> &'static str {
            self.name
        }

        fn finalize(&self) -> Result<(), ReplayError> {
            self.finalized.borrow_mut().push(self.name);
            Err(ReplayError::finalize(self.name, "boom"))
        }
    }

    #[test]
    fn test_compose_runs_layers_outermost_first() {
        let calls: CallLog = Rc::default();
        let base_calls = Rc::clone(&calls);
        let base: BoxedResolver = Box::new(move |_: &RegisterKey| -> ResolveResult {
            base_calls.borrow_mut().push("R");
            Ok(Some(vec![1]))
        });

        let a = Recorder { name: "A", calls: Rc::clone(&calls) };
        let b = Recorder { name: "B", calls: Rc::clone(&calls) };
        let mut resolver = compose(base, &[&a, &b]);

        let key = RegisterKey::new(vec![1], "k");
        assert_eq!(resolver.resolve(&key).unwrap(), Some(vec![1]));
        assert_eq!(resolver.resolve(&key).unwrap(), Some(vec![1]));
        assert_eq!(*calls.borrow(), vec!["A", "B", "R", "A", "B", "R"]);
    }

    #[test]
    fn test_finalize_all_does_not_short_circuit() {
        let finalized = Rc::default();
        let first = Failing { name: "first", finalized: Rc::clone(&finalized) };
        let second = Failing { name: "second", finalized: Rc::clone(&finalized) };

        let errors = finalize_all(&[&first, &second]);
        assert_eq!(errors.len(), 2);
        assert_eq!(*finalized.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_chain_serves_cache_hits_before_tracking() {
        let chain = ResolverChain::new(
            CachingResolver::in_memory(&crate::block::BlockId::from(1)),
            ReadTracker::new("unused"),
            ContractCapture::new("unused"),
        );
        let fetches = Rc::new(RefCell::new(0));
        let base_fetches = Rc::clone(&fetches);
        let mut resolver = chain.wrap(Box::new(move |_: &RegisterKey| -> ResolveResult {
            *base_fetches.borrow_mut() += 1;
            Ok(Some(b"pub contract Foo {}".to_vec()))
        }));

        let key = RegisterKey::new(vec![1], "code.Foo");
        resolver.resolve(&key).unwrap();
        assert_eq!(chain.tracker().entries().len(), 1);
        assert_eq!(chain.contracts().len(), 1);

        resolver.resolve(&key).unwrap();
        resolver.resolve(&key).unwrap();
        assert_eq!(*fetches.borrow(), 1);
        assert_eq!(chain.tracker().entries().len(), 1);
        assert_eq!(chain.contracts().len(), 1);
    }
}
