//! The state interface handed to the execution engine.

use std::{any::Any, cell::RefCell, fmt, rc::Rc};

use rustc_hash::FxHashMap;

use crate::{
    error::ReplayError,
    key::{RegisterKey, RegisterValue},
    resolver::BoxedResolver,
};

/// A register store with speculative child views.
///
/// This is the only state interface the execution engine sees. Reads return `None` for absent
/// registers, which is distinct from an empty value.
pub trait StateView: Any {
    fn get(&self, owner: &[u8], key: &[u8]) -> Result<Option<RegisterValue>, ReplayError>;

    fn set(&mut self, owner: &[u8], key: &[u8], value: RegisterValue) -> Result<(), ReplayError>;

    fn delete(&mut self, owner: &[u8], key: &[u8]) -> Result<(), ReplayError>;

    /// Mark the register as accessed without reading it.
    fn touch(&mut self, _owner: &[u8], _key: &[u8]) -> Result<(), ReplayError> {
        Ok(())
    }

    /// A new view layered on top of this one.
    fn new_child(&self) -> Box<dyn StateView>;

    /// Apply the writes of `child` to this view.
    fn merge(&mut self, child: &dyn StateView) -> Result<(), ReplayError>;

    /// Discard the writes of this view.
    fn drop_delta(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Local writes of a view. `None` is a tombstone.
type Delta = FxHashMap<RegisterKey, Option<RegisterValue>>;

/// A delta layer over either a parent view or, at the root, the register resolver.
///
/// Lookups check the local delta first, then the parent, and only the root ever calls the
/// resolver. Writes never leave the local delta until the view is merged into its parent.
///
/// `RemoteView` is a cheap handle: clones share the same node, and a child keeps its parent
/// alive for as long as it exists.
#[derive(Clone)]
pub struct RemoteView {
    node: Rc<ViewNode>,
}

struct ViewNode {
    delta: RefCell<Delta>,
    upstream: Upstream,
}

enum Upstream {
    Parent(RemoteView),
    Resolver(RefCell<BoxedResolver>),
}

impl RemoteView {
    /// A root view resolving every unknown register through `resolver`.
    pub fn new(resolver: BoxedResolver) -> Self {
        Self::from_upstream(Upstream::Resolver(RefCell::new(resolver)))
    }

    fn from_upstream(upstream: Upstream) -> Self {
        Self { node: Rc::new(ViewNode { delta: RefCell::default(), upstream }) }
    }

    /// A child view whose parent is `self`.
    pub fn child(&self) -> Self {
        Self::from_upstream(Upstream::Parent(self.clone()))
    }

    pub fn parent(&self) -> Option<&Self> {
        match &self.node.upstream {
            Upstream::Parent(parent) => Some(parent),
            Upstream::Resolver(_) => None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Resolve `key` through this view and its ancestors.
    pub fn lookup(&self, key: &RegisterKey) -> Result<Option<RegisterValue>, ReplayError> {
        let mut view = self;
        loop {
            if let Some(entry) = view.node.delta.borrow().get(key) {
                return Ok(entry.clone());
            }
            match &view.node.upstream {
                Upstream::Parent(parent) => view = parent,
                Upstream::Resolver(resolver) => return resolver.borrow_mut().resolve(key),
            }
        }
    }

    /// The writes of this view, ordered by key. `None` values are deletions.
    pub fn updates(&self) -> Vec<(RegisterKey, Option<RegisterValue>)> {
        let mut updates: Vec<_> = self
            .node
            .delta
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        updates.sort_by(|a, b| a.0.cmp(&b.0));
        updates
    }

    fn write(&self, key: RegisterKey, value: Option<RegisterValue>) {
        self.node.delta.borrow_mut().insert(key, value);
    }
}

impl StateView for RemoteView {
    fn get(&self, owner: &[u8], key: &[u8]) -> Result<Option<RegisterValue>, ReplayError> {
        self.lookup(&RegisterKey::new(owner, key))
    }

    fn set(&mut self, owner: &[u8], key: &[u8], value: RegisterValue) -> Result<(), ReplayError> {
        self.write(RegisterKey::new(owner, key), Some(value));
        Ok(())
    }

    fn delete(&mut self, owner: &[u8], key: &[u8]) -> Result<(), ReplayError> {
        self.write(RegisterKey::new(owner, key), None);
        Ok(())
    }

    fn new_child(&self) -> Box<dyn StateView> {
        Box::new(self.child())
    }

    fn merge(&mut self, child: &dyn StateView) -> Result<(), ReplayError> {
        let Some(other) = child.as_any().downcast_ref::<Self>() else {
            return Err(ReplayError::TypeMismatch { given: child.type_name() });
        };
        if Rc::ptr_eq(&self.node, &other.node) {
            return Ok(());
        }

        let other_delta = other.node.delta.borrow();
        self.node
            .delta
            .borrow_mut()
            .extend(other_delta.iter().map(|(key, value)| (key.clone(), value.clone())));
        Ok(())
    }

    fn drop_delta(&mut self) {
        self.node.delta.borrow_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for RemoteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteView")
            .field("delta", &self.node.delta.borrow().len())
            .field("parent", &self.parent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::resolver::ResolveResult;

    fn root(calls: Rc<Cell<usize>>) -> RemoteView {
        RemoteView::new(Box::new(move |key: &RegisterKey| -> ResolveResult {
            calls.set(calls.get() + 1);
            Ok(Some([b"remote:".as_slice(), &key.key].concat()))
        }))
    }

    struct ForeignView;

    impl StateView for ForeignView {
        fn get(&self, _: &[u8], _: &[u8]) -> Result<Option<RegisterValue>, ReplayError> {
            Ok(None)
        }

        fn set(&mut self, _: &[u8], _: &[u8], _: RegisterValue) -> Result<(), ReplayError> {
            Ok(())
        }

        fn delete(&mut self, _: &[u8], _: &[u8]) -> Result<(), ReplayError> {
            Ok(())
        }

        fn new_child(&self) -> Box<dyn StateView> {
            Box::new(ForeignView)
        }

        fn merge(&mut self, _: &dyn StateView) -> Result<(), ReplayError> {
            Ok(())
        }

        fn drop_delta(&mut self) {}

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_root_falls_back_to_resolver() {
        let calls = Rc::new(Cell::new(0));
        let view = root(Rc::clone(&calls));
        assert_eq!(view.get(b"\x01", b"balance").unwrap(), Some(b"remote:balance".to_vec()));
        assert_eq!(calls.get(), 1);
        assert!(view.is_root());
    }

    #[test]
    fn test_set_then_get() {
        let calls = Rc::new(Cell::new(0));
        let mut view = root(Rc::clone(&calls));
        view.set(b"\x01", b"balance", vec![7]).unwrap();
        assert_eq!(view.get(b"\x01", b"balance").unwrap(), Some(vec![7]));
        view.set(b"\x01", b"balance", vec![]).unwrap();
        assert_eq!(view.get(b"\x01", b"balance").unwrap(), Some(vec![]));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_delete_shadows_parent_and_resolver() {
        let calls = Rc::new(Cell::new(0));
        let mut parent = root(Rc::clone(&calls));
        parent.set(b"\x01", b"a", vec![1]).unwrap();

        let mut child = parent.child();
        child.delete(b"\x01", b"a").unwrap();
        child.delete(b"\x01", b"b").unwrap();

        assert_eq!(child.get(b"\x01", b"a").unwrap(), None);
        assert_eq!(child.get(b"\x01", b"b").unwrap(), None);
        assert_eq!(calls.get(), 0);
        assert_eq!(parent.get(b"\x01", b"a").unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_child_writes_are_invisible_until_merged() {
        let calls = Rc::new(Cell::new(0));
        let mut parent = root(calls);
        parent.set(b"\x01", b"parent-only", vec![1]).unwrap();
        parent.set(b"\x01", b"shared", vec![1]).unwrap();

        let mut child = parent.new_child();
        child.set(b"\x01", b"child-only", vec![2]).unwrap();
        child.set(b"\x01", b"shared", vec![2]).unwrap();
        child.delete(b"\x01", b"parent-only-deleted").unwrap();

        assert_eq!(child.get(b"\x01", b"parent-only").unwrap(), Some(vec![1]));
        assert_eq!(parent.get(b"\x01", b"shared").unwrap(), Some(vec![1]));
        assert_eq!(
            parent.get(b"\x01", b"child-only").unwrap(),
            Some(b"remote:child-only".to_vec())
        );

        parent.merge(child.as_ref()).unwrap();
        assert_eq!(parent.get(b"\x01", b"child-only").unwrap(), Some(vec![2]));
        assert_eq!(parent.get(b"\x01", b"shared").unwrap(), Some(vec![2]));
        assert_eq!(parent.get(b"\x01", b"parent-only").unwrap(), Some(vec![1]));
        assert_eq!(parent.get(b"\x01", b"parent-only-deleted").unwrap(), None);
    }

    #[test]
    fn test_merge_rejects_foreign_views() {
        let mut view = root(Rc::new(Cell::new(0)));
        let err = view.merge(&ForeignView).unwrap_err();
        assert!(matches!(err, ReplayError::TypeMismatch { given } if given.ends_with("ForeignView")));
    }

    #[test]
    fn test_drop_delta_and_updates() {
        let calls = Rc::new(Cell::new(0));
        let mut view = root(Rc::clone(&calls));
        view.set(b"\x02", b"b", vec![2]).unwrap();
        view.delete(b"\x01", b"a").unwrap();

        assert_eq!(
            view.updates(),
            vec![(RegisterKey::new(vec![1], "a"), None), (RegisterKey::new(vec![2], "b"), Some(vec![2]))]
        );

        view.drop_delta();
        assert!(view.updates().is_empty());
        assert_eq!(view.get(b"\x02", b"b").unwrap(), Some(b"remote:b".to_vec()));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_child_outlives_its_creator_handle() {
        let calls = Rc::new(Cell::new(0));
        let mut child = {
            let mut parent = root(Rc::clone(&calls));
            parent.set(b"\x01", b"a", vec![1]).unwrap();
            parent.child()
        };
        child.set(b"\x01", b"b", vec![2]).unwrap();
        assert_eq!(child.get(b"\x01", b"a").unwrap(), Some(vec![1]));
        assert!(!child.is_root());
    }

    #[test]
    fn test_composite_keys_do_not_collide() {
        let mut view = root(Rc::new(Cell::new(0)));
        view.set(b"a~", b"b", vec![1]).unwrap();
        view.set(b"a", b"~b", vec![2]).unwrap();
        assert_eq!(view.get(b"a~", b"b").unwrap(), Some(vec![1]));
        assert_eq!(view.get(b"a", b"~b").unwrap(), Some(vec![2]));
    }
}
