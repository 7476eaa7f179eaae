use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use tracing::trace;

/// Registry of execution-context stacks that act as roots.
///
/// Values are reference counted, so a registered stack keeps its frames' values alive by owning them; the registry
/// records which stacks exist so that hosts can observe when contexts are destroyed. A suspended stack that holds its
/// own thread is a cycle and stays registered until it is closed or runs to completion.
#[derive(Debug, Default)]
pub struct RootRegistry {
    roots: RefCell<BTreeSet<u64>>,
    next_id: Cell<u64>,
}

impl RootRegistry {
    pub fn new() -> RootRegistry {
        RootRegistry::default()
    }

    /// Registers a new stack and returns its id
    pub(crate) fn register(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.roots.borrow_mut().insert(id);
        trace!(target: "lua_runtime::gc", id, "root registered");
        id
    }

    pub(crate) fn unregister(&self, id: u64) {
        self.roots.borrow_mut().remove(&id);
        trace!(target: "lua_runtime::gc", id, "root unregistered");
    }

    pub fn contains(&self, id: u64) -> bool {
        self.roots.borrow().contains(&id)
    }

    pub fn count(&self) -> usize {
        self.roots.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let registry = RootRegistry::new();
        let a = registry.register();
        let b = registry.register();
        assert_ne!(a, b);
        assert_eq!(registry.count(), 2);
        registry.unregister(a);
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
    }
}
