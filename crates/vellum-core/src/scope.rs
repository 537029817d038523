use std::cell::RefCell;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;

use crate::interner::Sym;
use crate::map::ProxyMap;
use crate::value::Value;

/// One binding frame with an optional parent. Scopes form an acyclic chain;
/// closures pin the chain they captured by holding an `Rc` to its head.
#[derive(Debug, Default)]
pub struct Scope {
    bindings: RefCell<HashMap<Sym, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    /// The root of a scope chain (no parent).
    pub fn global() -> Rc<Scope> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn child(self: &Rc<Self>) -> Rc<Scope> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(self)),
        })
    }

    /// Walk the chain upward; clones the value out of the owning frame.
    pub fn lookup(&self, sym: Sym) -> Option<Value> {
        if let Some(v) = self.bindings.borrow().get(&sym) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(sym))
    }

    /// Python-style assignment: update the nearest enclosing frame that
    /// already binds `sym`, otherwise create the binding in this frame.
    pub fn set(&self, sym: Sym, value: Value) {
        let mut scope = self;
        loop {
            if scope.bindings.borrow().contains_key(&sym) {
                scope.bindings.borrow_mut().insert(sym, value);
                return;
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        self.bindings.borrow_mut().insert(sym, value);
    }

    /// Bind in this frame unconditionally, shadowing any parent binding.
    pub fn define(&self, sym: Sym, value: Value) {
        self.bindings.borrow_mut().insert(sym, value);
    }

    pub fn has_local(&self, sym: Sym) -> bool {
        self.bindings.borrow().contains_key(&sym)
    }

    pub fn local_keys(&self) -> Vec<Sym> {
        self.bindings.borrow().keys().copied().collect()
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }
}

/// A `ProxyMap` backed by a scope: `get`/`set`/`has`/`keys` delegate to the
/// scope's bindings. This is what the `global` binding of an execution
/// context is made of. The handle is weak; once the scope is gone the proxy
/// degrades to Nil/false.
pub struct ScopeProxyMap {
    scope: Weak<Scope>,
}

impl ScopeProxyMap {
    pub fn new(scope: &Rc<Scope>) -> Self {
        ScopeProxyMap {
            scope: Rc::downgrade(scope),
        }
    }
}

impl ProxyMap for ScopeProxyMap {
    fn get(&self, key: Sym) -> Value {
        match self.scope.upgrade() {
            Some(scope) => scope.lookup(key).unwrap_or(Value::Nil),
            None => Value::Nil,
        }
    }

    fn set(&self, key: Sym, value: Value) {
        if let Some(scope) = self.scope.upgrade() {
            scope.define(key, value);
        }
    }

    fn has(&self, key: Sym) -> bool {
        self.scope
            .upgrade()
            .is_some_and(|scope| scope.lookup(key).is_some())
    }

    fn remove(&self, _key: Sym) -> bool {
        // Scopes do not support unbinding
        false
    }

    fn keys(&self) -> Vec<Sym> {
        self.scope
            .upgrade()
            .map(|scope| scope.local_keys())
            .unwrap_or_default()
    }
}
