use std::fmt;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use crate::interner::Sym;
use crate::value::Value;

/// A map whose entries live outside the interpreter: reads and writes are
/// delegated to host code (entity properties, widget state, a scope, ...).
pub trait ProxyMap {
    fn get(&self, key: Sym) -> Value;
    fn set(&self, key: Sym, value: Value);
    fn has(&self, key: Sym) -> bool;
    /// May be unsupported; return false in that case.
    fn remove(&self, key: Sym) -> bool;
    fn keys(&self) -> Vec<Sym>;
}

/// Unified map storage: either a local hash map or a proxy. The evaluator
/// never cares which. Method flags are always stored locally, even for
/// proxy-backed maps.
#[derive(Default)]
pub struct MapData {
    proxy: Option<Rc<dyn ProxyMap>>,
    entries: HashMap<Sym, Value>,
    method_keys: HashSet<Sym>,
}

impl MapData {
    pub fn new() -> Self {
        MapData::default()
    }

    pub fn with_proxy(proxy: Rc<dyn ProxyMap>) -> Self {
        MapData {
            proxy: Some(proxy),
            entries: HashMap::new(),
            method_keys: HashSet::new(),
        }
    }

    /// Missing keys read as Nil; a map may also explicitly store Nil.
    pub fn get(&self, key: Sym) -> Value {
        if let Some(proxy) = &self.proxy {
            return proxy.get(key);
        }
        self.entries.get(&key).cloned().unwrap_or(Value::Nil)
    }

    pub fn set(&mut self, key: Sym, value: Value) {
        if let Some(proxy) = &self.proxy {
            proxy.set(key, value);
            return;
        }
        self.entries.insert(key, value);
    }

    pub fn has(&self, key: Sym) -> bool {
        if let Some(proxy) = &self.proxy {
            return proxy.has(key);
        }
        self.entries.contains_key(&key)
    }

    pub fn remove(&mut self, key: Sym) -> bool {
        self.method_keys.remove(&key);
        if let Some(proxy) = &self.proxy {
            return proxy.remove(key);
        }
        self.entries.remove(&key).is_some()
    }

    pub fn keys(&self) -> Vec<Sym> {
        if let Some(proxy) = &self.proxy {
            return proxy.keys();
        }
        self.entries.keys().copied().collect()
    }

    /// Store a value and mark the key as a method (dot-call passes the
    /// receiver as the implicit first argument).
    pub fn set_method(&mut self, key: Sym, value: Value) {
        if let Some(proxy) = &self.proxy {
            proxy.set(key, value);
        } else {
            self.entries.insert(key, value);
        }
        self.method_keys.insert(key);
    }

    /// Mark an existing key as a method without changing the stored value.
    pub fn mark_method(&mut self, key: Sym) {
        self.method_keys.insert(key);
    }

    /// Unmark a key; re-applied by the auto-method rule on each overwrite.
    pub fn clear_method(&mut self, key: Sym) {
        self.method_keys.remove(&key);
    }

    pub fn is_method(&self, key: Sym) -> bool {
        self.method_keys.contains(&key)
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy.is_some()
    }

    pub fn len(&self) -> usize {
        if self.proxy.is_some() {
            self.keys().len()
        } else {
            self.entries.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MapData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_proxy() {
            write!(f, "MapData(proxy)")
        } else {
            write!(f, "MapData({} entries)", self.entries.len())
        }
    }
}
