use std::any::Any;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::interner::{Interner, Sym};
use crate::scope::{Scope, ScopeProxyMap};
use crate::value::Value;

/// An event handler registered by the `on` statement. The engine never
/// dispatches these; the host iterates and calls them as it wishes.
#[derive(Debug, Clone)]
pub struct EventHandler {
    pub event: Sym,
    pub handler: Value,
}

/// Per-invocation collaborator: a scope that is a child of the engine's
/// global scope, the event handlers collected by `on`, and an opaque host
/// payload.
///
/// The context scope also carries a `global` binding: a proxy map over the
/// context scope itself, so `global.x` reaches past shadowing `let` bindings
/// from any nested scope.
pub struct ExecutionContext {
    interner: Rc<RefCell<Interner>>,
    scope: Rc<Scope>,
    event_handlers: RefCell<Vec<EventHandler>>,
    user_data: RefCell<Option<Rc<dyn Any>>>,
}

impl ExecutionContext {
    pub fn new(global_scope: &Rc<Scope>, interner: Rc<RefCell<Interner>>) -> Self {
        let scope = global_scope.child();
        let global_sym = interner.borrow_mut().intern(b"global");
        let proxy: Rc<dyn crate::map::ProxyMap> = Rc::new(ScopeProxyMap::new(&scope));
        scope.define(global_sym, Value::proxy_map(proxy));
        ExecutionContext {
            interner,
            scope,
            event_handlers: RefCell::new(Vec::new()),
            user_data: RefCell::new(None),
        }
    }

    /// Bind a value in the context scope (visible to scripts run with this
    /// context, invisible to other contexts on the same engine).
    pub fn set(&self, name: &str, value: Value) {
        let sym = self.interner.borrow_mut().intern(name.as_bytes());
        self.scope.define(sym, value);
    }

    /// Read a binding visible from the context scope; Nil if unbound.
    pub fn get(&self, name: &str) -> Value {
        let sym = self.interner.borrow_mut().intern(name.as_bytes());
        self.scope.lookup(sym).unwrap_or(Value::Nil)
    }

    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }

    pub fn interner(&self) -> &Rc<RefCell<Interner>> {
        &self.interner
    }

    pub fn register_event_handler(&self, event: Sym, handler: Value) {
        self.event_handlers
            .borrow_mut()
            .push(EventHandler { event, handler });
    }

    pub fn event_handlers(&self) -> Ref<'_, Vec<EventHandler>> {
        self.event_handlers.borrow()
    }

    pub fn set_user_data(&self, data: Rc<dyn Any>) {
        *self.user_data.borrow_mut() = Some(data);
    }

    pub fn user_data(&self) -> Option<Rc<dyn Any>> {
        self.user_data.borrow().clone()
    }
}
