use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::Node;
use crate::context::ExecutionContext;
use crate::error::ScriptError;
use crate::interner::{Interner, Sym};
use crate::map::{MapData, ProxyMap};
use crate::scope::Scope;

/// Script strings are shared, mutable byte buffers. All string operations are
/// byte-oriented; display goes through lossy UTF-8.
pub type StringHandle = Rc<RefCell<Vec<u8>>>;
pub type ArrayHandle = Rc<RefCell<Vec<Value>>>;
pub type MapHandle = Rc<RefCell<MapData>>;

/// A script function: parameter layout plus the captured lexical scope and an
/// `Rc` handle to the body subtree (which keeps the AST alive for as long as
/// the closure exists).
#[derive(Clone)]
pub struct Closure {
    pub params: Vec<Sym>,
    pub num_required: usize,
    pub defaults: Vec<Rc<Node>>,
    pub rest_param: Option<Sym>,
    pub kwargs_param: Option<Sym>,
    pub body: Rc<Node>,
    pub scope: Rc<Scope>,
    pub name: Option<Sym>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Closure({} params{})",
            self.params.len(),
            if self.name.is_some() { ", named" } else { "" }
        )
    }
}

/// A host-supplied callable. From the script's perspective it looks like a
/// regular function.
pub type NativeFnInner = dyn Fn(&ExecutionContext, &[Value]) -> Result<Value, ScriptError>;

pub struct NativeFn {
    pub name: String,
    pub func: Box<NativeFnInner>,
}

impl NativeFn {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&ExecutionContext, &[Value]) -> Result<Value, ScriptError> + 'static,
    ) -> Self {
        NativeFn {
            name: name.into(),
            func: Box::new(f),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native-fn {}>", self.name)
    }
}

/// The universal runtime value. Strings, arrays and maps are shared handles:
/// mutation through one alias is visible through all others.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Symbol(Sym),
    String(StringHandle),
    Array(ArrayHandle),
    Map(MapHandle),
    Closure(Rc<Closure>),
    Native(Rc<NativeFn>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

// -- Constructors --

impl Value {
    pub fn nil() -> Value {
        Value::Nil
    }

    pub fn bool(b: bool) -> Value {
        Value::Bool(b)
    }

    pub fn int(n: i64) -> Value {
        Value::Int(n)
    }

    pub fn float(f: f64) -> Value {
        Value::Float(f)
    }

    pub fn symbol(sym: Sym) -> Value {
        Value::Symbol(sym)
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Value {
        Value::String(Rc::new(RefCell::new(bytes.into())))
    }

    pub fn string_from_handle(handle: StringHandle) -> Value {
        Value::String(handle)
    }

    pub fn array(elems: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elems)))
    }

    pub fn array_from_handle(handle: ArrayHandle) -> Value {
        Value::Array(handle)
    }

    pub fn map() -> Value {
        Value::Map(Rc::new(RefCell::new(MapData::new())))
    }

    pub fn map_from_data(data: MapData) -> Value {
        Value::Map(Rc::new(RefCell::new(data)))
    }

    pub fn map_from_handle(handle: MapHandle) -> Value {
        Value::Map(handle)
    }

    pub fn proxy_map(proxy: Rc<dyn ProxyMap>) -> Value {
        Value::Map(Rc::new(RefCell::new(MapData::with_proxy(proxy))))
    }

    pub fn closure(closure: Rc<Closure>) -> Value {
        Value::Closure(closure)
    }

    pub fn native(f: NativeFn) -> Value {
        Value::Native(Rc::new(f))
    }
}

// -- Type queries and accessors --

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_closure(&self) -> bool {
        matches!(self, Value::Closure(_))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Value::Native(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Native(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric value of an Int or Float, widened to f64.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Sym> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn string_handle(&self) -> Option<&StringHandle> {
        match self {
            Value::String(h) => Some(h),
            _ => None,
        }
    }

    pub fn array_handle(&self) -> Option<&ArrayHandle> {
        match self {
            Value::Array(h) => Some(h),
            _ => None,
        }
    }

    pub fn map_handle(&self) -> Option<&MapHandle> {
        match self {
            Value::Map(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&Rc<Closure>> {
        match self {
            Value::Closure(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&Rc<NativeFn>> {
        match self {
            Value::Native(n) => Some(n),
            _ => None,
        }
    }

    /// Only Nil and false are falsy. 0, 0.0, "", [] and empty maps are truthy.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Symbol(_) => "symbol",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Closure(_) | Value::Native(_) => "function",
        }
    }
}

// -- Equality --
//
// Content equality for primitives, strings and arrays; identity for maps,
// closures and natives. Int and Float are never equal across types.

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// -- Display --

impl Value {
    /// Render for user-facing output (interpolation, `print`, the REPL).
    /// Symbols render as `:name` when an interner is available.
    pub fn to_display_string(&self, interner: Option<&Interner>) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Symbol(sym) => match interner.and_then(|i| i.try_resolve(*sym)) {
                Some(name) => format!(":{}", String::from_utf8_lossy(name)),
                None => format!(":<{}>", sym.index()),
            },
            Value::String(s) => String::from_utf8_lossy(&s.borrow()).into_owned(),
            Value::Array(arr) => {
                let mut out = String::from("[");
                for (i, elem) in arr.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(&elem.to_display_string(interner));
                }
                out.push(']');
                out
            }
            Value::Map(_) => "<map>".to_string(),
            Value::Closure(c) => match c.name.and_then(|n| interner.and_then(|i| i.try_resolve(n))) {
                Some(name) => format!("<fn:{}>", String::from_utf8_lossy(name)),
                None => "<fn>".to_string(),
            },
            Value::Native(_) => "<native-fn>".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string(None))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Symbol(s) => write!(f, "Symbol({})", s.index()),
            Value::String(s) => {
                write!(f, "String({:?})", String::from_utf8_lossy(&s.borrow()))
            }
            Value::Array(arr) => write!(f, "Array({:?})", arr.borrow()),
            Value::Map(m) => write!(f, "Map({:?})", m.borrow()),
            Value::Closure(c) => write!(f, "{c:?}"),
            Value::Native(n) => write!(f, "{n:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.truthy());
        assert!(!Value::bool(false).truthy());
        assert!(Value::bool(true).truthy());
        assert!(Value::int(0).truthy());
        assert!(Value::float(0.0).truthy());
        assert!(Value::string("").truthy());
        assert!(Value::array(vec![]).truthy());
        assert!(Value::map().truthy());
    }

    #[test]
    fn primitive_equality() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::int(42), Value::int(42));
        assert_ne!(Value::int(42), Value::int(43));
        assert_eq!(Value::float(1.5), Value::float(1.5));
        assert_eq!(Value::bool(true), Value::bool(true));
        assert_ne!(Value::bool(true), Value::bool(false));
    }

    #[test]
    fn int_and_float_are_never_equal() {
        assert_ne!(Value::int(1), Value::float(1.0));
        assert_ne!(Value::float(0.0), Value::int(0));
    }

    #[test]
    fn string_equality_is_by_content() {
        assert_eq!(Value::string("abc"), Value::string("abc"));
        assert_ne!(Value::string("abc"), Value::string("abd"));
    }

    #[test]
    fn array_equality_is_elementwise() {
        let a = Value::array(vec![Value::int(1), Value::string("x")]);
        let b = Value::array(vec![Value::int(1), Value::string("x")]);
        let c = Value::array(vec![Value::int(1)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn map_equality_is_by_identity() {
        let a = Value::map();
        let b = Value::map();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn string_mutation_is_visible_through_aliases() {
        let a = Value::string("hi");
        let b = a.clone();
        if let Value::String(h) = &a {
            h.borrow_mut().push(b'!');
        }
        assert_eq!(b, Value::string("hi!"));
    }

    #[test]
    fn display_primitives() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::bool(true).to_string(), "true");
        assert_eq!(Value::int(-3).to_string(), "-3");
        assert_eq!(Value::float(0.5).to_string(), "0.5");
        assert_eq!(Value::string("hey").to_string(), "hey");
        assert_eq!(
            Value::array(vec![Value::int(1), Value::int(2)]).to_string(),
            "[1 2]"
        );
        assert_eq!(Value::map().to_string(), "<map>");
    }

    #[test]
    fn symbol_display_with_interner() {
        let mut interner = Interner::new();
        let sym = interner.intern(b"stone");
        let v = Value::symbol(sym);
        assert_eq!(v.to_display_string(Some(&interner)), ":stone");
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::int(1).type_name(), "int");
        assert_eq!(Value::float(1.0).type_name(), "float");
        assert_eq!(Value::string("").type_name(), "string");
        assert_eq!(Value::array(vec![]).type_name(), "array");
        assert_eq!(Value::map().type_name(), "map");
    }
}
