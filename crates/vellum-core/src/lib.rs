pub mod ast;
pub mod context;
pub mod error;
pub mod interner;
pub mod map;
pub mod scope;
pub mod value;

pub use ast::{BinOp, FnDef, Node, NodeKind};
pub use context::{EventHandler, ExecutionContext};
pub use error::{EvalBreak, EvalResult, ScriptError, SourceLoc};
pub use interner::{Interner, Sym};
pub use map::{MapData, ProxyMap};
pub use scope::{Scope, ScopeProxyMap};
pub use value::{ArrayHandle, Closure, MapHandle, NativeFn, NativeFnInner, StringHandle, Value};
