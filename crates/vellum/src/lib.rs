//! Vellum is a small embeddable scripting language for host-application
//! customization: game and simulation content, UI scripting, modding.
//!
//! # Quick start
//!
//! ```no_run
//! use vellum::{ScriptEngine, Value};
//!
//! let engine = ScriptEngine::new();
//! let ctx = engine.create_context();
//! let result = engine.execute_command("(1 + 2)", &ctx);
//! assert_eq!(result.return_value, Value::int(3));
//! ```
//!
//! Hosts register native functions and constants on the engine, hand each
//! script run an [`ExecutionContext`], and collect the event handlers the
//! script registered with `on`.

pub mod builtins;
mod engine;

pub use engine::{CompiledScript, ResourceFinder, ScriptEngine, ScriptResult};

pub use vellum_core::{
    Closure, EvalBreak, EventHandler, ExecutionContext, Interner, MapData, NativeFn, ProxyMap,
    ScriptError, Scope, ScopeProxyMap, SourceLoc, Sym, Value,
};
pub use vellum_eval::{Evaluator, ScriptLoader};
pub use vellum_syntax::{parse, parse_expression};
