pub mod format;

mod eval;
mod methods;
mod ops;

pub use eval::{Evaluator, ScriptLoader};
