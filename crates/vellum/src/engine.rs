use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use vellum_core::{
    EvalBreak, ExecutionContext, Interner, NativeFn, Node, ScriptError, Scope, SourceLoc, Sym,
    Value,
};
use vellum_eval::{Evaluator, ScriptLoader};

/// Resolves a script name (e.g. "blocks/torch") to a filesystem path. Hosts
/// implement this for mod directories, asset bundles, search paths and the
/// like. Without one, the name is used as a path directly.
pub trait ResourceFinder {
    fn resolve(&self, name: &str) -> Option<PathBuf>;
}

/// A parsed script: the AST root plus the name used in error reports.
pub struct CompiledScript {
    pub root: Rc<Node>,
    pub name: String,
}

/// Outcome of `execute`/`execute_command`. The first error is converted into
/// this record; other host APIs surface `ScriptError` directly.
#[derive(Debug, Clone)]
pub struct ScriptResult {
    pub success: bool,
    pub return_value: Value,
    pub error: String,
    pub script_name: String,
    pub error_line: u32,
    pub error_column: u32,
}

impl ScriptResult {
    fn success(return_value: Value, script_name: &str) -> Self {
        ScriptResult {
            success: true,
            return_value,
            error: String::new(),
            script_name: script_name.to_string(),
            error_line: 0,
            error_column: 0,
        }
    }

    fn failure(err: &ScriptError, script_name: &str) -> Self {
        let loc = err.loc();
        ScriptResult {
            success: false,
            return_value: Value::Nil,
            error: err.to_string(),
            script_name: script_name.to_string(),
            error_line: loc.line,
            error_column: loc.column,
        }
    }
}

struct CachedScript {
    script: Rc<CompiledScript>,
    modified: SystemTime,
}

/// The host-facing engine: owns the interner, the global scope, the parsed
/// script cache and the resource finder. Create one per embed; contexts made
/// from it share its globals.
pub struct ScriptEngine {
    interner: Rc<RefCell<Interner>>,
    global_scope: Rc<Scope>,
    resource_finder: RefCell<Option<Box<dyn ResourceFinder>>>,
    cache: RefCell<HashMap<PathBuf, CachedScript>>,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    pub fn new() -> Self {
        let engine = ScriptEngine {
            interner: Rc::new(RefCell::new(Interner::new())),
            global_scope: Scope::global(),
            resource_finder: RefCell::new(None),
            cache: RefCell::new(HashMap::new()),
        };
        crate::builtins::register_builtins(&engine);
        engine
    }

    /// A fresh per-invocation context whose scope is a child of the global
    /// scope (and which carries the `global` proxy binding).
    pub fn create_context(&self) -> ExecutionContext {
        ExecutionContext::new(&self.global_scope, Rc::clone(&self.interner))
    }

    // -- Parsing --

    /// Parse a program. Source is a byte sequence (`&str` works through
    /// `AsRef`); scripts need not be valid UTF-8.
    pub fn parse_string(
        &self,
        source: impl AsRef<[u8]>,
        name: &str,
    ) -> Result<CompiledScript, ScriptError> {
        let root = vellum_syntax::parse(source.as_ref(), 0, &mut self.interner.borrow_mut())?;
        Ok(CompiledScript {
            root,
            name: name.to_string(),
        })
    }

    /// Parse a single expression (REPL / one-shot use).
    pub fn parse_expression(
        &self,
        source: impl AsRef<[u8]>,
        name: &str,
    ) -> Result<CompiledScript, ScriptError> {
        let root =
            vellum_syntax::parse_expression(source.as_ref(), 0, &mut self.interner.borrow_mut())?;
        Ok(CompiledScript {
            root,
            name: name.to_string(),
        })
    }

    /// Load and parse a script file, cached by path plus modification time.
    pub fn load_script(&self, path: &Path) -> Result<Rc<CompiledScript>, ScriptError> {
        let modified = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|e| {
                ScriptError::runtime(
                    format!("Cannot open script file: {}: {e}", path.display()),
                    SourceLoc::default(),
                )
            })?;

        if let Some(cached) = self.cache.borrow().get(path) {
            if cached.modified == modified {
                return Ok(Rc::clone(&cached.script));
            }
        }

        // Raw bytes: the lexer is byte-oriented and non-UTF-8 scripts load fine
        let source = std::fs::read(path).map_err(|e| {
            ScriptError::runtime(
                format!("Cannot open script file: {}: {e}", path.display()),
                SourceLoc::default(),
            )
        })?;
        let script = Rc::new(self.parse_string(&source, &path.display().to_string())?);
        self.cache.borrow_mut().insert(
            path.to_path_buf(),
            CachedScript {
                script: Rc::clone(&script),
                modified,
            },
        );
        Ok(script)
    }

    pub fn invalidate_cache(&self, path: &Path) {
        self.cache.borrow_mut().remove(path);
    }

    pub fn invalidate_all_caches(&self) {
        self.cache.borrow_mut().clear();
    }

    // -- Execution --

    pub fn execute(&self, script: &CompiledScript, ctx: &ExecutionContext) -> ScriptResult {
        let evaluator = Evaluator::new(Rc::clone(&self.interner), Some(self));
        match evaluator.eval(&script.root, ctx.scope(), Some(ctx)) {
            Ok(value) => ScriptResult::success(value, &script.name),
            // A top-level return ends the script with that value
            Err(EvalBreak::Return(value)) => ScriptResult::success(value, &script.name),
            Err(EvalBreak::Error(err)) => ScriptResult::failure(&err, &script.name),
        }
    }

    pub fn execute_command(
        &self,
        command: impl AsRef<[u8]>,
        ctx: &ExecutionContext,
    ) -> ScriptResult {
        match self.parse_string(command, "<command>") {
            Ok(script) => self.execute(&script, ctx),
            Err(err) => ScriptResult::failure(&err, "<command>"),
        }
    }

    /// Host-initiated dispatch to any callable value (closure or native).
    pub fn call_function(
        &self,
        callable: &Value,
        args: Vec<Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, ScriptError> {
        let evaluator = Evaluator::new(Rc::clone(&self.interner), Some(self));
        match evaluator.call_function(callable, args, Some(ctx), SourceLoc::default()) {
            Ok(value) => Ok(value),
            Err(EvalBreak::Return(value)) => Ok(value),
            Err(EvalBreak::Error(err)) => Err(err),
        }
    }

    // -- Registration --

    pub fn register_function(
        &self,
        name: &str,
        f: impl Fn(&ExecutionContext, &[Value]) -> Result<Value, ScriptError> + 'static,
    ) {
        let sym = self.intern(name);
        self.global_scope.define(sym, Value::native(NativeFn::new(name, f)));
    }

    pub fn register_constant(&self, name: &str, value: Value) {
        let sym = self.intern(name);
        self.global_scope.define(sym, value);
    }

    pub fn set_resource_finder(&self, finder: Box<dyn ResourceFinder>) {
        *self.resource_finder.borrow_mut() = Some(finder);
    }

    // -- Interner --

    /// Replace the engine's interner. Do this before registering functions
    /// or parsing anything; symbols minted by the old interner do not carry
    /// over.
    pub fn set_interner(&self, interner: Interner) {
        *self.interner.borrow_mut() = interner;
    }

    pub fn intern(&self, bytes: impl AsRef<[u8]>) -> Sym {
        self.interner.borrow_mut().intern(bytes.as_ref())
    }

    /// The display form of a symbol (lossy for non-UTF-8 names); None for a
    /// foreign id.
    pub fn lookup_symbol(&self, sym: Sym) -> Option<String> {
        self.interner
            .borrow()
            .try_resolve(sym)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn interner(&self) -> &Rc<RefCell<Interner>> {
        &self.interner
    }

    pub fn global_scope(&self) -> &Rc<Scope> {
        &self.global_scope
    }

    /// Render a value the way scripts see it (symbols resolved).
    pub fn display_value(&self, value: &Value) -> String {
        value.to_display_string(Some(&self.interner.borrow()))
    }

    fn resolve_script(&self, name: &str) -> Option<PathBuf> {
        match &*self.resource_finder.borrow() {
            Some(finder) => finder.resolve(name),
            None => Some(PathBuf::from(name)),
        }
    }
}

impl ScriptLoader for ScriptEngine {
    fn load_script(&self, name: &str, loc: SourceLoc) -> Result<Rc<Node>, ScriptError> {
        let Some(path) = self.resolve_script(name) else {
            return Err(ScriptError::runtime(
                format!("Cannot resolve script: {name}"),
                loc,
            ));
        };
        let script = ScriptEngine::load_script(self, &path)?;
        Ok(Rc::clone(&script.root))
    }
}
