use vellum::{ExecutionContext, ScriptEngine, Value};

/// Engine plus a persistent context, so multi-command tests share bindings.
pub struct TestEnv {
    pub engine: ScriptEngine,
    pub ctx: ExecutionContext,
}

impl TestEnv {
    pub fn new() -> Self {
        let engine = ScriptEngine::new();
        let ctx = engine.create_context();
        TestEnv { engine, ctx }
    }

    pub fn run(&self, source: &str) -> Value {
        let result = self.engine.execute_command(source, &self.ctx);
        assert!(
            result.success,
            "script failed for {source:?}: {}",
            result.error
        );
        result.return_value
    }

    #[allow(dead_code)]
    pub fn run_err(&self, source: &str) -> String {
        let result = self.engine.execute_command(source, &self.ctx);
        assert!(!result.success, "expected failure for {source:?}");
        result.error
    }

    #[allow(dead_code)]
    pub fn symbol_name(&self, value: &Value) -> String {
        let sym = value.as_symbol().expect("expected a symbol");
        self.engine.lookup_symbol(sym).expect("unknown symbol")
    }
}
