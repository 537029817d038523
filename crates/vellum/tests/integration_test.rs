mod common;

use std::path::PathBuf;
use std::rc::Rc;

use common::TestEnv;
use vellum::{ResourceFinder, ScriptEngine, ScriptError, Value};

// === Basic pipeline ===

#[test]
fn parse_and_execute_expression() {
    let env = TestEnv::new();
    assert_eq!(env.run("(1 + 2)"), Value::int(3));
}

#[test]
fn multi_statement_script() {
    let env = TestEnv::new();
    assert_eq!(env.run("set x 10\nset y 20\n(x + y)"), Value::int(30));
}

// === Native functions and constants ===

#[test]
fn register_and_call_native_function() {
    let engine = ScriptEngine::new();
    engine.register_function("add_native", |_ctx, args| {
        if args.len() < 2 {
            return Ok(Value::Nil);
        }
        let (Some(a), Some(b)) = (args[0].as_int(), args[1].as_int()) else {
            return Ok(Value::Nil);
        };
        Ok(Value::int(a + b))
    });

    let ctx = engine.create_context();
    let result = engine.execute_command("add_native 10 20", &ctx);
    assert!(result.success);
    assert_eq!(result.return_value, Value::int(30));
}

#[test]
fn native_function_reads_the_context() {
    let engine = ScriptEngine::new();
    engine.register_function("get_player_name", |ctx, _args| Ok(ctx.get("player_name")));

    let ctx = engine.create_context();
    ctx.set("player_name", Value::string("Alice"));
    let result = engine.execute_command("get_player_name", &ctx);
    assert!(result.success);
    assert_eq!(result.return_value, Value::string("Alice"));
}

#[test]
fn native_function_with_named_args_receives_kwargs_map() {
    let engine = ScriptEngine::new();
    engine.register_function("last_is_map", |_ctx, args| {
        Ok(Value::bool(matches!(args.last(), Some(Value::Map(_)))))
    });

    let ctx = engine.create_context();
    let result = engine.execute_command("last_is_map 1 =color \"red\"", &ctx);
    assert!(result.success);
    assert_eq!(result.return_value, Value::bool(true));
}

#[test]
fn register_constant() {
    let engine = ScriptEngine::new();
    engine.register_constant("MAX_HEALTH", Value::int(100));
    let ctx = engine.create_context();
    let result = engine.execute_command("MAX_HEALTH", &ctx);
    assert_eq!(result.return_value, Value::int(100));
}

// === Contexts ===

#[test]
fn context_variables() {
    let engine = ScriptEngine::new();
    let ctx = engine.create_context();
    ctx.set("block_type", Value::string("stone"));
    ctx.set("block_x", Value::int(10));

    assert_eq!(
        engine.execute_command("block_type", &ctx).return_value,
        Value::string("stone")
    );
    assert_eq!(
        engine.execute_command("block_x", &ctx).return_value,
        Value::int(10)
    );
}

#[test]
fn contexts_are_isolated() {
    let engine = ScriptEngine::new();
    let ctx1 = engine.create_context();
    let ctx2 = engine.create_context();
    ctx1.set("x", Value::int(1));
    ctx2.set("x", Value::int(2));

    assert_eq!(engine.execute_command("x", &ctx1).return_value, Value::int(1));
    assert_eq!(engine.execute_command("x", &ctx2).return_value, Value::int(2));
}

// === Event handlers ===

#[test]
fn on_collects_event_handlers() {
    let env = TestEnv::new();
    env.run("on :interact do\n    42\nend");
    env.run("on :destroy do\n    0\nend");

    let handlers = env.ctx.event_handlers();
    assert_eq!(handlers.len(), 2);
    assert_eq!(
        env.engine.lookup_symbol(handlers[0].event).as_deref(),
        Some("interact")
    );
    assert_eq!(
        env.engine.lookup_symbol(handlers[1].event).as_deref(),
        Some("destroy")
    );
    assert!(handlers[0].handler.is_closure());
    assert!(handlers[1].handler.is_closure());
}

#[test]
fn event_handlers_run_through_call_function() {
    let env = TestEnv::new();
    env.run("set hits 0");
    env.run("on :interact do\n    set hits (hits + 1)\nend");

    let handler = env.ctx.event_handlers()[0].handler.clone();
    env.engine.call_function(&handler, vec![], &env.ctx).unwrap();
    env.engine.call_function(&handler, vec![], &env.ctx).unwrap();
    assert_eq!(env.run("hits"), Value::int(2));
}

#[test]
fn on_registers_against_the_context_active_at_call_time() {
    let env = TestEnv::new();
    // The registration happens when the closure runs, not when it is defined
    env.run("fn install [] do\n    on :tick do\n        1\n    end\nend");
    assert!(env.ctx.event_handlers().is_empty());
    env.run("install");
    assert_eq!(env.ctx.event_handlers().len(), 1);
}

// === Compiled scripts ===

#[test]
fn compiled_script_reuse_across_contexts() {
    let engine = ScriptEngine::new();
    let script = engine.parse_string("(x * x)", "square_test").unwrap();

    let ctx1 = engine.create_context();
    ctx1.set("x", Value::int(5));
    assert_eq!(engine.execute(&script, &ctx1).return_value, Value::int(25));

    let ctx2 = engine.create_context();
    ctx2.set("x", Value::int(7));
    assert_eq!(engine.execute(&script, &ctx2).return_value, Value::int(49));
}

#[test]
fn closure_survives_across_commands() {
    let env = TestEnv::new();
    env.run(
        "fn makeCounter [] do\n    set count 0\n    fn [] do\n        set count (count + 1)\n        count\n    end\nend",
    );
    env.run("set counter {makeCounter}");
    assert_eq!(env.run("counter"), Value::int(1));
    assert_eq!(env.run("counter"), Value::int(2));
}

// === Error reporting ===

#[test]
fn runtime_error_reporting() {
    let env = TestEnv::new();
    let result = env.engine.execute_command("(1 / 0)", &env.ctx);
    assert!(!result.success);
    assert!(result.error.contains("Division by zero"));
    assert_eq!(result.script_name, "<command>");
    assert!(result.error_line > 0);
}

#[test]
fn parse_error_reporting() {
    let env = TestEnv::new();
    let result = env.engine.execute_command("(1 +)", &env.ctx);
    assert!(!result.success);
    assert!(!result.error.is_empty());
}

#[test]
fn top_level_return_becomes_the_script_result() {
    let env = TestEnv::new();
    let result = env.engine.execute_command("return 42", &env.ctx);
    assert!(result.success);
    assert_eq!(result.return_value, Value::int(42));
}

// === source and the script cache ===

fn write_temp_script(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, contents).expect("failed to write temp script");
    path
}

#[test]
fn source_loads_into_the_current_scope() {
    let path = write_temp_script("vellum_test_source.vel", "set sourced_var 42\n");
    let env = TestEnv::new();
    env.run(&format!("source \"{}\"", path.display()));
    assert_eq!(env.run("sourced_var"), Value::int(42));
    let _ = std::fs::remove_file(path);
}

#[test]
fn source_with_function_definition() {
    let path = write_temp_script("vellum_test_source_fn.vel", "fn sourced_add [a b] (a + b)\n");
    let env = TestEnv::new();
    env.run(&format!("source \"{}\"", path.display()));
    assert_eq!(env.run("sourced_add 3 4"), Value::int(7));
    let _ = std::fs::remove_file(path);
}

#[test]
fn source_unresolved_fails() {
    let env = TestEnv::new();
    env.run_err("source \"/nonexistent/vellum_script.vel\"");
}

struct PrefixFinder {
    base: PathBuf,
}

impl ResourceFinder for PrefixFinder {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        if name == "missing" {
            return None;
        }
        Some(self.base.join(name))
    }
}

#[test]
fn resource_finder_resolves_script_names() {
    let path = write_temp_script("vellum_test_finder.vel", "set found 1\n");
    let engine = ScriptEngine::new();
    engine.set_resource_finder(Box::new(PrefixFinder {
        base: std::env::temp_dir(),
    }));
    let ctx = engine.create_context();

    let result = engine.execute_command("source \"vellum_test_finder.vel\"", &ctx);
    assert!(result.success, "{}", result.error);
    assert_eq!(engine.execute_command("found", &ctx).return_value, Value::int(1));

    let result = engine.execute_command("source \"missing\"", &ctx);
    assert!(!result.success);
    assert!(result.error.contains("Cannot resolve script"));

    let _ = std::fs::remove_file(path);
}

#[test]
fn load_script_accepts_non_utf8_bytes() {
    let path = std::env::temp_dir().join("vellum_test_raw_bytes.vel");
    std::fs::write(&path, b"set s \"a\xffb\"\ns.length\n").unwrap();
    let engine = ScriptEngine::new();
    let ctx = engine.create_context();

    let script = engine.load_script(&path).unwrap();
    let result = engine.execute(&script, &ctx);
    assert!(result.success, "{}", result.error);
    assert_eq!(result.return_value, Value::int(3));

    let _ = std::fs::remove_file(path);
}

#[test]
fn load_script_caches_by_path() {
    let path = write_temp_script("vellum_test_cache.vel", "42\n");
    let engine = ScriptEngine::new();

    let first = engine.load_script(&path).unwrap();
    let second = engine.load_script(&path).unwrap();
    assert!(Rc::ptr_eq(&first, &second));

    let _ = std::fs::remove_file(path);
}

#[test]
fn cache_invalidation_forces_a_reparse() {
    let path = write_temp_script("vellum_test_invalidate.vel", "42\n");
    let engine = ScriptEngine::new();

    let first = engine.load_script(&path).unwrap();
    engine.invalidate_cache(&path);
    std::fs::write(&path, "99\n").unwrap();

    let second = engine.load_script(&path).unwrap();
    assert!(!Rc::ptr_eq(&first, &second));
    let ctx = engine.create_context();
    assert_eq!(engine.execute(&second, &ctx).return_value, Value::int(99));

    let _ = std::fs::remove_file(path);
}

// === Interner API ===

#[test]
fn intern_and_lookup_symbol() {
    let engine = ScriptEngine::new();
    let id = engine.intern("test_symbol");
    assert_eq!(engine.lookup_symbol(id).as_deref(), Some("test_symbol"));
    assert_eq!(engine.intern("test_symbol"), id);
}

#[test]
fn set_interner_replaces_the_table() {
    let engine = ScriptEngine::new();
    engine.set_interner(vellum::Interner::new());
    let id = engine.intern("custom_test");
    assert_eq!(engine.lookup_symbol(id).as_deref(), Some("custom_test"));
}

// === callFunction ===

#[test]
fn call_function_with_script_closure() {
    let env = TestEnv::new();
    env.run("fn double [x] (x * 2)");
    let closure = env.run("~double");
    assert!(closure.is_closure());

    let result = env
        .engine
        .call_function(&closure, vec![Value::int(21)], &env.ctx)
        .unwrap();
    assert_eq!(result, Value::int(42));
}

#[test]
fn call_function_with_native_function() {
    let engine = ScriptEngine::new();
    engine.register_function("add_native", |_ctx, args| {
        Ok(Value::int(
            args[0].as_int().unwrap() + args[1].as_int().unwrap(),
        ))
    });
    let ctx = engine.create_context();

    let native = engine.execute_command("~add_native", &ctx).return_value;
    assert!(native.is_native());
    let result = engine
        .call_function(&native, vec![Value::int(10), Value::int(32)], &ctx)
        .unwrap();
    assert_eq!(result, Value::int(42));
}

#[test]
fn call_function_with_stateful_closure() {
    let env = TestEnv::new();
    env.run(
        "fn makeCounter [] do\n    set n 0\n    fn [] do\n        set n (n + 1)\n        n\n    end\nend\nset counter {makeCounter}",
    );
    let counter = env.run("~counter");

    let v1 = env.engine.call_function(&counter, vec![], &env.ctx).unwrap();
    let v2 = env.engine.call_function(&counter, vec![], &env.ctx).unwrap();
    let v3 = env.engine.call_function(&counter, vec![], &env.ctx).unwrap();
    assert_eq!(v1, Value::int(1));
    assert_eq!(v2, Value::int(2));
    assert_eq!(v3, Value::int(3));
}

#[test]
fn call_function_on_non_callable_fails() {
    let env = TestEnv::new();
    let err = env
        .engine
        .call_function(&Value::int(5), vec![], &env.ctx)
        .unwrap_err();
    assert!(matches!(err, ScriptError::Runtime { .. }));
}

#[test]
fn call_function_with_extracted_method() {
    let env = TestEnv::new();
    env.run("set obj {map :hp 100}");
    env.run(
        "obj.setMethod :damage fn [self amount] do\n    set self.hp (self.hp - amount)\n    self.hp\nend",
    );

    // Fetch the raw method function: no self injection outside dot-call
    let method = env.run("{obj.get :damage}");
    assert!(method.is_closure());
    let obj = env.run("~obj");

    let result = env
        .engine
        .call_function(&method, vec![obj, Value::int(30)], &env.ctx)
        .unwrap();
    assert_eq!(result, Value::int(70));
    assert_eq!(env.run("obj.hp"), Value::int(70));
}

// === global scope proxy ===

#[test]
fn global_reads_from_inner_scopes() {
    let env = TestEnv::new();
    env.run("set x 42");
    assert_eq!(env.run("fn f [] global.x\n{f}"), Value::int(42));
}

#[test]
fn global_write_creates_in_the_context_scope() {
    let env = TestEnv::new();
    env.run("fn f [] do\n    set global.newvar 99\nend\n{f}");
    assert_eq!(env.run("global.newvar"), Value::int(99));
    assert_eq!(env.run("newvar"), Value::int(99));
}

#[test]
fn global_reaches_past_shadowing_let() {
    let env = TestEnv::new();
    env.run("set x 100");
    let result = env.run("fn f [] do\n    let x 5\n    global.x\nend\n{f}");
    assert_eq!(result, Value::int(100));
}

#[test]
fn global_counter_increment() {
    let env = TestEnv::new();
    env.run("set counter 0");
    env.run("fn increment [] do\n    set global.counter (global.counter + 1)\nend");
    env.run("increment");
    env.run("increment");
    env.run("increment");
    assert_eq!(env.run("counter"), Value::int(3));
}

// === User data ===

#[test]
fn user_data_is_carried_on_the_context() {
    let env = TestEnv::new();
    env.ctx.set_user_data(Rc::new(42_i32));
    let data = env.ctx.user_data().unwrap();
    assert_eq!(*data.downcast::<i32>().unwrap(), 42);
}

// === End to end ===

#[test]
fn complex_script_with_all_features() {
    let env = TestEnv::new();
    let result = env.run(
        "fn fibonacci [n] do\n    if (n <= 1) {return n}\n    ({fibonacci (n - 1)} + {fibonacci (n - 2)})\nend\n\nfn sumArray [arr] do\n    set total 0\n    for item in arr do\n        set total (total + item)\n    end\n    total\nend\n\nset fibs [0 1 1 2 3 5 8]\nset sum {sumArray fibs}\nset fib10 {fibonacci 10}\n\n(sum + fib10)",
    );
    // sum of [0 1 1 2 3 5 8] is 20, fib(10) is 55
    assert_eq!(result, Value::int(75));
}

#[test]
fn match_describe_end_to_end() {
    let env = TestEnv::new();
    env.run(
        "fn describe [x] do\n    match x\n        1 \"one\"\n        2 \"two\"\n        _ \"other\"\n    end\nend",
    );
    assert_eq!(env.run("describe 1"), Value::string("one"));
    assert_eq!(env.run("describe 2"), Value::string("two"));
    assert_eq!(env.run("describe 99"), Value::string("other"));
}

#[test]
fn widget_factory_end_to_end() {
    let env = TestEnv::new();
    env.run(
        "fn make_button [label =size 24 =color \"white\"] do\n    {=type :button =label label =size size =color color}\nend",
    );
    env.run("set btn {make_button \"OK\" =color \"green\"}");
    assert_eq!(env.run("btn.label"), Value::string("OK"));
    assert_eq!(env.run("btn.size"), Value::int(24));
    assert_eq!(env.run("btn.color"), Value::string("green"));
}
