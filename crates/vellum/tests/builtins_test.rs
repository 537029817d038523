mod common;

use common::TestEnv;
use vellum::Value;

// === Math ===

#[test]
fn abs() {
    let env = TestEnv::new();
    assert_eq!(env.run("abs -5"), Value::int(5));
    assert_eq!(env.run("abs 5"), Value::int(5));
    assert_eq!(env.run("abs -2.5"), Value::float(2.5));
}

#[test]
fn min_and_max() {
    let env = TestEnv::new();
    assert_eq!(env.run("min 3 7"), Value::int(3));
    assert_eq!(env.run("max 3 7"), Value::int(7));
    // Float promotion
    assert_eq!(env.run("min 2.5 3"), Value::float(2.5));
    assert_eq!(env.run("max 2.5 3"), Value::float(3.0));
}

#[test]
fn floor_ceil_round() {
    let env = TestEnv::new();
    assert_eq!(env.run("floor 3.7"), Value::int(3));
    assert_eq!(env.run("ceil 3.2"), Value::int(4));
    assert_eq!(env.run("round 3.5"), Value::int(4));
    // Identity on ints
    assert_eq!(env.run("floor 3"), Value::int(3));
    assert_eq!(env.run("ceil 3"), Value::int(3));
}

#[test]
fn sqrt_and_pow() {
    let env = TestEnv::new();
    assert_eq!(env.run("sqrt 16"), Value::float(4.0));
    // Integer operands with an integral result stay Int
    assert_eq!(env.run("pow 2 10"), Value::int(1024));
    assert_eq!(env.run("pow 2.0 3"), Value::float(8.0));
}

#[test]
fn trig() {
    let env = TestEnv::new();
    assert_eq!(env.run("sin 0"), Value::float(0.0));
    assert_eq!(env.run("cos 0"), Value::float(1.0));
    assert_eq!(env.run("tan 0"), Value::float(0.0));
}

#[test]
fn random_range_stays_in_bounds() {
    let env = TestEnv::new();
    for _ in 0..50 {
        let v = env.run("random_range 1 6").as_int().unwrap();
        assert!((1..=6).contains(&v));
    }
}

#[test]
fn random_float_is_in_unit_interval() {
    let env = TestEnv::new();
    for _ in 0..50 {
        let v = env.run("random_float").as_float().unwrap();
        assert!((0.0..1.0).contains(&v));
    }
}

// === Comparison ===

#[test]
fn comparison_functions() {
    let env = TestEnv::new();
    assert_eq!(env.run("eq 1 1"), Value::bool(true));
    assert_eq!(env.run("eq 1 2"), Value::bool(false));
    assert_eq!(env.run("ne 1 2"), Value::bool(true));
    assert_eq!(env.run("lt 1 2"), Value::bool(true));
    assert_eq!(env.run("gt 2 1"), Value::bool(true));
    assert_eq!(env.run("le 2 2"), Value::bool(true));
    assert_eq!(env.run("ge 2 2.0"), Value::bool(true));
}

// === Strings ===

#[test]
fn str_functions() {
    let env = TestEnv::new();
    assert_eq!(env.run("str_length \"hello\""), Value::int(5));
    assert_eq!(env.run("str_length \"\""), Value::int(0));
    assert_eq!(env.run("str_concat \"a\" 1 \"b\""), Value::string("a1b"));
    assert_eq!(env.run("str_substr \"hello world\" 6"), Value::string("world"));
    assert_eq!(env.run("str_substr \"hello world\" 0 5"), Value::string("hello"));
    // A negative start lands past the end, a negative length clamps to the end
    assert_eq!(env.run("str_substr \"hello\" -1"), Value::string(""));
    assert_eq!(env.run("str_substr \"hello world\" 6 -1"), Value::string("world"));
    assert_eq!(env.run("str_find \"hello\" \"ll\""), Value::int(2));
    assert_eq!(env.run("str_find \"hello\" \"xy\""), Value::int(-1));
    assert_eq!(env.run("str_upper \"mixedCase\""), Value::string("MIXEDCASE"));
    assert_eq!(env.run("str_lower \"MixedCase\""), Value::string("mixedcase"));
}

#[test]
fn format_function() {
    let env = TestEnv::new();
    assert_eq!(env.run("format \"%d/%d\" 10 20"), Value::string("10/20"));
    assert_eq!(
        env.run("format \"%s: %.2f\" \"score\" 1.239"),
        Value::string("score: 1.24")
    );
    assert_eq!(env.run("format \"%d%%\" 42"), Value::string("42%"));
    env.run_err("format \"%d %d\" 1");
}

// === Type conversion ===

#[test]
fn to_int() {
    let env = TestEnv::new();
    assert_eq!(env.run("to_int 3.9"), Value::int(3));
    assert_eq!(env.run("to_int \"42\""), Value::int(42));
    assert_eq!(env.run("to_int true"), Value::int(1));
    assert_eq!(env.run("to_int false"), Value::int(0));
    assert!(env.run("to_int \"not a number\"").is_nil());
}

#[test]
fn to_int_parses_a_leading_numeric_prefix() {
    let env = TestEnv::new();
    assert_eq!(env.run("to_int \"42abc\""), Value::int(42));
    assert_eq!(env.run("to_int \"  -7 apples\""), Value::int(-7));
    assert_eq!(env.run("to_int \"+3\""), Value::int(3));
    assert!(env.run("to_int \"abc42\"").is_nil());
    // Overflow is a failed conversion, not a wrap
    assert!(env.run("to_int \"99999999999999999999\"").is_nil());
}

#[test]
fn to_float() {
    let env = TestEnv::new();
    assert_eq!(env.run("to_float 42"), Value::float(42.0));
    assert_eq!(env.run("to_float \"2.5\""), Value::float(2.5));
}

#[test]
fn to_float_parses_a_leading_numeric_prefix() {
    let env = TestEnv::new();
    assert_eq!(env.run("to_float \"2.5x\""), Value::float(2.5));
    assert_eq!(env.run("to_float \"  -1.5e2 rest\""), Value::float(-150.0));
    assert_eq!(env.run("to_float \"3e\""), Value::float(3.0));
    assert!(env.run("to_float \"x1\"").is_nil());
}

#[test]
fn to_str_and_to_bool() {
    let env = TestEnv::new();
    assert_eq!(env.run("to_str 42"), Value::string("42"));
    assert_eq!(env.run("to_str nil"), Value::string("nil"));
    assert_eq!(env.run("to_str [1 2]"), Value::string("[1 2]"));
    assert_eq!(env.run("to_str :stone"), Value::string(":stone"));

    assert_eq!(env.run("to_bool nil"), Value::bool(false));
    assert_eq!(env.run("to_bool false"), Value::bool(false));
    assert_eq!(env.run("to_bool 0"), Value::bool(true));
    assert_eq!(env.run("to_bool \"\""), Value::bool(true));
}

#[test]
fn type_names() {
    let env = TestEnv::new();
    assert_eq!(env.run("type 1"), Value::string("int"));
    assert_eq!(env.run("type 1.5"), Value::string("float"));
    assert_eq!(env.run("type \"s\""), Value::string("string"));
    assert_eq!(env.run("type [1]"), Value::string("array"));
    assert_eq!(env.run("type nil"), Value::string("nil"));
    assert_eq!(env.run("type ~type"), Value::string("function"));
}

// === I/O ===

#[test]
fn print_returns_nil() {
    let env = TestEnv::new();
    assert!(env.run("print \"test output\" 42").is_nil());
}

// === Map constructor ===

#[test]
fn map_constructor_with_symbol_pairs() {
    let env = TestEnv::new();
    env.run("set m {map :hp 100 :mp 50}");
    assert_eq!(env.run("m.hp"), Value::int(100));
    assert_eq!(env.run("m.mp"), Value::int(50));
}

#[test]
fn map_constructor_empty() {
    let env = TestEnv::new();
    env.run("set m {map}");
    assert!(env.run("m").is_map());
    assert_eq!(env.run("m.keys"), Value::array(vec![]));
}

#[test]
fn map_constructor_with_named_args() {
    let env = TestEnv::new();
    env.run("set m {map =hp 100 =name \"orc\"}");
    assert_eq!(env.run("m.hp"), Value::int(100));
    assert_eq!(env.run("m.name"), Value::string("orc"));
}

#[test]
fn map_constructor_mixed() {
    let env = TestEnv::new();
    env.run("set m {map :a 1 =b 2}");
    assert_eq!(env.run("m.a"), Value::int(1));
    assert_eq!(env.run("m.b"), Value::int(2));
}

// === Builtins inside expressions ===

#[test]
fn builtins_compose_with_operators() {
    let env = TestEnv::new();
    assert_eq!(env.run("({abs -5} + {max 1 2})"), Value::int(7));
    assert_eq!(env.run("to_int {sqrt 16}"), Value::int(4));
}
