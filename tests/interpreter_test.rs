use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use ts_interpreter::{
    DiagnosticKind, Environment, Interpreter, Parser, RuntimeError, Value, eval::RuntimeErrorKind,
    parse, run,
};

fn value_of(source: &str) -> Value {
    let outcome = run(source);
    match outcome.value {
        Some(value) => value,
        None => panic!("`{source}` failed: {:?}", outcome.diagnostics.all()),
    }
}

fn runtime_error(source: &str) -> RuntimeError {
    let (program, diagnostics) = parse(source);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.all());
    Interpreter::new()
        .evaluate(&program)
        .expect_err("evaluation should fail")
}

#[test]
fn test_expression_evaluation() {
    let cases = vec![
        ("5 + 3;", 8.0),
        ("10 - 4;", 6.0),
        ("2 * 3;", 6.0),
        ("8 / 2;", 4.0),
        ("15 / 3;", 5.0),
        ("2 * 3 + 4;", 10.0),
        ("2 + 3 * 4;", 14.0),
        ("-2 * -3;", 6.0),
    ];

    for (input, expected) in cases {
        assert_eq!(value_of(input), Value::Number(expected), "input: {input}");
    }
}

#[test]
fn test_precedence_matches_double_arithmetic() {
    assert_eq!(value_of("1 + 2 * 3 / 4 - 5;"), Value::Number(-2.5));
    assert_eq!(value_of("(5 + 3) * 2;"), Value::Number(16.0));
    assert_eq!(value_of("5 + 3 * 2;"), Value::Number(11.0));
}

#[test]
fn test_division_follows_ieee_754() {
    assert_eq!(value_of("10 / 3;"), Value::Number(10.0 / 3.0));
    assert_eq!(value_of("1 / 0;"), Value::Number(f64::INFINITY));
    assert_eq!(value_of("-1 / 0;"), Value::Number(f64::NEG_INFINITY));
    match value_of("0 / 0;") {
        Value::Number(n) => assert!(n.is_nan()),
        other => panic!("expected a number, got {other:?}"),
    }
}

#[test]
fn test_statement_evaluation() {
    let cases = vec![
        ("let x = 42;", Value::Number(42.0)),
        ("let message = \"Hello\";", Value::String("Hello".to_string())),
        ("let flag = true;", Value::Boolean(true)),
    ];

    for (input, expected) in cases {
        let mut parser = Parser::new(input);
        let mut interpreter = Interpreter::new();

        while !parser.is_eof() {
            let stmt = parser.parse_statement().expect("statement should parse");
            let result = interpreter.eval(&stmt).expect("statement should evaluate");
            assert_eq!(result, expected);
        }
    }
}

#[test]
fn test_evaluate_variables() {
    let mut interpreter = Interpreter::new();
    let outcome = interpreter.run("let x = 42; let y = x + 8;");
    assert!(outcome.is_success());

    assert_eq!(interpreter.last_value(), Some(&Value::Number(50.0)));
    assert_eq!(interpreter.get("x"), Some(&Value::Number(42.0)));
}

#[test]
fn test_let_without_initializer_is_undefined() {
    let mut interpreter = Interpreter::new();
    let outcome = interpreter.run("let a; a;");
    assert_eq!(outcome.value, Some(Value::Undefined));
    assert_eq!(interpreter.get("a"), Some(&Value::Undefined));
}

#[test]
fn test_redeclaration_overwrites() {
    let mut interpreter = Interpreter::new();
    interpreter.run("let x = 1; let x = 2;");
    assert_eq!(interpreter.get("x"), Some(&Value::Number(2.0)));
    assert_eq!(interpreter.variables().count(), 1);
}

#[test]
fn test_string_concatenation_is_rejected() {
    let mut interpreter = Interpreter::new();
    let outcome = interpreter.run(
        r#"let greeting = "Hello, "; let name = "World"; let message = greeting + name;"#,
    );

    assert_eq!(outcome.value, None);
    let [diagnostic] = outcome.diagnostics.all() else {
        panic!("expected one diagnostic, got {:?}", outcome.diagnostics.all());
    };
    assert_eq!(diagnostic.kind, DiagnosticKind::Runtime);
    assert_eq!(
        diagnostic.message,
        "operator `+` cannot be applied to types 'string' and 'string'"
    );
    assert_eq!(
        interpreter.get("greeting"),
        Some(&Value::String("Hello, ".to_string()))
    );
    assert_eq!(interpreter.get("message"), None);
}

#[test]
fn test_runtime_error_kinds() {
    let error = runtime_error("1 + true;");
    assert_eq!(error.kind(), RuntimeErrorKind::TypeError);

    let error = runtime_error("-\"text\";");
    assert_eq!(error.kind(), RuntimeErrorKind::TypeError);
    assert_eq!(
        error.to_string(),
        "operator `-` cannot be applied to type 'string'"
    );

    let error = runtime_error("let a = 1;\nlet b = a * missing;");
    assert_eq!(error.kind(), RuntimeErrorKind::ReferenceError);
    assert_eq!(error.to_string(), "cannot find name 'missing'");
    assert_eq!(error.position().line, 2);
    assert_eq!(error.position().column, 13);
}

#[test]
fn test_operands_evaluate_left_to_right() {
    let error = runtime_error("first + second;");
    assert_eq!(error.to_string(), "cannot find name 'first'");
}

#[test]
fn test_runtime_error_ends_the_pass() {
    let mut interpreter = Interpreter::new();
    let outcome = interpreter.run("let a = 1; let b = c; let d = 2;");
    assert!(!outcome.is_success());
    assert_eq!(interpreter.get("a"), Some(&Value::Number(1.0)));
    assert_eq!(interpreter.get("d"), None);
}

#[test]
fn test_parse_errors_skip_evaluation() {
    let mut interpreter = Interpreter::new();
    let outcome = interpreter.run("let a = 1;\nlet = 2;");
    assert_eq!(outcome.value, None);
    assert_eq!(outcome.diagnostics.all()[0].kind, DiagnosticKind::Syntax);
    assert_eq!(interpreter.get("a"), None);
}

#[test]
fn test_blocks_open_a_child_scope() {
    let mut interpreter = Interpreter::new();
    let outcome = interpreter.run("let x = 1; { let x = 2; let y = x * 10; }");
    assert_eq!(outcome.value, Some(Value::Number(20.0)));
    assert_eq!(interpreter.get("x"), Some(&Value::Number(1.0)));
    assert_eq!(interpreter.get("y"), None);
}

#[test]
fn test_type_annotations_are_checked() {
    assert_eq!(value_of("let n: number = 1 + 1;"), Value::Number(2.0));
    assert_eq!(value_of("let u: number;"), Value::Undefined);
    assert_eq!(
        value_of("let v: any = \"anything\";"),
        Value::String("anything".to_string())
    );

    let error = runtime_error("let n: number = \"five\";");
    assert_eq!(
        error.to_string(),
        "type 'string' is not assignable to type 'number'"
    );

    let error = runtime_error("let p: Person = 1;");
    assert_eq!(error.to_string(), "cannot find type 'Person'");
}

#[test]
fn test_evaluate_into_caller_environment() {
    let (program, diagnostics) = parse("let a = 2; let b = a * a;");
    assert!(!diagnostics.has_errors());

    let mut environment = Environment::new();
    let value = ts_interpreter::eval::evaluate(&program, &mut environment)
        .expect("program should evaluate");
    assert_eq!(value, Value::Number(4.0));
    assert_eq!(environment.get("b"), Some(&Value::Number(4.0)));
    assert_eq!(environment.len(), 2);
}

#[test]
fn test_evaluate_input_file() {
    let mut test_file_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    test_file_path.push("tests");
    test_file_path.push("test_input.ts");

    let input = fs::read_to_string(test_file_path).expect("Should be able to read test_input.ts");

    let mut interpreter = Interpreter::new();
    let outcome = interpreter.run(&input);
    assert!(
        outcome.is_success(),
        "fixture should run cleanly: {:?}",
        outcome.diagnostics.all()
    );
    assert_eq!(outcome.value, Some(Value::Number(-2.5)));

    let expected = [
        ("x", Value::Number(42.0)),
        ("y", Value::Number(3.14159)),
        ("name", Value::String("TypeScript".to_string())),
        ("sum", Value::Number(8.0)),
        ("diff", Value::Number(6.0)),
        ("product", Value::Number(42.0)),
        ("quotient", Value::Number(5.0)),
        ("complex", Value::Number(16.0)),
        ("mixed", Value::Number(-2.5)),
    ];
    for (name, value) in &expected {
        assert_eq!(interpreter.get(name), Some(value), "binding `{name}`");
    }
    assert_eq!(interpreter.variables().count(), expected.len());
}
