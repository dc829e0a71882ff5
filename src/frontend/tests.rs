//! Program loading tests

use super::ast::{Expr, Stmt};
use super::*;
use crate::runtime::value::Value;

const COUNTER: &str = r#"(
    structs: [(name: "Counter", fields: ["count"])],
    functions: [
        (
            name: "tick",
            owner: Some("Counter"),
            is_async: true,
            body: [
                Assign(target: "self.count", value: BinOp(op: Add, left: Var("self.count"), right: Lit(Int(1)))),
                Return(Some(Var("self.count"))),
            ],
        ),
        (
            name: "spin",
            params: ["n"],
            is_async: true,
            body: [
                While(condition: BinOp(op: Gt, left: Var("n"), right: Lit(Int(0))), body: [
                    Yield,
                    Assign(target: "n", value: BinOp(op: Sub, left: Var("n"), right: Lit(Int(1)))),
                ]),
            ],
        ),
    ],
    main: [
        Let(name: "c", value: StructLit(type_name: "Counter", fields: [("count", Lit(Int(0)))])),
        Print(Await(MethodCall(receiver: "c", method: "tick", args: []))),
    ],
)"#;

#[test]
fn test_parse_program() {
    let program = parse_program(COUNTER).unwrap();
    assert_eq!(program.structs.len(), 1);
    assert_eq!(program.functions.len(), 2);
    assert_eq!(program.functions[0].qualified_name(), "Counter.tick");
    assert!(program.functions[0].is_async);
    assert!(program.functions[1].has_yield());
    assert!(!program.functions[0].has_yield());
    assert_eq!(
        program.main[0],
        Stmt::Let {
            name: "c".to_string(),
            value: Expr::StructLit {
                type_name: "Counter".to_string(),
                fields: vec![("count".to_string(), Expr::Lit(Value::Int(0)))],
            },
        }
    );
}

#[test]
fn test_optional_sections_default() {
    let program = parse_program("(main: [Print(Lit(Str(\"hi\")))])").unwrap();
    assert!(program.functions.is_empty());
    assert!(program.structs.is_empty());
    assert_eq!(program.main.len(), 1);
}

#[test]
fn test_syntax_error() {
    let err = parse_program("(main: [Print(]").unwrap_err();
    assert!(matches!(err, LoadError::Parse(_)));
}

#[test]
fn test_duplicate_function_rejected() {
    let src = r#"(functions: [(name: "f", body: []), (name: "f", body: [])])"#;
    let err = parse_program(src).unwrap_err();
    assert!(matches!(err, LoadError::DuplicateFunction(name) if name == "f"));
}

#[test]
fn test_method_owner_must_exist() {
    let src = r#"(functions: [(name: "m", owner: Some("Ghost"), body: [])])"#;
    let err = parse_program(src).unwrap_err();
    assert!(matches!(err, LoadError::UnknownOwner { .. }));
}

#[test]
fn test_load_program_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_program(&dir.path().join("missing.ron")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn test_load_program_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter.ron");
    std::fs::write(&path, COUNTER).unwrap();
    let program = load_program(&path).unwrap();
    assert_eq!(program.main.len(), 2);
}

#[test]
fn test_summary() {
    let program = parse_program(COUNTER).unwrap();
    let summary = ProgramSummary::of(&program);
    assert_eq!(summary.functions, 2);
    assert_eq!(summary.async_functions, 2);
    assert_eq!(summary.auto_yield_functions, 1);
    assert_eq!(summary.main_statements, 2);
    // tick: 2, spin: while + 2 nested, main: 2
    assert_eq!(summary.total_statements, 7);
}
