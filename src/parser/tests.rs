use super::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn parse(source: &str) -> Module {
    let result = parse_source(source, &PathBuf::from("test.py"));
    assert!(result.is_ok(), "Parse error: {:?}", result.err());
    result.unwrap()
}

fn parse_err(source: &str) -> DiagnosticBag {
    parse_source(source, &PathBuf::from("test.py")).unwrap_err()
}

fn only_expr(source: &str) -> Expr {
    let module = parse(source);
    match module.body.into_iter().next() {
        Some(Stmt::Expr { expr, .. }) => expr,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_parse_empty_module() {
    assert!(parse("").body.is_empty());
    assert!(parse("\n# only a comment\n\n").body.is_empty());
}

#[test]
fn test_parse_function_with_annotations() {
    let module = parse("def add_3(num1: int, num2: int, num3: int) -> int:\n    return num1 + num2 + num3\n");
    let Stmt::FunctionDef(def) = &module.body[0] else {
        panic!("expected a function definition");
    };
    assert_eq!(def.name, "add_3");
    assert_eq!(def.params.len(), 3);
    assert!(def.is_annotated());
    assert_eq!(def.returns.as_ref().map(|r| r.to_string()), Some("int".to_string()));
    assert_eq!(def.span.start_line, 1);
    assert!(matches!(def.body[0], Stmt::Return { value: Some(_), .. }));
}

#[test]
fn test_parse_one_line_suite() {
    let module = parse("def f(): return 5\nx = f()\n");
    let Stmt::FunctionDef(def) = &module.body[0] else {
        panic!("expected a function definition");
    };
    assert!(!def.is_annotated());
    assert_eq!(def.body.len(), 1);
    assert!(matches!(&module.body[1], Stmt::Assign { targets, .. } if targets.len() == 1));
}

#[test]
fn test_parse_class_and_control_flow() {
    let source = r#"class Counter:
    def __init__(self, start):
        self.count = start

    def bump(self):
        self.count += 1

c = Counter(0)
for i in range(3):
    if i > 1:
        c.bump()
    elif i == 1:
        pass
    else:
        continue
while False:
    break
"#;
    let module = parse(source);
    assert_eq!(module.body.len(), 4);
    let Stmt::ClassDef(class) = &module.body[0] else {
        panic!("expected a class");
    };
    assert_eq!(class.name, "Counter");
    assert_eq!(class.body.len(), 2);
    let Stmt::For { body, .. } = &module.body[2] else {
        panic!("expected a for loop");
    };
    let Stmt::If { orelse, .. } = &body[0] else {
        panic!("expected an if");
    };
    assert!(matches!(orelse[0], Stmt::If { .. }));
}

#[test]
fn test_parse_imports() {
    let module = parse("import os.path as p, sys\nfrom math import (sqrt, pi as PI)\n");
    let Stmt::Import { module: None, names, .. } = &module.body[0] else {
        panic!("expected import");
    };
    assert_eq!(names[0].bound_name(), "p");
    assert_eq!(names[1].bound_name(), "sys");
    let Stmt::Import { module: Some(m), names, .. } = &module.body[1] else {
        panic!("expected from-import");
    };
    assert_eq!(m, "math");
    assert_eq!(names[1].bound_name(), "PI");
}

#[test]
fn test_assignment_forms() {
    let module = parse("a = b = 1\nx, y = 1, 'two'\nn: int = 3\nn -= 1; m = n\n");
    assert!(matches!(&module.body[0], Stmt::Assign { targets, .. } if targets.len() == 2));
    assert!(matches!(&module.body[1], Stmt::Assign { targets, value: Expr::Tuple { .. }, .. }
        if matches!(targets[0], Expr::Tuple { .. })));
    assert!(matches!(&module.body[2], Stmt::AnnAssign { value: Some(_), .. }));
    assert!(matches!(&module.body[3], Stmt::AugAssign { op: BinaryOp::Sub, .. }));
    assert_eq!(module.body.len(), 5);
}

#[test]
fn test_precedence_round_trips_through_display() {
    for source in [
        "1 + 2 * 3",
        "(1 + 2) * 3",
        "-x ** 2",
        "2 ** -1",
        "a - (b - c)",
        "not a and b or c",
        "f(x, y=2)[0].attr",
        "lambda a, b: a + b",
        "x if c else y",
        "a < b <= c",
        "a not in b",
        "{'k': [1, 2.5, None]}",
        "(1,)",
    ] {
        assert_eq!(only_expr(source).to_string(), source);
    }
}

#[test]
fn test_literal_repr() {
    assert_eq!(only_expr("'string'").literal_repr(), Some("'string'".to_string()));
    assert_eq!(only_expr("\"it's\"").literal_repr(), Some("\"it's\"".to_string()));
    assert_eq!(only_expr("1.0").literal_repr(), Some("1.0".to_string()));
    assert_eq!(only_expr("True").literal_repr(), Some("True".to_string()));
    assert_eq!(only_expr("'a' 'b'").literal_repr(), Some("'ab'".to_string()));
    assert_eq!(only_expr("x").literal_repr(), None);
}

#[test]
fn test_node_ids_are_unique() {
    let module = parse("x = 1 + 2\n");
    let Stmt::Assign { id, targets, value, .. } = &module.body[0] else {
        panic!("expected assignment");
    };
    let Expr::BinOp { left, right, .. } = value else {
        panic!("expected binop");
    };
    let mut ids = vec![module.id, *id, targets[0].id(), value.id(), left.id(), right.id()];
    ids.sort_by_key(|id| id.0);
    ids.dedup();
    assert_eq!(ids.len(), 6);
}

#[test]
fn test_syntax_errors() {
    let bag = parse_err("def f(:\n    pass\n");
    assert!(bag.has_errors());
    assert_eq!(bag.diagnostics()[0].code, syntax::UNEXPECTED_TOKEN);

    let bag = parse_err("1 = x\n");
    assert_eq!(bag.diagnostics()[0].code, syntax::UNEXPECTED_TOKEN);

    let bag = parse_err("def f():\n");
    assert_eq!(bag.diagnostics()[0].code, syntax::UNEXPECTED_EOF);
}

#[test]
fn test_errors_in_several_statements_are_all_reported() {
    let bag = parse_err("x = )\ny = 2\nz = ]\n");
    assert_eq!(bag.error_count(), 2);
}
