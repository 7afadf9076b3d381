//! Property tests for inference over generated programs

use std::path::Path;

use dyntype::parser::parse_source;
use dyntype::typechecker::{infer_module, Type, TypeInference};
use proptest::prelude::*;

fn infer(source: &str) -> TypeInference {
    let module = parse_source(source, Path::new("prop.py"))
        .unwrap_or_else(|bag| panic!("parse failed:\n{}", bag.format_text(source)));
    infer_module(&module)
}

fn binding(inference: &TypeInference, name: &str) -> Type {
    inference
        .module_bindings()
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, ty)| ty)
        .unwrap_or_else(|| panic!("no binding for {name}"))
}

/// Keywords and builtin names a generated identifier must not collide with
const RESERVED: &[&str] = &[
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not",
    "or", "pass", "raise", "return", "try", "while", "with", "yield", "async", "await", "abs",
    "bool", "float", "input", "int", "len", "max", "min", "print", "range", "round", "str", "sum",
    "self",
];

fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}".prop_filter("reserved word", |s| !RESERVED.contains(&s.as_str()))
}

/// `count` distinct identifiers
fn identifiers(count: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set(identifier(), count).prop_map(|set| {
        let mut names: Vec<String> = set.into_iter().collect();
        names.sort();
        names
    })
}

/// A literal with the name of the type it should infer to
fn literal() -> impl Strategy<Value = (String, &'static str)> {
    prop_oneof![
        (0i64..100_000).prop_map(|n| (n.to_string(), "int")),
        (0u32..1000, 1u32..100).prop_map(|(a, b)| (format!("{a}.{b}"), "float")),
        "[a-z]{0,8}".prop_map(|s| (format!("\"{s}\""), "str")),
        any::<bool>().prop_map(|b| (if b { "True" } else { "False" }.to_string(), "bool")),
    ]
}

/// A function body returning `value`, written one of several ways.
/// `local` is free for the body to bind.
fn body_returning(form: u8, value: &str, local: &str) -> String {
    match form % 5 {
        0 => format!("    return {value}\n"),
        1 => format!("    {local} = {value}\n    return {local}\n"),
        2 => format!("    if {value}:\n        return {value}\n    return {value}\n"),
        3 => format!("    while False:\n        pass\n    return {value}\n"),
        _ => format!("    for {local} in [1, 2]:\n        pass\n    return {value}\n"),
    }
}

fn callable_parts(ty: Type) -> Result<(Vec<Type>, Type), TestCaseError> {
    match ty {
        Type::Callable { params, ret } => Ok((params, *ret)),
        other => Err(TestCaseError::fail(format!("expected a callable, got {other}"))),
    }
}

proptest! {
    #[test]
    fn literal_return_fixes_the_return_type(
        (lit, expected) in literal(),
        names in identifiers(2),
        form in any::<u8>(),
    ) {
        let (func, local) = (&names[0], &names[1]);
        let source = format!("def {func}():\n{}", body_returning(form, &lit, local));
        let inference = infer(&source);
        prop_assert!(!inference.has_errors(), "{}", source);
        let (params, ret) = callable_parts(binding(&inference, func))?;
        prop_assert!(params.is_empty());
        prop_assert_eq!(ret.to_string(), expected);
    }

    #[test]
    fn none_bodies_return_none_with_open_params(
        names in (1usize..7).prop_flat_map(identifiers),
        (lit, _) in literal(),
        form in 0u8..3,
    ) {
        let (func, params) = names.split_first().expect("at least one name");
        let body = match form {
            0 => "pass".to_string(),
            1 => "return None".to_string(),
            _ => lit,
        };
        let source = format!("def {func}({}):\n    {body}\n", params.join(", "));
        let inference = infer(&source);
        prop_assert!(!inference.has_errors(), "{}", source);
        let (types, ret) = callable_parts(binding(&inference, func))?;
        prop_assert_eq!(types.len(), params.len());
        prop_assert!(types.iter().all(|p| matches!(p, Type::Var(_))));
        prop_assert_eq!(ret, Type::none());
    }

    #[test]
    fn returning_a_parameter_ties_it_to_the_result(
        (names, k) in (3usize..8).prop_flat_map(|n| (identifiers(n), 0..n - 2)),
        form in any::<u8>(),
    ) {
        let (func, rest) = names.split_first().expect("at least one name");
        let (local, params) = rest.split_first().expect("a local name");
        let source = format!(
            "def {func}({}):\n{}",
            params.join(", "),
            body_returning(form, &params[k], local),
        );
        let inference = infer(&source);
        prop_assert!(!inference.has_errors(), "{}", source);
        let (types, ret) = callable_parts(binding(&inference, func))?;
        prop_assert_eq!(&types[k], &ret);
    }

    #[test]
    fn calling_with_literals_fixes_every_parameter(
        (names, k) in (2usize..7).prop_flat_map(|n| (identifiers(n), 0..n - 1)),
        lits in prop::collection::vec(literal(), 6),
    ) {
        let (func, params) = names.split_first().expect("at least one name");
        let lits = &lits[..params.len()];
        let args: Vec<&str> = lits.iter().map(|(lit, _)| lit.as_str()).collect();
        let expected: Vec<&str> = lits.iter().map(|(_, ty)| *ty).collect();
        let source = format!(
            "def {func}({}):\n    return {}\n\nResult = {func}({})\n",
            params.join(", "),
            params[k],
            args.join(", "),
        );
        let inference = infer(&source);
        prop_assert!(!inference.has_errors(), "{}", source);
        prop_assert_eq!(binding(&inference, "Result").to_string(), expected[k]);
        prop_assert_eq!(
            binding(&inference, func).to_string(),
            format!("Callable[[{}], {}]", expected.join(", "), expected[k])
        );
    }

    #[test]
    fn wrong_argument_count_is_reported_once(
        names in (2usize..6).prop_flat_map(identifiers),
        extra in 1usize..3,
    ) {
        let (func, params) = names.split_first().expect("at least one name");
        let args = vec!["1"; params.len() + extra];
        let source = format!(
            "def {func}({}):\n    pass\n\n{func}({})\n",
            params.join(", "),
            args.join(", "),
        );
        let inference = infer(&source);
        prop_assert_eq!(inference.errors().len(), 1, "{}", source);
        let expected = format!(
            "was expecting {} argument{}, but was given {}.",
            params.len(),
            if params.len() == 1 { "" } else { "s" },
            args.len()
        );
        prop_assert!(inference.errors()[0].message().ends_with(&expected));
    }

    #[test]
    fn inference_is_deterministic(
        (lit, _) in literal(),
        names in (2usize..5).prop_flat_map(identifiers),
        form in any::<u8>(),
    ) {
        let (func, params) = names.split_first().expect("at least one name");
        let source = format!(
            "def {func}({}):\n{}\nz = {func}({})\nw = [{lit}, {lit}]\n",
            params.join(", "),
            body_returning(form, &params[0], "tmp_local"),
            vec![lit.clone(); params.len()].join(", "),
        );
        let first = infer(&source);
        let second = infer(&source);
        prop_assert_eq!(first.module_bindings(), second.module_bindings());
        let messages = |i: &TypeInference| i.errors().iter().map(|e| e.message().to_string()).collect::<Vec<_>>();
        prop_assert_eq!(messages(&first), messages(&second));
    }
}
