//! Pruebas de la tabla de símbolos, las verificaciones semánticas y el
//! verificador de tipos.

use compiler::ast::{Ast, NodeId, NodeKind};
use compiler::error::{Report, Severity};
use compiler::lex::Lexeme;
use compiler::symtab::{self, ScopeTree};
use compiler::types::SimpleType;
use compiler::{parse, semantic, typecheck};

fn parse_clean(source: &str) -> Ast {
    let mut report = Report::new();
    let ast = parse::parse(source, &mut report);
    assert_eq!(report.error_count(), 0, "{}", report);
    ast
}

/// Corre las cuatro verificaciones semánticas sobre una unidad sin
/// errores de sintaxis.
fn analyze(source: &str) -> Report {
    let ast = parse_clean(source);
    let mut report = Report::new();

    semantic::check_lvalues(&ast, &mut report);
    semantic::check_function_calls(&ast, &mut report);
    semantic::check_switches(&ast, &mut report);
    semantic::check_returns(&ast, &mut report);

    report
}

/// Decora los tipos de una unidad sin errores de sintaxis.
fn typed(source: &str) -> (Ast, ScopeTree, Report) {
    let mut ast = parse_clean(source);
    let scopes = symtab::collect(&ast);
    let mut report = Report::new();

    typecheck::decorate(&mut ast, &scopes, &mut report);

    (ast, scopes, report)
}

fn find_kind(ast: &Ast, node: NodeId, kind: NodeKind) -> Option<NodeId> {
    if ast.kind(node) == kind {
        return Some(node);
    }

    ast.children(node)
        .iter()
        .find_map(|&child| find_kind(ast, child, kind))
}

fn count_kind(ast: &Ast, node: NodeId, kind: NodeKind) -> usize {
    let own = usize::from(ast.kind(node) == kind);

    own + ast
        .children(node)
        .iter()
        .map(|&child| count_kind(ast, child, kind))
        .sum::<usize>()
}

fn messages(report: &Report, severity: Severity) -> Vec<&str> {
    report
        .diagnostics()
        .iter()
        .filter(|diagnostic| diagnostic.severity == severity)
        .map(|diagnostic| diagnostic.message.as_str())
        .collect()
}

// Tabla de símbolos.

#[test]
fn function_scope_holds_parameters_and_top_block() {
    let ast = parse_clean(
        "module ambitos;\n\
         \n\
         f: int a -> int\n\
         {\n\
         \tint b;\n\
         \t{\n\
         \t\tint c;\n\
         \t}\n\
         \treturn( a );\n\
         }\n",
    );

    let scopes = symtab::collect(&ast);

    let root = scopes.scope(ScopeTree::ROOT);
    assert_eq!(root.symbols.len(), 1);
    assert_eq!(root.children.len(), 1);

    let function = scopes.scope(root.children[0]);
    let names: Vec<&str> = function
        .symbols
        .iter()
        .map(|symbol| symbol.name.as_str())
        .collect();

    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(function.children.len(), 1);

    let nested = scopes.scope(function.children[0]);
    assert_eq!(nested.symbols[0].name, "c");
}

#[test]
fn lookup_prefers_the_innermost_declaration() {
    let ast = parse_clean(
        "module sombras;\n\
         \n\
         f: void -> void\n\
         {\n\
         \tint x;\n\
         \t{\n\
         \t\tint x;\n\
         \t}\n\
         }\n",
    );

    let scopes = symtab::collect(&ast);
    let function = scopes.scope(ScopeTree::ROOT).children[0];
    let nested = scopes.scope(function).children[0];

    let inner = scopes.lookup(nested, "x").expect("x not found");
    assert_eq!(inner.scope, nested);
    assert!(!inner.global);

    let outer = scopes.lookup(function, "x").expect("x not found");
    assert_eq!(outer.scope, function);
}

#[test]
fn function_symbols_carry_return_type_then_parameters() {
    let ast = parse_clean(
        "module firmas;\n\
         \n\
         f: int a; char b -> float\n\
         {\n\
         \treturn( 1.0 );\n\
         }\n\
         \n\
         g: void -> void\n\
         {\n\
         }\n",
    );

    let scopes = symtab::collect(&ast);

    let f = scopes.lookup(ScopeTree::ROOT, "f").expect("f not found");
    let f = scopes.symbol(f);
    assert!(f.is_function());
    assert_eq!(f.first_type().simple, SimpleType::Float);
    let params: Vec<SimpleType> = f.param_types().iter().map(|typ| typ.simple).collect();
    assert_eq!(params, vec![SimpleType::Int, SimpleType::Char]);

    let g = scopes.lookup(ScopeTree::ROOT, "g").expect("g not found");
    assert!(scopes.symbol(g).param_types().is_empty());
}

// Verificaciones semánticas.

#[test]
fn assignment_targets_must_be_identifiers_or_dereferences() {
    let report = analyze(
        "module destinos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a;\n\
         \tint *p;\n\
         \t1 = a;\n\
         \t*p = 2;\n\
         }\n",
    );

    assert_eq!(messages(&report, Severity::Error), vec!["invalid lvalue"]);
}

#[test]
fn second_start_function_is_a_redefinition() {
    let report = analyze(
        "module doble;\n\
         \n\
         start uno: void -> void\n\
         {\n\
         }\n\
         \n\
         start dos: void -> void\n\
         {\n\
         }\n",
    );

    assert_eq!(
        messages(&report, Severity::Error),
        vec!["redefinition of `start' function"],
    );
}

#[test]
fn call_arity_and_unknown_callees_warn() {
    let report = analyze(
        "module llamadas;\n\
         \n\
         f: int a -> int\n\
         {\n\
         \treturn( a );\n\
         }\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tf( 1, 2 );\n\
         \tg();\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0);
    assert_eq!(
        messages(&report, Severity::Warning),
        vec![
            "too many arguments to function `f'",
            "undeclared function `g'",
        ],
    );
}

#[test]
fn each_repeated_case_value_is_one_error() {
    let report = analyze(
        "module casos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a;\n\
         \tswitch( a )\n\
         \t{\n\
         \t\tcase 3 { }\n\
         \t\tcase 3 { }\n\
         \t\tcase 3 { }\n\
         \t\tcase 4 { }\n\
         \t\tdefault { }\n\
         \t}\n\
         }\n",
    );

    assert_eq!(
        messages(&report, Severity::Error),
        vec!["duplicate case value", "duplicate case value"],
    );
}

#[test]
fn terminal_return_satisfies_reachability() {
    let report = analyze(
        "module retorno;\n\
         \n\
         f: void -> int\n\
         {\n\
         \treturn( 1 );\n\
         }\n",
    );

    assert_eq!(report.warning_count(), 0, "{}", report);
}

#[test]
fn missing_return_in_non_void_function_warns() {
    let report = analyze(
        "module retorno;\n\
         \n\
         f: void -> int\n\
         {\n\
         \tint a;\n\
         }\n",
    );

    assert_eq!(
        messages(&report, Severity::Warning),
        vec!["control reaches end of non-void function"],
    );
}

#[test]
fn both_branches_returning_satisfies_reachability() {
    let report = analyze(
        "module retorno;\n\
         \n\
         f: int a -> int\n\
         {\n\
         \tif( a > 0 )\n\
         \t{\n\
         \t\treturn( 1 );\n\
         \t}\n\
         \telse\n\
         \t{\n\
         \t\treturn( 0 );\n\
         \t}\n\
         }\n",
    );

    assert_eq!(report.warning_count(), 0, "{}", report);
}

#[test]
fn a_then_branch_alone_does_not_guarantee_return() {
    let report = analyze(
        "module retorno;\n\
         \n\
         f: int a -> int\n\
         {\n\
         \tif( a > 0 )\n\
         \t{\n\
         \t\treturn( 1 );\n\
         \t}\n\
         }\n",
    );

    assert_eq!(
        messages(&report, Severity::Warning),
        vec!["control reaches end of non-void function"],
    );
}

#[test]
fn code_after_return_is_unreachable() {
    let report = analyze(
        "module retorno;\n\
         \n\
         f: void -> int\n\
         {\n\
         \treturn( 1 );\n\
         \tint a;\n\
         }\n",
    );

    assert_eq!(
        messages(&report, Severity::Warning),
        vec!["function has unreachable code"],
    );
}

#[test]
fn switch_returns_when_every_alternative_returns() {
    let report = analyze(
        "module retorno;\n\
         \n\
         f: int a -> int\n\
         {\n\
         \tswitch( a )\n\
         \t{\n\
         \t\tcase 1 { return( 1 ); }\n\
         \t\tdefault { return( 0 ); }\n\
         \t}\n\
         }\n",
    );

    assert_eq!(report.warning_count(), 0, "{}", report);
}

// Verificación de tipos.

#[test]
fn same_type_operands_need_no_coercion() {
    let (ast, _, report) = typed(
        "module tipos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a, b;\n\
         \ta = 1;\n\
         \tb = a + 2;\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0, "{}", report);

    let root = ast.root().expect("missing root");
    assert_eq!(count_kind(&ast, root, NodeKind::IntToFloat), 0);
    assert_eq!(count_kind(&ast, root, NodeKind::CharToInt), 0);
    assert_eq!(count_kind(&ast, root, NodeKind::CharToFloat), 0);

    let sum = find_kind(&ast, root, NodeKind::BinaryAdd).expect("missing addition");
    assert_eq!(
        ast.node(sum).typ.as_ref().map(|typ| typ.simple),
        Some(SimpleType::Int),
    );

    let one = find_kind(&ast, root, NodeKind::LitInt).expect("missing literal");
    assert!(matches!(ast.node(one).value, Some(Lexeme::Uint(1))));
    assert_eq!(
        ast.node(one).typ.as_ref().map(|typ| typ.simple),
        Some(SimpleType::Int),
    );
}

#[test]
fn char_assigned_to_int_gets_a_conversion_node() {
    let (ast, _, report) = typed(
        "module tipos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tchar c;\n\
         \tint i;\n\
         \ti = c;\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0, "{}", report);

    let root = ast.root().expect("missing root");
    let assign = find_kind(&ast, root, NodeKind::Assign).expect("missing assignment");

    let converted = ast.child(assign, 1);
    assert_eq!(ast.kind(converted), NodeKind::CharToInt);
    assert_eq!(ast.kind(ast.child(converted, 0)), NodeKind::LitIdentifier);

    assert_eq!(
        ast.node(assign).typ.as_ref().map(|typ| typ.simple),
        Some(SimpleType::Int),
    );
}

#[test]
fn int_operand_promotes_to_float() {
    let (ast, _, report) = typed(
        "module tipos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tfloat f;\n\
         \tint i;\n\
         \tf = i + 1.5;\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0, "{}", report);

    let root = ast.root().expect("missing root");
    let sum = find_kind(&ast, root, NodeKind::BinaryAdd).expect("missing addition");

    assert_eq!(ast.kind(ast.child(sum, 0)), NodeKind::IntToFloat);
    assert_eq!(
        ast.node(sum).typ.as_ref().map(|typ| typ.simple),
        Some(SimpleType::Float),
    );
}

#[test]
fn float_equality_is_rejected() {
    let (_, _, report) = typed(
        "module tipos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tfloat x;\n\
         \tbool b;\n\
         \tb = x == x;\n\
         }\n",
    );

    assert_eq!(
        messages(&report, Severity::Error),
        vec!["Invalid types for binary expression"],
    );
}

#[test]
fn returning_a_value_from_a_void_function_warns() {
    let (_, _, report) = typed(
        "module tipos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \treturn( 1 );\n\
         }\n",
    );

    assert_eq!(
        messages(&report, Severity::Warning),
        vec![
            "`return' with a value, in function returning void",
            "Invalid type for return value",
        ],
    );
}

#[test]
fn dereferencing_a_non_pointer_is_an_error() {
    let (_, _, report) = typed(
        "module tipos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint i, j;\n\
         \ti = *j;\n\
         }\n",
    );

    assert_eq!(
        messages(&report, Severity::Error),
        vec!["Dereferencing non-pointer."],
    );
}

#[test]
fn argument_types_check_against_parameters() {
    let (ast, _, report) = typed(
        "module tipos;\n\
         \n\
         f: float x -> float\n\
         {\n\
         \treturn( x );\n\
         }\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tfloat r;\n\
         \tr = f( 1 );\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0, "{}", report);

    // El argumento entero viaja convertido a float.
    let root = ast.root().expect("missing root");
    let application = find_kind(&ast, root, NodeKind::Application).expect("missing call");
    let arguments = ast.child(application, 1);

    assert_eq!(ast.kind(ast.child(arguments, 0)), NodeKind::IntToFloat);
}
