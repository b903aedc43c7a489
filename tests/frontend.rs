//! Pruebas del frente del compilador: preprocesador, analizador léxico,
//! analizador sintáctico y simplificador.

use compiler::ast::{Ast, NodeId, NodeKind};
use compiler::error::{Report, Severity};
use compiler::lex::{Lexer, TokenKind};
use compiler::{parse, pp};

use std::path::PathBuf;

fn parse_source(source: &str) -> (Ast, Report) {
    let mut report = Report::new();
    let ast = parse::parse(source, &mut report);
    (ast, report)
}

/// Primer nodo alcanzable desde la raíz con la clase pedida, en preorden.
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

fn reachable(ast: &Ast, node: NodeId) -> usize {
    1 + ast
        .children(node)
        .iter()
        .map(|&child| reachable(ast, child))
        .sum::<usize>()
}

fn sample(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/samples/imports");
    path.push(name);
    path
}

#[test]
fn tokenizer_reports_every_bad_character() {
    let mut report = Report::new();
    let tokens = Lexer::tokenize("module m;\n@ $\n", &mut report);

    assert_eq!(report.error_count(), 2);
    assert_eq!(tokens.last().map(|token| token.kind), Some(TokenKind::Eof));
}

#[test]
fn keywords_are_case_sensitive() {
    let mut report = Report::new();
    let tokens = Lexer::tokenize("While while", &mut report);

    assert_eq!(report.error_count(), 0);
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[1].kind, TokenKind::While);
}

#[test]
fn positions_count_from_one() {
    let mut report = Report::new();
    let tokens = Lexer::tokenize("module\n  demo", &mut report);

    assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
    assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
}

#[test]
fn parses_minimal_module() {
    let (ast, report) = parse_source("module demo;\n");

    assert_eq!(report.error_count(), 0);

    let root = ast.root().expect("missing root");
    assert_eq!(ast.kind(root), NodeKind::Module);
}

#[test]
fn clean_parse_leaves_no_wrapper_nodes() {
    let (ast, report) = parse_source(
        "module demo;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a;\n\
         \ta = 1 + 2;\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0, "{}", report);

    let root = ast.root().expect("missing root");
    assert_eq!(count_kind(&ast, root, NodeKind::Statement), 0);
    assert_eq!(count_kind(&ast, root, NodeKind::Factor), 0);
}

#[test]
fn simplifier_is_idempotent() {
    let (mut ast, report) = parse_source(
        "module demo;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a;\n\
         \ta = (1 + 2) * 3;\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0, "{}", report);

    let root = ast.root().expect("missing root");
    let before = reachable(&ast, root);

    ast.simplify();

    assert_eq!(reachable(&ast, root), before);
}

#[test]
fn recovery_reports_one_error_per_construct() {
    let (ast, report) = parse_source(
        "module broken;\n\
         \n\
         one: void -> void\n\
         {\n\
         \tswitch( 1 ) { case 1 { } }\n\
         }\n\
         \n\
         two: void -> void\n\
         {\n\
         \tswitch( 2 ) { case 1 { } }\n\
         }\n",
    );

    let messages: Vec<&str> = report
        .diagnostics()
        .iter()
        .filter(|diagnostic| diagnostic.severity == Severity::Error)
        .map(|diagnostic| diagnostic.message.as_str())
        .collect();

    assert_eq!(
        messages,
        vec![
            "must have a default alternative in switch block",
            "must have a default alternative in switch block",
        ],
    );

    // La recuperación del switch no roba la llave del bloque que lo
    // contiene: las dos funciones sobreviven en el árbol.
    let root = ast.root().expect("missing root");
    assert_eq!(count_kind(&ast, root, NodeKind::Function), 2);
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let (ast, report) = parse_source(
        "module demo;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a;\n\
         \ta = 1 + 2 * 3;\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0, "{}", report);

    let root = ast.root().expect("missing root");
    let assign = find_kind(&ast, root, NodeKind::Assign).expect("missing assignment");
    let sum = ast.child(assign, 1);

    assert_eq!(ast.kind(sum), NodeKind::BinaryAdd);
    assert_eq!(ast.kind(ast.child(sum, 1)), NodeKind::Multiply);
}

#[test]
fn assignment_associates_to_the_right() {
    let (ast, report) = parse_source(
        "module demo;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a, b;\n\
         \ta = b = 1;\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0, "{}", report);

    let root = ast.root().expect("missing root");
    let outer = find_kind(&ast, root, NodeKind::Assign).expect("missing assignment");

    assert_eq!(ast.kind(ast.child(outer, 1)), NodeKind::Assign);
}

#[test]
fn empty_statement_produces_no_node() {
    let (ast, report) = parse_source(
        "module demo;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \t;\n\
         \t;\n\
         }\n",
    );

    assert_eq!(report.error_count(), 0, "{}", report);

    let root = ast.root().expect("missing root");
    let block = find_kind(&ast, root, NodeKind::Block).expect("missing block");

    assert!(ast.children(block).is_empty());
}

#[test]
fn repeated_import_expands_once() {
    let mut report = Report::new();
    let expanded = pp::expand(&sample("main.i"), &mut report).expect("preprocessing failed");

    assert_eq!(report.error_count(), 0, "{}", report);
    assert_eq!(expanded.matches("int compartido;").count(), 1);
    assert!(!expanded.contains('#'));
}

#[test]
fn circular_import_warns_and_terminates() {
    let mut report = Report::new();
    let expanded = pp::expand(&sample("loop_a.i"), &mut report).expect("preprocessing failed");

    assert!(report
        .diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.message.contains("circular import reference")));
    assert!(expanded.contains("int primero;"));
    assert!(expanded.contains("int segundo;"));
}

#[test]
fn unopenable_import_is_an_error() {
    let mut report = Report::new();
    let expanded = pp::expand(&sample("missing.i"), &mut report).expect("preprocessing failed");

    assert_eq!(report.error_count(), 1);
    assert!(report.diagnostics()[0]
        .message
        .contains("cannot open import file"));
    assert!(expanded.contains("int solo;"));
}
