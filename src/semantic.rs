//! Verificaciones semánticas sobre el árbol ya simplificado.
//!
//! Cuatro pasadas independientes: destinos de asignación válidos, llamadas
//! a función (redefinición de `start`, existencia y cantidad de
//! argumentos), valores de `case` repetidos, y alcanzabilidad de los
//! `return`. Cada una recorre el árbol por su cuenta y deja sus
//! diagnósticos en el reporte; ninguna necesita la tabla de símbolos.

use crate::ast::{lexeme_text, Ast, NodeId, NodeKind};
use crate::error::Report;

/// El lado izquierdo de una asignación debe ser un identificador o una
/// desreferencia.
pub fn check_lvalues(ast: &Ast, report: &mut Report) {
    let root = match ast.root() {
        Some(root) => root,
        None => return,
    };

    lvalues(ast, root, report);
}

fn lvalues(ast: &Ast, node: NodeId, report: &mut Report) {
    if ast.kind(node) == NodeKind::Assign {
        let target = ast.child(node, 0);

        match ast.kind(target) {
            NodeKind::LitIdentifier | NodeKind::Dereference => {}
            _ => report.error(ast.node(node).line, "invalid lvalue"),
        }
    }

    for &child in ast.children(node) {
        lvalues(ast, child, report);
    }
}

/// Encabezado registrado por la pasada de llamadas.
struct Header {
    name: String,
    params: usize,
}

/// Verifica que `start` se defina una sola vez y que cada llamada nombre
/// una función conocida con la cantidad de argumentos de su encabezado.
pub fn check_function_calls(ast: &Ast, report: &mut Report) {
    let root = match ast.root() {
        Some(root) => root,
        None => return,
    };

    let mut headers = Vec::new();
    let mut start_seen = false;
    collect_headers(ast, root, &mut headers, &mut start_seen, report);

    check_applications(ast, root, &headers, report);
}

fn collect_headers(
    ast: &Ast,
    node: NodeId,
    headers: &mut Vec<Header>,
    start_seen: &mut bool,
    report: &mut Report,
) {
    if ast.kind(node) == NodeKind::FunctionHeader {
        let name = node_name(ast, ast.child(node, 1));
        let params = ast
            .children(ast.child(node, 2))
            .iter()
            .filter(|&&child| ast.kind(child) == NodeKind::Param)
            .count();

        let modifiers = ast.child(node, 0);
        if !ast.children(modifiers).is_empty() {
            if *start_seen {
                report.error(ast.node(node).line, "redefinition of `start' function");
            } else {
                *start_seen = true;
            }
        }

        headers.push(Header { name, params });
        return;
    }

    for &child in ast.children(node) {
        collect_headers(ast, child, headers, start_seen, report);
    }
}

fn check_applications(ast: &Ast, node: NodeId, headers: &[Header], report: &mut Report) {
    if ast.kind(node) == NodeKind::Application {
        let name = node_name(ast, ast.child(node, 0));
        let arguments = ast.children(ast.child(node, 1)).len();
        let line = ast.node(node).line;

        match headers.iter().find(|header| header.name == name) {
            None => report.warning(line, format!("undeclared function `{}'", name)),
            Some(header) if arguments < header.params => {
                report.warning(line, format!("too few arguments to function `{}'", name));
            }
            Some(header) if arguments > header.params => {
                report.warning(line, format!("too many arguments to function `{}'", name));
            }
            Some(_) => {}
        }
    }

    for &child in ast.children(node) {
        check_applications(ast, child, headers, report);
    }
}

/// Reporta los valores de `case` repetidos dentro de cada `switch`. Un
/// valor repetido n veces produce n - 1 errores, uno por cada repetición.
pub fn check_switches(ast: &Ast, report: &mut Report) {
    let root = match ast.root() {
        Some(root) => root,
        None => return,
    };

    switches(ast, root, report);
}

fn switches(ast: &Ast, node: NodeId, report: &mut Report) {
    if ast.kind(node) == NodeKind::Switch {
        let cases = ast.child(node, 1);
        let mut seen: Vec<String> = Vec::new();

        for &case in ast.children(cases) {
            let value = match ast.node(case).value.as_ref() {
                Some(value) => lexeme_text(value),
                None => continue,
            };

            if seen.contains(&value) {
                report.error(ast.node(case).line, "duplicate case value");
            } else {
                seen.push(value);
            }
        }
    }

    for &child in ast.children(node) {
        switches(ast, child, report);
    }
}

/// Alcanzabilidad de los `return`: una función no-void debe retornar por
/// todos los caminos, y el código después de un `return` es inalcanzable.
pub fn check_returns(ast: &Ast, report: &mut Report) {
    let root = match ast.root() {
        Some(root) => root,
        None => return,
    };

    returns(ast, root, report);
}

fn returns(ast: &Ast, node: NodeId, report: &mut Report) {
    if ast.kind(node) == NodeKind::Function {
        if let [header, body] = ast.children(node)[..] {
            let type_slot = ast.child(header, 3);

            if ast.kind(type_slot) != NodeKind::TypeVoid && !block_returns(ast, body) {
                report.warning(
                    ast.node(body).line,
                    "control reaches end of non-void function",
                );
            }

            if has_unreachable(ast, body, report) {
                report.warning(ast.node(body).line, "function has unreachable code");
            }
        }

        return;
    }

    for &child in ast.children(node) {
        returns(ast, child, report);
    }
}

/// Indica si un bloque retorna por todos los caminos: contiene un `return`
/// directo, un `if` cuyas dos ramas retornan, o un `switch` en el que
/// todas las alternativas y el caso default retornan.
fn block_returns(ast: &Ast, block: NodeId) -> bool {
    for &child in ast.children(block) {
        match ast.kind(child) {
            NodeKind::Return => return true,
            NodeKind::If => {
                if let [_, then_block, else_block] = ast.children(child)[..] {
                    if block_returns(ast, then_block) && block_returns(ast, else_block) {
                        return true;
                    }
                }
            }
            NodeKind::Switch => {
                let cases = ast.child(child, 1);
                let default = ast.child(child, 2);

                let all_cases = ast
                    .children(cases)
                    .iter()
                    .all(|&case| block_returns(ast, ast.child(case, 0)));

                if all_cases && block_returns(ast, default) {
                    return true;
                }
            }
            _ => {}
        }
    }

    false
}

/// Un `return` que no es la última sentencia del bloque deja código
/// inalcanzable. Las ramas de un `if` se reportan aquí mismo; el valor de
/// retorno sólo refleja el bloque recibido.
fn has_unreachable(ast: &Ast, block: NodeId, report: &mut Report) -> bool {
    let children = ast.children(block).to_vec();
    let last = children.last().copied();

    for &child in &children {
        match ast.kind(child) {
            NodeKind::Return => {
                if Some(child) != last {
                    return true;
                }
            }
            NodeKind::If => {
                let branches = ast.children(child).to_vec();
                let line = ast.node(child).line;

                if let Some(&then_block) = branches.get(1) {
                    if has_unreachable(ast, then_block, report) {
                        report.warning(line, "unreachable code in then block");
                    }
                }

                if let Some(&else_block) = branches.get(2) {
                    if has_unreachable(ast, else_block, report) {
                        report.warning(line, "unreachable code in else block");
                    }
                }
            }
            _ => {}
        }
    }

    false
}

fn node_name(ast: &Ast, node: NodeId) -> String {
    ast.node(node)
        .value
        .as_ref()
        .and_then(|value| value.as_ident())
        .unwrap_or_default()
        .to_string()
}
