//! Verificación y decoración de tipos.
//!
//! Recorre el árbol en postorden y anota cada nodo de expresión con su
//! tipo. Las conversiones implícitas permitidas se materializan como nodos
//! de conversión insertados entre el operando y su padre, de modo que el
//! generador de código las encuentra ya resueltas. Los ámbitos se recorren
//! con el mismo cursor que usó la recolección de símbolos, así la búsqueda
//! de identificadores cae siempre en el ámbito correcto.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::Report;
use crate::symtab::{ScopeTree, ScopeWalker};
use crate::types::{SimpleType, Type};

/// Conversiones implícitas: tipo de origen, tipo de destino y el nodo de
/// conversión que se inserta.
const COERCIONS: &[(SimpleType, SimpleType, NodeKind)] = &[
    (SimpleType::Int, SimpleType::Float, NodeKind::IntToFloat),
    (SimpleType::Char, SimpleType::Int, NodeKind::CharToInt),
    (SimpleType::Char, SimpleType::Float, NodeKind::CharToFloat),
];

/// Reglas de los operadores binarios: operador, tipo de operando admitido
/// y tipo del resultado. Un resultado `Unknown` significa que la expresión
/// conserva el tipo de sus operandos. Para un mismo operador gana la
/// primera fila cuyo tipo coincide con alguno de los dos operandos, por lo
/// que el orden de las filas decide hacia qué tipo se convierte.
const BINARY_RULES: &[(NodeKind, SimpleType, SimpleType)] = &[
    (NodeKind::LogicalOr, SimpleType::Boolean, SimpleType::Unknown),
    (NodeKind::LogicalAnd, SimpleType::Boolean, SimpleType::Unknown),
    (NodeKind::BitwiseOr, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::BitwiseXor, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::BitwiseAnd, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::Equal, SimpleType::Int, SimpleType::Boolean),
    (NodeKind::NotEqual, SimpleType::Int, SimpleType::Boolean),
    (NodeKind::Greater, SimpleType::Int, SimpleType::Boolean),
    (NodeKind::GreaterEqual, SimpleType::Int, SimpleType::Boolean),
    (NodeKind::Less, SimpleType::Float, SimpleType::Boolean),
    (NodeKind::Less, SimpleType::Int, SimpleType::Boolean),
    (NodeKind::Less, SimpleType::Char, SimpleType::Boolean),
    (NodeKind::LessEqual, SimpleType::Float, SimpleType::Boolean),
    (NodeKind::LessEqual, SimpleType::Int, SimpleType::Boolean),
    (NodeKind::LessEqual, SimpleType::Char, SimpleType::Boolean),
    (NodeKind::BitwiseLShift, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::BitwiseRShift, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::Assign, SimpleType::Float, SimpleType::Unknown),
    (NodeKind::Assign, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::Assign, SimpleType::Char, SimpleType::Unknown),
    (NodeKind::BinarySubtract, SimpleType::Float, SimpleType::Unknown),
    (NodeKind::BinarySubtract, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::BinaryAdd, SimpleType::Float, SimpleType::Unknown),
    (NodeKind::BinaryAdd, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::Multiply, SimpleType::Float, SimpleType::Unknown),
    (NodeKind::Multiply, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::Multiply, SimpleType::Char, SimpleType::Unknown),
    (NodeKind::Divide, SimpleType::Int, SimpleType::Unknown),
    (NodeKind::Modulus, SimpleType::Int, SimpleType::Unknown),
];

fn is_binary(kind: NodeKind) -> bool {
    BINARY_RULES.iter().any(|&(operator, _, _)| operator == kind)
}

fn is_unary(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::UnaryAdd
            | NodeKind::UnarySubtract
            | NodeKind::Not
            | NodeKind::BitwiseComplement
            | NodeKind::Address
            | NodeKind::Dereference
    )
}

/// Decora el árbol con tipos y acumula los diagnósticos en el reporte.
pub fn decorate(ast: &mut Ast, scopes: &ScopeTree, report: &mut Report) {
    let root = match ast.root() {
        Some(root) => root,
        None => return,
    };

    let mut checker = Checker {
        ast,
        scopes,
        walker: ScopeWalker::new(),
        report,
    };

    checker.visit(root);
}

struct Checker<'a> {
    ast: &'a mut Ast,
    scopes: &'a ScopeTree,
    walker: ScopeWalker,
    report: &'a mut Report,
}

impl<'a> Checker<'a> {
    fn visit(&mut self, node: NodeId) {
        match self.ast.kind(node) {
            NodeKind::Global => {
                let children = self.ast.children(node).to_vec();
                let is_extern = children
                    .first()
                    .map_or(false, |&first| self.ast.kind(first) == NodeKind::Extern);

                for &child in &children {
                    if is_extern {
                        // Lo externo no se verifica, pero el cursor de
                        // ámbitos debe avanzar igual que en la recolección.
                        self.skip_scopes(child);
                    } else {
                        self.visit(child);
                    }
                }
            }
            NodeKind::Function => {
                let children = self.ast.children(node).to_vec();

                if children.len() > 1 {
                    self.walker.enter(self.scopes);

                    // El bloque superior comparte el ámbito de la función.
                    for &child in &self.ast.children(children[1]).to_vec() {
                        self.visit(child);
                    }

                    self.walker.exit();
                }
            }
            NodeKind::Block => {
                self.walker.enter(self.scopes);

                for &child in &self.ast.children(node).to_vec() {
                    self.visit(child);
                }

                self.walker.exit();
            }
            _ => {
                for &child in &self.ast.children(node).to_vec() {
                    self.visit(child);
                }

                self.decorate(node);
            }
        }
    }

    /// Avanza el cursor de ámbitos sobre un subárbol sin decorarlo.
    fn skip_scopes(&mut self, node: NodeId) {
        match self.ast.kind(node) {
            NodeKind::Function => {
                let children = self.ast.children(node).to_vec();

                if children.len() > 1 {
                    self.walker.enter(self.scopes);
                    for &child in &self.ast.children(children[1]).to_vec() {
                        self.skip_scopes(child);
                    }
                    self.walker.exit();
                }
            }
            NodeKind::Block => {
                self.walker.enter(self.scopes);
                for &child in &self.ast.children(node).to_vec() {
                    self.skip_scopes(child);
                }
                self.walker.exit();
            }
            _ => {
                for &child in &self.ast.children(node).to_vec() {
                    self.skip_scopes(child);
                }
            }
        }
    }

    fn decorate(&mut self, node: NodeId) {
        match self.ast.kind(node) {
            NodeKind::LitBool => self.set(node, Type::new(SimpleType::Boolean)),
            NodeKind::LitChar => self.set(node, Type::new(SimpleType::Char)),
            NodeKind::LitFloat => self.set(node, Type::new(SimpleType::Float)),
            NodeKind::LitInt => self.set(node, Type::new(SimpleType::Int)),
            NodeKind::LitString => {
                // Una cadena es un puntero a char.
                let mut typ = Type::new(SimpleType::Char);
                typ.dimensions.push(0);
                self.set(node, typ);
            }
            NodeKind::LitIdentifier => self.identifier(node),
            NodeKind::Application => self.application(node),
            NodeKind::Return => self.check_return(node),
            kind if is_unary(kind) => self.unary(node),
            kind if is_binary(kind) => self.binary(node),
            _ => {}
        }
    }

    fn set(&mut self, node: NodeId, typ: Type) {
        self.ast.node_mut(node).typ = Some(typ);
    }

    /// Un identificador toma una copia del tipo de su símbolo. Si no hay
    /// símbolo se deja sin tipo; los otros verificadores reportan el uso
    /// de nombres sin declarar.
    fn identifier(&mut self, node: NodeId) {
        let name = match self.ast.node(node).value.as_ref().and_then(|v| v.as_ident()) {
            Some(name) => name.to_string(),
            None => return,
        };

        if let Some(found) = self.scopes.lookup(self.walker.current(), &name) {
            let typ = self.scopes.symbol(found).first_type().clone();
            self.set(node, typ);
        }
    }

    fn binary(&mut self, node: NodeId) {
        let kind = self.ast.kind(node);
        let children = self.ast.children(node).to_vec();
        let (left, right) = match children[..] {
            [left, right] => (left, right),
            _ => return,
        };

        let (left_type, right_type) =
            match (self.ast.node(left).typ.clone(), self.ast.node(right).typ.clone()) {
                (Some(left_type), Some(right_type)) => (left_type, right_type),
                _ => return,
            };

        let line = self.ast.node(node).line;
        let mut result = SimpleType::Unknown;

        // En una asignación manda el lado izquierdo; en el resto decide la
        // primera regla que admite a alguno de los dos operandos.
        let wanted = if kind == NodeKind::Assign {
            left_type.simple
        } else {
            let mut wanted = SimpleType::Unknown;

            for &(operator, operand, rule_result) in BINARY_RULES {
                if operator == kind
                    && (left_type.simple == operand || right_type.simple == operand)
                {
                    wanted = operand;
                    result = rule_result;
                    break;
                }
            }

            wanted
        };

        if wanted == SimpleType::Unknown {
            self.report.error(line, "Invalid types for binary expression");
            return;
        }

        let good = if left_type.simple != wanted {
            self.coerce(left, wanted)
        } else if right_type.simple != wanted {
            self.coerce(right, wanted)
        } else {
            true
        };

        if !good {
            self.report.error(
                line,
                format!("Invalid operands for '{}' operator", kind.name()),
            );
        }

        let typ = if result != SimpleType::Unknown {
            Type::new(result)
        } else {
            left_type.with_simple(wanted)
        };

        self.set(node, typ);
    }

    fn unary(&mut self, node: NodeId) {
        let child = self.ast.child(node, 0);
        let child_type = match self.ast.node(child).typ.clone() {
            Some(typ) => typ,
            None => return,
        };

        let typ = match self.ast.kind(node) {
            NodeKind::Dereference => {
                if !child_type.is_pointer() {
                    let line = self.ast.node(node).line;
                    self.report.error(line, "Dereferencing non-pointer.");
                    return;
                }

                child_type.dereferenced()
            }
            NodeKind::Address => {
                let mut typ = child_type;
                typ.dimensions.insert(0, 0);
                typ
            }
            _ => child_type,
        };

        self.set(node, typ);
    }

    /// Una llamada toma el tipo de retorno de la función y verifica cada
    /// argumento contra el parámetro correspondiente, insertando las
    /// conversiones admitidas.
    fn application(&mut self, node: NodeId) {
        let children = self.ast.children(node).to_vec();
        let (callee, arguments) = match children[..] {
            [callee, arguments] => (callee, arguments),
            _ => return,
        };

        if let Some(typ) = self.ast.node(callee).typ.clone() {
            self.set(node, typ);
        }

        let name = match self.ast.node(callee).value.as_ref().and_then(|v| v.as_ident()) {
            Some(name) => name.to_string(),
            None => return,
        };

        let found = match self.scopes.lookup(self.walker.current(), &name) {
            Some(found) => found,
            None => return,
        };

        let expected: Vec<Type> = self.scopes.symbol(found).param_types().to_vec();
        let args = self.ast.children(arguments).to_vec();
        let line = self.ast.node(node).line;

        // El desajuste en la cantidad de argumentos se reporta aparte.
        for (i, parameter) in expected.iter().enumerate() {
            let &arg = match args.get(i) {
                Some(arg) => arg,
                None => break,
            };

            let arg_type = match self.ast.node(arg).typ.clone() {
                Some(typ) => typ,
                None => continue,
            };

            if arg_type.simple != parameter.simple && !self.coerce(arg, parameter.simple) {
                self.report.error(
                    line,
                    format!(
                        "Type for argument({}) does not match. Got '{}', expected '{}'",
                        i + 1,
                        arg_type,
                        parameter
                    ),
                );
            }
        }
    }

    /// Compara el valor de un `return` con el tipo de retorno de la
    /// función que lo contiene.
    fn check_return(&mut self, node: NodeId) {
        let mut current = node;
        let function = loop {
            match self.ast.node(current).parent {
                Some(parent) if self.ast.kind(parent) == NodeKind::Function => break parent,
                Some(parent) => current = parent,
                None => return,
            }
        };

        let header = self.ast.child(function, 0);
        let name_node = self.ast.child(header, 1);
        let name = match self.ast.node(name_node).value.as_ref().and_then(|v| v.as_ident()) {
            Some(name) => name.to_string(),
            None => return,
        };

        let returns = match self.scopes.lookup(self.walker.current(), &name) {
            Some(found) => self.scopes.symbol(found).first_type().clone(),
            None => return,
        };

        let line = self.ast.node(node).line;
        let children = self.ast.children(node).to_vec();

        if returns.simple == SimpleType::Void {
            if children.is_empty() {
                return;
            }

            self.report
                .warning(line, "`return' with a value, in function returning void");
        }

        let value = match children.first() {
            Some(&value) => value,
            None => return,
        };

        let value_type = match self.ast.node(value).typ.clone() {
            Some(typ) => typ,
            None => return,
        };

        if value_type.simple != returns.simple && !self.coerce(value, returns.simple) {
            self.report.warning(line, "Invalid type for return value");
        }
    }

    /// Intenta convertir el operando al tipo pedido. Si hay una conversión
    /// admitida, inserta el nodo de conversión sobre el operando con el
    /// tipo resultante.
    fn coerce(&mut self, operand: NodeId, wanted: SimpleType) -> bool {
        let from = match self.ast.node(operand).typ.clone() {
            Some(typ) => typ,
            None => return false,
        };

        for &(source, target, conversion) in COERCIONS {
            if source == from.simple && target == wanted {
                let line = self.ast.node(operand).line;
                let converted = self.ast.add(conversion, line);

                self.ast.node_mut(converted).typ = Some(from.with_simple(wanted));
                self.ast.insert_above(operand, converted);

                return true;
            }
        }

        false
    }
}
