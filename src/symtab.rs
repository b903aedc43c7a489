//! Tabla de símbolos.
//!
//! Los ámbitos forman un árbol: la raíz es el ámbito global, cada función
//! con cuerpo abre un ámbito hijo que contiene sus parámetros y las
//! declaraciones de su bloque superior, y cada bloque anidado abre a su vez
//! un ámbito propio. Los símbolos de una función llevan primero el tipo de
//! retorno y luego un tipo por parámetro (o un `void` centinela si la lista
//! está vacía), lo cual los distingue de las variables, cuyo símbolo lleva
//! un único tipo.
//!
//! Las fases que recorren ámbitos (recolección, verificación de tipos,
//! generación de código) comparten el mismo orden de visita mediante
//! [`ScopeWalker`], un cursor explícito que desciende a los hijos en su
//! orden de creación.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::lex::Lexeme;
use crate::types::{Modifiers, SimpleType, Type};
use std::io::{self, Write};

/// Índice de un ámbito dentro del árbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeId(pub usize);

/// Un símbolo declarado: variable (un tipo) o función (retorno y parámetros).
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub types: Vec<Type>,
    /// Desplazamiento en el marco de pila, asignado por el generador de
    /// código. `None` para globales y funciones.
    pub location: Option<i32>,
}

impl Symbol {
    pub fn is_function(&self) -> bool {
        self.types.len() > 1
    }

    /// Tipo de una variable, o tipo de retorno de una función.
    pub fn first_type(&self) -> &Type {
        &self.types[0]
    }

    /// Tipos de los parámetros de una función. Una lista vacía de
    /// parámetros se representó con un `void` centinela.
    pub fn param_types(&self) -> &[Type] {
        let params = &self.types[1..];
        match params {
            [only] if only.simple == SimpleType::Void => &[],
            _ => params,
        }
    }
}

/// Un ámbito con sus símbolos y sus ámbitos hijos.
#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub symbols: Vec<Symbol>,
    pub children: Vec<ScopeId>,
}

/// Resultado de una búsqueda: dónde se encontró el símbolo y si proviene
/// del ámbito global.
#[derive(Copy, Clone, Debug)]
pub struct Resolved {
    pub scope: ScopeId,
    pub index: usize,
    pub global: bool,
}

/// Árbol de ámbitos de una unidad de compilación.
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn new() -> Self {
        ScopeTree {
            scopes: vec![Scope {
                parent: None,
                symbols: Vec::new(),
                children: Vec::new(),
            }],
        }
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn create_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            symbols: Vec::new(),
            children: Vec::new(),
        });
        self.scopes[parent.0].children.push(id);

        id
    }

    pub fn declare(&mut self, scope: ScopeId, symbol: Symbol) {
        self.scopes[scope.0].symbols.push(symbol);
    }

    /// Busca un nombre desde `scope` hacia la raíz. Dentro de cada ámbito
    /// los símbolos se examinan del más reciente al más antiguo.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<Resolved> {
        let mut current = Some(scope);

        while let Some(id) = current {
            let found = self.scopes[id.0]
                .symbols
                .iter()
                .rposition(|symbol| symbol.name == name);

            if let Some(index) = found {
                return Some(Resolved {
                    scope: id,
                    index,
                    global: id == Self::ROOT,
                });
            }

            current = self.scopes[id.0].parent;
        }

        None
    }

    pub fn symbol(&self, resolved: Resolved) -> &Symbol {
        &self.scopes[resolved.scope.0].symbols[resolved.index]
    }

    pub fn symbol_mut(&mut self, resolved: Resolved) -> &mut Symbol {
        &mut self.scopes[resolved.scope.0].symbols[resolved.index]
    }

    /// Volcado indentado del árbol de ámbitos con los tipos de cada símbolo.
    pub fn dump<W: Write>(&self, output: &mut W) -> io::Result<()> {
        self.dump_scope(output, Self::ROOT, 0)
    }

    fn dump_scope<W: Write>(&self, output: &mut W, id: ScopeId, depth: usize) -> io::Result<()> {
        let indent = "|     ".repeat(depth);
        let scope = self.scope(id);

        for symbol in &scope.symbols {
            writeln!(output, "{}|", indent)?;
            write!(output, "{}+--| {} ", indent, symbol.name)?;
            for typ in &symbol.types {
                write!(output, "-> {} ", typ)?;
            }
            writeln!(output)?;
        }

        for &child in &scope.children {
            writeln!(output, "{}|", indent)?;
            writeln!(output, "{}+-----+", indent)?;
            self.dump_scope(output, child, depth + 1)?;
        }

        Ok(())
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        ScopeTree::new()
    }
}

/// Cursor de recorrido determinista sobre el árbol de ámbitos. Cada pase
/// que entra y sale de ámbitos en el orden del árbol sintáctico obtiene los
/// mismos ámbitos que creó la recolección.
#[derive(Clone)]
pub struct ScopeWalker {
    stack: Vec<(ScopeId, usize)>,
}

impl ScopeWalker {
    pub fn new() -> Self {
        ScopeWalker {
            stack: vec![(ScopeTree::ROOT, 0)],
        }
    }

    pub fn current(&self) -> ScopeId {
        self.stack[self.stack.len() - 1].0
    }

    /// Desciende al siguiente hijo no visitado del ámbito actual.
    pub fn enter(&mut self, tree: &ScopeTree) -> ScopeId {
        let top = self.stack.len() - 1;
        let (scope, cursor) = self.stack[top];

        let child = tree.scope(scope).children[cursor];
        self.stack[top].1 += 1;
        self.stack.push((child, 0));

        child
    }

    pub fn exit(&mut self) {
        self.stack.pop();
    }
}

impl Default for ScopeWalker {
    fn default() -> Self {
        ScopeWalker::new()
    }
}

/// Recolecta los símbolos del árbol sintáctico ya simplificado.
pub fn collect(ast: &Ast) -> ScopeTree {
    let mut tree = ScopeTree::new();

    if let Some(root) = ast.root() {
        let mut collector = Collector { ast, tree: &mut tree };
        collector.walk(root, ScopeTree::ROOT, false);
    }

    tree
}

struct Collector<'a> {
    ast: &'a Ast,
    tree: &'a mut ScopeTree,
}

impl<'a> Collector<'a> {
    fn walk(&mut self, node: NodeId, scope: ScopeId, is_extern: bool) {
        match self.ast.kind(node) {
            NodeKind::Global => {
                let children = self.ast.children(node);
                let is_extern = children
                    .first()
                    .map_or(false, |&first| self.ast.kind(first) == NodeKind::Extern);

                for &child in children {
                    self.walk(child, scope, is_extern);
                }
            }
            NodeKind::Declaration => {
                let symbol = self.declaration_symbol(node, is_extern);
                self.tree.declare(scope, symbol);
            }
            NodeKind::Function => {
                let header = self.ast.child(node, 0);
                let symbol = self.header_symbol(header, is_extern);
                self.tree.declare(scope, symbol);

                // Una declaración adelantada no tiene cuerpo ni ámbito.
                if self.ast.children(node).len() > 1 {
                    let body = self.ast.child(node, 1);
                    let function_scope = self.tree.create_scope(scope);

                    for symbol in self.param_symbols(header) {
                        self.tree.declare(function_scope, symbol);
                    }

                    // El bloque superior comparte el ámbito de la función.
                    for &child in self.ast.children(body) {
                        self.walk(child, function_scope, false);
                    }
                }
            }
            NodeKind::Block => {
                let block_scope = self.tree.create_scope(scope);
                for &child in self.ast.children(node) {
                    self.walk(child, block_scope, false);
                }
            }
            _ => {
                for &child in self.ast.children(node) {
                    self.walk(child, scope, is_extern);
                }
            }
        }
    }

    fn simple_type(&self, type_node: NodeId) -> SimpleType {
        match self.ast.kind(type_node) {
            NodeKind::TypeBool => SimpleType::Boolean,
            NodeKind::TypeChar => SimpleType::Char,
            NodeKind::TypeFloat => SimpleType::Float,
            NodeKind::TypeInt => SimpleType::Int,
            NodeKind::TypeUntyped => SimpleType::Untyped,
            NodeKind::TypeVoid => SimpleType::Void,
            other => unreachable!("node {:?} does not name a type", other),
        }
    }

    fn uint_value(&self, node: NodeId) -> u32 {
        match self.ast.node(node).value {
            Some(Lexeme::Uint(value)) => value,
            _ => 0,
        }
    }

    fn node_name(&self, node: NodeId) -> String {
        self.ast
            .node(node)
            .value
            .as_ref()
            .and_then(|value| value.as_ident())
            .unwrap_or_default()
            .to_string()
    }

    /// Tipo de una declaración: niveles de indirección como dimensiones
    /// cero, luego los tamaños declarados de arreglo.
    fn declaration_type(&self, node: NodeId, is_extern: bool) -> Type {
        let simple = self.simple_type(self.ast.child(node, 0));
        let references = self.uint_value(self.ast.child(node, 1));
        let index_block = self.ast.child(node, 3);

        let mut dimensions: Vec<u32> = vec![0; references as usize];
        for &index in self.ast.children(index_block) {
            dimensions.push(self.uint_value(index));
        }

        let mut modifiers = Modifiers::empty();
        if is_extern {
            modifiers |= Modifiers::EXTERN;
        }

        Type {
            simple,
            dimensions,
            modifiers,
        }
    }

    fn declaration_symbol(&self, node: NodeId, is_extern: bool) -> Symbol {
        Symbol {
            name: self.node_name(self.ast.child(node, 2)),
            types: vec![self.declaration_type(node, is_extern)],
            location: None,
        }
    }

    /// Tipo de retorno de un encabezado, con sus modificadores `start` y
    /// `extern` adjuntos.
    fn return_type(&self, header: NodeId, is_extern: bool) -> Type {
        let type_slot = self.ast.child(header, 3);

        let mut typ = if self.ast.kind(type_slot) == NodeKind::TypeVoid {
            Type::new(SimpleType::Void)
        } else {
            // Nodo returntype: nombre de tipo, referencias, dimensiones.
            let simple = self.simple_type(self.ast.child(type_slot, 0));
            let references = self.uint_value(self.ast.child(type_slot, 1));
            let dimensions = self.uint_value(self.ast.child(type_slot, 2));

            Type {
                simple,
                dimensions: vec![0; (references + dimensions) as usize],
                modifiers: Modifiers::empty(),
            }
        };

        let modifiers_node = self.ast.child(header, 0);
        if !self.ast.children(modifiers_node).is_empty() {
            typ.modifiers |= Modifiers::START;
        }
        if is_extern {
            typ.modifiers |= Modifiers::EXTERN;
        }

        typ
    }

    fn param_type(&self, param: NodeId) -> Type {
        let simple = self.simple_type(self.ast.child(param, 0));
        let references = self.uint_value(self.ast.child(param, 1));
        let dimensions = self.uint_value(self.ast.child(param, 3));

        Type {
            simple,
            dimensions: vec![0; (references + dimensions) as usize],
            modifiers: Modifiers::empty(),
        }
    }

    fn params(&self, header: NodeId) -> Vec<NodeId> {
        let param_list = self.ast.child(header, 2);

        self.ast
            .children(param_list)
            .iter()
            .copied()
            .filter(|&child| self.ast.kind(child) == NodeKind::Param)
            .collect()
    }

    fn header_symbol(&self, header: NodeId, is_extern: bool) -> Symbol {
        let mut types = vec![self.return_type(header, is_extern)];

        let params = self.params(header);
        if params.is_empty() {
            types.push(Type::new(SimpleType::Void));
        } else {
            for param in params {
                types.push(self.param_type(param));
            }
        }

        Symbol {
            name: self.node_name(self.ast.child(header, 1)),
            types,
            location: None,
        }
    }

    fn param_symbols(&self, header: NodeId) -> Vec<Symbol> {
        self.params(header)
            .into_iter()
            .map(|param| Symbol {
                name: self.node_name(self.ast.child(param, 2)),
                types: vec![self.param_type(param)],
                location: None,
            })
            .collect()
    }
}
