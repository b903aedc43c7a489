//! Árbol de sintaxis abstracta.
//!
//! El árbol vive en una arena ([`Ast`]): cada nodo ocupa una posición fija en
//! un vector y se referencia por su índice ([`NodeId`]). Los enlaces padre e
//! hijo son índices, lo cual evita propiedad compartida entre nodos. Un nodo
//! desconectado durante la recuperación de errores del parser queda huérfano
//! en la arena, inalcanzable desde la raíz.
//!
//! Cada nodo lleva su clase ([`NodeKind`]), la línea donde inició, un valor
//! opcional (literal o identificador) y un tipo opcional que el verificador
//! de tipos asigna una sola vez.

use crate::lex::Lexeme;
use crate::types::Type;
use std::fmt::{self, Display};
use std::io::{self, Write};

/// Índice de un nodo dentro de la arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Clase de nodo del árbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Module,
    Start,
    Extern,
    Global,
    Function,
    FunctionHeader,
    Modifiers,
    ParamList,
    Param,
    ReturnType,
    DimensionBlock,
    Block,
    Statement,
    Switch,
    Cases,
    Case,
    While,
    Goto,
    Label,
    If,
    Return,
    Continue,
    Break,
    DeclBlock,
    Declaration,
    Initializer,
    IndexBlock,
    Reference,
    Index,
    LogicalOr,
    LogicalAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    BitwiseLShift,
    BitwiseRShift,
    Assign,
    BinaryAdd,
    BinarySubtract,
    UnaryAdd,
    UnarySubtract,
    Multiply,
    Divide,
    Modulus,
    BitwiseComplement,
    Address,
    Dereference,
    Not,
    Application,
    Indexer,
    Arguments,
    Factor,

    // Nombres de tipo
    TypeBool,
    TypeChar,
    TypeFloat,
    TypeInt,
    TypeUntyped,
    TypeVoid,

    // Literales
    LitBool,
    LitChar,
    LitFloat,
    LitInt,
    LitString,
    LitIdentifier,

    // Conversiones insertadas por el verificador de tipos
    IntToFloat,
    CharToInt,
    CharToFloat,
}

impl NodeKind {
    /// Nombre legible, usado en los volcados del árbol y en diagnósticos
    /// sobre operadores.
    pub fn name(&self) -> &'static str {
        use NodeKind::*;

        match self {
            Module => "module",
            Start => "start",
            Extern => "extern",
            Global => "global",
            Function => "function",
            FunctionHeader => "header",
            Modifiers => "modifiers",
            ParamList => "paramlist",
            Param => "param",
            ReturnType => "returntype",
            DimensionBlock => "dimensionblock",
            Block => "block",
            Statement => "statement",
            Switch => "switch",
            Cases => "cases",
            Case => "case",
            While => "while",
            Goto => "goto",
            Label => "label",
            If => "if",
            Return => "return",
            Continue => "continue",
            Break => "break",
            DeclBlock => "declblock",
            Declaration => "declaration",
            Initializer => "initializer",
            IndexBlock => "indexblock",
            Reference => "reference",
            Index => "index",
            LogicalOr => "||",
            LogicalAnd => "&&",
            BitwiseOr => "|",
            BitwiseXor => "^",
            BitwiseAnd => "&",
            Equal => "==",
            NotEqual => "!=",
            Greater => ">",
            GreaterEqual => ">=",
            Less => "<",
            LessEqual => "<=",
            BitwiseLShift => "<<",
            BitwiseRShift => ">>",
            Assign => "=",
            BinaryAdd => "+",
            BinarySubtract => "-",
            UnaryAdd => "+",
            UnarySubtract => "-",
            Multiply => "*",
            Divide => "/",
            Modulus => "%",
            BitwiseComplement => "~",
            Address => "&",
            Dereference => "*",
            Not => "!",
            Application => "application",
            Indexer => "indexer",
            Arguments => "arguments",
            Factor => "factor",
            TypeBool => "bool",
            TypeChar => "char",
            TypeFloat => "float",
            TypeInt => "int",
            TypeUntyped => "untyped",
            TypeVoid => "void",
            LitBool => "bool",
            LitChar => "char",
            LitFloat => "float",
            LitInt => "int",
            LitString => "string",
            LitIdentifier => "identifier",
            IntToFloat => "int->float",
            CharToInt => "char->int",
            CharToFloat => "char->float",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Forma textual de un valor, usada en volcados y en la comparación de
/// etiquetas `case`.
pub fn lexeme_text(lexeme: &Lexeme) -> String {
    match lexeme {
        Lexeme::Uint(value) => value.to_string(),
        Lexeme::Float(value) => format!("{:.6}", value),
        Lexeme::Char(value) => format!("'{}'", value),
        Lexeme::Str(value) => format!("\"{}\"", value),
        Lexeme::Bool(true) => "true".to_string(),
        Lexeme::Bool(false) => "false".to_string(),
        Lexeme::Ident(name) => name.clone(),
    }
}

/// Nodo del árbol.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
    pub value: Option<Lexeme>,
    /// Tipo asignado por el verificador de tipos; `None` hasta entonces.
    pub typ: Option<Type>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena de nodos de una unidad de compilación.
#[derive(Default)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn child(&self, id: NodeId, index: usize) -> NodeId {
        self.node(id).children[index]
    }

    /// Crea un nodo sin valor, todavía desconectado.
    pub fn add(&mut self, kind: NodeKind, line: u32) -> NodeId {
        self.add_node(kind, line, None)
    }

    /// Crea un nodo con valor, todavía desconectado.
    pub fn add_val(&mut self, kind: NodeKind, value: Lexeme, line: u32) -> NodeId {
        self.add_node(kind, line, Some(value))
    }

    fn add_node(&mut self, kind: NodeKind, line: u32, value: Option<Lexeme>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            line,
            value,
            typ: None,
            parent: None,
            children: Vec::new(),
        });

        id
    }

    /// Agrega `child` al final de la lista de hijos de `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// Desconecta un nodo de su padre. El nodo y sus descendientes quedan
    /// huérfanos en la arena.
    pub fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&child| child != id);
            self.node_mut(id).parent = None;
        }
    }

    /// Inserta `new` entre `id` y su padre: `new` toma el lugar de `id` en
    /// la lista de hijos del padre, e `id` pasa a ser hijo único de `new`.
    pub fn insert_above(&mut self, id: NodeId, new: NodeId) {
        let parent = self.node(id).parent;

        if let Some(parent) = parent {
            let position = self
                .node(parent)
                .children
                .iter()
                .position(|&child| child == id)
                .unwrap_or_else(|| unreachable!("parent link without child link"));

            self.node_mut(parent).children[position] = new;
        } else if self.root == Some(id) {
            self.root = Some(new);
        }

        self.node_mut(new).parent = parent;
        self.node_mut(new).children.push(id);
        self.node_mut(id).parent = Some(new);
    }

    /// Reemplaza un nodo envoltorio por su hijo único.
    fn lift_only_child(&mut self, id: NodeId) {
        let only = self.node(id).children[0];
        let parent = self.node(id).parent;

        self.node_mut(only).parent = parent;

        if let Some(parent) = parent {
            let position = self
                .node(parent)
                .children
                .iter()
                .position(|&child| child == id)
                .unwrap_or_else(|| unreachable!("parent link without child link"));

            self.node_mut(parent).children[position] = only;
        } else if self.root == Some(id) {
            self.root = Some(only);
        }
    }

    /// Elimina los nodos envoltorio `statement` y `factor`, promoviendo su
    /// hijo único. El paso es idempotente.
    pub fn simplify(&mut self) {
        if let Some(root) = self.root {
            self.simplify_node(root);
        }
    }

    fn simplify_node(&mut self, id: NodeId) {
        // Copia porque la lista de hijos puede cambiar durante el descenso.
        let children = self.node(id).children.clone();
        for child in children {
            self.simplify_node(child);
        }

        let node = self.node(id);
        if matches!(node.kind, NodeKind::Statement | NodeKind::Factor) && node.children.len() == 1 {
            self.lift_only_child(id);
        }
    }

    /// Escribe una representación indentada del árbol.
    pub fn dump<W: Write>(&self, output: &mut W) -> io::Result<()> {
        if let Some(root) = self.root {
            self.dump_node(output, root, 0)?;
        }

        Ok(())
    }

    fn dump_node<W: Write>(&self, output: &mut W, id: NodeId, depth: usize) -> io::Result<()> {
        let node = self.node(id);

        write!(output, "{}{}", "  ".repeat(depth), node.kind)?;
        if let Some(value) = &node.value {
            write!(output, " {}", lexeme_text(value))?;
        }
        if let Some(typ) = &node.typ {
            write!(output, " <{}>", typ)?;
        }
        writeln!(output)?;

        for &child in &node.children {
            self.dump_node(output, child, depth + 1)?;
        }

        Ok(())
    }
}
