//! Análisis sintáctico.
//!
//! Parser descendente recursivo con una función por no terminal. La
//! recuperación de errores sigue la técnica de conjuntos FIRST y FOLLOW:
//! al entrar a un no terminal, [`Parser::sync`] verifica que el token actual
//! pertenezca al conjunto FIRST y, si no, registra un error y descarta
//! tokens hasta alcanzar un miembro de FIRST (se continúa el análisis) o de
//! FOLLOW (el no terminal se abandona devolviendo `None`). Ante un token
//! inesperado a mitad de un no terminal, el nodo parcial se desconecta del
//! árbol y se descartan tokens hasta el conjunto FOLLOW.
//!
//! Un análisis sin errores termina con la pasada de simplificación, que
//! elimina los nodos envoltorio de sentencia y factor.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::Report;
use crate::lex::{Lexeme, Lexer, Token, TokenKind};

/// Conjuntos FIRST y FOLLOW de los no terminales.
mod sets {
    use crate::lex::TokenKind::{self, *};

    pub const TYPES: &[TokenKind] = &[KwBool, KwChar, KwFloat, KwInt, KwUntyped];

    pub const FACTOR_FIRST: &[TokenKind] =
        &[LitBool, LitChar, LitFloat, LitInt, LitString, LParen, Identifier];

    pub const UNARY2_FIRST: &[TokenKind] = &[
        LitBool, LitChar, LitFloat, LitInt, LitString, Add, Subtract, Not, LParen, Identifier,
    ];

    pub const EXPR_FIRST: &[TokenKind] = &[
        LitBool, LitChar, LitFloat, LitInt, LitString, BitwiseAnd, Multiply, BitwiseComplement,
        Add, Subtract, Not, LParen, Identifier,
    ];

    // FOLLOW de los niveles de expresión: la base más los operadores de
    // precedencia menor o igual al nivel.
    pub const FOLLOW_UNARY: &[TokenKind] = &[
        RParen, Comma, Semicolon, Assign, LogicalOr, LogicalAnd, BitwiseOr, BitwiseXor,
        BitwiseAnd, Equal, NotEqual, Greater, GreaterEqual, Less, LessEqual, BitwiseLShift,
        BitwiseRShift, Add, Subtract, Multiply, Divide, Modulus,
    ];

    pub const FOLLOW_MUL: &[TokenKind] = &[
        RParen, Comma, Semicolon, Assign, LogicalOr, LogicalAnd, BitwiseOr, BitwiseXor,
        BitwiseAnd, Equal, NotEqual, Greater, GreaterEqual, Less, LessEqual, BitwiseLShift,
        BitwiseRShift, Add, Subtract,
    ];

    pub const FOLLOW_ADD: &[TokenKind] = &[
        RParen, Comma, Semicolon, Assign, LogicalOr, LogicalAnd, BitwiseOr, BitwiseXor,
        BitwiseAnd, Equal, NotEqual, Greater, GreaterEqual, Less, LessEqual, BitwiseLShift,
        BitwiseRShift,
    ];

    pub const FOLLOW_SHIFT: &[TokenKind] = &[
        RParen, Comma, Semicolon, Assign, LogicalOr, LogicalAnd, BitwiseOr, BitwiseXor,
        BitwiseAnd, Equal, NotEqual, Greater, GreaterEqual, Less, LessEqual,
    ];

    pub const FOLLOW_REL: &[TokenKind] = &[
        RParen, Comma, Semicolon, Assign, LogicalOr, LogicalAnd, BitwiseOr, BitwiseXor,
        BitwiseAnd, Equal, NotEqual,
    ];

    pub const FOLLOW_EQ: &[TokenKind] = &[
        RParen, Comma, Semicolon, Assign, LogicalOr, LogicalAnd, BitwiseOr, BitwiseXor,
        BitwiseAnd,
    ];

    pub const FOLLOW_BITAND: &[TokenKind] = &[
        RParen, Comma, Semicolon, Assign, LogicalOr, LogicalAnd, BitwiseOr, BitwiseXor,
    ];

    pub const FOLLOW_BITXOR: &[TokenKind] =
        &[RParen, Comma, Semicolon, Assign, LogicalOr, LogicalAnd, BitwiseOr];

    pub const FOLLOW_BITOR: &[TokenKind] =
        &[RParen, Comma, Semicolon, Assign, LogicalOr, LogicalAnd];

    pub const FOLLOW_LOGAND: &[TokenKind] = &[RParen, Comma, Semicolon, Assign, LogicalOr];

    pub const FOLLOW_LOGOR: &[TokenKind] = &[RParen, Comma, Semicolon, Assign];

    pub const FOLLOW_EXPR: &[TokenKind] = &[RParen, Comma, Semicolon];

    pub const STATEMENT_FIRST: &[TokenKind] = &[
        Label, Break, Continue, If, Goto, While, Do, Switch, Return, Semicolon, BitwiseAnd,
        Multiply, BitwiseComplement, Add, Subtract, Not, KwBool, KwChar, KwFloat, KwInt,
        KwUntyped, LitBool, LitChar, LitFloat, LitInt, LitString, LParen, Identifier,
    ];

    pub const STATEMENT_FOLLOW: &[TokenKind] = &[
        Label, Break, Continue, If, Goto, While, Do, Switch, Return, Semicolon, BitwiseAnd,
        Multiply, BitwiseComplement, Add, Subtract, Not, KwBool, KwChar, KwFloat, KwInt,
        KwUntyped, LitBool, LitChar, LitFloat, LitInt, LitString, LParen, Identifier, LBrace,
        RBrace,
    ];

    pub const BLOCK_FIRST: &[TokenKind] = &[LBrace];

    pub const BLOCK_FOLLOW: &[TokenKind] = &[
        KwBool, KwChar, KwFloat, KwInt, KwUntyped, LitBool, LitChar, LitFloat, LitInt,
        LitString, Label, Break, Continue, If, Goto, While, Do, Switch, Return, Semicolon,
        BitwiseAnd, Multiply, BitwiseComplement, Add, Subtract, Not, Eof, Start, Identifier,
        LBrace, RBrace, LParen,
    ];

    pub const DECLARATOR_FIRST: &[TokenKind] = &[Multiply, Identifier];

    pub const DECLARATION_FOLLOW: &[TokenKind] = &[Comma, Semicolon];

    pub const PARAM_FOLLOW: &[TokenKind] = &[Comma, Semicolon, Arrow];

    pub const DIMENSION_FOLLOW: &[TokenKind] = &[Semicolon, Comma, Arrow];

    pub const INDEX_FOLLOW: &[TokenKind] = &[Semicolon, Comma, Assign];

    pub const PARAMLIST_FIRST: &[TokenKind] =
        &[KwBool, KwChar, KwFloat, KwInt, KwUntyped, KwVoid];

    pub const GLOBAL_SET: &[TokenKind] =
        &[KwBool, KwChar, KwFloat, KwInt, KwUntyped, Extern, Start, Identifier];

    pub const FUNCTION_FIRST: &[TokenKind] = &[Start, Identifier];

    pub const FUNCTION_FOLLOW: &[TokenKind] = &[Start, Identifier, Eof];

    pub const HEADER_FIRST: &[TokenKind] = &[Extern, Start, Identifier];

    pub const HEADER_FOLLOW: &[TokenKind] = &[Semicolon, LBrace];
}

const EXPR_START_MSG: &str =
    "expression must start with literal, unary operator, ( or identifier";

/// Genera un nivel de la cadena de precedencia binaria: asociatividad
/// izquierda sobre el nivel inmediato superior.
macro_rules! binary_level {
    ($name:ident, $next:ident, $follow:expr, $( $token:ident => $node:ident ),+ $(,)?) => {
        fn $name(&mut self) -> Option<NodeId> {
            if !self.sync(sets::EXPR_FIRST, $follow, EXPR_START_MSG) {
                return None;
            }

            let mut node = self.$next()?;

            loop {
                let kind = match self.kind() {
                    $( TokenKind::$token => NodeKind::$node, )+
                    _ => break,
                };

                let op = self.ast.add(kind, self.line());
                self.ast.append(op, node);
                self.advance();

                if let Some(right) = self.$next() {
                    self.ast.append(op, right);
                }

                node = op;
            }

            Some(node)
        }
    };
}

/// Analizador sintáctico de una unidad de compilación.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    ast: Ast,
    report: &'a mut Report,
}

/// Analiza el texto fuente completo. Los errores léxicos y sintácticos se
/// acumulan en el reporte; si no hubo errores, el árbol resultante ya viene
/// simplificado.
pub fn parse(source: &str, report: &mut Report) -> Ast {
    let tokens = Lexer::tokenize(source, report);

    let mut parser = Parser {
        tokens,
        position: 0,
        ast: Ast::new(),
        report,
    };

    parser.module();

    let clean = parser.report.is_clean();
    let mut ast = parser.ast;
    if clean {
        ast.simplify();
    }

    ast
}

impl<'a> Parser<'a> {
    fn token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn kind(&self) -> TokenKind {
        self.token().kind
    }

    fn line(&self) -> u32 {
        self.token().line
    }

    /// Valor del token actual; solo se consulta tras verificar la clase.
    fn value(&self) -> Lexeme {
        self.token()
            .value
            .clone()
            .unwrap_or_else(|| unreachable!("valueless token where a lexeme was expected"))
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn error_here(&mut self, message: &str) {
        let (line, column) = (self.token().line, self.token().column);
        self.report.error_at(line, column, message);
    }

    /// Verificación FIRST/FOLLOW al entrar a un no terminal. Devuelve `true`
    /// si el token actual (posiblemente tras descartar) está en FIRST.
    fn sync(&mut self, first: &[TokenKind], follow: &[TokenKind], message: &str) -> bool {
        if !first.contains(&self.kind()) {
            self.error_here(message);
        }

        while !first.contains(&self.kind()) && !follow.contains(&self.kind()) {
            if self.kind() == TokenKind::Eof {
                return false;
            }
            self.advance();
        }

        first.contains(&self.kind())
    }

    /// Descarta tokens hasta el conjunto FOLLOW del no terminal actual.
    fn sync_out(&mut self, follow: &[TokenKind]) {
        while !follow.contains(&self.kind()) && self.kind() != TokenKind::Eof {
            self.advance();
        }
    }

    /// Error a mitad de un no terminal: registra el mensaje, descarta hasta
    /// FOLLOW y abandona devolviendo `None`.
    fn sync_error(&mut self, follow: &[TokenKind], message: &str) -> Option<NodeId> {
        self.error_here(message);
        self.sync_out(follow);

        None
    }

    /// Error dentro de una construcción con llave ya abierta: descarta
    /// tokens hasta la llave que la cierra, contando las anidadas, y la
    /// consume. Así la llave del bloque que la contiene queda intacta.
    fn brace_error(&mut self, message: &str) -> Option<NodeId> {
        self.error_here(message);

        let mut depth = 1u32;
        while depth > 0 && self.kind() != TokenKind::Eof {
            match self.kind() {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            self.advance();
        }

        None
    }

    fn attach(&mut self, parent: NodeId, child: Option<NodeId>) {
        if let Some(child) = child {
            self.ast.append(parent, child);
        }
    }

    fn type_node_kind(token: TokenKind) -> NodeKind {
        match token {
            TokenKind::KwBool => NodeKind::TypeBool,
            TokenKind::KwChar => NodeKind::TypeChar,
            TokenKind::KwFloat => NodeKind::TypeFloat,
            TokenKind::KwInt => NodeKind::TypeInt,
            TokenKind::KwUntyped => NodeKind::TypeUntyped,
            TokenKind::KwVoid => NodeKind::TypeVoid,
            other => unreachable!("token {:?} does not name a type", other),
        }
    }

    fn factor(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::FACTOR_FIRST,
            sets::FOLLOW_UNARY,
            "literal, ( or identifier expected",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::Factor, self.line());

        match self.kind() {
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression();
                self.attach(node, inner);

                if self.kind() != TokenKind::RParen {
                    self.ast.unlink(node);
                    return self.sync_error(sets::FOLLOW_UNARY, ") expected");
                }
                self.advance();
            }
            TokenKind::Identifier => {
                let name = self.value();
                let line = self.line();
                let ident = self.ast.add_val(NodeKind::LitIdentifier, name, line);
                self.ast.append(node, ident);
                self.advance();
            }
            literal => {
                let kind = match literal {
                    TokenKind::LitBool => NodeKind::LitBool,
                    TokenKind::LitChar => NodeKind::LitChar,
                    TokenKind::LitFloat => NodeKind::LitFloat,
                    TokenKind::LitInt => NodeKind::LitInt,
                    TokenKind::LitString => NodeKind::LitString,
                    other => unreachable!("token {:?} escaped the factor FIRST set", other),
                };

                let value = self.value();
                let line = self.line();
                let child = self.ast.add_val(kind, value, line);
                self.ast.append(node, child);
                self.advance();
            }
        }

        Some(node)
    }

    fn arguments(&mut self) -> Option<NodeId> {
        if !self.sync(
            &[TokenKind::LParen],
            &[TokenKind::RParen],
            "an application must begin with (",
        ) {
            return None;
        }

        self.advance();
        let node = self.ast.add(NodeKind::Arguments, self.line());

        if self.kind() != TokenKind::RParen {
            loop {
                let argument = self.expression();
                self.attach(node, argument);

                if self.kind() != TokenKind::Comma {
                    break;
                }
                self.advance();
            }
        }

        if self.kind() != TokenKind::RParen {
            self.ast.unlink(node);
            return self.sync_error(
                &[TokenKind::RParen],
                ") expected to terminate application argument list",
            );
        }
        self.advance();

        Some(node)
    }

    /// Nivel de postfijos: aplicación de función e indexación de arreglos.
    fn unary1(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::FACTOR_FIRST,
            sets::FOLLOW_UNARY,
            "a factor must start with a literal, ( or identifier",
        ) {
            return None;
        }

        let mut node = self.factor()?;

        loop {
            match self.kind() {
                TokenKind::LParen => {
                    let application = self.ast.add(NodeKind::Application, self.line());
                    self.ast.append(application, node);

                    let arguments = self.arguments();
                    self.attach(application, arguments);

                    node = application;
                }
                TokenKind::LBracket => {
                    self.advance();
                    let indexer = self.ast.add(NodeKind::Indexer, self.line());
                    self.ast.append(indexer, node);

                    let index = self.expression();
                    self.attach(indexer, index);

                    if self.kind() != TokenKind::RBracket {
                        self.ast.unlink(indexer);
                        return self
                            .sync_error(sets::FOLLOW_UNARY, "] expected to close array index");
                    }
                    self.advance();

                    node = indexer;
                }
                _ => break,
            }
        }

        Some(node)
    }

    /// Nivel de los unarios aritméticos y lógico: `+`, `-` y `!`.
    fn unary2(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::UNARY2_FIRST,
            sets::FOLLOW_UNARY,
            "expression must start with literal, unary operator (+, - or !), ( or identifier",
        ) {
            return None;
        }

        let kind = match self.kind() {
            TokenKind::Add => NodeKind::UnaryAdd,
            TokenKind::Subtract => NodeKind::UnarySubtract,
            TokenKind::Not => NodeKind::Not,
            _ => return self.unary1(),
        };

        let node = self.ast.add(kind, self.line());
        self.advance();

        let operand = self.unary2();
        self.attach(node, operand);

        Some(node)
    }

    /// Nivel de los unarios de indirección: `&`, `*` y `~`.
    fn unary3(&mut self) -> Option<NodeId> {
        if !self.sync(sets::EXPR_FIRST, sets::FOLLOW_UNARY, EXPR_START_MSG) {
            return None;
        }

        let kind = match self.kind() {
            TokenKind::BitwiseAnd => NodeKind::Address,
            TokenKind::Multiply => NodeKind::Dereference,
            TokenKind::BitwiseComplement => NodeKind::BitwiseComplement,
            _ => return self.unary2(),
        };

        let node = self.ast.add(kind, self.line());
        self.advance();

        let operand = self.unary3();
        self.attach(node, operand);

        Some(node)
    }

    binary_level!(multiplication, unary3, sets::FOLLOW_MUL,
        Multiply => Multiply, Divide => Divide, Modulus => Modulus);

    binary_level!(addition, multiplication, sets::FOLLOW_ADD,
        Add => BinaryAdd, Subtract => BinarySubtract);

    binary_level!(shift, addition, sets::FOLLOW_SHIFT,
        BitwiseLShift => BitwiseLShift, BitwiseRShift => BitwiseRShift);

    binary_level!(relation, shift, sets::FOLLOW_REL,
        Greater => Greater, GreaterEqual => GreaterEqual,
        Less => Less, LessEqual => LessEqual);

    binary_level!(equality, relation, sets::FOLLOW_EQ,
        Equal => Equal, NotEqual => NotEqual);

    binary_level!(bitwise_and, equality, sets::FOLLOW_BITAND,
        BitwiseAnd => BitwiseAnd);

    binary_level!(bitwise_xor, bitwise_and, sets::FOLLOW_BITXOR,
        BitwiseXor => BitwiseXor);

    binary_level!(bitwise_or, bitwise_xor, sets::FOLLOW_BITOR,
        BitwiseOr => BitwiseOr);

    binary_level!(logical_and, bitwise_or, sets::FOLLOW_LOGAND,
        LogicalAnd => LogicalAnd);

    binary_level!(logical_or, logical_and, sets::FOLLOW_LOGOR,
        LogicalOr => LogicalOr);

    /// Expresión completa. La asignación es asociativa a la derecha y de
    /// precedencia mínima.
    fn expression(&mut self) -> Option<NodeId> {
        if !self.sync(sets::EXPR_FIRST, sets::FOLLOW_EXPR, EXPR_START_MSG) {
            return None;
        }

        let node = self.logical_or()?;

        if self.kind() != TokenKind::Assign {
            return Some(node);
        }

        let assign = self.ast.add(NodeKind::Assign, self.line());
        self.advance();
        self.ast.append(assign, node);

        let value = self.expression();
        self.attach(assign, value);

        Some(assign)
    }

    fn index(&mut self) -> Option<NodeId> {
        if !self.sync(
            &[TokenKind::LBracket],
            sets::INDEX_FOLLOW,
            "index must start with [",
        ) {
            return None;
        }
        self.advance();

        if self.kind() != TokenKind::LitInt {
            return self.sync_error(
                sets::INDEX_FOLLOW,
                "integer number expected in array dimension",
            );
        }

        let value = self.value();
        let line = self.line();
        let node = self.ast.add_val(NodeKind::Index, value, line);
        self.advance();

        if self.kind() != TokenKind::RBracket {
            self.ast.unlink(node);
            return self.sync_error(
                sets::INDEX_FOLLOW,
                "] expected to terminate array dimension",
            );
        }
        self.advance();

        Some(node)
    }

    /// Conteo de asteriscos de indirección delante de un declarador.
    fn reference(&mut self) -> NodeId {
        let line = self.line();
        let mut count: u32 = 0;

        while self.kind() == TokenKind::Multiply {
            count += 1;
            self.advance();
        }

        self.ast.add_val(NodeKind::Reference, Lexeme::Uint(count), line)
    }

    fn index_block(&mut self) -> NodeId {
        let node = self.ast.add(NodeKind::IndexBlock, self.line());

        while self.kind() == TokenKind::LBracket {
            let index = self.index();
            self.attach(node, index);
        }

        node
    }

    fn initializer(&mut self) -> NodeId {
        let node = self.ast.add(NodeKind::Initializer, self.line());

        if self.kind() == TokenKind::Assign {
            self.advance();
            let value = self.expression();
            self.attach(node, value);
        }

        node
    }

    fn declaration(&mut self, type_kind: NodeKind) -> Option<NodeId> {
        if !self.sync(
            sets::DECLARATOR_FIRST,
            sets::DECLARATION_FOLLOW,
            "variable identifier or * expected in declaration",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::Declaration, self.line());

        let line = self.line();
        let type_node = self.ast.add(type_kind, line);
        self.ast.append(node, type_node);

        let reference = self.reference();
        self.ast.append(node, reference);

        if self.kind() != TokenKind::Identifier {
            self.ast.unlink(node);
            return self.sync_error(
                sets::DECLARATION_FOLLOW,
                "identifier expected in declaration list",
            );
        }

        let name = self.value();
        let line = self.line();
        let ident = self.ast.add_val(NodeKind::LitIdentifier, name, line);
        self.ast.append(node, ident);
        self.advance();

        let indices = self.index_block();
        self.ast.append(node, indices);

        let initializer = self.initializer();
        self.ast.append(node, initializer);

        Some(node)
    }

    fn declaration_block(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::TYPES,
            &[TokenKind::Semicolon],
            "declaration must start with type name",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::DeclBlock, self.line());
        let type_kind = Self::type_node_kind(self.kind());
        self.advance();

        loop {
            let declaration = self.declaration(type_kind);
            self.attach(node, declaration);

            if self.kind() != TokenKind::Comma {
                break;
            }
            self.advance();
        }

        Some(node)
    }

    fn statement_break(&mut self) -> Option<NodeId> {
        if self.kind() != TokenKind::Semicolon {
            return self.sync_error(sets::STATEMENT_FOLLOW, "; expected after BREAK");
        }
        self.advance();

        Some(self.ast.add(NodeKind::Break, self.line()))
    }

    fn statement_continue(&mut self) -> Option<NodeId> {
        if self.kind() != TokenKind::Semicolon {
            return self.sync_error(sets::STATEMENT_FOLLOW, "; expected after CONTINUE");
        }
        self.advance();

        Some(self.ast.add(NodeKind::Continue, self.line()))
    }

    fn statement_return(&mut self) -> Option<NodeId> {
        let node = self.ast.add(NodeKind::Return, self.line());

        // La expresión entre paréntesis es opcional.
        if self.kind() == TokenKind::LParen {
            self.advance();
            let value = self.expression();
            self.attach(node, value);

            if self.kind() != TokenKind::RParen {
                self.ast.unlink(node);
                return self.sync_error(
                    sets::STATEMENT_FOLLOW,
                    "must terminate RETURN expression with )",
                );
            }
            self.advance();
        }

        if self.kind() != TokenKind::Semicolon {
            self.ast.unlink(node);
            return self.sync_error(sets::STATEMENT_FOLLOW, "must terminate RETURN with ;");
        }
        self.advance();

        Some(node)
    }

    fn statement_label(&mut self) -> Option<NodeId> {
        if self.kind() != TokenKind::Identifier {
            return self.sync_error(
                sets::STATEMENT_FOLLOW,
                "identifier expected after LABEL keyword",
            );
        }

        let node = self.ast.add(NodeKind::Label, self.line());
        let name = self.value();
        let line = self.line();
        let ident = self.ast.add_val(NodeKind::LitIdentifier, name, line);
        self.ast.append(node, ident);
        self.advance();

        if self.kind() != TokenKind::Semicolon {
            self.ast.unlink(node);
            return self.sync_error(sets::STATEMENT_FOLLOW, "; expected after label identifier");
        }
        self.advance();

        Some(node)
    }

    fn statement_goto(&mut self) -> Option<NodeId> {
        if self.kind() != TokenKind::Identifier {
            return self.sync_error(
                sets::STATEMENT_FOLLOW,
                "label identifier expected after 'goto'",
            );
        }

        let node = self.ast.add(NodeKind::Goto, self.line());
        let name = self.value();
        let line = self.line();
        let ident = self.ast.add_val(NodeKind::LitIdentifier, name, line);
        self.ast.append(node, ident);
        self.advance();

        if self.kind() != TokenKind::Semicolon {
            self.ast.unlink(node);
            return self.sync_error(sets::STATEMENT_FOLLOW, "; expected after label identifier");
        }
        self.advance();

        Some(node)
    }

    fn statement_if(&mut self) -> Option<NodeId> {
        if self.kind() != TokenKind::LParen {
            return self.sync_error(sets::STATEMENT_FOLLOW, "( expected after IF");
        }

        let node = self.ast.add(NodeKind::If, self.line());
        self.advance();

        let condition = self.expression();
        self.attach(node, condition);

        if self.kind() != TokenKind::RParen {
            self.ast.unlink(node);
            return self.sync_error(sets::STATEMENT_FOLLOW, ") expected after IF condition");
        }
        self.advance();

        let then_block = self.block();
        self.attach(node, then_block);

        if self.kind() == TokenKind::Else {
            self.advance();
            let else_block = self.block();
            self.attach(node, else_block);
        }

        Some(node)
    }

    fn statement_while(&mut self) -> Option<NodeId> {
        if self.kind() != TokenKind::LParen {
            return self.sync_error(sets::STATEMENT_FOLLOW, "( expected after WHILE");
        }

        let node = self.ast.add(NodeKind::While, self.line());
        self.advance();

        let condition = self.expression();
        self.attach(node, condition);

        if self.kind() != TokenKind::RParen {
            self.ast.unlink(node);
            return self.sync_error(sets::STATEMENT_FOLLOW, ") expected after WHILE condition");
        }
        self.advance();

        if self.kind() != TokenKind::Do {
            self.ast.unlink(node);
            return self.sync_error(sets::STATEMENT_FOLLOW, "DO expected after WHILE condition");
        }
        self.advance();

        let body = self.block();
        self.attach(node, body);

        Some(node)
    }

    fn switch_case(&mut self) -> Option<NodeId> {
        if !self.sync(
            &[TokenKind::LitInt],
            &[TokenKind::Case, TokenKind::Default],
            "integer literal expected after CASE",
        ) {
            return None;
        }

        let value = self.value();
        let line = self.line();
        let node = self.ast.add_val(NodeKind::Case, value, line);
        self.advance();

        let body = self.block();
        self.attach(node, body);

        Some(node)
    }

    fn switch_cases(&mut self) -> NodeId {
        let node = self.ast.add(NodeKind::Cases, self.line());

        while self.kind() == TokenKind::Case {
            self.advance();
            let case = self.switch_case();
            self.attach(node, case);
        }

        node
    }

    fn statement_switch(&mut self) -> Option<NodeId> {
        if self.kind() != TokenKind::LParen {
            return self.sync_error(sets::STATEMENT_FOLLOW, "( expected after switch");
        }

        let node = self.ast.add(NodeKind::Switch, self.line());
        self.advance();

        let selector = self.expression();
        self.attach(node, selector);

        if self.kind() != TokenKind::RParen {
            self.ast.unlink(node);
            return self.sync_error(sets::STATEMENT_FOLLOW, ") expected after switch expression");
        }
        self.advance();

        if self.kind() != TokenKind::LBrace {
            self.ast.unlink(node);
            return self.sync_error(
                sets::STATEMENT_FOLLOW,
                "{ expected to open switch case block",
            );
        }
        self.advance();

        let cases = self.switch_cases();
        self.ast.append(node, cases);

        // La alternativa default es obligatoria. La llave del switch ya
        // está abierta: la recuperación consume hasta su cierre para no
        // robarle el terminador al bloque que lo contiene.
        if self.kind() != TokenKind::Default {
            self.ast.unlink(node);
            return self.brace_error("must have a default alternative in switch block");
        }
        self.advance();

        let default = self.block();
        self.attach(node, default);

        if self.kind() != TokenKind::RBrace {
            self.ast.unlink(node);
            return self.brace_error("} expected to close switch case block");
        }
        self.advance();

        Some(node)
    }

    /// Una sentencia. La sentencia vacía (`;`) consume el token y devuelve
    /// `None` sin registrar error: no aparece en el árbol.
    fn statement(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::STATEMENT_FIRST,
            sets::STATEMENT_FOLLOW,
            "statement must start with an instruction, a unary operator, a type, a literal, \
             (, { or an identifier",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::Statement, self.line());

        let child = match self.kind() {
            TokenKind::Semicolon => {
                self.advance();
                return None;
            }
            TokenKind::Break => {
                self.advance();
                self.statement_break()
            }
            TokenKind::Continue => {
                self.advance();
                self.statement_continue()
            }
            TokenKind::Return => {
                self.advance();
                self.statement_return()
            }
            TokenKind::Label => {
                self.advance();
                self.statement_label()
            }
            TokenKind::If => {
                self.advance();
                self.statement_if()
            }
            TokenKind::Goto => {
                self.advance();
                self.statement_goto()
            }
            TokenKind::While => {
                self.advance();
                self.statement_while()
            }
            TokenKind::Switch => {
                self.advance();
                self.statement_switch()
            }
            TokenKind::KwBool
            | TokenKind::KwChar
            | TokenKind::KwFloat
            | TokenKind::KwInt
            | TokenKind::KwUntyped => {
                let block = self.declaration_block();
                self.attach(node, block);

                if self.kind() != TokenKind::Semicolon {
                    self.ast.unlink(node);
                    return self.sync_error(sets::STATEMENT_FOLLOW, "; expected after declaration");
                }
                self.advance();

                return Some(node);
            }
            _ => {
                // El conjunto FIRST ya se verificó: solo queda una expresión.
                let expression = self.expression();
                self.attach(node, expression);

                if self.kind() != TokenKind::Semicolon {
                    self.ast.unlink(node);
                    return self.sync_error(
                        sets::STATEMENT_FOLLOW,
                        "; expected after immediate expression",
                    );
                }
                self.advance();

                return Some(node);
            }
        };

        self.attach(node, child);

        Some(node)
    }

    fn block(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::BLOCK_FIRST,
            sets::BLOCK_FOLLOW,
            "a code block must start with {",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::Block, self.line());
        self.advance();

        while self.kind() != TokenKind::RBrace && self.kind() != TokenKind::Eof {
            let child = if self.kind() == TokenKind::LBrace {
                self.block()
            } else {
                self.statement()
            };

            self.attach(node, child);
        }

        if self.kind() == TokenKind::RBrace {
            self.advance();
        }

        Some(node)
    }

    /// Dimensiones sin tamaño (`[]`) de un parámetro formal o tipo de
    /// retorno. El nodo lleva el conteo como valor.
    fn dimension_block(&mut self) -> Option<NodeId> {
        let line = self.line();
        let mut count: u32 = 0;

        while self.kind() == TokenKind::LBracket {
            self.advance();

            if self.kind() != TokenKind::RBracket {
                return self.sync_error(
                    sets::DIMENSION_FOLLOW,
                    "] expected after [ in parameter dimension",
                );
            }
            self.advance();

            count += 1;
        }

        Some(self.ast.add_val(NodeKind::DimensionBlock, Lexeme::Uint(count), line))
    }

    fn return_type(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::TYPES,
            &[TokenKind::Semicolon, TokenKind::LBrace],
            "return type must start with a type name",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::ReturnType, self.line());

        let line = self.line();
        let type_node = self.ast.add(Self::type_node_kind(self.kind()), line);
        self.ast.append(node, type_node);
        self.advance();

        let reference = self.reference();
        self.ast.append(node, reference);

        let dimensions = self.dimension_block();
        self.attach(node, dimensions);

        Some(node)
    }

    fn param(&mut self, type_kind: NodeKind) -> Option<NodeId> {
        if !self.sync(
            sets::DECLARATOR_FIRST,
            sets::PARAM_FOLLOW,
            "variable identifier or * expected in formal parameter",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::Param, self.line());

        let line = self.line();
        let type_node = self.ast.add(type_kind, line);
        self.ast.append(node, type_node);

        let reference = self.reference();
        self.ast.append(node, reference);

        if self.kind() != TokenKind::Identifier {
            self.ast.unlink(node);
            return self.sync_error(
                sets::PARAM_FOLLOW,
                "identifier expected in formal parameter list",
            );
        }

        let name = self.value();
        let line = self.line();
        let ident = self.ast.add_val(NodeKind::LitIdentifier, name, line);
        self.ast.append(node, ident);
        self.advance();

        let dimensions = self.dimension_block();
        self.attach(node, dimensions);

        Some(node)
    }

    fn param_list(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::PARAMLIST_FIRST,
            &[TokenKind::Arrow],
            "void or a type name expected in formal parameter list",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::ParamList, self.line());

        if self.kind() == TokenKind::KwVoid {
            let line = self.line();
            let void = self.ast.add(NodeKind::TypeVoid, line);
            self.ast.append(node, void);
            self.advance();

            return Some(node);
        }

        loop {
            if !sets::TYPES.contains(&self.kind()) {
                self.error_here("void or a type name expected in formal parameter list");
                self.sync_out(&[TokenKind::Arrow]);
                return Some(node);
            }

            let type_kind = Self::type_node_kind(self.kind());
            self.advance();

            loop {
                let param = self.param(type_kind);
                self.attach(node, param);

                if self.kind() != TokenKind::Comma {
                    break;
                }
                self.advance();
            }

            if self.kind() != TokenKind::Semicolon {
                break;
            }
            self.advance();
        }

        Some(node)
    }

    fn modifiers(&mut self) -> NodeId {
        let node = self.ast.add(NodeKind::Modifiers, self.line());

        while self.kind() == TokenKind::Start {
            let line = self.line();
            let start = self.ast.add(NodeKind::Start, line);
            self.ast.append(node, start);
            self.advance();
        }

        node
    }

    fn function_header(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::HEADER_FIRST,
            sets::HEADER_FOLLOW,
            "start or function identifier expected",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::FunctionHeader, self.line());

        let modifiers = self.modifiers();
        self.ast.append(node, modifiers);

        if self.kind() != TokenKind::Identifier {
            self.ast.unlink(node);
            return self.sync_error(sets::HEADER_FOLLOW, "function identifier expected");
        }

        let name = self.value();
        let line = self.line();
        let ident = self.ast.add_val(NodeKind::LitIdentifier, name, line);
        self.ast.append(node, ident);
        self.advance();

        if self.kind() != TokenKind::Colon {
            self.ast.unlink(node);
            return self.sync_error(sets::HEADER_FOLLOW, ": expected after function identifier");
        }
        self.advance();

        let params = self.param_list();
        self.attach(node, params);

        if self.kind() != TokenKind::Arrow {
            self.ast.unlink(node);
            return self.sync_error(sets::HEADER_FOLLOW, "-> expected after formal parameter list");
        }
        self.advance();

        if self.kind() == TokenKind::KwVoid {
            let line = self.line();
            let void = self.ast.add(NodeKind::TypeVoid, line);
            self.ast.append(node, void);
            self.advance();
        } else {
            let return_type = self.return_type();
            self.attach(node, return_type);
        }

        Some(node)
    }

    fn function(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::FUNCTION_FIRST,
            sets::FUNCTION_FOLLOW,
            "start or function identifier expected",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::Function, self.line());

        let header = self.function_header();
        self.attach(node, header);

        match self.kind() {
            TokenKind::Semicolon => {
                // Declaración adelantada: solo el encabezado.
                self.advance();
            }
            TokenKind::LBrace => {
                let body = self.block();
                self.attach(node, body);
            }
            _ => {
                self.ast.unlink(node);
                return self.sync_error(
                    sets::FUNCTION_FOLLOW,
                    "Either ; or code block expected after function header",
                );
            }
        }

        Some(node)
    }

    fn global(&mut self) -> Option<NodeId> {
        if !self.sync(
            sets::GLOBAL_SET,
            sets::GLOBAL_SET,
            "global variable or function declaration expected",
        ) {
            return None;
        }

        let node = self.ast.add(NodeKind::Global, self.line());

        if self.kind() == TokenKind::Extern {
            let line = self.line();
            let extern_node = self.ast.add(NodeKind::Extern, line);
            self.ast.append(node, extern_node);
            self.advance();
        }

        match self.kind() {
            TokenKind::Start | TokenKind::Identifier => {
                let function = self.function();
                self.attach(node, function);
            }
            TokenKind::KwBool
            | TokenKind::KwChar
            | TokenKind::KwFloat
            | TokenKind::KwInt
            | TokenKind::KwUntyped => {
                let block = self.declaration_block();
                self.attach(node, block);

                if self.kind() != TokenKind::Semicolon {
                    self.ast.unlink(node);
                    return self.sync_error(
                        sets::GLOBAL_SET,
                        "; expected to terminate global variable declaration",
                    );
                }
                self.advance();
            }
            _ => {
                self.ast.unlink(node);
                return self.sync_error(
                    sets::GLOBAL_SET,
                    "function or global variable declaration expected in global scope",
                );
            }
        }

        Some(node)
    }

    fn module(&mut self) -> Option<NodeId> {
        if !self.sync(&[TokenKind::Module], &[TokenKind::Eof], "'module' expected") {
            return None;
        }
        self.advance();

        if self.kind() != TokenKind::Identifier {
            return self.sync_error(&[TokenKind::Eof], "module name expected");
        }

        let name = self.value();
        let line = self.line();
        let node = self.ast.add_val(NodeKind::Module, name, line);
        self.advance();

        if self.kind() != TokenKind::Semicolon {
            return self.sync_error(&[TokenKind::Eof], "; expected after module name");
        }
        self.advance();

        while self.kind() != TokenKind::Eof {
            let global = self.global();
            self.attach(node, global);
        }

        self.ast.set_root(node);

        Some(node)
    }
}
