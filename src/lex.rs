//! Análisis léxico.
//!
//! Descompone el texto fuente (ya aplanado por el preprocesador) en tokens.
//! Los espacios en blanco y los comentarios se descartan. Cada token lleva la
//! línea y columna donde inicia, información que las fases posteriores
//! propagan hacia los diagnósticos.
//!
//! Los operadores, la puntuación y las palabras clave se identifican solo por
//! su [`TokenKind`] y no llevan lexema. Los identificadores preservan su
//! texto original y las constantes literales se resuelven a sus valores.
//!
//! El lenguaje es case-sensitive: `while` es palabra clave, `While` es un
//! identificador.

use crate::error::Report;
use std::{
    fmt::{self, Display},
    iter::Peekable,
    str::Chars,
};
use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter que no inicia ningún token.
    #[error("bad character {0:?} in input stream")]
    BadChar(char),

    /// Secuencia de escape desconocida en un literal.
    #[error("unknown escape sequence '\\{0}'")]
    BadEscape(char),

    /// Literal de carácter sin la comilla de cierre.
    #[error("unterminated character constant")]
    UnterminatedChar,

    /// Literal de cadena sin la comilla de cierre.
    #[error("unterminated string constant")]
    UnterminatedString,

    /// Comentario `/*` sin su `*/` correspondiente.
    #[error("unterminated comment")]
    UnterminatedComment,

    /// Constante entera fuera del rango representable.
    #[error("integer constant too large")]
    IntegerOverflow,

    /// Constante de punto flotante mal formada.
    #[error("malformed float constant")]
    BadFloat,
}

/// [`LexerError`] junto con la posición donde ocurrió.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct LocatedLexerError {
    pub error: LexerError,
    pub line: u32,
    pub column: u32,
}

/// Clase de token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Palabras clave
    Break,
    Case,
    Continue,
    Default,
    Do,
    Else,
    Extern,
    Goto,
    If,
    Label,
    Module,
    Return,
    Start,
    Switch,
    While,

    // Nombres de tipo
    KwBool,
    KwChar,
    KwFloat,
    KwInt,
    KwUntyped,
    KwVoid,

    // Literales e identificadores
    LitBool,
    LitChar,
    LitFloat,
    LitInt,
    LitString,
    Identifier,

    // Operadores
    Add,
    Assign,
    BitwiseAnd,
    BitwiseComplement,
    BitwiseLShift,
    BitwiseOr,
    BitwiseRShift,
    BitwiseXor,
    Divide,
    Equal,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    LogicalAnd,
    LogicalOr,
    Modulus,
    Multiply,
    Not,
    NotEqual,
    Subtract,

    // Delimitadores
    Arrow,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    LParen,
    RParen,
    Semicolon,

    /// Fin de la entrada.
    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TokenKind::*;

        let text = match self {
            Break => "break",
            Case => "case",
            Continue => "continue",
            Default => "default",
            Do => "do",
            Else => "else",
            Extern => "extern",
            Goto => "goto",
            If => "if",
            Label => "label",
            Module => "module",
            Return => "return",
            Start => "start",
            Switch => "switch",
            While => "while",
            KwBool => "bool",
            KwChar => "char",
            KwFloat => "float",
            KwInt => "int",
            KwUntyped => "untyped",
            KwVoid => "void",
            LitBool => "bool constant",
            LitChar => "character constant",
            LitFloat => "float constant",
            LitInt => "integer constant",
            LitString => "string constant",
            Identifier => "identifier",
            Add => "+",
            Assign => "=",
            BitwiseAnd => "&",
            BitwiseComplement => "~",
            BitwiseLShift => "<<",
            BitwiseOr => "|",
            BitwiseRShift => ">>",
            BitwiseXor => "^",
            Divide => "/",
            Equal => "==",
            Greater => ">",
            GreaterEqual => ">=",
            Less => "<",
            LessEqual => "<=",
            LogicalAnd => "&&",
            LogicalOr => "||",
            Modulus => "%",
            Multiply => "*",
            Not => "!",
            NotEqual => "!=",
            Subtract => "-",
            Arrow => "->",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            Colon => ":",
            Comma => ",",
            LParen => "(",
            RParen => ")",
            Semicolon => ";",
            Eof => "end of file",
        };

        f.write_str(text)
    }
}

/// Valor resuelto de un literal o texto de un identificador.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    Uint(u32),
    Float(f32),
    Char(char),
    Str(String),
    Bool(bool),
    Ident(String),
}

impl Lexeme {
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Lexeme::Ident(name) => Some(name),
            _ => None,
        }
    }
}

/// Unidad léxica con su posición de origen.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Option<Lexeme>,
    pub line: u32,
    pub column: u32,
}

/// Analizador léxico sobre un flujo de caracteres.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Escanea el texto completo, registrando los errores léxicos en el
    /// reporte y saltando los caracteres problemáticos. La secuencia
    /// resultante siempre termina con un token [`TokenKind::Eof`].
    pub fn tokenize(source: &'a str, report: &mut Report) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();

        loop {
            match lexer.scan() {
                Ok(Some(token)) => tokens.push(token),
                Ok(None) => break,
                Err(located) => {
                    report.error_at(located.line, located.column, located.error.to_string())
                }
            }
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            value: None,
            line: lexer.line,
            column: lexer.column,
        });

        tokens
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.chars.next()?;
        if next == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(next)
    }

    /// Consume el siguiente carácter solo si es `expected`.
    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, error: LexerError, line: u32, column: u32) -> LocatedLexerError {
        LocatedLexerError { error, line, column }
    }

    /// Produce el siguiente token, o `None` al agotarse la entrada.
    pub fn scan(&mut self) -> Result<Option<Token>, LocatedLexerError> {
        loop {
            let (line, column) = (self.line, self.column);

            let first = match self.bump() {
                Some(first) => first,
                None => return Ok(None),
            };

            let token = |kind| {
                Ok(Some(Token {
                    kind,
                    value: None,
                    line,
                    column,
                }))
            };

            return match first {
                ' ' | '\t' | '\r' | '\n' => continue,
                '/' if self.eat('/') => {
                    while let Some(&next) = self.chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    continue;
                }
                '/' if self.eat('*') => {
                    loop {
                        match self.bump() {
                            Some('*') if self.eat('/') => break,
                            Some(_) => continue,
                            None => {
                                return Err(self.error(
                                    LexerError::UnterminatedComment,
                                    line,
                                    column,
                                ))
                            }
                        }
                    }
                    continue;
                }
                '+' => token(TokenKind::Add),
                '-' if self.eat('>') => token(TokenKind::Arrow),
                '-' => token(TokenKind::Subtract),
                '*' => token(TokenKind::Multiply),
                '/' => token(TokenKind::Divide),
                '%' => token(TokenKind::Modulus),
                '^' => token(TokenKind::BitwiseXor),
                '~' => token(TokenKind::BitwiseComplement),
                '&' if self.eat('&') => token(TokenKind::LogicalAnd),
                '&' => token(TokenKind::BitwiseAnd),
                '|' if self.eat('|') => token(TokenKind::LogicalOr),
                '|' => token(TokenKind::BitwiseOr),
                '<' if self.eat('<') => token(TokenKind::BitwiseLShift),
                '<' if self.eat('=') => token(TokenKind::LessEqual),
                '<' => token(TokenKind::Less),
                '>' if self.eat('>') => token(TokenKind::BitwiseRShift),
                '>' if self.eat('=') => token(TokenKind::GreaterEqual),
                '>' => token(TokenKind::Greater),
                '=' if self.eat('=') => token(TokenKind::Equal),
                '=' => token(TokenKind::Assign),
                '!' if self.eat('=') => token(TokenKind::NotEqual),
                '!' => token(TokenKind::Not),
                '{' => token(TokenKind::LBrace),
                '}' => token(TokenKind::RBrace),
                '[' => token(TokenKind::LBracket),
                ']' => token(TokenKind::RBracket),
                ':' => token(TokenKind::Colon),
                ',' => token(TokenKind::Comma),
                '(' => token(TokenKind::LParen),
                ')' => token(TokenKind::RParen),
                ';' => token(TokenKind::Semicolon),
                '\'' => self.scan_char(line, column),
                '"' => self.scan_string(line, column),
                digit if digit.is_ascii_digit() => self.scan_number(digit, line, column),
                start if start.is_ascii_alphabetic() || start == '_' => {
                    Ok(Some(self.scan_word(start, line, column)))
                }
                other => Err(self.error(LexerError::BadChar(other), line, column)),
            };
        }
    }

    fn scan_escape(&mut self, line: u32, column: u32) -> Result<char, LocatedLexerError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('\\') => Ok('\\'),
            Some('\'') => Ok('\''),
            Some('"') => Ok('"'),
            Some('0') => Ok('\0'),
            Some(other) => Err(self.error(LexerError::BadEscape(other), line, column)),
            None => Err(self.error(LexerError::UnterminatedChar, line, column)),
        }
    }

    fn scan_char(&mut self, line: u32, column: u32) -> Result<Option<Token>, LocatedLexerError> {
        let value = match self.bump() {
            Some('\\') => self.scan_escape(line, column)?,
            Some('\'') | Some('\n') | None => {
                return Err(self.error(LexerError::UnterminatedChar, line, column))
            }
            Some(plain) => plain,
        };

        if !self.eat('\'') {
            return Err(self.error(LexerError::UnterminatedChar, line, column));
        }

        Ok(Some(Token {
            kind: TokenKind::LitChar,
            value: Some(Lexeme::Char(value)),
            line,
            column,
        }))
    }

    fn scan_string(&mut self, line: u32, column: u32) -> Result<Option<Token>, LocatedLexerError> {
        let mut text = String::new();

        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => text.push(self.scan_escape(line, column)?),
                Some('\n') | None => {
                    return Err(self.error(LexerError::UnterminatedString, line, column))
                }
                Some(plain) => text.push(plain),
            }
        }

        Ok(Some(Token {
            kind: TokenKind::LitString,
            value: Some(Lexeme::Str(text)),
            line,
            column,
        }))
    }

    fn scan_number(
        &mut self,
        first: char,
        line: u32,
        column: u32,
    ) -> Result<Option<Token>, LocatedLexerError> {
        let mut digits = String::from(first);

        while let Some(&next) = self.chars.peek() {
            if !next.is_ascii_digit() {
                break;
            }
            digits.push(next);
            self.bump();
        }

        // Un punto seguido de dígito convierte la constante en flotante.
        let mut is_float = false;
        if self.chars.peek() == Some(&'.') {
            is_float = true;
            digits.push('.');
            self.bump();

            let mut fraction = false;
            while let Some(&next) = self.chars.peek() {
                if !next.is_ascii_digit() {
                    break;
                }
                fraction = true;
                digits.push(next);
                self.bump();
            }

            if !fraction {
                return Err(self.error(LexerError::BadFloat, line, column));
            }
        }

        if is_float {
            let value: f32 = digits
                .parse()
                .map_err(|_| self.error(LexerError::BadFloat, line, column))?;

            Ok(Some(Token {
                kind: TokenKind::LitFloat,
                value: Some(Lexeme::Float(value)),
                line,
                column,
            }))
        } else {
            let value: u32 = digits
                .parse()
                .map_err(|_| self.error(LexerError::IntegerOverflow, line, column))?;

            Ok(Some(Token {
                kind: TokenKind::LitInt,
                value: Some(Lexeme::Uint(value)),
                line,
                column,
            }))
        }
    }

    fn scan_word(&mut self, first: char, line: u32, column: u32) -> Token {
        let mut word = String::from(first);

        while let Some(&next) = self.chars.peek() {
            if !next.is_ascii_alphanumeric() && next != '_' {
                break;
            }
            word.push(next);
            self.bump();
        }

        let (kind, value) = match word.as_str() {
            "break" => (TokenKind::Break, None),
            "case" => (TokenKind::Case, None),
            "continue" => (TokenKind::Continue, None),
            "default" => (TokenKind::Default, None),
            "do" => (TokenKind::Do, None),
            "else" => (TokenKind::Else, None),
            "extern" => (TokenKind::Extern, None),
            "goto" => (TokenKind::Goto, None),
            "if" => (TokenKind::If, None),
            "label" => (TokenKind::Label, None),
            "module" => (TokenKind::Module, None),
            "return" => (TokenKind::Return, None),
            "start" => (TokenKind::Start, None),
            "switch" => (TokenKind::Switch, None),
            "while" => (TokenKind::While, None),
            "bool" => (TokenKind::KwBool, None),
            "char" => (TokenKind::KwChar, None),
            "float" => (TokenKind::KwFloat, None),
            "int" => (TokenKind::KwInt, None),
            "untyped" => (TokenKind::KwUntyped, None),
            "void" => (TokenKind::KwVoid, None),
            "true" => (TokenKind::LitBool, Some(Lexeme::Bool(true))),
            "false" => (TokenKind::LitBool, Some(Lexeme::Bool(false))),
            _ => (TokenKind::Identifier, Some(Lexeme::Ident(word))),
        };

        Token {
            kind,
            value,
            line,
            column,
        }
    }
}
