//! Representación de tipos.
//!
//! Un tipo completo consiste de un tipo base ([`SimpleType`]), una lista de
//! dimensiones y un conjunto de modificadores. Las dimensiones modelan tanto
//! punteros como arreglos: una dimensión de valor cero corresponde a un nivel
//! de indirección, mientras que un valor distinto de cero corresponde al
//! tamaño declarado de un arreglo.

use bitflags::bitflags;
use std::fmt::{self, Display};

/// Tipo base de una expresión o símbolo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimpleType {
    Char,
    Int,
    Float,
    Boolean,
    Void,
    /// Declarado `untyped`; compatible con cualquier otro tipo base.
    Untyped,
    /// Aún no determinado por el contexto.
    Unknown,
}

impl Display for SimpleType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SimpleType::Char => "char",
            SimpleType::Int => "int",
            SimpleType::Float => "float",
            SimpleType::Boolean => "bool",
            SimpleType::Void => "void",
            SimpleType::Untyped => "untyped",
            SimpleType::Unknown => "unknown",
        };

        f.write_str(name)
    }
}

bitflags! {
    /// Modificadores de declaración.
    pub struct Modifiers: u8 {
        const CONST = 1 << 0;
        const START = 1 << 1;
        const EXTERN = 1 << 2;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Modifiers::empty()
    }
}

/// Tipo completo: base, dimensiones y modificadores.
#[derive(Clone, Debug, PartialEq)]
pub struct Type {
    pub simple: SimpleType,
    pub dimensions: Vec<u32>,
    pub modifiers: Modifiers,
}

impl Type {
    pub fn new(simple: SimpleType) -> Self {
        Type {
            simple,
            dimensions: Vec::new(),
            modifiers: Modifiers::empty(),
        }
    }

    /// Copia de este tipo con el tipo base reemplazado, preservando
    /// dimensiones y modificadores.
    pub fn with_simple(&self, simple: SimpleType) -> Self {
        Type { simple, ..self.clone() }
    }

    /// Indica si el tipo lleva al menos un nivel de indirección.
    pub fn is_pointer(&self) -> bool {
        self.dimensions.first() == Some(&0)
    }

    /// Copia con la primera dimensión eliminada, como resultado de
    /// desreferenciar o indexar.
    pub fn dereferenced(&self) -> Self {
        Type {
            simple: self.simple,
            dimensions: self.dimensions.iter().copied().skip(1).collect(),
            modifiers: self.modifiers,
        }
    }
}

impl From<SimpleType> for Type {
    fn from(simple: SimpleType) -> Self {
        Type::new(simple)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for _ in &self.dimensions {
            f.write_str("*")?;
        }

        write!(f, "{}", self.simple)
    }
}
