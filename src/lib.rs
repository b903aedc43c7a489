//! Compilador para el lenguaje Inger.
//!
//! # Front end
//! Cada unidad de compilación parte de un archivo fuente que primero pasa
//! por el preprocesador de importaciones en [`pp`]. El texto aplanado se
//! somete a análisis léxico en [`lex`], de lo cual se obtiene un flujo de
//! tokens. El flujo de tokens se dispone en un árbol sintáctico por medio
//! del análisis descendente con recuperación de errores en [`parse`]; el
//! árbol queda en la arena de [`ast`] y se simplifica cuando la unidad no
//! tiene errores.
//!
//! # Análisis
//! Sobre el árbol simplificado se recolecta la tabla de símbolos en
//! [`symtab`], corren las verificaciones de [`semantic`] y el verificador
//! de tipos de [`typecheck`] decora cada expresión, insertando las
//! conversiones implícitas admitidas por [`types`].
//!
//! # Back end
//! Con la unidad libre de errores, [`codegen`] emite ensamblador x86 de
//! 32 bits para GNU as. Los diagnósticos de todas las fases se acumulan
//! en el reporte de [`error`] y se imprimen juntos, ordenados por línea.

#[macro_use]
mod macros;

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lex;
pub mod parse;
pub mod pp;
pub mod semantic;
pub mod symtab;
pub mod typecheck;
pub mod types;
