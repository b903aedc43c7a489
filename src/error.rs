//! Recolección y despliegue de diagnósticos.
//!
//! Las fases del compilador no abortan al primer problema: registran cada
//! error o advertencia en un [`Report`] compartido y continúan hasta donde
//! les sea posible. Al final de la compilación de una unidad, el reporte se
//! imprime ordenado por número de línea, seguido de una línea de resumen.

use std::fmt::{self, Display};

/// Clase de un diagnóstico.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// Un error o advertencia asociado a una posición en el código fuente.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: u32,
    pub column: Option<u32>,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}:{}", self.line, column)?,
            None => write!(f, "{}", self.line)?,
        }

        write!(f, " - {}: {}.", self.severity, self.message)
    }
}

/// Acumulador de diagnósticos de una unidad de compilación.
#[derive(Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Report::default()
    }

    pub fn error(&mut self, line: u32, message: impl Into<String>) {
        self.push(Severity::Error, line, None, message.into());
    }

    pub fn error_at(&mut self, line: u32, column: u32, message: impl Into<String>) {
        self.push(Severity::Error, line, Some(column), message.into());
    }

    pub fn warning(&mut self, line: u32, message: impl Into<String>) {
        self.push(Severity::Warning, line, None, message.into());
    }

    fn push(&mut self, severity: Severity, line: u32, column: Option<u32>, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            message,
            line,
            column,
        });
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == severity)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }

    /// Diagnósticos en orden ascendente de línea. El orden relativo entre
    /// diagnósticos de una misma línea se preserva.
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut diagnostics: Vec<&Diagnostic> = self.diagnostics.iter().collect();
        diagnostics.sort_by_key(|diagnostic| diagnostic.line);

        diagnostics
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for diagnostic in self.sorted() {
            writeln!(f, "{}", diagnostic)?;
        }

        write!(
            f,
            "{} errors, {} warnings.",
            self.error_count(),
            self.warning_count()
        )
    }
}
