//! Preprocesador de directivas `#import`.
//!
//! Aplana una unidad de compilación antes del análisis léxico: cada línea
//! que empieza con `#import "archivo"` se reemplaza por el contenido ya
//! preprocesado de ese archivo. Un archivo se importa una sola vez por
//! unidad; un ciclo de importaciones se reporta y se corta. Las rutas se
//! resuelven relativas al archivo que importa.

use crate::error::Report;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Falla al leer el archivo de entrada inicial. Las fallas en archivos
/// importados no interrumpen la expansión: quedan como diagnósticos.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PreprocessError {
    #[error("cannot open source file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Expande las directivas de importación y devuelve la fuente aplanada.
pub fn expand(path: &Path, report: &mut Report) -> Result<String, PreprocessError> {
    let source = fs::read_to_string(path).map_err(|source| PreprocessError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let resolved = canonical(path);
    let mut preprocessor = Preprocessor {
        imported: vec![resolved.clone()],
        active: vec![resolved],
        output: String::new(),
    };

    preprocessor.process(path, &source, report);

    Ok(preprocessor.output)
}

struct Preprocessor {
    /// Archivos ya incluidos en la unidad; se importan una sola vez.
    imported: Vec<PathBuf>,
    /// Cadena de importaciones en curso, para detectar ciclos.
    active: Vec<PathBuf>,
    output: String,
}

impl Preprocessor {
    fn process(&mut self, path: &Path, source: &str, report: &mut Report) {
        for (index, line) in source.lines().enumerate() {
            let number = (index + 1) as u32;

            if line.starts_with('#') {
                self.directive(path, &line[1..], number, report);
            } else {
                self.output.push_str(line);
                self.output.push('\n');
            }
        }
    }

    fn directive(&mut self, path: &Path, rest: &str, line: u32, report: &mut Report) {
        let (word, tail) = match rest.find(|c| c == ' ' || c == '\t') {
            Some(space) => (&rest[..space], &rest[space..]),
            None => (rest, ""),
        };

        if word != "import" {
            report.error(line, format!("unknown preprocessor directive '#{}'", word));
            return;
        }

        let tail = tail.trim_start_matches(|c| c == ' ' || c == '\t');
        let tail = match tail.strip_prefix('"') {
            Some(tail) => tail,
            None => {
                report.error(line, "string constant expected after #import");
                return;
            }
        };

        let (name, after) = match tail.find('"') {
            Some(end) => (&tail[..end], &tail[end + 1..]),
            None => {
                report.error(line, "newline in string constant");
                return;
            }
        };

        if !after.trim_matches(|c| c == ' ' || c == '\t').is_empty() {
            report.warning(
                line,
                "unexpected tokens following preprocessor directive - expected a newline",
            );
        }

        self.import(path, name, line, report);
    }

    fn import(&mut self, from: &Path, name: &str, line: u32, report: &mut Report) {
        let path = match from.parent() {
            Some(directory) => directory.join(name),
            None => PathBuf::from(name),
        };
        let resolved = canonical(&path);

        if self.active.contains(&resolved) {
            report.warning(
                line,
                format!("circular import reference in {}", from.display()),
            );
            return;
        }

        if self.imported.contains(&resolved) {
            return;
        }

        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(_) => {
                report.error(line, format!("cannot open import file {}", path.display()));
                return;
            }
        };

        self.imported.push(resolved.clone());
        self.active.push(resolved);
        self.process(&path, &source, report);
        self.active.pop();
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
