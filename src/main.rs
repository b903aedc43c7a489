//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las fases del proceso de compilación y expone una
//! CLI. Cada archivo de entrada es una unidad independiente: sus
//! contadores de diagnósticos y de etiquetas arrancan de cero, y un error
//! en una unidad no detiene a las demás.

use anyhow::Context;
use clap::{self, crate_version, Arg};
use compiler::{ast::Ast, codegen, error::Report, parse, pp, semantic, symtab, typecheck};

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

struct Options {
    symtab: bool,
    ast: bool,
    ast_file: bool,
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = clap::Command::new("Inger compiler")
        .version(crate_version!())
        .arg(
            Arg::new("files")
                .value_name("FILE")
                .required(true)
                .multiple_values(true)
                .help("Input source files"),
        )
        .arg(
            Arg::new("symtab")
                .short('s')
                .long("symtab")
                .help("Dump the symbol table to standard output"),
        )
        .arg(
            Arg::new("ast")
                .short('a')
                .long("ast")
                .help("Dump the syntax tree to standard output"),
        )
        .arg(
            Arg::new("ast-file")
                .long("ast-file")
                .help("Dump the syntax tree to <input>.ast"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Trace compilation stages"),
        )
        .get_matches();

    let options = Options {
        symtab: args.is_present("symtab"),
        ast: args.is_present("ast"),
        ast_file: args.is_present("ast-file"),
        debug: args.is_present("debug"),
    };

    for file in args.values_of("files").unwrap_or_default() {
        compile(Path::new(file), &options)?;
    }

    Ok(())
}

/// Compila una unidad hasta donde lo permitan sus errores, y deja el
/// ensamblador en `<entrada>.s`. El reporte se imprime siempre.
fn compile(path: &Path, options: &Options) -> anyhow::Result<()> {
    let mut report = Report::new();

    trace(options, path, "preprocessing");
    let source =
        pp::expand(path, &mut report).with_context(|| format!("{}", path.display()))?;

    if report.error_count() == 0 {
        trace(options, path, "parsing");
        let mut ast = parse::parse(&source, &mut report);

        if report.error_count() == 0 {
            trace(options, path, "collecting symbols");
            let mut scopes = symtab::collect(&ast);

            dump(&ast, &scopes, path, options)?;

            trace(options, path, "checking semantics");
            semantic::check_lvalues(&ast, &mut report);
            semantic::check_function_calls(&ast, &mut report);
            semantic::check_switches(&ast, &mut report);
            semantic::check_returns(&ast, &mut report);

            if report.error_count() == 0 {
                trace(options, path, "checking types");
                typecheck::decorate(&mut ast, &scopes, &mut report);

                if report.error_count() == 0 {
                    trace(options, path, "generating code");
                    let target = path.with_extension("s");
                    let mut output = File::create(&target)
                        .with_context(|| format!("cannot create {}", target.display()))?;

                    codegen::generate(&ast, &mut scopes, &mut output)
                        .with_context(|| format!("cannot write {}", target.display()))?;
                }
            }
        }
    }

    println!("{}", report);

    Ok(())
}

fn dump(ast: &Ast, scopes: &symtab::ScopeTree, path: &Path, options: &Options) -> anyhow::Result<()> {
    let mut stdout = io::stdout();

    if options.symtab {
        scopes.dump(&mut stdout)?;
    }

    if options.ast {
        ast.dump(&mut stdout)?;
    }

    if options.ast_file {
        let target = path.with_extension("ast");
        let mut file = File::create(&target)
            .with_context(|| format!("cannot create {}", target.display()))?;

        ast.dump(&mut file)?;
    }

    Ok(())
}

fn trace(options: &Options, path: &Path, stage: &str) {
    if options.debug {
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "{}: {}", path.display(), stage);
    }
}
