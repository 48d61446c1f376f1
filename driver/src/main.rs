use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser; // clap crate for CLI argument parsing
use model::Diagnostics;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use transpiler::{TranspileError, Transpiler};

/*
Each stage flag stops the pipeline early:
--lex prints the token stream, --parse reports syntax problems,
--check runs the resolver too. With none of them the Rust source is
written to the output file, or to stdout when no -o is given.
*/

#[derive(Parser, Debug)]
#[command(version, about = "Transpile a C file to Rust", long_about = None)]
struct Args {
    /// Path to the C source file
    input_path: PathBuf,

    /// Run lexer only and print the tokens
    #[arg(short, long)]
    lex: bool,

    /// Run lexer and parser only
    #[arg(short, long)]
    parse: bool,

    /// Run every check but do not generate code
    #[arg(short, long)]
    check: bool,

    /// Write the generated Rust here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Leave out the generated-file comment
    #[arg(long)]
    no_header: bool,

    /// Do not emit a Rust `fn main` calling the C `main`
    #[arg(long)]
    no_main_wrapper: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the source passed every stage that ran.
fn run(args: &Args) -> Result<bool> {
    let input = args.input_path.as_path();
    if args.lex || args.parse {
        let source = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
        return Ok(front_end(args, input, &source));
    }

    let transpiler = Transpiler::with_options(codegen_options(args));
    let output = match transpiler.transpile(input) {
        Ok(output) => output,
        Err(TranspileError::Io(err)) => {
            return Err(err).with_context(|| format!("failed to read {}", input.display()));
        }
        Err(err) => {
            print_diagnostics(input, err.diagnostics());
            eprintln!("error: {err}");
            return Ok(false);
        }
    };
    print_diagnostics(input, &output.diagnostics);
    if args.check {
        return Ok(true);
    }

    match &args.output {
        Some(path) => {
            std::fs::write(path, &output.code).with_context(|| format!("failed to write {}", path.display()))?;
            debug!(path = %path.display(), "wrote generated rust");
        }
        None => print!("{}", output.code),
    }
    Ok(true)
}

fn codegen_options(args: &Args) -> transpiler::GeneratorOptions {
    transpiler::GeneratorOptions {
        emit_header_comment: !args.no_header,
        emit_main_wrapper: !args.no_main_wrapper,
    }
}

/// `--lex` and `--parse`.
fn front_end(args: &Args, input: &Path, source: &[u8]) -> bool {
    let mut diags = Diagnostics::new();
    let tokens = lexer::lex(source, &mut diags);
    if args.lex {
        for token in &tokens {
            println!("{}\t{:?}", token.span.start, token.kind);
        }
    } else {
        let unit = parser::parse_with_typedefs(&tokens, &transpiler::builtin_typedefs(), &mut diags);
        debug!(items = unit.items.len(), "parsed");
    }
    print_diagnostics(input, diags.as_slice());
    !diags.has_errors()
}

fn print_diagnostics(input: &Path, diagnostics: &[model::Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}:{diagnostic}", input.display());
    }
}
