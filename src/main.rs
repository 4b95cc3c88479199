use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use clap::Subcommand;
use log::info;
use miette::IntoDiagnostic;
use miette::NamedSource;
use miette::WrapErr;
use ts_interpreter::{DiagnosticKind, Diagnostics, Interpreter, Lexer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the token stream of a file
    Tokenize { filename: PathBuf },
    /// Print the parsed program of a file
    Parse { filename: PathBuf },
    /// Evaluate a file and print its final value
    Run { filename: PathBuf },
    /// Evaluate input line by line
    Repl,
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.debug { "debug" } else { "warn" }),
    )
    .init();

    match args.command.unwrap_or(Commands::Repl) {
        Commands::Tokenize { filename } => {
            let file_contents = read(&filename)?;

            for token in Lexer::new(&file_contents) {
                let token = match token {
                    Ok(token) => token,
                    Err(e) => {
                        eprintln!("[line {}] Error: {e}", e.line());
                        let report = miette::Report::new(e).with_source_code(NamedSource::new(
                            filename.display().to_string(),
                            file_contents.clone(),
                        ));
                        eprintln!("{report:?}");

                        std::process::exit(65);
                    }
                };
                println!("{token}");
            }
        }
        Commands::Parse { filename } => {
            let file_contents = read(&filename)?;

            let (program, diagnostics) = ts_interpreter::parse(&file_contents);
            if diagnostics.has_errors() {
                report(&filename, &file_contents, &diagnostics);
                std::process::exit(exit_code(&diagnostics));
            }
            print!("{program}");
        }
        Commands::Run { filename } => {
            let file_contents = read(&filename)?;

            let outcome = Interpreter::new().run(&file_contents);
            match outcome.value {
                Some(value) => println!("{value}"),
                None => {
                    report(&filename, &file_contents, &outcome.diagnostics);
                    std::process::exit(exit_code(&outcome.diagnostics));
                }
            }
        }
        Commands::Repl => repl()?,
    }
    Ok(())
}

fn read(filename: &Path) -> miette::Result<String> {
    info!("reading {}", filename.display());
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))
}

fn report(filename: &Path, source: &str, diagnostics: &Diagnostics) {
    let name = filename.display().to_string();
    for (diagnostic, report) in diagnostics
        .all()
        .iter()
        .zip(diagnostics.reports(&name, source))
    {
        eprintln!("[line {}] {diagnostic}", diagnostic.line());
        eprintln!("{report:?}");
    }
}

/// 65 for input that does not lex or parse, 70 for runtime failures.
fn exit_code(diagnostics: &Diagnostics) -> i32 {
    if diagnostics.has_kind(DiagnosticKind::Lexical) || diagnostics.has_kind(DiagnosticKind::Syntax)
    {
        65
    } else if diagnostics.has_errors() {
        70
    } else {
        0
    }
}

fn repl() -> miette::Result<()> {
    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().into_diagnostic()?;

        line.clear();
        if stdin.lock().read_line(&mut line).into_diagnostic()? == 0 {
            break;
        }
        let input = line.trim();
        if input == ".exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        // a bare expression at the prompt does not need its `;`
        let source = if input.ends_with(';') || input.ends_with('}') {
            input.to_string()
        } else {
            format!("{input};")
        };

        let outcome = interpreter.run(&source);
        match outcome.value {
            Some(value) => println!("{value}"),
            None => report(Path::new("<repl>"), &source, &outcome.diagnostics),
        }
    }
    Ok(())
}
