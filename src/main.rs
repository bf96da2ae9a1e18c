use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Report, WrapErr};
use std::path::{Path, PathBuf};
use std::{
    fs,
    io::{self, Write},
    process,
};
use tracing_subscriber::EnvFilter;
use xp::{lexer::Lexer, parser, Environment, Interpreter, RunError};

#[derive(Parser, Debug)]
#[command(name = "xp", version, about = "Interpreter for the xp expression language", long_about = None)]
struct Cli {
    /// Log filter directives, e.g. `debug` or `xp=trace`.
    #[arg(long, global = true, env = "XP_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the tokens of a file.
    Tokenize { filename: PathBuf },
    /// Print the expression trees of a file.
    Parse { filename: PathBuf },
    /// Evaluate a file, printing each result.
    Run { filename: PathBuf },
    /// Evaluate one line of source.
    Eval { source: String },
    /// Interactive prompt (the default).
    Repl,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Tokenize { filename } => {
            let file_contents = read_source(&filename)?;

            for token in Lexer::new(&file_contents) {
                match token {
                    Ok(token) => println!("{:?} {} {}", token.kind, token.lexeme, token.line),
                    Err(err) => eprintln!("{:?}", Report::new(err).with_source_code(file_contents.clone())),
                }
            }
        }
        Commands::Parse { filename } => {
            let file_contents = read_source(&filename)?;

            let (tokens, diagnostics) = xp::scan(&file_contents);
            for err in diagnostics.into_errors() {
                eprintln!("{:?}", Report::new(err).with_source_code(file_contents.clone()));
            }
            let extensions = Environment::with_builtins().extension_arities();
            match parser::Parser::new(tokens).with_extensions(extensions).parse() {
                Ok(trees) => {
                    for tree in trees {
                        println!("{tree}");
                    }
                }
                Err(err) => eprintln!("{:?}", Report::new(err).with_source_code(file_contents.clone())),
            }
        }
        Commands::Run { filename } => {
            let file_contents = read_source(&filename)?;
            run_batch(&file_contents);
        }
        Commands::Eval { source } => run_batch(&source),
        Commands::Repl => repl()?,
    }

    Ok(())
}

fn read_source(filename: &Path) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading '{}' failed", filename.display()))
}

/// Runs a whole input once and exits with the error's status if it failed.
fn run_batch(source: &str) {
    let mut interpreter = Interpreter::new();
    if let Err(err) = interpreter.run(source) {
        let code = err.exit_code();
        report(err, source);
        process::exit(code);
    }
}

fn repl() -> miette::Result<()> {
    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush().into_diagnostic()?;

        let mut input = String::new();
        if stdin.read_line(&mut input).into_diagnostic()? == 0 {
            break;
        }
        match ReplLine::classify(&input) {
            ReplLine::Blank => {}
            ReplLine::Exit => break,
            ReplLine::ShowEnv => println!("{}", interpreter.env()),
            ReplLine::Source(source) => {
                if let Err(err) = interpreter.run(source) {
                    report(err, source);
                }
            }
        }
    }

    Ok(())
}

/// What one line typed at the prompt asks for. The commands match exactly,
/// so `Exit` or `EXIT` are still plain names.
#[derive(Debug, PartialEq)]
enum ReplLine<'a> {
    Blank,
    Exit,
    ShowEnv,
    Source(&'a str),
}

impl<'a> ReplLine<'a> {
    fn classify(line: &'a str) -> Self {
        match line.trim() {
            "" => ReplLine::Blank,
            "exit" => ReplLine::Exit,
            ":env" => ReplLine::ShowEnv,
            source => ReplLine::Source(source),
        }
    }
}

fn report(err: RunError, source: &str) {
    match err {
        RunError::Syntax(errors) => {
            for err in errors {
                eprintln!("{:?}", Report::new(err).with_source_code(source.to_string()));
            }
        }
        RunError::Runtime(err) => {
            eprintln!("{:?}", Report::new(err).with_source_code(source.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_commands_match_exactly() {
        assert_eq!(ReplLine::classify("exit\n"), ReplLine::Exit);
        assert_eq!(ReplLine::classify("  :env "), ReplLine::ShowEnv);
        assert_eq!(ReplLine::classify("\n"), ReplLine::Blank);
        assert_eq!(ReplLine::classify("EXIT\n"), ReplLine::Source("EXIT"));
        assert_eq!(ReplLine::classify("Exit : 1"), ReplLine::Source("Exit : 1"));
    }
}
