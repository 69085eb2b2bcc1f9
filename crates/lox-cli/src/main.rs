use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lox_vm::{InterpretError, Vm};

#[derive(Parser)]
#[command(name = "lox", version, about = "A bytecode interpreter for Lox", long_about = None)]
struct Cli {
    /// Trace every executed instruction and the value stack (equiv. LOX_TRACE=1).
    #[arg(long)]
    trace: bool,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run a Lox source file.
    Run(RunArgs),
    /// Start an interactive read-eval-print loop.
    Repl,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a `.lox` source file.
    path: PathBuf,
}

fn main() -> ExitCode {
    color_eyre::install().expect("color_eyre installs exactly once");

    let cli = Cli::parse();
    if cli.trace || std::env::var_os("LOX_TRACE").is_some() {
        install_tracing();
    }

    match cli.cmd.unwrap_or(Cmd::Repl) {
        Cmd::Run(args) => run_file(&args.path),
        Cmd::Repl => repl(),
    }
}

fn install_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lox_vm=trace"));
    tracing_subscriber::fmt().with_env_filter(filter).without_time().with_target(false).init();
}

fn run_file(path: &std::path::Path) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("lox: can't read '{}': {err}", path.display());
            return ExitCode::from(74);
        }
    };

    let mut vm = Vm::new();
    match vm.interpret(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(InterpretError::Compile(errs)) => {
            for err in &errs {
                eprintln!("{err}");
            }
            ExitCode::from(65)
        }
        Err(InterpretError::Runtime(err)) => {
            eprintln!("{}", err.report());
            ExitCode::from(70)
        }
    }
}

fn repl() -> ExitCode {
    let mut vm = Vm::new();
    let mut line = String::new();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return ExitCode::SUCCESS;
        }

        line.clear();
        match io::stdin().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(err) => {
                eprintln!("lox: {err}");
                return ExitCode::from(74);
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        match vm.interpret(&line) {
            Ok(()) => {}
            Err(InterpretError::Compile(errs)) => {
                for err in &errs {
                    eprintln!("{err}");
                }
            }
            Err(InterpretError::Runtime(err)) => eprintln!("{}", err.report()),
        }
    }
}
