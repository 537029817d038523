use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use vellum::{ExecutionContext, ScriptEngine};

#[derive(Parser)]
#[command(name = "vellum", about = "Vellum: an embeddable scripting language", version)]
struct Cli {
    /// Script file to execute
    file: Option<PathBuf>,

    /// Evaluate an expression and print its result
    #[arg(short, long)]
    eval: Option<String>,

    /// Enter the REPL after running the file or expression
    #[arg(short, long)]
    interactive: bool,

    /// Suppress the REPL banner
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let engine = ScriptEngine::new();
    let ctx = engine.create_context();

    let mut ran = false;

    if let Some(file) = &cli.file {
        ran = true;
        match engine.load_script(file) {
            Ok(script) => {
                let result = engine.execute(&script, &ctx);
                if !result.success {
                    eprintln!("{}: {}", result.script_name, result.error);
                    return ExitCode::FAILURE;
                }
            }
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(expr) = &cli.eval {
        ran = true;
        let result = engine.execute_command(expr, &ctx);
        if !result.success {
            eprintln!("{}", result.error);
            return ExitCode::FAILURE;
        }
        if !result.return_value.is_nil() {
            println!("{}", engine.display_value(&result.return_value));
        }
    }

    if !ran || cli.interactive {
        if let Err(err) = repl(&engine, &ctx, cli.quiet) {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn repl(engine: &ScriptEngine, ctx: &ExecutionContext, quiet: bool) -> rustyline::Result<()> {
    if !quiet {
        println!("vellum {} (ctrl-d to exit)", env!("CARGO_PKG_VERSION"));
    }

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("vellum> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                let result = engine.execute_command(&line, ctx);
                if result.success {
                    if !result.return_value.is_nil() {
                        println!("{}", engine.display_value(&result.return_value));
                    }
                } else {
                    eprintln!("error: {}", result.error);
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
