// CLI binary. Errors end the process with exit code 1.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use mcs::compiler::builder::TreeBuilder;
use mcs::compiler::compile_source;
use mcs::compiler::error::CompileError;
use mcs::compiler::statements::parse_statements;
use mcs::compiler::trace::SourceId;
use mcs::config::CompilerConfig;

/// Source id of the single input file.
const INPUT_SOURCE: SourceId = SourceId(0);

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mcs-cli", about = "Compile scripts into scoreboard command functions", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Compiler config file (JSON). Missing fields, or a missing file, take the defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log more; repeat for trace output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script into a directory of .mcfunction files
    Build {
        input: PathBuf,
        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,
        /// Override the configured namespace
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Print the tree of each top-level statement
    Tree {
        input: PathBuf,
        /// Output raw JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

// ── Entry point ──────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => CompilerConfig::load_or_default(path),
        None => Ok(CompilerConfig::default()),
    }
    .unwrap_or_else(|e| fail(&format!("Error: {e}")));

    match cli.command {
        Commands::Build { input, out, namespace } => {
            if let Some(namespace) = namespace {
                config.namespace = namespace;
            }
            if let Err(e) = config.validate() {
                fail(&format!("Error: {e}"));
            }
            let text = read_input(&input);
            let package = compile_source(INPUT_SOURCE, &text, config)
                .unwrap_or_else(|e| fail(&describe_error(&e, &input)));
            match package.write_to(&out) {
                Ok(written) => println!("Wrote {} functions to {}", written.len(), out.display()),
                Err(e) => fail(&format!("Error: cannot write {}: {e}", out.display())),
            }
        }
        Commands::Tree { input, json } => {
            let text = read_input(&input);
            let builder = TreeBuilder::new(INPUT_SOURCE).with_separator(config.statement_separator);
            let trees = parse_statements(builder, &text).unwrap_or_else(|e| fail(&describe_error(&e, &input)));
            if json {
                println!("{}", serde_json::to_string_pretty(&trees).unwrap());
            } else {
                for tree in &trees {
                    println!("{tree}");
                }
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn read_input(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| fail(&format!("Error: cannot read {}: {e}", path.display())))
}

fn describe_error(error: &CompileError, input: &Path) -> String {
    let message = error.format_with_source(&input.display().to_string());
    if error.is_internal() {
        format!("{message}\nThis is a compiler bug; please report it with the script that triggered it.")
    } else {
        message
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(1);
}
