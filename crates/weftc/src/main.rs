//! The weft middle-end driver.
//!
//! Provides the `weftc` command with the following subcommands:
//!
//! - `weftc fixup <ast.json>` - Normalize and verify an AST dump
//! - `weftc config` - Print the resolved runtime configuration
//!
//! Fixup options:
//! - `--verify-only` - Skip normalization, only report violations
//! - `--no-verify` - Normalize without verifying afterwards
//! - `--checks` - Comma-separated verification checks (default: all)
//! - `--emit` - Write the normalized AST back out as JSON
//! - `--dump` - Print every module as pseudo-source to stdout
//! - `--json` - Output diagnostics as JSON (one object per line)
//! - `--no-color` - Disable colorized output
//!
//! Exit status is 0 on success, 1 when diagnostics were reported or the
//! input could not be used, and 101 on an internal error.

mod config;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use weft_ast::pretty::{print_module, PrettyConfig};
use weft_ast::{Ast, ModuleId};
use weft_passes::{
    render_diagnostic, DiagnosticOptions, InternalError, NormalizeRules, Normalizer, VerifyChecks,
    Verifier,
};

use crate::config::{ConfigError, RuntimeArgs, RuntimeConfig, Verbosity};

#[derive(Parser)]
#[command(name = "weftc", version, about = "The weft middle-end driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize and verify an AST dump
    Fixup {
        /// Path to the AST dump (JSON)
        input: PathBuf,

        /// Only verify; do not rewrite the tree
        #[arg(long = "verify-only", conflicts_with = "no_verify")]
        verify_only: bool,

        /// Only normalize; do not verify afterwards
        #[arg(long = "no-verify")]
        no_verify: bool,

        /// Verification checks to run: all, none, or a comma-separated list
        /// of symbol-refs, enclosing-stmt, parent-symbol, symbol-scope
        #[arg(long, default_value = "all")]
        checks: String,

        /// Write the resulting AST to this file as JSON
        #[arg(long)]
        emit: Option<PathBuf>,

        /// Print every module as pseudo-source to stdout
        #[arg(long)]
        dump: bool,

        /// Output diagnostics as JSON (one object per line) instead of human-readable format
        #[arg(long)]
        json: bool,

        /// Disable colorized output
        #[arg(long = "no-color")]
        no_color: bool,

        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// Print the resolved runtime configuration
    Config {
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
}

/// Why the driver stopped.
#[derive(Debug)]
enum DriverError {
    Config(ConfigError),
    Usage(String),
    Io { path: PathBuf, message: String },
    Input { path: PathBuf, message: String },
    Internal(InternalError),
}

impl DriverError {
    fn exit_code(&self) -> i32 {
        match self {
            DriverError::Internal(_) => 101,
            _ => 1,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            DriverError::Internal(_) => "I0001",
            _ => "C0001",
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Config(e) => write!(f, "{e}"),
            DriverError::Usage(message) => write!(f, "{message}"),
            DriverError::Io { path, message } => {
                write!(f, "Failed to access '{}': {message}", path.display())
            }
            DriverError::Input { path, message } => {
                write!(f, "'{}' is not a valid AST dump: {message}", path.display())
            }
            DriverError::Internal(e) => write!(f, "internal compiler error: {e}"),
        }
    }
}

impl From<ConfigError> for DriverError {
    fn from(e: ConfigError) -> Self {
        DriverError::Config(e)
    }
}

impl From<InternalError> for DriverError {
    fn from(e: InternalError) -> Self {
        DriverError::Internal(e)
    }
}

struct FixupOptions<'a> {
    verify_only: bool,
    no_verify: bool,
    checks: &'a str,
    emit: Option<&'a Path>,
    dump: bool,
    diag_opts: DiagnosticOptions,
}

fn main() {
    let cli = Cli::parse();

    let (result, json) = match cli.command {
        Commands::Fixup {
            input,
            verify_only,
            no_verify,
            checks,
            emit,
            dump,
            json,
            no_color,
            runtime,
        } => {
            let options = FixupOptions {
                verify_only,
                no_verify,
                checks: &checks,
                emit: emit.as_deref(),
                dump,
                diag_opts: if json {
                    DiagnosticOptions::json_mode()
                } else if no_color {
                    DiagnosticOptions::colorless()
                } else {
                    DiagnosticOptions::colored()
                },
            };
            let result = runtime
                .resolve()
                .map_err(DriverError::from)
                .and_then(|config| fixup(&input, &options, &config));
            (result, json)
        }
        Commands::Config { runtime } => (show_config(&runtime).map(|()| 0), false),
    };

    match result {
        Ok(0) => {}
        Ok(_) => process::exit(1),
        Err(e) => {
            if json {
                let msg = serde_json::json!({
                    "code": e.code(),
                    "severity": "error",
                    "message": e.to_string(),
                    "file": "",
                    "line": 0,
                });
                eprintln!("{}", msg);
            } else {
                eprintln!("error: {}", e);
            }
            process::exit(e.exit_code());
        }
    }
}

fn show_config(runtime: &RuntimeArgs) -> Result<(), DriverError> {
    let config = runtime.resolve()?;
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Run fixup over the dump at `input`. Returns the number of diagnostics.
fn fixup(input: &Path, options: &FixupOptions<'_>, config: &RuntimeConfig) -> Result<usize, DriverError> {
    let verbosity = config.verbosity;
    if verbosity == Verbosity::Verbose {
        eprintln!("runtime configuration:");
        eprint!("{}", config.to_toml()?);
    }

    let checks = VerifyChecks::parse_list(options.checks).map_err(DriverError::Usage)?;
    let mut ast = load_ast(input)?;
    let modules: Vec<ModuleId> = ast.module_ids().collect();

    if !options.verify_only {
        let report = Normalizer::new(NormalizeRules::default()).run(&mut ast, &modules)?;
        if verbosity >= Verbosity::Normal {
            eprintln!(
                "  Normalized {} module(s): {} rewrite(s)",
                modules.len(),
                report.rewrites()
            );
        }
        if verbosity == Verbosity::Verbose {
            eprintln!(
                "    wrapped branches: {}, hoisted temporaries: {}, flattened parens: {}, dropped empty statements: {}",
                report.wrapped_branches,
                report.hoisted_temps,
                report.flattened_parens,
                report.dropped_nops
            );
            eprintln!(
                "    visited {} symbol(s), {} statement(s), {} expression(s)",
                report.stats.symbols, report.stats.stmts, report.stats.exprs
            );
        }
    }

    let mut diagnostics = 0;
    if !options.no_verify {
        let report = Verifier::new(checks).run(&ast, &modules)?;
        for diag in &report.diagnostics {
            let source = ast.get_module(diag.module).and_then(|m| m.source.as_deref());
            let rendered = render_diagnostic(diag, source, &options.diag_opts);
            if options.diag_opts.json {
                eprintln!("{}", rendered);
            } else {
                eprint!("{}", rendered);
            }
        }
        diagnostics = report.diagnostics.len();
        if verbosity >= Verbosity::Normal && !options.diag_opts.json {
            if diagnostics == 0 {
                eprintln!("  Verified {} module(s): no violations", modules.len());
            } else {
                eprintln!(
                    "  Verified {} module(s): {} violation(s)",
                    modules.len(),
                    diagnostics
                );
            }
        }
    }

    if let Some(path) = options.emit {
        let json = serde_json::to_string_pretty(&ast).map_err(|e| DriverError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| DriverError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    if options.dump {
        let pretty = PrettyConfig::default();
        for &module in &modules {
            print!("{}", print_module(&ast, module, &pretty));
        }
    }

    Ok(diagnostics)
}

fn load_ast(path: &Path) -> Result<Ast, DriverError> {
    let text = std::fs::read_to_string(path).map_err(|e| DriverError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| DriverError::Input {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
