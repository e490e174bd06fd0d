//! Runtime configuration resolved from the command line.
//!
//! None of this reaches the passes. It conditions the surrounding driver
//! (how much it prints) and is reported back by `weftc config`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

/// How much the driver prints to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Diagnostics and errors only.
    Quiet,
    #[default]
    Normal,
    /// Adds per-module statistics and the resolved configuration.
    Verbose,
}

/// Memory limit and tracking settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
    pub stat: bool,
    pub final_stat: bool,
    pub track: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<PathBuf>,
}

/// The fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeConfig {
    pub num_locales: u32,
    pub verbosity: Verbosity,
    pub gdb: bool,
    pub block_report: bool,
    pub task_report: bool,
    pub memory: MemoryConfig,
    pub config_vars: BTreeMap<String, String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_locales: 1,
            verbosity: Verbosity::Normal,
            gdb: false,
            block_report: false,
            task_report: false,
            memory: MemoryConfig::default(),
            config_vars: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Render as TOML, the same format `-f` reads config variables from.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Render(e.to_string()))
    }
}

/// Errors while resolving the runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroLocales,
    BadAssignment(String),
    ReadFile { path: PathBuf, message: String },
    ParseFile { path: PathBuf, message: String },
    BadValue { name: String, path: PathBuf },
    Render(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroLocales => write!(f, "Number of locales must be greater than 0"),
            ConfigError::BadAssignment(arg) => {
                write!(f, "malformed config variable `{arg}` (expected NAME=VALUE)")
            }
            ConfigError::ReadFile { path, message } => {
                write!(f, "failed to read config file '{}': {message}", path.display())
            }
            ConfigError::ParseFile { path, message } => {
                write!(f, "failed to parse config file '{}': {message}", path.display())
            }
            ConfigError::BadValue { name, path } => write!(
                f,
                "config variable `{name}` in '{}' must be a string, number or boolean",
                path.display()
            ),
            ConfigError::Render(message) => write!(f, "failed to render configuration: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RuntimeArgs {
    /// Number of locales to run on (must be positive)
    #[arg(short = 'n', long = "num-locales", default_value_t = 1)]
    pub num_locales: u32,

    /// Print diagnostics and errors only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print per-module statistics and the resolved configuration
    #[arg(short, long)]
    pub verbose: bool,

    /// Upper bound on memory, in bytes
    #[arg(long)]
    pub memmax: Option<u64>,

    /// Print memory statistics
    #[arg(long)]
    pub memstat: bool,

    /// Print memory statistics at exit
    #[arg(long)]
    pub memfinalstat: bool,

    /// Track every allocation
    #[arg(long)]
    pub memtrack: bool,

    /// Only track allocations at least this large, in bytes
    #[arg(long)]
    pub memthreshold: Option<u64>,

    /// Write the allocation trace to this file
    #[arg(long)]
    pub memtrace: Option<PathBuf>,

    /// Run under a debugger
    #[arg(long)]
    pub gdb: bool,

    /// Report blocked tasks
    #[arg(short = 'b', long = "blockreport")]
    pub block_report: bool,

    /// Report running tasks
    #[arg(short = 't', long = "taskreport")]
    pub task_report: bool,

    /// Set a config variable (repeatable)
    #[arg(short = 's', long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Read config variables from a TOML file
    #[arg(short = 'f', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

impl RuntimeArgs {
    /// Validate the flags and merge config variables. Variables from `-f`
    /// are applied first; `-s` overrides them.
    pub fn resolve(&self) -> Result<RuntimeConfig, ConfigError> {
        if self.num_locales == 0 {
            return Err(ConfigError::ZeroLocales);
        }

        let verbosity = if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };

        let mut config_vars = BTreeMap::new();
        if let Some(path) = &self.config_file {
            config_vars.extend(read_config_file(path)?);
        }
        for arg in &self.set {
            let (name, value) = parse_assignment(arg)?;
            config_vars.insert(name, value);
        }

        Ok(RuntimeConfig {
            num_locales: self.num_locales,
            verbosity,
            gdb: self.gdb,
            block_report: self.block_report,
            task_report: self.task_report,
            memory: MemoryConfig {
                max: self.memmax,
                stat: self.memstat,
                final_stat: self.memfinalstat,
                track: self.memtrack,
                threshold: self.memthreshold,
                trace: self.memtrace.clone(),
            },
            config_vars,
        })
    }
}

fn parse_assignment(arg: &str) -> Result<(String, String), ConfigError> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::BadAssignment(arg.to_string())),
    }
}

fn read_config_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_config_vars(&content, path)
}

fn parse_config_vars(content: &str, path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let table: toml::Table = content.parse().map_err(|e: toml::de::Error| ConfigError::ParseFile {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;
    let mut vars = BTreeMap::new();
    for (name, value) in table {
        let value = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(x) => x.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            _ => {
                return Err(ConfigError::BadValue {
                    name,
                    path: path.to_path_buf(),
                })
            }
        };
        vars.insert(name, value);
    }
    Ok(vars)
}
