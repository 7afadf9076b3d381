//! Command-line interface for dyntype
//!
//! Provides commands: check, types, explain

mod check_cmd;
mod explain_cmd;
mod types_cmd;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{Config, ConfigError};

pub use check_cmd::{check_source, CheckSummary};
pub use explain_cmd::get_error_explanation;
pub use types_cmd::render_bindings;

/// dyntype - type inference for a Python teaching subset
#[derive(Parser, Debug)]
#[command(name = "dyntype")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Infer types and report type errors
    Check {
        /// Files or directories to check
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Output diagnostics as JSON
        #[arg(long)]
        json: bool,

        /// Configuration file (defaults to the nearest dyntype.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Print the inferred type of every module-level binding
    Types {
        /// File to infer
        file: PathBuf,
    },

    /// Explain a diagnostic code in detail
    Explain {
        /// Code to explain (e.g., E1001)
        code: String,
    },
}

/// Errors surfaced by the command-line front-end
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(
        code(dyntype::config),
        help("Check dyntype.toml for correct syntax and values")
    )]
    Config(#[from] ConfigError),

    #[error("failed to read {}", path.display())]
    #[diagnostic(code(dyntype::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown diagnostic code `{0}`")]
    #[diagnostic(
        code(dyntype::unknown_code),
        help("Codes are E0xxx for syntax errors and E1xxx for type errors")
    )]
    UnknownCode(String),

    #[error("{0} contains syntax errors")]
    #[diagnostic(code(dyntype::syntax))]
    Syntax(String),
}

impl Cli {
    /// Run the parsed command
    pub fn run(self) -> Result<ExitCode, CliError> {
        match self.command {
            Command::Check {
                paths,
                json,
                config,
                strict,
            } => {
                let mut config = load_config(config.as_deref(), &paths)?;
                config.check.strict |= strict;
                let summary = check_cmd::run_check(&paths, &config, json)?;
                Ok(if summary.failed(config.check.strict) {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                })
            }
            Command::Types { file } => {
                types_cmd::run_types(&file)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Explain { code } => {
                explain_cmd::run_explain(&code)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Explicit `--config`, else the nearest dyntype.toml above the first path
fn load_config(explicit: Option<&Path>, paths: &[PathBuf]) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return Config::load(path);
    }
    let start = paths.first().map(PathBuf::as_path).unwrap_or(Path::new("."));
    let start = if start.is_file() {
        start.parent().unwrap_or(Path::new("."))
    } else {
        start
    };
    Config::discover(start)
}

/// `.py` files under `paths`, directories walked recursively, in sorted order
fn collect_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            walkdir(path, &mut files)?;
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn walkdir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), CliError> {
    let io_error = |source| CliError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(io_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            walkdir(&entry, files)?;
        } else if entry.extension().is_some_and(|ext| ext == "py") {
            files.push(entry);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
