//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Log verbosity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors (default)
    #[default]
    Warn,
    /// Show informational messages, warnings, and errors
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Run one command of a quire manifest.
///
/// Without a command, lists the commands the manifest provides.
#[derive(Debug, Parser)]
#[command(name = "quire", version)]
pub struct Args {
    /// Path to the TOML manifest describing the commands
    #[arg(short, long, env = "QUIRE_MANIFEST")]
    pub manifest: PathBuf,

    /// A whole command line, split with shell quoting rules
    #[arg(short, long, conflicts_with = "command")]
    pub line: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Shortcut for `--log-level debug`
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the result as indented JSON
    #[arg(long)]
    pub pretty: bool,

    /// The command name followed by its options
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl Args {
    /// Tokens handed to the dispatcher.
    pub fn argv(&self) -> anyhow::Result<Vec<String>> {
        match &self.line {
            Some(line) => shlex::split(line)
                .ok_or_else(|| anyhow::anyhow!("Unbalanced quotes in command line: {line}")),
            None => Ok(self.command.clone()),
        }
    }

    /// Effective log level.
    pub fn level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}
