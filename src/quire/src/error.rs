//! Error types for dispatcher construction and invocation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::loader::LoaderError;

/// Where a command was declared in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationSite {
    /// An inline command descriptor.
    Inline { index: usize },
    /// A single command file path.
    File { index: usize, path: PathBuf },
    /// A command file matched by a glob pattern.
    Glob {
        index: usize,
        pattern: String,
        path: PathBuf,
    },
}

impl DeclarationSite {
    /// Position of the declaration in the configured command list.
    pub fn index(&self) -> usize {
        match self {
            Self::Inline { index } | Self::File { index, .. } | Self::Glob { index, .. } => *index,
        }
    }

    /// The command file behind this declaration, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Inline { .. } => None,
            Self::File { path, .. } | Self::Glob { path, .. } => Some(path),
        }
    }
}

impl fmt::Display for DeclarationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline { index } => write!(f, "the command object at index {index}"),
            Self::File { index, path } => {
                write!(f, "the file {} at index {index}", path.display())
            }
            Self::Glob {
                index,
                pattern,
                path,
            } => write!(
                f,
                "the file {} matched by the glob \"{pattern}\" at index {index}",
                path.display()
            ),
        }
    }
}

/// Errors raised while building a dispatcher.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The configuration must be an object, received {received}.")]
    UnvalidConfigurationObject { received: String },

    #[error("The cli name must be a non-empty string, received {received}.")]
    UnvalidName { received: String },

    #[error("The cli version must be a non-empty string or a number, received {received}.")]
    UnvalidVersion { received: String },

    #[error("The cli options must be an object, received {received}.")]
    UnvalidOptions { received: String },

    #[error("The stdin option must be a readable stream, received {received}.")]
    UnvalidStdin { received: String },

    #[error("The stdout option must be a writable stream, received {received}.")]
    UnvalidStdout { received: String },

    #[error("The stderr option must be a writable stream, received {received}.")]
    UnvalidStderr { received: String },

    #[error("The cli commands must be an array, received {received}.")]
    UnvalidCommands { received: String },

    #[error(
        "The command declared at index {index} is neither an object or an absolute path, received {received}."
    )]
    UnvalidCommandEntry { index: usize, received: String },

    #[error("The command declared at index {index} is not valid: {reason}.")]
    UnvalidCommand { index: usize, reason: String },

    #[error("The command path \"{path}\" declared at index {index} must be absolute.")]
    NotAbsolute { index: usize, path: String },

    #[error("The command \"{name}\" is declared twice, by {first} and by {second}.")]
    DuplicateCommand {
        name: String,
        first: DeclarationSite,
        second: DeclarationSite,
    },

    #[error(
        "The command file {} is declared twice, at index {first_index} and at index {second_index}.",
        .path.display()
    )]
    DuplicateFilePath {
        path: PathBuf,
        first_index: usize,
        second_index: usize,
    },

    #[error(
        "The glob \"{pattern}\" is declared twice, at index {first_index} and at index {second_index}."
    )]
    DuplicateGlob {
        pattern: String,
        first_index: usize,
        second_index: usize,
    },

    #[error("The glob \"{pattern}\" declared at index {index} does not match any file.")]
    GlobNoMatch { index: usize, pattern: String },

    #[error("The glob \"{pattern}\" is not valid: {message}")]
    UnvalidGlob { pattern: String, message: String },

    #[error(
        "The glob \"{pattern}\" matches {}, which is not a command file.",
        .path.display()
    )]
    UnvalidGlobMatch { pattern: String, path: PathBuf },

    #[error("Unable to resolve a command file: {0}")]
    Loader(#[from] LoaderError),

    #[error("The command file {} must export a function, it exports a {exported}.", .path.display())]
    NotAnAction { path: PathBuf, exported: String },

    #[error("Command files can only be resolved inside a tokio runtime.")]
    NoRuntime,

    #[error("The resolution of the command files panicked: {message}")]
    ResolutionPanicked { message: String },

    #[error("Unable to read the manifest {}: {source}", .path.display())]
    ReadManifest {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to parse the manifest: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unable to read the manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// An action misusing the completion contract.
///
/// These never come from the caller's input: they point at a bug in the
/// implementation of the command itself.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error(
        "The command \"{command}\" of \"{cli}\" calls internally a callback in a synchronous way. The callback must only be called after the action returned."
    )]
    SyncCallback { cli: String, command: String },

    #[error(
        "The command \"{command}\" of \"{cli}\" both uses internally a callback and returns a promise. Use only one of them."
    )]
    CallbackAndFuture { cli: String, command: String },

    #[error(
        "The command \"{command}\" of \"{cli}\" uses a callback and returns a value ({value}). An action using a callback must not return anything."
    )]
    CallbackAndValue {
        cli: String,
        command: String,
        value: String,
    },

    #[error(
        "The command \"{command}\" of \"{cli}\" calls internally a callback with an unvalid error value: received the {kind} {value}. The first argument of the callback must be null or an error, the result goes in the second argument."
    )]
    UnvalidErrorValue {
        cli: String,
        command: String,
        kind: String,
        value: String,
    },

    #[error(
        "The command \"{command}\" of \"{cli}\" calls internally a callback with more than one value: {values}. Wrap several results in an array or an object."
    )]
    TooManyValues {
        cli: String,
        command: String,
        values: String,
    },

    #[error("The command \"{command}\" of \"{cli}\" dropped its callback without calling it.")]
    CallbackDropped { cli: String, command: String },
}

/// The failure side of a dispatch outcome.
#[derive(Debug, Error)]
pub enum CliError {
    /// Command resolution failed after the dispatcher was built.
    #[error(transparent)]
    Config(Arc<ConfigError>),

    #[error("The command \"{command}\" is not a command of \"{cli}\".")]
    UnknownCommand { cli: String, command: String },

    #[error(
        "The command \"{command}\" of \"{cli}\" accepts {allowed}, the value \"{token}\" given at position {position} is not recognized."
    )]
    TooManyOptions {
        cli: String,
        command: String,
        allowed: String,
        token: String,
        position: usize,
    },

    #[error("The command \"{command}\" of \"{cli}\" cannot run: missing option {option}.")]
    MissingOption {
        cli: String,
        command: String,
        option: String,
    },

    #[error(
        "The option {option} of the command \"{command}\" of \"{cli}\" expects a number, received \"{token}\"."
    )]
    UnvalidNumber {
        cli: String,
        command: String,
        option: String,
        token: String,
    },

    /// The action body failed before returning.
    #[error("Error happen when using the {cli} command {command} : {error}")]
    Thrown {
        cli: String,
        command: String,
        error: anyhow::Error,
    },

    /// The action failed through its callback or its future.
    #[error("{cli} {command} error: {error}")]
    Failed {
        cli: String,
        command: String,
        error: anyhow::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    #[error("The resolution of the commands of \"{cli}\" was interrupted.")]
    Interrupted { cli: String },

    /// No runtime could be started to drive a pending call.
    #[error("Unable to start a runtime for a call of \"{cli}\": {source}")]
    Runtime {
        cli: String,
        source: std::io::Error,
    },
}

impl CliError {
    /// Whether this failure points at a bug in the command implementation.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// The business error reported by the action, if any.
    pub fn action_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Thrown { error, .. } | Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::Config(Arc::new(error))
    }
}

/// Name of the JSON type of a value, used in diagnostics.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Type and rendering of a value, e.g. `string "abc"`.
pub(crate) fn describe(value: &Value) -> String {
    format!("{} {value}", kind_of(value))
}
