//! Declarative dispatcher configuration.
//!
//! A manifest describes a dispatcher in TOML (or any JSON-shaped value):
//!
//! ```toml
//! name = "tool"
//! version = "1.0.0"
//!
//! [options]
//! stdin = "null"
//!
//! [[commands]]
//! name = "echo"
//! action = "echo"
//! options = [{ name = "text" }]
//! ```
//!
//! Inline commands name their action; the names are bound against an
//! [`ActionTable`] supplied by the host. String entries are command file
//! paths or globs:
//!
//! ```toml
//! commands = ["/opt/tool/commands/*.rs"]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::action::Action;
use crate::cli::{Cli, CliBuilder};
use crate::command::CommandDescriptor;
use crate::config::{Version, validate_name, validate_version};
use crate::error::{ConfigError, describe, kind_of};
use crate::io::{Input, Output};
use crate::option::OptionSpec;

/// Actions that manifest commands can refer to by name.
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    actions: HashMap<String, Action>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under `name`.
    pub fn with(mut self, name: impl Into<String>, action: Action) -> Self {
        self.insert(name, action);
        self
    }

    /// Register an action, replacing any previous one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, action: Action) {
        self.actions.insert(name.into(), action);
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// What a manifest can say about a standard stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamSetting {
    /// Use the process stream.
    #[default]
    Inherit,
    /// Discard output, or read nothing.
    Null,
}

impl StreamSetting {
    fn parse(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "inherit" => Some(Self::Inherit),
            "null" => Some(Self::Null),
            _ => None,
        }
    }
}

/// One entry of the manifest's command list.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEntry {
    /// A command whose action is looked up in an [`ActionTable`].
    Inline {
        index: usize,
        name: String,
        action: String,
        options: Vec<OptionSpec>,
    },
    /// A command file path or glob.
    Source(String),
}

/// A validated manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct CliManifest {
    pub name: String,
    pub version: Option<Version>,
    pub stdin: StreamSetting,
    pub stdout: StreamSetting,
    pub stderr: StreamSetting,
    pub commands: Vec<CommandEntry>,
}

impl CliManifest {
    /// Load a manifest from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadManifest {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse a manifest from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        Self::from_value(serde_json::to_value(table)?)
    }

    /// Parse a manifest from a JSON string.
    pub fn parse_json(content: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(content)?)
    }

    /// Validate a JSON-shaped configuration.
    ///
    /// Checks run in a fixed order and the first failure wins: the value
    /// itself, `name`, `version`, `options`, the streams, then `commands`.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let Value::Object(config) = value else {
            return Err(ConfigError::UnvalidConfigurationObject {
                received: kind_of(&value).to_string(),
            });
        };

        let name = match config.get("name") {
            Some(Value::String(name)) => validate_name(name)?,
            other => {
                return Err(ConfigError::UnvalidName {
                    received: received(other),
                });
            }
        };

        let version = match config.get("version") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(Version::Text(text.clone())),
            Some(Value::Number(number)) => Some(Version::Number(number.clone())),
            Some(other) => {
                return Err(ConfigError::UnvalidVersion {
                    received: describe(other),
                });
            }
        };
        validate_version(version.as_ref())?;

        let empty = Map::new();
        let options = match config.get("options") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(options)) => options,
            Some(other) => {
                return Err(ConfigError::UnvalidOptions {
                    received: kind_of(other).to_string(),
                });
            }
        };

        let stdin = stream(options, "stdin")
            .map_err(|received| ConfigError::UnvalidStdin { received })?;
        let stdout = stream(options, "stdout")
            .map_err(|received| ConfigError::UnvalidStdout { received })?;
        let stderr = stream(options, "stderr")
            .map_err(|received| ConfigError::UnvalidStderr { received })?;

        let commands = match config.get("commands") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .enumerate()
                .map(|(index, entry)| command_entry(index, entry))
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(ConfigError::UnvalidCommands {
                    received: kind_of(other).to_string(),
                });
            }
        };

        Ok(Self {
            name,
            version,
            stdin,
            stdout,
            stderr,
            commands,
        })
    }

    /// Relative command sources resolved against `base`.
    ///
    /// Useful for manifests shipped next to their command files.
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        for entry in &mut self.commands {
            if let CommandEntry::Source(source) = entry
                && !Path::new(source.as_str()).is_absolute()
            {
                *source = base.join(&*source).to_string_lossy().into_owned();
            }
        }
        self
    }

    /// Turn the manifest into a builder, binding inline actions by name.
    pub fn into_builder(self, actions: &ActionTable) -> Result<CliBuilder, ConfigError> {
        let mut builder = Cli::builder(self.name);
        if let Some(version) = self.version {
            builder = builder.version(version);
        }
        if self.stdin == StreamSetting::Null {
            builder = builder.stdin(Input::empty());
        }
        if self.stdout == StreamSetting::Null {
            builder = builder.stdout(Output::null());
        }
        if self.stderr == StreamSetting::Null {
            builder = builder.stderr(Output::null());
        }

        for entry in self.commands {
            builder = match entry {
                CommandEntry::Inline {
                    index,
                    name,
                    action,
                    options,
                } => {
                    let Some(handle) = actions.get(&action) else {
                        return Err(ConfigError::UnvalidCommand {
                            index,
                            reason: format!("the action \"{action}\" is not registered"),
                        });
                    };
                    debug!("Binding command {} to action {}", name, action);
                    builder.command(CommandDescriptor::new(name, handle.clone()).with_options(options))
                }
                CommandEntry::Source(source) => builder.source(source),
            };
        }

        Ok(builder)
    }

    /// Paths of the single-file sources, in declaration order.
    pub fn file_sources(&self) -> Vec<PathBuf> {
        self.commands
            .iter()
            .filter_map(|entry| match entry {
                CommandEntry::Source(source) if !crate::source::is_glob(source) => {
                    Some(PathBuf::from(source))
                }
                _ => None,
            })
            .collect()
    }
}

fn received(value: Option<&Value>) -> String {
    value.map(describe).unwrap_or_else(|| "nothing".to_string())
}

fn stream(options: &Map<String, Value>, key: &str) -> Result<StreamSetting, String> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(StreamSetting::Inherit),
        Some(value) => StreamSetting::parse(value).ok_or_else(|| describe(value)),
    }
}

fn command_entry(index: usize, entry: &Value) -> Result<CommandEntry, ConfigError> {
    let fields = match entry {
        Value::String(source) => return Ok(CommandEntry::Source(source.clone())),
        Value::Object(fields) => fields,
        other => {
            return Err(ConfigError::UnvalidCommandEntry {
                index,
                received: kind_of(other).to_string(),
            });
        }
    };

    let invalid = |reason: String| ConfigError::UnvalidCommand { index, reason };

    let name = match fields.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        other => {
            return Err(invalid(format!(
                "the name must be a non-empty string, received {}",
                received(other)
            )));
        }
    };
    let action = match fields.get("action") {
        Some(Value::String(action)) => action.clone(),
        other => {
            return Err(invalid(format!(
                "the action must name a registered action, received {}",
                received(other)
            )));
        }
    };
    let options = match fields.get("options") {
        None | Some(Value::Null) => Vec::new(),
        Some(options) => serde_json::from_value(options.clone())
            .map_err(|e| invalid(format!("the options are not valid: {e}")))?,
    };

    Ok(CommandEntry::Inline {
        index,
        name,
        action,
        options,
    })
}
