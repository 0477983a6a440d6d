//! Loading commands from command files.
//!
//! A command file is a source file whose exported action becomes the
//! command's action. Its leading `//!` documentation comment may refine the
//! command:
//!
//! ```text
//! //! Copy a file somewhere else.
//! //!
//! //! @name copy
//! //! @option from
//! //! @option [to]
//! //! @option {number} [mode]
//! ```
//!
//! - `@name <name>` overrides the command name (the file stem otherwise).
//! - `@option <name>` declares a required positional option; brackets mark
//!   an option with a default value and `{number}` requests numeric
//!   coercion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::action::Action;
use crate::option::{OptionKind, OptionSpec};

/// Errors that can occur when loading a command file.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The file could not be read.
    #[error("Cannot load the file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No export was registered for the file.
    #[error("Cannot find module {}", .path.display())]
    MissingModule { path: PathBuf },

    /// The documentation comment of the file cannot be understood.
    #[error("Malformed documentation comment in {}: {message}", .path.display())]
    MalformedDocComment { path: PathBuf, message: String },
}

/// What a command file exports.
#[derive(Debug, Clone)]
pub enum Export {
    /// An invocable action.
    Action(Action),
    /// Anything else.
    Value(Value),
}

/// A command as deduced from a command file.
#[derive(Debug, Clone)]
pub struct LoadedCommand {
    /// Name from the documentation comment, if declared.
    pub name: Option<String>,
    /// Options from the documentation comment.
    pub options: Vec<OptionSpec>,
    /// The file's export.
    pub export: Export,
}

/// Turns an absolute command file path into a command.
#[async_trait]
pub trait CommandFileLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<LoadedCommand, LoaderError>;
}

/// Default loader: reads the documentation comment from disk and takes the
/// export from a table registered by the host.
#[derive(Debug, Clone, Default)]
pub struct ModuleLoader {
    exports: HashMap<PathBuf, Export>,
}

impl ModuleLoader {
    /// Create a loader without exports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the action exported by a command file.
    pub fn export(mut self, path: impl Into<PathBuf>, action: Action) -> Self {
        self.register(path, Export::Action(action));
        self
    }

    /// Register a non-invocable export for a command file.
    pub fn export_value(mut self, path: impl Into<PathBuf>, value: Value) -> Self {
        self.register(path, Export::Value(value));
        self
    }

    /// Register an export, replacing any previous one for the same path.
    pub fn register(&mut self, path: impl Into<PathBuf>, export: Export) {
        self.exports.insert(path.into(), export);
    }

    /// Number of registered exports.
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Check if no export is registered.
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

#[async_trait]
impl CommandFileLoader for ModuleLoader {
    async fn load(&self, path: &Path) -> Result<LoadedCommand, LoaderError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| LoaderError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let doc = parse_doc_comment(&content).map_err(|message| {
            LoaderError::MalformedDocComment {
                path: path.to_path_buf(),
                message,
            }
        })?;

        let export = self
            .exports
            .get(path)
            .cloned()
            .ok_or_else(|| LoaderError::MissingModule {
                path: path.to_path_buf(),
            })?;

        debug!(
            "Loaded command file {:?} (name: {:?}, {} options)",
            path,
            doc.name,
            doc.options.len()
        );

        Ok(LoadedCommand {
            name: doc.name,
            options: doc.options,
            export,
        })
    }
}

/// Command details declared in a documentation comment.
#[derive(Debug, Default, PartialEq)]
pub struct DocComment {
    pub name: Option<String>,
    pub options: Vec<OptionSpec>,
}

/// Parse the leading `//!` block of a command file.
///
/// Blank lines before the block are skipped; the block ends at the first
/// line that is not an inner doc comment.
pub fn parse_doc_comment(content: &str) -> Result<DocComment, String> {
    let mut doc = DocComment::default();

    let lines = content
        .lines()
        .map(str::trim_start)
        .skip_while(|line| line.is_empty())
        .map_while(|line| line.strip_prefix("//!"));

    for line in lines {
        let line = line.trim();
        if let Some(rest) = strip_tag(line, "@name") {
            if doc.name.is_some() {
                return Err("the @name tag is declared twice".to_string());
            }
            doc.name = Some(parse_name(rest)?);
        } else if let Some(rest) = strip_tag(line, "@option") {
            doc.options.push(parse_option(rest)?);
        }
    }

    Ok(doc)
}

fn strip_tag<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(tag)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then(|| rest.trim())
}

fn parse_name(rest: &str) -> Result<String, String> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(name), None) => Ok(name.to_string()),
        (None, _) => Err("the @name tag has no value".to_string()),
        (Some(_), Some(_)) => Err(format!(
            "the @name tag expects a single word, found \"{rest}\""
        )),
    }
}

fn parse_option(rest: &str) -> Result<OptionSpec, String> {
    let (kind, rest) = match rest.strip_prefix('{') {
        Some(typed) => {
            let (kind, rest) = typed
                .split_once('}')
                .ok_or_else(|| format!("unclosed type in \"@option {rest}\""))?;
            let kind = match kind.trim() {
                "number" => OptionKind::Number,
                "string" | "default" => OptionKind::Default,
                other => return Err(format!("unknown option type \"{other}\"")),
            };
            (kind, rest.trim())
        }
        None => (OptionKind::Default, rest),
    };

    let mut words = rest.split_whitespace();
    let Some(word) = words.next() else {
        return Err("the @option tag has no name".to_string());
    };
    if words.next().is_some() {
        return Err(format!(
            "the @option tag expects a single name, found \"{rest}\""
        ));
    }

    let (name, has_default_value) = match word.strip_prefix('[') {
        Some(inner) => {
            let name = inner
                .strip_suffix(']')
                .ok_or_else(|| format!("unclosed brackets around \"{word}\""))?;
            (name, true)
        }
        None => (word, false),
    };

    if name.is_empty() {
        return Err("the @option tag has an empty name".to_string());
    }

    Ok(OptionSpec {
        name: name.to_string(),
        has_default_value,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_doc_comment() {
        let content = r#"
//! Copy a file.
//!
//! @name copy
//! @option from
//! @option [to]
//! @option {number} [mode]

//! @name ignored-after-the-block
"#;
        let doc = parse_doc_comment(content).unwrap();

        assert_eq!(doc.name.as_deref(), Some("copy"));
        assert_eq!(
            doc.options,
            vec![
                OptionSpec::new("from"),
                OptionSpec::new("to").with_default(),
                OptionSpec::new("mode").with_default().number(),
            ]
        );
    }

    #[test]
    fn test_parse_without_doc_comment() {
        let doc = parse_doc_comment("fn main() {}\n").unwrap();
        assert_eq!(doc, DocComment::default());
    }

    #[test]
    fn test_tag_prefix_is_not_a_tag() {
        let doc = parse_doc_comment("//! @names are fun\n").unwrap();
        assert!(doc.name.is_none());
    }

    #[test]
    fn test_malformed_tags() {
        assert!(parse_doc_comment("//! @name\n").is_err());
        assert!(parse_doc_comment("//! @name two words\n").is_err());
        assert!(parse_doc_comment("//! @name a\n//! @name b\n").is_err());
        assert!(parse_doc_comment("//! @option\n").is_err());
        assert!(parse_doc_comment("//! @option {bool} flag\n").is_err());
        assert!(parse_doc_comment("//! @option {number flag\n").is_err());
        assert!(parse_doc_comment("//! @option [flag\n").is_err());
        assert!(parse_doc_comment("//! @option []\n").is_err());
    }

    #[tokio::test]
    async fn test_module_loader_reads_doc_comment() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("greet.rs");
        std::fs::write(&path, "//! @name hello\n//! @option who\n").unwrap();

        let loader = ModuleLoader::new().export(&path, Action::value(|_| Ok("hi")));
        let loaded = loader.load(&path).await.unwrap();

        assert_eq!(loaded.name.as_deref(), Some("hello"));
        assert_eq!(loaded.options, vec![OptionSpec::new("who")]);
        assert!(matches!(loaded.export, Export::Action(_)));
    }

    #[tokio::test]
    async fn test_module_loader_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.rs");

        let loader = ModuleLoader::new().export(&path, Action::value(|_| Ok(1)));
        let err = loader.load(&path).await.unwrap_err();

        assert!(matches!(err, LoaderError::Io { .. }));
        assert!(err.to_string().contains("absent.rs"));
    }

    #[tokio::test]
    async fn test_module_loader_missing_export() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("orphan.rs");
        std::fs::write(&path, "").unwrap();

        let err = ModuleLoader::new().load(&path).await.unwrap_err();
        assert!(matches!(err, LoaderError::MissingModule { .. }));
    }

    #[tokio::test]
    async fn test_module_loader_value_export() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.rs");
        std::fs::write(&path, "").unwrap();

        let loader = ModuleLoader::new().export_value(&path, json!({"not": "a function"}));
        let loaded = loader.load(&path).await.unwrap();

        assert!(matches!(loaded.export, Export::Value(_)));
        assert_eq!(loader.len(), 1);
    }
}
