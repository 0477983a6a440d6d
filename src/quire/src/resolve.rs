//! Resolution of declared commands into the command table.
//!
//! Resolution runs in two phases. [`plan`] folds over the declarations
//! synchronously: it registers inline commands, classifies string sources,
//! expands globs and rejects every duplicate that can be detected without
//! reading files. [`resolve`] then loads the pending command files and
//! registers them, checking their names against everything registered so far.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::command::CommandDescriptor;
use crate::error::{ConfigError, DeclarationSite, kind_of};
use crate::loader::{CommandFileLoader, Export, LoadedCommand};
use crate::source::{GlobLister, SourceKind, classify, has_command_extension};

/// One entry of the configured command list.
#[derive(Debug, Clone)]
pub(crate) enum Declaration {
    Inline(CommandDescriptor),
    Source(String),
}

/// Outcome of the synchronous phase.
#[derive(Debug, Default)]
pub(crate) struct Plan {
    commands: HashMap<String, (DeclarationSite, CommandDescriptor)>,
    pending: Vec<DeclarationSite>,
}

impl Plan {
    /// Whether command files remain to be loaded.
    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The table of a plan without command files.
    pub(crate) fn into_commands(self) -> HashMap<String, CommandDescriptor> {
        self.commands
            .into_iter()
            .map(|(name, (_, command))| (name, command))
            .collect()
    }

    fn register(
        &mut self,
        site: DeclarationSite,
        command: CommandDescriptor,
    ) -> Result<(), ConfigError> {
        match self.commands.entry(command.name.clone()) {
            Entry::Occupied(existing) => {
                let existing = existing.get().0.clone();
                let (first, second) = if existing.index() <= site.index() {
                    (existing, site)
                } else {
                    (site, existing)
                };
                Err(ConfigError::DuplicateCommand {
                    name: command.name,
                    first,
                    second,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert((site, command));
                Ok(())
            }
        }
    }
}

/// Paths and globs already declared, with the index declaring them.
#[derive(Debug, Default)]
struct Seen {
    paths: HashMap<PathBuf, usize>,
    globs: HashMap<String, usize>,
}

impl Seen {
    fn path(&mut self, path: &Path, index: usize) -> Result<(), ConfigError> {
        if let Some(&first_index) = self.paths.get(path) {
            return Err(ConfigError::DuplicateFilePath {
                path: path.to_path_buf(),
                first_index,
                second_index: index,
            });
        }
        self.paths.insert(path.to_path_buf(), index);
        Ok(())
    }

    fn glob(&mut self, pattern: &str, index: usize) -> Result<(), ConfigError> {
        if let Some(&first_index) = self.globs.get(pattern) {
            return Err(ConfigError::DuplicateGlob {
                pattern: pattern.to_string(),
                first_index,
                second_index: index,
            });
        }
        self.globs.insert(pattern.to_string(), index);
        Ok(())
    }
}

/// Synchronous phase: fail on the first problem, in declaration order.
pub(crate) fn plan(
    declarations: Vec<Declaration>,
    globber: &dyn GlobLister,
) -> Result<Plan, ConfigError> {
    let mut plan = Plan::default();
    let mut seen = Seen::default();

    for (index, declaration) in declarations.into_iter().enumerate() {
        match declaration {
            Declaration::Inline(command) => {
                if command.name.trim().is_empty() {
                    return Err(ConfigError::UnvalidCommand {
                        index,
                        reason: "the command name must be a non-empty string".to_string(),
                    });
                }
                plan.register(DeclarationSite::Inline { index }, command)?;
            }
            Declaration::Source(source) => match classify(index, &source)? {
                SourceKind::File(path) => {
                    seen.path(&path, index)?;
                    plan.pending.push(DeclarationSite::File { index, path });
                }
                SourceKind::Glob(pattern) => {
                    seen.glob(&pattern, index)?;
                    let matches = globber.list(&pattern)?;
                    if matches.is_empty() {
                        return Err(ConfigError::GlobNoMatch { index, pattern });
                    }
                    debug!("Glob {} matched {} command files", pattern, matches.len());

                    for path in matches {
                        if !has_command_extension(&path) {
                            return Err(ConfigError::UnvalidGlobMatch { pattern, path });
                        }
                        seen.path(&path, index)?;
                        plan.pending.push(DeclarationSite::Glob {
                            index,
                            pattern: pattern.clone(),
                            path,
                        });
                    }
                }
            },
        }
    }

    Ok(plan)
}

/// Asynchronous phase: load every pending command file and register it.
///
/// Files are loaded concurrently but registered in declaration order, so the
/// reported conflict is the same as with a sequential load.
pub(crate) async fn resolve(
    mut plan: Plan,
    loader: Arc<dyn CommandFileLoader>,
) -> Result<HashMap<String, CommandDescriptor>, ConfigError> {
    let pending = std::mem::take(&mut plan.pending);

    let loads = pending.iter().map(|site| {
        let loader = Arc::clone(&loader);
        async move {
            match site.path() {
                Some(path) => loader.load(path).await.map_err(ConfigError::from),
                None => Err(ConfigError::UnvalidCommand {
                    index: site.index(),
                    reason: "an inline command cannot be loaded from a file".to_string(),
                }),
            }
        }
    });
    let loaded = join_all(loads).await;

    for (site, result) in pending.into_iter().zip(loaded) {
        let command = into_command(&site, result?)?;
        plan.register(site, command)?;
    }

    debug!("Resolved {} commands", plan.commands.len());
    Ok(plan.into_commands())
}

fn into_command(
    site: &DeclarationSite,
    loaded: LoadedCommand,
) -> Result<CommandDescriptor, ConfigError> {
    let path = site.path().unwrap_or_else(|| Path::new(""));

    let action = match loaded.export {
        Export::Action(action) => action,
        Export::Value(value) => {
            return Err(ConfigError::NotAnAction {
                path: path.to_path_buf(),
                exported: kind_of(&value).to_string(),
            });
        }
    };

    let name = loaded.name.unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    Ok(CommandDescriptor {
        name,
        action,
        options: loaded.options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::loader::ModuleLoader;
    use serde_json::json;
    use tempfile::TempDir;

    struct FixedGlob(Vec<PathBuf>);

    impl GlobLister for FixedGlob {
        fn list(&self, _pattern: &str) -> Result<Vec<PathBuf>, ConfigError> {
            Ok(self.0.clone())
        }
    }

    fn inline(name: &str) -> Declaration {
        Declaration::Inline(CommandDescriptor::new(name, Action::value(|_| Ok(1))))
    }

    fn no_glob() -> FixedGlob {
        FixedGlob(Vec::new())
    }

    #[test]
    fn test_plan_inline_only() {
        let plan = plan(vec![inline("a"), inline("b")], &no_glob()).unwrap();
        assert!(!plan.has_pending());
        let commands = plan.into_commands();
        assert_eq!(commands.len(), 2);
        assert!(commands.contains_key("a"));
    }

    #[test]
    fn test_duplicate_inline_names() {
        let err = plan(vec![inline("a"), inline("b"), inline("a")], &no_glob()).unwrap_err();
        match err {
            ConfigError::DuplicateCommand {
                name,
                first,
                second,
            } => {
                assert_eq!(name, "a");
                assert_eq!(first, DeclarationSite::Inline { index: 0 });
                assert_eq!(second, DeclarationSite::Inline { index: 2 });
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_inline_name() {
        let err = plan(vec![inline(" ")], &no_glob()).unwrap_err();
        assert!(matches!(err, ConfigError::UnvalidCommand { index: 0, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_duplicate_file_paths() {
        let declarations = vec![
            Declaration::Source("/cmds/a.rs".to_string()),
            Declaration::Source("/cmds/a.rs".to_string()),
        ];
        let err = plan(declarations, &no_glob()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateFilePath {
                first_index: 0,
                second_index: 1,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_duplicate_globs() {
        let globber = FixedGlob(vec![PathBuf::from("/cmds/a.rs")]);
        let declarations = vec![
            Declaration::Source("/cmds/*.rs".to_string()),
            Declaration::Source("/cmds/*.rs".to_string()),
        ];
        let err = plan(declarations, &globber).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateGlob {
                first_index: 0,
                second_index: 1,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_glob_match_duplicates_file() {
        let globber = FixedGlob(vec![PathBuf::from("/cmds/a.rs")]);
        let declarations = vec![
            Declaration::Source("/cmds/a.rs".to_string()),
            Declaration::Source("/cmds/*.rs".to_string()),
        ];
        let err = plan(declarations, &globber).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateFilePath { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_glob_without_match() {
        let err = plan(
            vec![Declaration::Source("/cmds/*.rs".to_string())],
            &no_glob(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::GlobNoMatch { index: 0, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_glob_with_foreign_file() {
        let globber = FixedGlob(vec![PathBuf::from("/cmds/a.rs"), PathBuf::from("/cmds/notes.md")]);
        let err = plan(vec![Declaration::Source("/cmds/*".to_string())], &globber).unwrap_err();
        assert!(matches!(err, ConfigError::UnvalidGlobMatch { .. }));
    }

    #[tokio::test]
    async fn test_resolve_files_and_inline() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join("build.rs");
        let deploy = temp.path().join("deploy.rs");
        std::fs::write(&build, "").unwrap();
        std::fs::write(&deploy, "//! @name ship\n//! @option target\n").unwrap();

        let loader = ModuleLoader::new()
            .export(&build, Action::value(|_| Ok("built")))
            .export(&deploy, Action::value(|_| Ok("shipped")));

        let declarations = vec![
            inline("test"),
            Declaration::Source(build.display().to_string()),
            Declaration::Source(deploy.display().to_string()),
        ];
        let plan = plan(declarations, &no_glob()).unwrap();
        assert!(plan.has_pending());

        let commands = resolve(plan, Arc::new(loader)).await.unwrap();
        let mut names: Vec<_> = commands.keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["build", "ship", "test"]);
        assert_eq!(commands["ship"].options.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_file_colliding_with_inline() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join("build.rs");
        std::fs::write(&build, "").unwrap();

        let loader = ModuleLoader::new().export(&build, Action::value(|_| Ok(1)));
        let declarations = vec![
            Declaration::Source(build.display().to_string()),
            inline("build"),
        ];
        let plan = plan(declarations, &no_glob()).unwrap();
        let err = resolve(plan, Arc::new(loader)).await.unwrap_err();

        match err {
            ConfigError::DuplicateCommand { first, second, .. } => {
                assert_eq!(first.index(), 0);
                assert_eq!(first.path(), Some(build.as_path()));
                assert_eq!(second, DeclarationSite::Inline { index: 1 });
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_non_action_export() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data.rs");
        std::fs::write(&data, "").unwrap();

        let loader = ModuleLoader::new().export_value(&data, json!(42));
        let plan = plan(
            vec![Declaration::Source(data.display().to_string())],
            &no_glob(),
        )
        .unwrap();
        let err = resolve(plan, Arc::new(loader)).await.unwrap_err();

        match err {
            ConfigError::NotAnAction { path, exported } => {
                assert_eq!(path, data);
                assert_eq!(exported, "number");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_malformed_doc_comment() {
        let temp = TempDir::new().unwrap();
        let broken = temp.path().join("broken.rs");
        std::fs::write(&broken, "//! @name\n").unwrap();

        let loader = ModuleLoader::new().export(&broken, Action::value(|_| Ok(1)));
        let plan = plan(
            vec![Declaration::Source(broken.display().to_string())],
            &no_glob(),
        )
        .unwrap();
        let err = resolve(plan, Arc::new(loader)).await.unwrap_err();

        assert!(matches!(err, ConfigError::Loader(_)));
        assert!(err.to_string().contains("@name tag has no value"));
    }
}
