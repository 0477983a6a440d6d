//! Command descriptors and the resolved command table.

use std::collections::HashMap;

use crate::action::Action;
use crate::option::OptionSpec;

/// A resolved command: a name, an action and its positional options.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    /// Name used as the first token of a call.
    pub name: String,

    /// Behavior run for each call.
    pub action: Action,

    /// Positional option slots, bound in declared order.
    pub options: Vec<OptionSpec>,
}

impl CommandDescriptor {
    /// Create a command without options.
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            action,
            options: Vec::new(),
        }
    }

    /// Append an option slot.
    pub fn with_option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    /// Append several option slots.
    pub fn with_options(mut self, options: impl IntoIterator<Item = OptionSpec>) -> Self {
        self.options.extend(options);
        self
    }
}

/// Commands available at dispatch time.
///
/// User-declared commands always win; the default set is only consulted for
/// names no user command claims.
#[derive(Debug, Default)]
pub(crate) struct CommandTable {
    commands: HashMap<String, CommandDescriptor>,
    defaults: HashMap<String, CommandDescriptor>,
}

impl CommandTable {
    pub(crate) fn new(
        commands: HashMap<String, CommandDescriptor>,
        defaults: HashMap<String, CommandDescriptor>,
    ) -> Self {
        Self { commands, defaults }
    }

    /// Look a command up, falling back to the default set.
    pub(crate) fn get(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.get(name).or_else(|| self.defaults.get(name))
    }

    /// Every callable name, sorted.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .keys()
            .chain(self.defaults.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Number of user-declared commands.
    pub(crate) fn len(&self) -> usize {
        self.commands.len()
    }
}
