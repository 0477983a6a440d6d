//! Built-in commands available to every dispatcher.
//!
//! A user command with the same name replaces the built-in one.
//!
//! - `version` - Print `{name} version {version}` and yield the version

use std::collections::HashMap;

use crate::action::{Action, Invocation};
use crate::command::CommandDescriptor;

/// Name of the built-in version command.
pub const VERSION_COMMAND: &str = "version";

/// Build the default command set for a dispatcher.
pub fn default_commands(name: &str, version: &str) -> HashMap<String, CommandDescriptor> {
    let mut commands = HashMap::new();
    commands.insert(
        VERSION_COMMAND.to_string(),
        version_command(name, version),
    );
    commands
}

fn version_command(name: &str, version: &str) -> CommandDescriptor {
    let line = format!("{name} version {version}\n");
    let version = version.to_string();

    let action = Action::value(move |invocation: Invocation| {
        invocation.stdout.write_str(&line)?;
        Ok(version.clone())
    });

    CommandDescriptor::new(VERSION_COMMAND, action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_contains_version() {
        let commands = default_commands("tool", "1.0.0");
        assert_eq!(commands.len(), 1);

        let version = &commands[VERSION_COMMAND];
        assert_eq!(version.name, "version");
        assert!(version.options.is_empty());
        assert!(!version.action.uses_callback());
    }
}
