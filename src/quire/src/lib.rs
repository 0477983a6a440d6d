//! Declarative command dispatcher for building command-line tools.
//!
//! A host application describes its commands (inline, as command files, or as
//! globs matching many command files) and receives a [`Cli`] handle. Each call
//! into the handle picks a command from the first token, binds the remaining
//! tokens to the command's positional options, runs the command's action and
//! normalizes however the action completes into a single outcome.
//!
//! # Actions
//!
//! An action is registered with one of two explicit completion styles:
//!
//! - **Returning**: the body hands back nothing, a value, or a future.
//! - **Callback**: the body receives a [`Done`] handle and must call it
//!   asynchronously, after the body itself returned.
//!
//! Misuse of either style (calling `Done` before returning, returning a value
//! or a future alongside a callback, passing a non-error as the error slot...)
//! surfaces as a [`ProtocolViolation`], distinct from ordinary failures.
//!
//! ```rust,ignore
//! use quire::{Action, Cli, CommandDescriptor, OptionSpec};
//!
//! let cli = Cli::builder("greeter")
//!     .version("1.2.0")
//!     .command(
//!         CommandDescriptor::new(
//!             "hello",
//!             Action::value(|inv| Ok(format!("hello {}", inv.options.get_str("who").unwrap_or("you")))),
//!         )
//!         .with_option(OptionSpec::new("who").with_default()),
//!     )
//!     .build()?;
//!
//! let greeting = cli.call(["hello", "world"]).await?;
//! ```
//!
//! # Command files
//!
//! Absolute paths and absolute globs are resolved asynchronously through a
//! [`CommandFileLoader`] once the dispatcher is built. Calls issued before the
//! resolution completes are queued and run in the order they were issued.
//!
//! # Manifests
//!
//! [`CliManifest`] reads the same configuration from TOML, binding inline
//! commands to actions registered in an [`ActionTable`].

mod action;
mod cli;
mod command;
mod config;
pub mod defaults;
mod engine;
mod error;
mod io;
pub mod loader;
mod manifest;
mod option;
mod resolve;
pub mod source;

pub use action::{Action, ActionFuture, ActionResult, Arg, Done, Invocation, Returned};
pub use cli::{Cli, CliBuilder};
pub use command::CommandDescriptor;
pub use config::{UNVERSIONED, Version};
pub use engine::{Dispatch, Outcome};
pub use error::{CliError, ConfigError, DeclarationSite, ProtocolViolation};
pub use io::{Buffer, Input, Output};
pub use loader::{CommandFileLoader, Export, LoadedCommand, LoaderError, ModuleLoader};
pub use manifest::{ActionTable, CliManifest, CommandEntry, StreamSetting};
pub use option::{OptionKind, OptionSpec, Options};
pub use source::{FsGlob, GlobLister};

/// Re-export common types for convenience.
pub mod prelude {
    pub use crate::{
        Action, Arg, Cli, CliBuilder, CliError, CommandDescriptor, ConfigError, Done, Invocation,
        OptionSpec, Output, Returned,
    };
}
