//! The `quire` binary: host a dispatcher described by a TOML manifest and run
//! one of its commands.

pub mod actions;
pub mod args;

use std::path::Path;

use anyhow::Context;
use quire::{Cli, CliManifest};
use serde_json::Value;
use tracing::debug;

use crate::args::Args;

/// Build the dispatcher described by `args` and run the requested call.
///
/// Without a command, returns the names of the available commands.
pub async fn run(args: &Args) -> anyhow::Result<Value> {
    let argv = args.argv()?;
    let cli = load(&args.manifest).await?;

    if argv.is_empty() {
        debug!("No command given, listing the commands of {}", cli.name());
        return Ok(Value::from(cli.command_names()));
    }

    Ok(cli.call(argv).await?)
}

/// Read a manifest and build its dispatcher, waiting for its command files.
///
/// Relative command sources are resolved against the manifest's directory.
pub async fn load(manifest: &Path) -> anyhow::Result<Cli> {
    let path = std::path::absolute(manifest)
        .with_context(|| format!("Cannot resolve the manifest path {}", manifest.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("/"));

    let builder = CliManifest::from_file(&path)?
        .with_base_dir(base)
        .into_builder(&actions::bundled())?;

    Ok(Cli::resolved(builder).await?)
}

/// Render a result for the terminal.
pub fn render(value: &Value, pretty: bool) -> anyhow::Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}
