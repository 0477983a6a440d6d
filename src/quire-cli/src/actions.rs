//! Actions bundled with the binary, available to manifest commands by name.

use std::time::Duration;

use anyhow::Context;
use quire::{Action, ActionTable, Invocation};
use serde_json::{Value, json};

/// Default delay of the `wait` action, in milliseconds.
const DEFAULT_WAIT_MS: u64 = 10;

/// Every bundled action.
pub fn bundled() -> ActionTable {
    ActionTable::new()
        .with("echo", Action::value(echo))
        .with("sum", Action::value(sum))
        .with("wait", Action::future(wait))
        .with("later", Action::callback(later))
        .with("lines", Action::value(lines))
}

/// Write the `text` option to stdout and return it.
///
/// Without a `text` option, every option value is written in declared order.
fn echo(invocation: Invocation) -> anyhow::Result<Value> {
    let text = match invocation.options.get_str("text") {
        Some(text) => text.to_string(),
        None => invocation
            .options
            .iter()
            .map(|(_, value)| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
    };
    invocation.stdout.write_str(&format!("{text}\n"))?;
    Ok(Value::String(text))
}

/// Add every numeric option.
fn sum(invocation: Invocation) -> anyhow::Result<Value> {
    let mut total = 0.0;
    for (name, value) in invocation.options.iter() {
        total += value
            .as_f64()
            .with_context(|| format!("option {name} is not a number"))?;
    }

    if total.fract() == 0.0 && total.abs() < i64::MAX as f64 {
        Ok(json!(total as i64))
    } else {
        Ok(json!(total))
    }
}

/// Sleep for `ms` milliseconds, then return the delay.
async fn wait(invocation: Invocation) -> quire::ActionResult {
    let ms = match invocation.options.get("ms") {
        None => DEFAULT_WAIT_MS,
        Some(value) => value
            .as_u64()
            .with_context(|| format!("cannot wait for {value} milliseconds"))?,
    };
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(json!(ms))
}

/// Hand the options back through the completion callback, from another thread.
fn later(invocation: Invocation, done: quire::Done) {
    let options = invocation.options.into_value();
    std::thread::spawn(move || done.ok(options));
}

/// Read stdin and return its lines.
fn lines(invocation: Invocation) -> anyhow::Result<Value> {
    let mut lines = Vec::new();
    while let Some(line) = invocation.stdin.read_line()? {
        lines.push(Value::String(line));
    }
    Ok(Value::Array(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quire::{Cli, CliError, CommandDescriptor, Input, OptionSpec, Output};

    fn cli(stdout: Output, stdin: Input) -> Cli {
        let actions = bundled();
        let action = |name: &str| actions.get(name).cloned().unwrap();
        Cli::builder("demo")
            .stdout(stdout)
            .stdin(stdin)
            .command(
                CommandDescriptor::new("echo", action("echo")).with_option(OptionSpec::new("text")),
            )
            .command(CommandDescriptor::new("add", action("sum")).with_options([
                OptionSpec::new("a").number(),
                OptionSpec::new("b").number().with_default(),
            ]))
            .command(
                CommandDescriptor::new("wait", action("wait"))
                    .with_option(OptionSpec::new("ms").number().with_default()),
            )
            .command(
                CommandDescriptor::new("later", action("later"))
                    .with_option(OptionSpec::new("x").with_default()),
            )
            .command(CommandDescriptor::new("lines", action("lines")))
            .build()
            .unwrap()
    }

    fn quiet() -> Cli {
        cli(Output::null(), Input::empty())
    }

    #[tokio::test]
    async fn test_echo_writes_stdout() {
        let (stdout, buffer) = Output::buffer();
        let cli = cli(stdout, Input::empty());

        let value = cli.call(["echo", "hello"]).await.unwrap();
        assert_eq!(value, json!("hello"));
        assert_eq!(buffer.contents(), "hello\n");
    }

    #[tokio::test]
    async fn test_echo_joins_options_in_declared_order() {
        let (stdout, buffer) = Output::buffer();
        let cli = Cli::builder("demo")
            .stdout(stdout)
            .command(
                CommandDescriptor::new("say", bundled().get("echo").cloned().unwrap())
                    .with_options([
                        OptionSpec::new("zeta"),
                        OptionSpec::new("mid").number(),
                        OptionSpec::new("alpha"),
                    ]),
            )
            .build()
            .unwrap();

        let value = cli.call(["say", "first", "2", "last"]).await.unwrap();
        assert_eq!(value, json!("first 2 last"));
        assert_eq!(buffer.contents(), "first 2 last\n");
    }

    #[tokio::test]
    async fn test_sum() {
        let cli = quiet();
        assert_eq!(cli.call(["add", "2", "40"]).await.unwrap(), json!(42));
        assert_eq!(cli.call(["add", "1.5"]).await.unwrap(), json!(1.5));
    }

    #[tokio::test]
    async fn test_wait() {
        let cli = quiet();
        assert_eq!(cli.call(["wait", "5"]).await.unwrap(), json!(5));
        assert_eq!(cli.call(["wait"]).await.unwrap(), json!(DEFAULT_WAIT_MS));

        let err = cli.call(["wait", "-1"]).await.unwrap_err();
        assert!(matches!(err, CliError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_later_uses_callback() {
        let cli = quiet();
        let value = cli.call(["later", "y"]).await.unwrap();
        assert_eq!(value, json!({"x": "y"}));
    }

    #[tokio::test]
    async fn test_lines_reads_stdin() {
        let cli = cli(Output::null(), Input::from_text("one\ntwo\n"));
        assert_eq!(cli.call(["lines"]).await.unwrap(), json!(["one", "two"]));
    }

    #[test]
    fn test_bundled_names() {
        assert_eq!(bundled().names(), vec!["echo", "later", "lines", "sum", "wait"]);
    }
}
