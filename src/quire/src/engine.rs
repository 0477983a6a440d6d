//! Dispatch of one call: command lookup, option binding, action invocation
//! and normalization of the action's completion into a single outcome.
//!
//! Per call the engine moves through:
//!
//! ```text
//! lookup -> binding -> invoked -> settled (value | failure | protocol violation)
//! ```
//!
//! Lookup and binding failures settle the call before the action runs. Once
//! invoked, the action's completion style decides which single signal becomes
//! the outcome; any extra or conflicting signal is reported as a
//! [`ProtocolViolation`] instead of a second outcome.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::action::{Action, Done, Invocation, Returned};
use crate::cli::Cli;
use crate::command::{CommandDescriptor, CommandTable};
use crate::error::{CliError, ProtocolViolation, describe};
use crate::option::{Options, coerce};

/// The single normalized result of one call.
pub type Outcome = Result<Value, CliError>;

/// The pending outcome of a call.
///
/// Already settled when the action completed synchronously.
pub struct Dispatch {
    state: DispatchState,
}

enum DispatchState {
    Settled(Option<Outcome>),
    Pending(BoxFuture<'static, Outcome>),
}

impl Dispatch {
    pub(crate) fn settled(outcome: Outcome) -> Self {
        Self {
            state: DispatchState::Settled(Some(outcome)),
        }
    }

    pub(crate) fn pending(future: impl Future<Output = Outcome> + Send + 'static) -> Self {
        Self {
            state: DispatchState::Pending(Box::pin(future)),
        }
    }

    /// Whether the outcome is already known.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, DispatchState::Settled(Some(_)))
    }

    /// The outcome if it is already known, the pending dispatch otherwise.
    pub fn into_settled(self) -> Result<Outcome, Self> {
        match self.state {
            DispatchState::Settled(Some(outcome)) => Ok(outcome),
            state => Err(Self { state }),
        }
    }
}

impl Future for Dispatch {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        match &mut self.get_mut().state {
            DispatchState::Settled(outcome) => match outcome.take() {
                Some(outcome) => Poll::Ready(outcome),
                None => panic!("Dispatch polled after completion"),
            },
            DispatchState::Pending(future) => future.as_mut().poll(cx),
        }
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            DispatchState::Settled(Some(_)) => "settled",
            DispatchState::Settled(None) => "completed",
            DispatchState::Pending(_) => "pending",
        };
        f.debug_tuple("Dispatch").field(&state).finish()
    }
}

/// Run one call against a resolved command table.
pub(crate) fn dispatch(cli: &Cli, table: &CommandTable, argv: Vec<String>) -> Dispatch {
    let mut tokens = argv.into_iter();
    let name = tokens.next().unwrap_or_default();

    let Some(command) = table.get(&name) else {
        return Dispatch::settled(Err(CliError::UnknownCommand {
            cli: cli.name().to_string(),
            command: name,
        }));
    };

    let options = match bind(cli.name(), command, tokens.collect()) {
        Ok(options) => options,
        Err(error) => return Dispatch::settled(Err(error)),
    };

    debug!(
        "Dispatching {} {} with {} options",
        cli.name(),
        command.name,
        options.len()
    );

    let invocation = Invocation {
        options,
        cli: cli.clone(),
        stdout: cli.stdout().clone(),
        stderr: cli.stderr().clone(),
        stdin: cli.stdin().clone(),
    };

    invoke(cli.name(), command, invocation)
}

/// Bind positional tokens to the command's option slots.
pub(crate) fn bind(
    cli: &str,
    command: &CommandDescriptor,
    tokens: Vec<String>,
) -> Result<Options, CliError> {
    let declared = command.options.len();
    if let Some(token) = tokens.get(declared) {
        return Err(CliError::TooManyOptions {
            cli: cli.to_string(),
            command: command.name.clone(),
            allowed: allowed_options(declared),
            token: token.clone(),
            position: declared + 1,
        });
    }

    let mut tokens = tokens.into_iter();
    let mut options = Options::new();

    for spec in &command.options {
        match tokens.next() {
            Some(token) => {
                let value = coerce(spec.kind, &token).ok_or_else(|| CliError::UnvalidNumber {
                    cli: cli.to_string(),
                    command: command.name.clone(),
                    option: spec.name.clone(),
                    token: token.clone(),
                })?;
                options.insert(spec.name.clone(), value);
            }
            // The action applies its own default.
            None if spec.has_default_value => {}
            None => {
                return Err(CliError::MissingOption {
                    cli: cli.to_string(),
                    command: command.name.clone(),
                    option: spec.name.clone(),
                });
            }
        }
    }

    Ok(options)
}

fn allowed_options(count: usize) -> String {
    match count {
        0 => "no option".to_string(),
        1 => "only 1 option".to_string(),
        n => format!("only {n} options"),
    }
}

/// Invoke the action once and classify how it completes.
pub(crate) fn invoke(cli: &str, command: &CommandDescriptor, invocation: Invocation) -> Dispatch {
    let cli = cli.to_string();
    let name = command.name.clone();

    match &command.action {
        Action::Returning(body) => match body(invocation) {
            Err(error) => Dispatch::settled(Err(CliError::Thrown {
                cli,
                command: name,
                error,
            })),
            Ok(Returned::Nothing) => Dispatch::settled(Ok(Value::Null)),
            Ok(Returned::Value(value)) => Dispatch::settled(Ok(value)),
            Ok(Returned::Future(future)) => Dispatch::pending(async move {
                future.await.map_err(|error| CliError::Failed {
                    cli,
                    command: name,
                    error,
                })
            }),
        },
        Action::Callback(body) => {
            let (sender, receiver) = oneshot::channel();
            let returned = Arc::new(AtomicBool::new(false));
            let done = Done::new(sender, Arc::clone(&returned), cli.clone(), name.clone());

            let result = body(invocation, done);
            returned.store(true, Ordering::Release);

            match result {
                Err(error) => Dispatch::settled(Err(CliError::Thrown {
                    cli,
                    command: name,
                    error,
                })),
                Ok(Returned::Future(_)) => violation(ProtocolViolation::CallbackAndFuture {
                    cli,
                    command: name,
                }),
                Ok(Returned::Value(value)) => violation(ProtocolViolation::CallbackAndValue {
                    cli,
                    command: name,
                    value: describe(&value),
                }),
                Ok(Returned::Nothing) => Dispatch::pending(async move {
                    match receiver.await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(ProtocolViolation::CallbackDropped { cli, command: name }.into()),
                    }
                }),
            }
        }
    }
}

fn violation(violation: ProtocolViolation) -> Dispatch {
    warn!("{}", violation);
    Dispatch::settled(Err(violation.into()))
}
