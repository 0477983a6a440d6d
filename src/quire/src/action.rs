//! Actions, their completion styles and the invocation context.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::cli::Cli;
use crate::engine::Outcome;
use crate::error::{CliError, ProtocolViolation, describe, kind_of};
use crate::io::{Input, Output};
use crate::option::Options;

/// Result of an asynchronous action.
pub type ActionResult = Result<Value, anyhow::Error>;

/// Future handed back by an action that completes later.
pub type ActionFuture = BoxFuture<'static, ActionResult>;

type ReturningFn = dyn Fn(Invocation) -> anyhow::Result<Returned> + Send + Sync;
type CallbackFn = dyn Fn(Invocation, Done) -> anyhow::Result<Returned> + Send + Sync;

/// Everything an action receives for one invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Values bound to the command's options.
    pub options: Options,
    /// The dispatcher running this invocation, for composing commands.
    pub cli: Cli,
    pub stdout: Output,
    pub stderr: Output,
    pub stdin: Input,
}

/// What an action body hands back when it returns.
pub enum Returned {
    /// The body returned nothing.
    Nothing,
    /// The body returned a value.
    Value(Value),
    /// The body returned a future settling later.
    Future(ActionFuture),
}

impl Returned {
    /// Wrap a future.
    pub fn future(future: impl Future<Output = ActionResult> + Send + 'static) -> Self {
        Self::Future(Box::pin(future))
    }
}

impl From<Value> for Returned {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<()> for Returned {
    fn from(_: ()) -> Self {
        Self::Nothing
    }
}

impl fmt::Debug for Returned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => f.write_str("Nothing"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Future(_) => f.write_str("Future(..)"),
        }
    }
}

/// The invocable behavior behind a command.
///
/// The completion style is chosen when the action is created: either the
/// body reports its result by returning, or it receives a [`Done`] callback.
#[derive(Clone)]
pub enum Action {
    /// Completes through what the body returns.
    Returning(Arc<ReturningFn>),
    /// Completes through the [`Done`] callback.
    Callback(Arc<CallbackFn>),
}

impl Action {
    /// A returning action with full control over what is returned.
    pub fn returning<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> anyhow::Result<Returned> + Send + Sync + 'static,
    {
        Self::Returning(Arc::new(f))
    }

    /// A callback action with full control over what the body returns.
    ///
    /// A well-behaved body returns [`Returned::Nothing`]; anything else is
    /// reported as a protocol violation.
    pub fn with_callback<F>(f: F) -> Self
    where
        F: Fn(Invocation, Done) -> anyhow::Result<Returned> + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// An action producing its value synchronously.
    pub fn value<F, V>(f: F) -> Self
    where
        F: Fn(Invocation) -> anyhow::Result<V> + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self::returning(move |invocation| f(invocation).map(|value| Returned::Value(value.into())))
    }

    /// An action producing its value from a future.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        Self::returning(move |invocation| Ok(Returned::future(f(invocation))))
    }

    /// An action completing through its callback.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Invocation, Done) + Send + Sync + 'static,
    {
        Self::with_callback(move |invocation, done| {
            f(invocation, done);
            Ok(Returned::Nothing)
        })
    }

    /// Whether the action completes through a callback.
    pub fn uses_callback(&self) -> bool {
        matches!(self, Self::Callback(_))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Returning(_) => f.write_str("Action::Returning"),
            Self::Callback(_) => f.write_str("Action::Callback"),
        }
    }
}

/// One raw argument passed to a [`Done`] callback.
#[derive(Debug)]
pub enum Arg {
    Error(anyhow::Error),
    Value(Value),
}

impl Arg {
    fn render(&self) -> String {
        match self {
            Self::Error(error) => format!("error \"{error}\""),
            Self::Value(value) => describe(value),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Error(error) => Value::String(error.to_string()),
            Self::Value(value) => value,
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<anyhow::Error> for Arg {
    fn from(error: anyhow::Error) -> Self {
        Self::Error(error)
    }
}

/// Completion callback handed to callback-style actions.
///
/// Consumed when called, so it can be called at most once. Calling it from
/// the action body itself, before the body returned, is a protocol violation;
/// dropping it without calling it settles the invocation with a protocol
/// violation too.
pub struct Done {
    sender: Option<oneshot::Sender<Outcome>>,
    returned: Arc<AtomicBool>,
    origin: ThreadId,
    cli: String,
    command: String,
}

impl Done {
    pub(crate) fn new(
        sender: oneshot::Sender<Outcome>,
        returned: Arc<AtomicBool>,
        cli: String,
        command: String,
    ) -> Self {
        Self {
            sender: Some(sender),
            returned,
            origin: thread::current().id(),
            cli,
            command,
        }
    }

    /// Complete with raw callback arguments: an optional error slot followed
    /// by at most one value.
    pub fn call(mut self, args: Vec<Arg>) {
        let in_body =
            !self.returned.load(Ordering::Acquire) && thread::current().id() == self.origin;
        let outcome = if !in_body {
            self.settle(args)
        } else {
            Err(ProtocolViolation::SyncCallback {
                cli: self.cli.clone(),
                command: self.command.clone(),
            }
            .into())
        };
        self.send(outcome);
    }

    /// Complete successfully with a value.
    pub fn ok(self, value: impl Into<Value>) {
        self.call(vec![Arg::Value(Value::Null), Arg::Value(value.into())]);
    }

    /// Complete successfully without a value.
    pub fn finish(self) {
        self.call(Vec::new());
    }

    /// Complete with an error.
    pub fn fail(self, error: impl Into<anyhow::Error>) {
        self.call(vec![Arg::Error(error.into())]);
    }

    fn settle(&self, args: Vec<Arg>) -> Outcome {
        let mut args = args.into_iter();
        match args.next() {
            None => Ok(Value::Null),
            Some(Arg::Error(error)) => Err(CliError::Failed {
                cli: self.cli.clone(),
                command: self.command.clone(),
                error,
            }),
            Some(Arg::Value(Value::Null)) => {
                let values: Vec<Arg> = args.collect();
                if values.len() > 1 {
                    let rendered: Vec<String> = values.iter().map(Arg::render).collect();
                    return Err(ProtocolViolation::TooManyValues {
                        cli: self.cli.clone(),
                        command: self.command.clone(),
                        values: rendered.join(", "),
                    }
                    .into());
                }
                Ok(values
                    .into_iter()
                    .next()
                    .map(Arg::into_value)
                    .unwrap_or(Value::Null))
            }
            Some(Arg::Value(other)) => Err(ProtocolViolation::UnvalidErrorValue {
                cli: self.cli.clone(),
                command: self.command.clone(),
                kind: kind_of(&other).to_string(),
                value: other.to_string(),
            }
            .into()),
        }
    }

    fn send(&mut self, outcome: Outcome) {
        if let Some(sender) = self.sender.take() {
            if let Err(error) = &outcome
                && error.is_protocol_violation()
            {
                tracing::warn!("{}", error);
            }
            // The receiver is gone once the dispatcher already settled the
            // invocation through another path.
            let _ = sender.send(outcome);
        }
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if self.sender.is_some() {
            let violation = ProtocolViolation::CallbackDropped {
                cli: self.cli.clone(),
                command: self.command.clone(),
            };
            self.send(Err(violation.into()));
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("cli", &self.cli)
            .field("command", &self.command)
            .field("pending", &self.sender.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn done(returned: bool) -> (Done, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let flag = Arc::new(AtomicBool::new(returned));
        (Done::new(tx, flag, "tool".into(), "cmd".into()), rx)
    }

    #[test]
    fn test_ok_delivers_value() {
        let (done, mut rx) = done(true);
        done.ok("hello");
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!("hello"));
    }

    #[test]
    fn test_finish_delivers_null() {
        let (done, mut rx) = done(true);
        done.finish();
        assert_eq!(rx.try_recv().unwrap().unwrap(), Value::Null);
    }

    #[test]
    fn test_error_slot_discards_values() {
        let (done, mut rx) = done(true);
        done.call(vec![
            Arg::Error(anyhow::anyhow!("nope")),
            Arg::Value(json!(1)),
            Arg::Value(json!(2)),
        ]);
        let err = rx.try_recv().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "tool cmd error: nope");
    }

    #[test]
    fn test_unvalid_error_value() {
        let (done, mut rx) = done(true);
        done.call(vec![Arg::Value(json!("oops"))]);
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(err.is_protocol_violation());
        let msg = err.to_string();
        assert!(msg.contains("with an unvalid error value"));
        assert!(msg.contains("string \"oops\""));
    }

    #[test]
    fn test_too_many_values_lists_them() {
        let (done, mut rx) = done(true);
        done.call(vec![
            Arg::Value(Value::Null),
            Arg::Value(json!(1)),
            Arg::Value(json!("two")),
        ]);
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(err.is_protocol_violation());
        let msg = err.to_string();
        assert!(msg.contains("with more than one value"));
        assert!(msg.contains("number 1, string \"two\""));
    }

    #[test]
    fn test_call_before_return_is_a_violation() {
        let (done, mut rx) = done(false);
        done.ok(1);
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(
            err,
            CliError::Protocol(ProtocolViolation::SyncCallback { .. })
        ));
    }

    #[test]
    fn test_call_from_another_thread_is_asynchronous() {
        let (done, mut rx) = done(false);
        thread::spawn(move || done.ok(1)).join().unwrap();
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!(1));
    }

    #[test]
    fn test_drop_without_call() {
        let (done, mut rx) = done(true);
        drop(done);
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(
            err,
            CliError::Protocol(ProtocolViolation::CallbackDropped { .. })
        ));
    }

    #[test]
    fn test_action_styles() {
        assert!(!Action::value(|_| Ok(1)).uses_callback());
        assert!(Action::callback(|_, done| done.finish()).uses_callback());
        assert_eq!(format!("{:?}", Action::future(|_| async { Ok(Value::Null) })), "Action::Returning");
    }
}
