//! The dispatcher handle and its builder.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::command::{CommandDescriptor, CommandTable};
use crate::config::{Version, validate_name, validate_version};
use crate::defaults::default_commands;
use crate::engine::{self, Dispatch, Outcome};
use crate::error::{CliError, ConfigError};
use crate::io::{Input, Output};
use crate::loader::{CommandFileLoader, ModuleLoader};
use crate::resolve::{self, Declaration};
use crate::source::{FsGlob, GlobLister};

/// A call issued before command resolution completed.
struct Queued {
    argv: Vec<String>,
    reply: oneshot::Sender<Outcome>,
}

enum State {
    /// Command files are still loading; calls wait in issue order.
    Resolving(VecDeque<Queued>),
    Ready(Arc<CommandTable>),
    Failed(Arc<ConfigError>),
}

struct Inner {
    name: String,
    version: String,
    stdin: Input,
    stdout: Output,
    stderr: Output,
    state: Mutex<State>,
    resolved: watch::Sender<bool>,
}

/// A built dispatcher.
///
/// Cheap to clone; every clone dispatches against the same commands and
/// streams.
#[derive(Clone)]
pub struct Cli {
    inner: Arc<Inner>,
}

impl Cli {
    /// Start configuring a dispatcher.
    pub fn builder(name: impl Into<String>) -> CliBuilder {
        CliBuilder::new(name)
    }

    /// Build a dispatcher and wait for its command files to be resolved.
    pub async fn resolved(builder: CliBuilder) -> Result<Self, CliError> {
        let cli = builder.build()?;
        cli.ready().await?;
        Ok(cli)
    }

    /// The cli name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The cli version.
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// Shared standard input handed to every action.
    pub fn stdin(&self) -> &Input {
        &self.inner.stdin
    }

    /// Shared standard output handed to every action.
    pub fn stdout(&self) -> &Output {
        &self.inner.stdout
    }

    /// Shared standard error handed to every action.
    pub fn stderr(&self) -> &Output {
        &self.inner.stderr
    }

    /// Whether command files are still being resolved.
    pub fn is_resolving(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Resolving(_))
    }

    /// Names of every callable command, built-in ones included.
    ///
    /// Empty while command files are still being resolved.
    pub fn command_names(&self) -> Vec<String> {
        match &*self.inner.state.lock() {
            State::Ready(table) => table.names(),
            _ => Vec::new(),
        }
    }

    /// Wait for command resolution and report its failure, if any.
    pub async fn ready(&self) -> Result<(), CliError> {
        self.wait_resolution().await;
        match &*self.inner.state.lock() {
            State::Failed(error) => Err(CliError::Config(Arc::clone(error))),
            _ => Ok(()),
        }
    }

    async fn wait_resolution(&self) {
        let mut resolved = self.inner.resolved.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = resolved.wait_for(|done| *done).await;
    }

    /// Dispatch a call and get its outcome as a future.
    ///
    /// The first token names the command, the remaining ones are bound to its
    /// options. When the commands are resolved, the action starts before this
    /// method returns; otherwise the call is queued behind earlier ones.
    pub fn call<I, S>(&self, argv: I) -> Dispatch
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();

        let table = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Ready(table) => Arc::clone(table),
                State::Failed(error) => {
                    return Dispatch::settled(Err(CliError::Config(Arc::clone(error))));
                }
                State::Resolving(queue) => {
                    let (reply, receiver) = oneshot::channel();
                    queue.push_back(Queued { argv, reply });
                    debug!(
                        "Queued call to {} until its commands are resolved ({} waiting)",
                        self.inner.name,
                        queue.len()
                    );
                    let cli = self.inner.name.clone();
                    return Dispatch::pending(async move {
                        receiver
                            .await
                            .unwrap_or_else(|_| Err(CliError::Interrupted { cli }))
                    });
                }
            }
        };

        engine::dispatch(self, &table, argv)
    }

    /// Dispatch a call and deliver its outcome to `callback`.
    ///
    /// The callback fires exactly once: right away when the outcome is
    /// already known, otherwise from a task on the current tokio runtime.
    /// Outside a runtime, a thread drives the call on a runtime of its own.
    pub fn call_with<I, S, F>(&self, argv: I, callback: F)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(Outcome) + Send + 'static,
    {
        let dispatch = match self.call(argv).into_settled() {
            Ok(outcome) => {
                callback(outcome);
                return;
            }
            Err(dispatch) => dispatch,
        };

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { callback(dispatch.await) });
            }
            Err(_) => {
                debug!("No tokio runtime, driving the call on a dedicated thread");
                let cli = self.inner.name.clone();
                std::thread::spawn(move || {
                    let outcome = match Builder::new_current_thread().enable_all().build() {
                        Ok(runtime) => runtime.block_on(dispatch),
                        Err(source) => Err(CliError::Runtime { cli, source }),
                    };
                    callback(outcome);
                });
            }
        }
    }

    fn finish_resolution(&self, result: Result<CommandTable, ConfigError>) {
        match result {
            Ok(table) => {
                info!(
                    "Resolved {} commands for {}",
                    table.len(),
                    self.inner.name
                );
                self.drain(Arc::new(table));
            }
            Err(error) => {
                warn!("Command resolution failed for {}: {}", self.inner.name, error);
                let error = Arc::new(error);
                let previous =
                    std::mem::replace(&mut *self.inner.state.lock(), State::Failed(Arc::clone(&error)));
                if let State::Resolving(queue) = previous {
                    for queued in queue {
                        let _ = queued.reply.send(Err(CliError::Config(Arc::clone(&error))));
                    }
                }
            }
        }
        self.inner.resolved.send_replace(true);
    }

    /// Run queued calls in issue order, then open the dispatcher.
    ///
    /// Calls issued while draining are queued behind the ones already
    /// waiting, so issue order holds across the switch.
    fn drain(&self, table: Arc<CommandTable>) {
        loop {
            let next = {
                let mut state = self.inner.state.lock();
                let next = match &mut *state {
                    State::Resolving(queue) => queue.pop_front(),
                    _ => None,
                };
                if next.is_none() {
                    *state = State::Ready(Arc::clone(&table));
                }
                next
            };

            let Some(Queued { argv, reply }) = next else {
                break;
            };

            match engine::dispatch(self, &table, argv).into_settled() {
                Ok(outcome) => {
                    let _ = reply.send(outcome);
                }
                Err(dispatch) => {
                    tokio::spawn(async move {
                        let _ = reply.send(dispatch.await);
                    });
                }
            }
        }
    }
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .finish_non_exhaustive()
    }
}

/// Configuration of a [`Cli`].
pub struct CliBuilder {
    name: String,
    version: Option<Version>,
    stdin: Option<Input>,
    stdout: Option<Output>,
    stderr: Option<Output>,
    declarations: Vec<Declaration>,
    loader: Arc<dyn CommandFileLoader>,
    globber: Arc<dyn GlobLister>,
}

impl CliBuilder {
    /// Create a builder for a cli called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            stdin: None,
            stdout: None,
            stderr: None,
            declarations: Vec::new(),
            loader: Arc::new(ModuleLoader::new()),
            globber: Arc::new(FsGlob),
        }
    }

    /// Set the version reported by the built-in `version` command.
    pub fn version(mut self, version: impl Into<Version>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Replace the process standard input.
    pub fn stdin(mut self, stdin: Input) -> Self {
        self.stdin = Some(stdin);
        self
    }

    /// Replace the process standard output.
    pub fn stdout(mut self, stdout: Output) -> Self {
        self.stdout = Some(stdout);
        self
    }

    /// Replace the process standard error.
    pub fn stderr(mut self, stderr: Output) -> Self {
        self.stderr = Some(stderr);
        self
    }

    /// Declare an inline command.
    pub fn command(mut self, command: CommandDescriptor) -> Self {
        self.declarations.push(Declaration::Inline(command));
        self
    }

    /// Declare an absolute command file path or an absolute glob.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.declarations.push(Declaration::Source(source.into()));
        self
    }

    /// Use another loader for command files.
    pub fn loader(mut self, loader: impl CommandFileLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// Use another glob expansion.
    pub fn globber(mut self, globber: impl GlobLister + 'static) -> Self {
        self.globber = Arc::new(globber);
        self
    }

    /// Validate the configuration and build the dispatcher.
    ///
    /// Every problem detectable without reading command files is reported
    /// here. Command files are then resolved on the current tokio runtime;
    /// see [`Cli::ready`].
    pub fn build(self) -> Result<Cli, ConfigError> {
        let name = validate_name(&self.name)?;
        let version = validate_version(self.version.as_ref())?;

        let plan = resolve::plan(self.declarations, self.globber.as_ref())?;
        let defaults = default_commands(&name, &version);

        let runtime = if plan.has_pending() {
            Some(Handle::try_current().map_err(|_| ConfigError::NoRuntime)?)
        } else {
            None
        };

        let (resolved, _) = watch::channel(false);
        let cli = Cli {
            inner: Arc::new(Inner {
                name,
                version,
                stdin: self.stdin.unwrap_or_else(Input::stdin),
                stdout: self.stdout.unwrap_or_else(Output::stdout),
                stderr: self.stderr.unwrap_or_else(Output::stderr),
                state: Mutex::new(State::Resolving(VecDeque::new())),
                resolved,
            }),
        };

        match runtime {
            None => {
                let table = CommandTable::new(plan.into_commands(), defaults);
                info!("Built {} with {} commands", cli.name(), table.len());
                *cli.inner.state.lock() = State::Ready(Arc::new(table));
                cli.inner.resolved.send_replace(true);
            }
            Some(handle) => {
                debug!("Resolving command files of {}", cli.name());
                let loader = self.loader;
                let resolving = cli.clone();
                handle.spawn(async move {
                    let resolution = AssertUnwindSafe(resolve::resolve(plan, loader))
                        .catch_unwind()
                        .await;
                    let result = match resolution {
                        Ok(result) => result.map(|commands| CommandTable::new(commands, defaults)),
                        Err(payload) => Err(ConfigError::ResolutionPanicked {
                            message: panic_message(&*payload),
                        }),
                    };
                    resolving.finish_resolution(result);
                });
            }
        }

        Ok(cli)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for CliBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliBuilder")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("declarations", &self.declarations.len())
            .finish_non_exhaustive()
    }
}
