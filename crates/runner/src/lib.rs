//! A concurrent application runner that manages long-running processes with graceful shutdown.
//!
//! The runner orchestrates named app processes and cleanup functions, providing:
//! - Concurrent execution of multiple processes
//! - Graceful shutdown on SIGTERM/SIGINT
//! - Configurable cleanup timeout
//! - Automatic cleanup execution regardless of process outcome
//! - An outcome naming the process that failed, for the exit diagnostic
//!
//! # Example
//!
//! ```no_run
//! use weather_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let outcome = Runner::new()
//!         .with_app_process("heartbeat", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("still alive");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("Cleaning up resources");
//!             Ok(())
//!         })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//!
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Type alias for an app process function.
/// Takes a cancellation token and returns a future that resolves to Result<(), anyhow::Error>
pub type AppProcess =
    Box<dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>> + Send>;

/// Type alias for a closer function.
/// Returns a future that resolves to Result<(), anyhow::Error>
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>> + Send>;

/// How the runner finished
#[derive(Debug)]
pub enum RunOutcome {
    /// Every process stopped without error (usually after a shutdown signal)
    Clean,
    /// A process failed or panicked; the remaining ones were cancelled
    Failed {
        process: String,
        error: anyhow::Error,
    },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Clean => 0,
            RunOutcome::Failed { .. } => 1,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, RunOutcome::Clean)
    }
}

/// A concurrent application runner that manages long-running processes with graceful shutdown.
///
/// - App processes run concurrently until one fails or a shutdown signal is received
/// - Closers execute afterward, regardless of process outcome
/// - Signal handling (SIGTERM/SIGINT) implements graceful shutdown
pub struct Runner {
    app_processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Creates a new Runner with a 10 second closer timeout and nothing registered.
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds a named app process to the runner.
    ///
    /// App processes run concurrently. If any process returns an error,
    /// all processes are cancelled and closers are executed. The name is
    /// reported in the outcome and in the fatal log line.
    pub fn with_app_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.app_processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Adds a closer to the runner.
    ///
    /// Closers are executed after all app processes have stopped,
    /// regardless of whether they stopped due to error or cancellation.
    /// All closers will attempt to execute even if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// Sets the timeout for executing closers. Default is 10 seconds.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Sets a custom cancellation token, allowing external control over shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs all app processes and waits for completion or shutdown signal.
    ///
    /// 1. Spawns all app processes concurrently
    /// 2. Monitors for SIGTERM/SIGINT signals
    /// 3. Cancels all processes when a signal is received or any process fails
    /// 4. Waits for the cancelled processes to finish their own draining
    /// 5. Executes all closers with the configured timeout
    pub async fn run(self) -> RunOutcome {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        Self::spawn_signal_handlers(&token);

        let mut outcome = RunOutcome::Clean;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    tracing::debug!(process = %name, "App process completed successfully");
                }
                Ok((name, Err(err))) => {
                    tracing::error!(process = %name, "App process failed: {:#}", err);
                    if outcome.is_clean() {
                        outcome = RunOutcome::Failed {
                            process: name,
                            error: err,
                        };
                    }
                    token.cancel();
                }
                Err(err) => {
                    tracing::error!("App process panicked: {}", err);
                    if outcome.is_clean() {
                        outcome = RunOutcome::Failed {
                            process: "unknown".to_string(),
                            error: anyhow::anyhow!("process panicked: {}", err),
                        };
                    }
                    token.cancel();
                }
            }
        }

        if !self.closers.is_empty() {
            tracing::info!("Running closers with timeout of {:?}", self.closer_timeout);

            match tokio::time::timeout(self.closer_timeout, Self::run_closers(self.closers)).await {
                Ok(()) => tracing::info!("All closers completed"),
                Err(_) => tracing::error!("Closers timed out after {:?}", self.closer_timeout),
            }
        }

        match &outcome {
            RunOutcome::Clean => tracing::info!("Application exiting normally"),
            RunOutcome::Failed { process, error } => {
                tracing::error!(process = %process, "Application exiting with error: {:#}", error)
            }
        }
        outcome
    }

    fn spawn_signal_handlers(token: &CancellationToken) {
        let signal_token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received shutdown signal");
                    signal_token.cancel();
                }
                Err(err) => {
                    tracing::error!("Error setting up signal handler: {}", err);
                }
            }
        });

        #[cfg(unix)]
        {
            let sigterm_token = token.clone();
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                        tracing::info!("Received SIGTERM signal");
                        sigterm_token.cancel();
                    }
                    Err(err) => {
                        tracing::error!("Error setting up SIGTERM handler: {}", err);
                    }
                }
            });
        }
    }

    /// Runs all closers concurrently.
    async fn run_closers(closers: Vec<Closer>) {
        let mut closer_set = JoinSet::new();

        for closer in closers {
            closer_set.spawn(async move { closer().await });
        }

        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => {
                    tracing::debug!("Closer completed successfully");
                }
                Ok(Err(err)) => {
                    tracing::error!("Closer error: {:#}", err);
                }
                Err(err) => {
                    tracing::error!("Closer panicked: {}", err);
                }
            }
        }
    }
}
