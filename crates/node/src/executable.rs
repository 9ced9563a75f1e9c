//! Workers bound to topic handles
//!
//! An [`Executable`] owns one prepared [`Worker`] and the handles it was
//! deployed with. Each start runs the worker as a task; whatever goes wrong
//! inside it, an error or a panic, is reported to an [`ExceptionSink`] and
//! never reaches the host.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use topicmesh_storage::Storage;
use topicmesh_topic::{TopicQueue, WriteableClient};
use tracing::{error, info, warn};

use crate::{Error, TopicHandles};

/// Named string parameters passed to a worker.
pub type Parameters = HashMap<String, String>;

/// Error a worker may fail with.
pub type WorkerError = Box<dyn std::error::Error + Send + Sync>;

/// User logic run against topic handles.
#[async_trait]
pub trait Worker<S: Storage>: Send + Sync + 'static {
    /// Run until done. Cancellation drops the returned future.
    async fn run(
        &self,
        handles: Arc<TopicHandles<S>>,
        parameters: Parameters,
    ) -> Result<(), WorkerError>;
}

/// Where worker failures are reported.
#[async_trait]
pub trait ExceptionSink: Send + Sync + 'static {
    /// Report one failure.
    async fn report(&self, failure: String);
}

#[async_trait]
impl<S: Storage> ExceptionSink for TopicQueue<S> {
    async fn report(&self, failure: String) {
        if let Err(e) = self.put(failure).await {
            error!("failed to record worker failure: {e}");
        }
    }
}

#[async_trait]
impl<S: Storage> ExceptionSink for WriteableClient<S> {
    async fn report(&self, failure: String) {
        if let Err(e) = self.put(failure).await {
            error!("failed to send worker failure: {e}");
        }
    }
}

#[async_trait]
impl ExceptionSink for mpsc::UnboundedSender<String> {
    async fn report(&self, failure: String) {
        if self.send(failure).is_err() {
            warn!("worker failure dropped, receiver gone");
        }
    }
}

#[async_trait]
impl<T: ExceptionSink + ?Sized> ExceptionSink for Arc<T> {
    async fn report(&self, failure: String) {
        (**self).report(failure).await;
    }
}

struct Running {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

/// A worker deployed with its handles.
pub struct Executable<S: Storage> {
    name: String,
    worker: Arc<dyn Worker<S>>,
    handles: Arc<TopicHandles<S>>,
    parameters: Parameters,
    exceptions: Arc<dyn ExceptionSink>,
    running: Mutex<Option<Running>>,
}

impl<S: Storage> Executable<S> {
    /// Prepare `worker` to run against `handles`.
    ///
    /// `parameters` are defaults that each start may override.
    pub fn new(
        name: impl Into<String>,
        worker: Arc<dyn Worker<S>>,
        handles: TopicHandles<S>,
        parameters: Parameters,
        exceptions: Arc<dyn ExceptionSink>,
    ) -> Self {
        Self {
            name: name.into(),
            worker,
            handles: Arc::new(handles),
            parameters,
            exceptions,
            running: Mutex::new(None),
        }
    }

    /// The handles the worker runs against.
    #[must_use]
    pub const fn handles(&self) -> &Arc<TopicHandles<S>> {
        &self.handles
    }

    /// Whether a started worker has not finished yet.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Run the worker in the background.
    ///
    /// `parameters` take precedence over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExecutableRunning`] if a worker is still running.
    pub fn start(&self, parameters: Parameters) -> Result<(), Error> {
        let mut running = self.running.lock();
        if running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
        {
            return Err(Error::ExecutableRunning);
        }

        let mut merged = self.parameters.clone();
        merged.extend(parameters);

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let name = self.name.clone();
        let worker = self.worker.clone();
        let handles = self.handles.clone();
        let exceptions = self.exceptions.clone();

        let task = tokio::spawn(async move {
            let run = AssertUnwindSafe(worker.run(handles, merged)).catch_unwind();
            tokio::select! {
                () = token.cancelled() => info!(executable = %name, "worker cancelled"),
                outcome = run => match outcome {
                    Ok(Ok(())) => info!(executable = %name, "worker finished"),
                    Ok(Err(e)) => {
                        warn!(executable = %name, "worker failed: {e}");
                        exceptions.report(format!("{name}: {e}")).await;
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        warn!(executable = %name, "worker panicked: {message}");
                        exceptions.report(format!("{name}: panicked: {message}")).await;
                    }
                },
            }
        });

        *running = Some(Running { cancel_token, task });
        info!(executable = %self.name, "worker started");
        Ok(())
    }

    /// Ask the running worker to stop.
    pub fn cancel(&self) {
        if let Some(running) = self.running.lock().as_ref() {
            running.cancel_token.cancel();
        }
    }

    /// Wait for the running worker to finish.
    pub async fn wait(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        if let Err(e) = running.task.await {
            error!(executable = %self.name, "worker task failed: {e}");
        }
    }

    /// Cancel the worker, wait for it, and disconnect the handles.
    pub async fn stop(&self) {
        self.cancel();
        self.wait().await;
        self.handles.stop().await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
