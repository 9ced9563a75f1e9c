//! Listening side of a topic endpoint

use std::future::IntoFuture;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::role::{StreamRole, run_session};
use crate::socket::ServerSocket;
use crate::{Error, TopicAddress, TopicConfig};

/// Accepts any number of peers and runs a role session for each.
///
/// The first path segment of the request URL becomes the session's group.
#[derive(Debug)]
pub struct TopicServer<R: StreamRole> {
    pub(crate) role: R,
    configured: TopicAddress,
    config: TopicConfig,
    running: Mutex<Option<Running>>,
}

#[derive(Debug)]
struct Running {
    local_addr: SocketAddr,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

#[derive(Clone)]
struct Accept<R: StreamRole> {
    role: R,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
    config: TopicConfig,
}

impl<R: StreamRole> TopicServer<R> {
    /// Create a server for `role` that will bind `address` when started.
    ///
    /// Use port 0 to bind an ephemeral port.
    #[must_use]
    pub const fn new(role: R, address: TopicAddress, config: TopicConfig) -> Self {
        Self {
            role,
            configured: address,
            config,
            running: Mutex::new(None),
        }
    }

    /// The role sessions run.
    #[must_use]
    pub const fn role(&self) -> &R {
        &self.role
    }

    /// Whether the listener is bound.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// The reachable address while bound, the configured one otherwise.
    #[must_use]
    pub fn address(&self) -> TopicAddress {
        match self.running.lock().as_ref() {
            Some(running) => self.configured.with_socket_addr(running.local_addr),
            None => self.configured.clone(),
        }
    }

    /// Bind the listener and start accepting peers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the server is running, or an
    /// error if the address cannot be resolved or bound.
    pub async fn start(&self) -> Result<(), Error> {
        if self.is_running() {
            return Err(Error::AlreadyStarted);
        }

        let listen_addr = self.configured.resolve().await?;
        let listener = tokio::net::TcpListener::bind(listen_addr)
            .await
            .map_err(Error::Bind)?;
        let local_addr = listener.local_addr().map_err(Error::Bind)?;

        let shutdown_token = CancellationToken::new();
        let task_tracker = TaskTracker::new();

        let router = Router::new()
            .route("/", get(accept_root::<R>))
            .route("/{group}", get(accept_group::<R>))
            .with_state(Accept {
                role: self.role.clone(),
                shutdown_token: shutdown_token.clone(),
                task_tracker: task_tracker.clone(),
                config: self.config,
            });

        {
            let mut running = self.running.lock();
            if running.is_some() {
                return Err(Error::AlreadyStarted);
            }
            *running = Some(Running {
                local_addr,
                shutdown_token: shutdown_token.clone(),
                task_tracker: task_tracker.clone(),
            });
        }

        let topic = self.role.topic().to_string();
        let kind = self.role.kind();
        task_tracker.spawn(async move {
            tokio::select! {
                e = axum::serve(listener, router.into_make_service()).into_future() => {
                    info!(topic = %topic, kind, "listener exited {:?}", e);
                }
                () = shutdown_token.cancelled() => {}
            };
        });

        info!(
            topic = self.role.topic(),
            kind,
            "server listening on {}",
            self.address()
        );
        Ok(())
    }

    /// Close every session, then the listener, and forget the bound address.
    ///
    /// Does nothing if the server is not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        info!(topic = self.role.topic(), kind = self.role.kind(), "server shutting down...");

        running.shutdown_token.cancel();
        running.task_tracker.close();
        running.task_tracker.wait().await;

        info!(topic = self.role.topic(), kind = self.role.kind(), "server shutdown");
    }
}

impl<R: StreamRole> Drop for TopicServer<R> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.shutdown_token.cancel();
        }
    }
}

impl<R: StreamRole> Accept<R> {
    fn upgrade(self, ws: WebSocketUpgrade, group: Option<String>) -> Response {
        ws.on_upgrade(move |socket| {
            let task_tracker = self.task_tracker.clone();
            task_tracker.track_future(async move {
                let mut socket = ServerSocket::new(socket);
                run_session(
                    &self.role,
                    &mut socket,
                    group,
                    &self.shutdown_token,
                    self.config.close_timeout,
                )
                .await;
            })
        })
    }
}

async fn accept_root<R: StreamRole>(
    State(accept): State<Accept<R>>,
    ws: WebSocketUpgrade,
) -> Response {
    accept.upgrade(ws, None)
}

async fn accept_group<R: StreamRole>(
    State(accept): State<Accept<R>>,
    Path(group): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    accept.upgrade(ws, Some(group))
}
