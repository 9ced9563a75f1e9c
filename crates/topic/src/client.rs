//! Dialing side of a topic endpoint

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::role::{StreamRole, run_session};
use crate::socket::ClientSocket;
use crate::{Error, TopicAddress, TopicConfig};

/// Dials one remote endpoint and runs a role session over it.
#[derive(Debug)]
pub struct TopicClient<R: StreamRole> {
    pub(crate) role: R,
    address: TopicAddress,
    config: TopicConfig,
    running: Mutex<Option<Running>>,
}

#[derive(Debug)]
struct Running {
    shutdown_token: CancellationToken,
    session: JoinHandle<()>,
}

impl<R: StreamRole> TopicClient<R> {
    /// Create a client for `role` that will dial `address` when started.
    ///
    /// A group in the address path is sent to the server, local reads on
    /// the client use the no-group cursor.
    #[must_use]
    pub const fn new(role: R, address: TopicAddress, config: TopicConfig) -> Self {
        Self {
            role,
            address,
            config,
            running: Mutex::new(None),
        }
    }

    /// The role the session runs.
    #[must_use]
    pub const fn role(&self) -> &R {
        &self.role
    }

    /// The remote address.
    #[must_use]
    pub const fn address(&self) -> &TopicAddress {
        &self.address
    }

    /// Whether the session is still running.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.session.is_finished())
    }

    /// Dial the remote endpoint, returning once the handshake completed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if a session is running, or an
    /// error if the handshake fails or times out.
    pub async fn start(&self) -> Result<(), Error> {
        if self.running.lock().is_some() {
            return Err(Error::AlreadyStarted);
        }

        let (stream, _) =
            tokio::time::timeout(self.config.connect_timeout, connect_async(self.address.as_str()))
                .await
                .map_err(|_| Error::ConnectTimeout(self.address.to_string()))?
                .map_err(|e| Error::Connect {
                    address: self.address.to_string(),
                    reason: e.to_string(),
                })?;

        let shutdown_token = CancellationToken::new();
        let role = self.role.clone();
        let token = shutdown_token.clone();
        let close_timeout = self.config.close_timeout;

        let mut running = self.running.lock();
        if running.is_some() {
            return Err(Error::AlreadyStarted);
        }
        *running = Some(Running {
            shutdown_token,
            session: tokio::spawn(async move {
                let mut socket = ClientSocket::new(stream);
                run_session(&role, &mut socket, None, &token, close_timeout).await;
            }),
        });
        drop(running);

        info!(
            topic = self.role.topic(),
            kind = self.role.kind(),
            "client connected to {}",
            self.address
        );
        Ok(())
    }

    /// Say goodbye to the peer, close the socket and join the session.
    ///
    /// A writeable client first sends the records still queued for its
    /// peer, for at most `close_timeout`. Does nothing if the client is not
    /// running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        running.shutdown_token.cancel();
        if let Err(e) = running.session.await {
            warn!(topic = self.role.topic(), "client session panicked: {e}");
        }

        info!(
            topic = self.role.topic(),
            kind = self.role.kind(),
            "client disconnected from {}",
            self.address
        );
    }
}

impl<R: StreamRole> Drop for TopicClient<R> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.shutdown_token.cancel();
        }
    }
}
