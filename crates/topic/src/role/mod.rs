//! Stream roles and the session loop that drives them
//!
//! A role owns the protocol state machine of one side of a topic stream. The
//! connection kind (server or client) only supplies sockets; [`run_session`]
//! feeds each socket's frames to the role until either side stops.

mod redeable;
mod writeable;

pub use redeable::{Redeable, RedeableSession};
pub use writeable::{Writeable, WriteableSession, WriteableState};

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::Error;
use crate::frame::Frame;
use crate::socket::{CloseReason, FrameSocket, Incoming};

/// Whether a session keeps reading after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Read the next frame.
    Continue,
    /// End the session.
    Stop,
}

/// Protocol half of a topic endpoint.
#[async_trait]
pub trait StreamRole: Clone + Debug + Send + Sync + 'static {
    /// Per-connection state.
    type Session: Send;

    /// Short role name used in logs.
    fn kind(&self) -> &'static str;

    /// Name of the topic this role serves.
    fn topic(&self) -> &str;

    /// Set up a freshly opened connection reading as `group`.
    async fn connect(
        &self,
        socket: &mut dyn FrameSocket,
        group: Option<String>,
    ) -> Result<Self::Session, Error>;

    /// Handle one frame from the peer.
    async fn process(
        &self,
        session: &mut Self::Session,
        socket: &mut dyn FrameSocket,
        frame: Frame,
    ) -> Result<Flow, Error>;

    /// Flush what the peer is still owed once shutdown has begun.
    ///
    /// Runs before [`StreamRole::disconnect`] when the local side stops,
    /// bounded by the close timeout. Does nothing by default.
    async fn drain(
        &self,
        _session: &mut Self::Session,
        _socket: &mut dyn FrameSocket,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Tear down a session, the socket may already be closed.
    async fn disconnect(
        &self,
        session: Self::Session,
        socket: &mut dyn FrameSocket,
    ) -> Result<(), Error>;
}

/// Run one connection until the peer leaves, the role stops, or `shutdown`
/// fires. The socket is always closed on return.
pub(crate) async fn run_session<R, F>(
    role: &R,
    socket: &mut F,
    group: Option<String>,
    shutdown: &CancellationToken,
    close_timeout: Duration,
) where
    R: StreamRole,
    F: FrameSocket,
{
    let topic = role.topic();
    let kind = role.kind();
    debug!(topic, kind, ?group, "session opened");

    let mut session = match role.connect(&mut *socket, group).await {
        Ok(session) => session,
        Err(e) => {
            error!(topic, kind, "failed to open session: {e}");
            close(socket, CloseReason::Normal, close_timeout).await;
            return;
        }
    };

    let mut reason = CloseReason::Normal;
    loop {
        let incoming = tokio::select! {
            () = shutdown.cancelled() => {
                reason = CloseReason::GoingAway;
                break;
            }
            incoming = socket.next_frame() => incoming,
        };

        let frame = match incoming {
            Incoming::Text(text) => Frame::parse(text),
            Incoming::Closed => {
                debug!(topic, kind, "peer closed the connection");
                break;
            }
            Incoming::Unsupported(frame) => {
                warn!(topic, kind, "unsupported {frame} frame, ending session");
                break;
            }
            Incoming::Failed(e) => {
                error!(topic, kind, "transport failed: {e}");
                break;
            }
        };

        let flow = tokio::select! {
            () = shutdown.cancelled() => {
                reason = CloseReason::GoingAway;
                break;
            }
            flow = role.process(&mut session, &mut *socket, frame) => flow,
        };

        match flow {
            Ok(Flow::Continue) => {}
            Ok(Flow::Stop) => break,
            Err(e) => {
                error!(topic, kind, "session failed: {e}");
                break;
            }
        }
    }

    if reason == CloseReason::GoingAway {
        match tokio::time::timeout(close_timeout, role.drain(&mut session, &mut *socket)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(topic, kind, "drain failed: {e}"),
            Err(_) => warn!(topic, kind, "drain timed out after {close_timeout:?}"),
        }
    }

    if let Err(e) = role.disconnect(session, &mut *socket).await {
        debug!(topic, kind, "disconnect handshake failed: {e}");
    }
    close(socket, reason, close_timeout).await;
    debug!(topic, kind, "session closed");
}

async fn close<F: FrameSocket>(socket: &mut F, reason: CloseReason, close_timeout: Duration) {
    match tokio::time::timeout(close_timeout, socket.close(reason)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("close handshake failed: {e}"),
        Err(_) => debug!("close handshake timed out after {close_timeout:?}"),
    }
}
