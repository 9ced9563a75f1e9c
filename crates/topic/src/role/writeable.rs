use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use topicmesh_storage::Storage;
use tracing::{debug, info, warn};

use super::{Flow, StreamRole};
use crate::frame::Frame;
use crate::queue::TopicQueue;
use crate::socket::{FrameSocket, Incoming};
use crate::{Error, TopicConfig};

/// Producer-facing role: hands queued records to peers that ask for them.
///
/// Records only leave when a peer grants credit with a ready frame, so
/// [`Writeable::put`] never waits on the network.
#[derive(Clone, Debug)]
pub struct Writeable<S: Storage> {
    topic: Arc<str>,
    queue: Arc<TopicQueue<S>>,
    ready_timeout: Duration,
    ready_peers: Arc<watch::Sender<usize>>,
}

/// Where a writeable session is in the credit exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteableState {
    /// Waiting for the peer to ask for a record.
    AwaitReady,
    /// Waiting for a record to send.
    Sending,
    /// The peer is gone.
    Closed,
}

/// Per-peer state of a [`Writeable`].
#[derive(Debug)]
pub struct WriteableSession {
    group: Option<String>,
    state: WriteableState,
    announced: bool,
}

impl WriteableSession {
    /// The group this peer reads as.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Current protocol state.
    #[must_use]
    pub const fn state(&self) -> WriteableState {
        self.state
    }
}

impl<S: Storage> Writeable<S> {
    /// Create the role and register the no-group cursor so records put
    /// before any peer connects are kept.
    ///
    /// # Errors
    ///
    /// Fails if the queue cannot read its log.
    pub async fn new(
        topic: impl Into<String>,
        queue: Arc<TopicQueue<S>>,
        config: &TopicConfig,
    ) -> Result<Self, Error> {
        queue.setup(None).await?;
        let (ready_peers, _) = watch::channel(0);

        Ok(Self {
            topic: Arc::from(topic.into()),
            queue,
            ready_timeout: config.ready_timeout,
            ready_peers: Arc::new(ready_peers),
        })
    }

    /// Queue a record for the next peer that asks.
    ///
    /// # Errors
    ///
    /// Fails if the log rejects the append.
    pub async fn put(&self, record: impl Into<String> + Send) -> Result<u64, Error> {
        self.queue.put(record.into()).await
    }

    /// The queue records are served from.
    #[must_use]
    pub const fn queue(&self) -> &Arc<TopicQueue<S>> {
        &self.queue
    }

    /// Connected peers that have asked for a record at least once.
    #[must_use]
    pub fn ready_peers(&self) -> usize {
        *self.ready_peers.borrow()
    }

    /// Wait until at least `count` peers are ready.
    pub async fn wait_for_peers(&self, count: usize) {
        let mut peers = self.ready_peers.subscribe();
        let _ = peers.wait_for(|ready| *ready >= count).await;
    }

    fn announce(&self, session: &mut WriteableSession) {
        if !session.announced {
            session.announced = true;
            self.ready_peers.send_modify(|ready| *ready += 1);
        }
    }

    async fn send_next(
        &self,
        session: &mut WriteableSession,
        socket: &mut dyn FrameSocket,
    ) -> Result<Flow, Error> {
        session.state = WriteableState::Sending;

        loop {
            tokio::select! {
                incoming = socket.next_frame() => match incoming {
                    Incoming::Text(text) => match Frame::parse(text) {
                        Frame::Close => {
                            debug!(topic = %self.topic, "peer has no more capacity");
                            session.state = WriteableState::Closed;
                            return Ok(Flow::Stop);
                        }
                        Frame::Ready => debug!(topic = %self.topic, "duplicate ready ignored"),
                        Frame::Payload(_) => {
                            warn!(topic = %self.topic, "peer sent a record to a writeable, ignoring");
                        }
                    },
                    Incoming::Closed => {
                        session.state = WriteableState::Closed;
                        return Ok(Flow::Stop);
                    }
                    Incoming::Unsupported(frame) => {
                        warn!(topic = %self.topic, "unsupported {frame} frame, ending session");
                        session.state = WriteableState::Closed;
                        return Ok(Flow::Stop);
                    }
                    Incoming::Failed(e) => {
                        session.state = WriteableState::Closed;
                        return Err(Error::Socket(e));
                    }
                },
                fetched = tokio::time::timeout(self.ready_timeout, self.queue.get(session.group.as_deref())) => {
                    let Ok(record) = fetched else {
                        if socket.is_closed() {
                            info!(topic = %self.topic, "peer went away while waiting for a record");
                            session.state = WriteableState::Closed;
                            return Ok(Flow::Stop);
                        }
                        continue;
                    };

                    match String::from_utf8(record?.to_vec()) {
                        Ok(text) => {
                            socket.send_text(text).await?;
                            session.state = WriteableState::AwaitReady;
                            return Ok(Flow::Continue);
                        }
                        Err(e) => warn!(topic = %self.topic, "dropping record: {e}"),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<S: Storage> StreamRole for Writeable<S> {
    type Session = WriteableSession;

    fn kind(&self) -> &'static str {
        "writeable"
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    async fn connect(
        &self,
        _socket: &mut dyn FrameSocket,
        group: Option<String>,
    ) -> Result<Self::Session, Error> {
        self.queue.setup(group.as_deref()).await?;

        Ok(WriteableSession {
            group,
            state: WriteableState::AwaitReady,
            announced: false,
        })
    }

    async fn process(
        &self,
        session: &mut Self::Session,
        socket: &mut dyn FrameSocket,
        frame: Frame,
    ) -> Result<Flow, Error> {
        match frame {
            Frame::Ready => {
                self.announce(session);
                self.send_next(session, socket).await
            }
            Frame::Close => {
                session.state = WriteableState::Closed;
                Ok(Flow::Stop)
            }
            Frame::Payload(_) => {
                warn!(topic = %self.topic, "peer sent a record to a writeable, ignoring");
                Ok(Flow::Continue)
            }
        }
    }

    /// Keep trading records for credit until the group has nothing left.
    ///
    /// A session stopped in the middle of [`Writeable::send_next`] still
    /// holds the peer's credit and sends straight away.
    async fn drain(
        &self,
        session: &mut Self::Session,
        socket: &mut dyn FrameSocket,
    ) -> Result<(), Error> {
        let group = session.group.clone();

        while session.state != WriteableState::Closed
            && !self.queue.empty(group.as_deref()).await?
        {
            if session.state == WriteableState::AwaitReady {
                match socket.next_frame().await {
                    Incoming::Text(text) => match Frame::parse(text) {
                        Frame::Ready => {
                            self.announce(session);
                            session.state = WriteableState::Sending;
                        }
                        Frame::Close => session.state = WriteableState::Closed,
                        Frame::Payload(_) => {
                            warn!(topic = %self.topic, "peer sent a record to a writeable, ignoring");
                        }
                    },
                    Incoming::Closed | Incoming::Unsupported(_) => {
                        session.state = WriteableState::Closed;
                    }
                    Incoming::Failed(e) => {
                        session.state = WriteableState::Closed;
                        return Err(Error::Socket(e));
                    }
                }
                continue;
            }

            let record = self.queue.get(group.as_deref()).await?;
            match String::from_utf8(record.to_vec()) {
                Ok(text) => {
                    socket.send_text(text).await?;
                    session.state = WriteableState::AwaitReady;
                }
                Err(e) => warn!(topic = %self.topic, "dropping record: {e}"),
            }
        }

        debug!(topic = %self.topic, group = ?group, "drained");
        Ok(())
    }

    async fn disconnect(
        &self,
        mut session: Self::Session,
        _socket: &mut dyn FrameSocket,
    ) -> Result<(), Error> {
        session.state = WriteableState::Closed;
        if session.announced {
            self.ready_peers
                .send_modify(|ready| *ready = ready.saturating_sub(1));
        }
        Ok(())
    }
}
