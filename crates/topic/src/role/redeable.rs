use std::sync::Arc;

use async_trait::async_trait;
use topicmesh_storage::Storage;
use tracing::debug;

use super::{Flow, StreamRole};
use crate::Error;
use crate::frame::{CLOSE_SIGNAL, Frame, READY_SIGNAL};
use crate::queue::TopicQueue;
use crate::socket::FrameSocket;

/// Consumer-facing role: pulls records from peers one at a time.
///
/// Each connection is granted credit for exactly one record; the next ready
/// frame goes out only once the previous record is in the local queue.
#[derive(Clone, Debug)]
pub struct Redeable<S: Storage> {
    topic: Arc<str>,
    queue: Arc<TopicQueue<S>>,
}

/// Per-peer state of a [`Redeable`].
#[derive(Debug)]
pub struct RedeableSession {
    group: Option<String>,
    received: u64,
}

impl RedeableSession {
    /// The group named in the connection's path.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Records received on this connection.
    #[must_use]
    pub const fn received(&self) -> u64 {
        self.received
    }
}

impl<S: Storage> Redeable<S> {
    /// Create the role and register the no-group cursor so records
    /// received before the first local read are kept.
    ///
    /// # Errors
    ///
    /// Fails if the queue cannot read its log.
    pub async fn new(topic: impl Into<String>, queue: Arc<TopicQueue<S>>) -> Result<Self, Error> {
        queue.setup(None).await?;

        Ok(Self {
            topic: Arc::from(topic.into()),
            queue,
        })
    }

    /// Take the next received record for `group`, waiting if none is queued.
    ///
    /// # Errors
    ///
    /// Fails if the log cannot be read or the record is not UTF-8.
    pub async fn get(&self, group: Option<&str>) -> Result<String, Error> {
        let record = self.queue.get(group).await?;
        Ok(String::from_utf8(record.to_vec())?)
    }

    /// The queue received records land in.
    #[must_use]
    pub const fn queue(&self) -> &Arc<TopicQueue<S>> {
        &self.queue
    }
}

#[async_trait]
impl<S: Storage> StreamRole for Redeable<S> {
    type Session = RedeableSession;

    fn kind(&self) -> &'static str {
        "redeable"
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    async fn connect(
        &self,
        socket: &mut dyn FrameSocket,
        group: Option<String>,
    ) -> Result<Self::Session, Error> {
        socket.send_text(READY_SIGNAL.to_string()).await?;

        Ok(RedeableSession { group, received: 0 })
    }

    async fn process(
        &self,
        session: &mut Self::Session,
        socket: &mut dyn FrameSocket,
        frame: Frame,
    ) -> Result<Flow, Error> {
        match frame {
            Frame::Payload(record) => {
                self.queue.put(record).await?;
                session.received += 1;
                socket.send_text(READY_SIGNAL.to_string()).await?;
                Ok(Flow::Continue)
            }
            Frame::Ready => {
                debug!(topic = %self.topic, "ready frame sent to a redeable, ignoring");
                Ok(Flow::Continue)
            }
            Frame::Close => Ok(Flow::Stop),
        }
    }

    async fn disconnect(
        &self,
        session: Self::Session,
        socket: &mut dyn FrameSocket,
    ) -> Result<(), Error> {
        debug!(
            topic = %self.topic,
            group = ?session.group,
            received = session.received,
            "redeable session ending"
        );
        if !socket.is_closed() {
            socket.send_text(CLOSE_SIGNAL.to_string()).await?;
        }
        Ok(())
    }
}
