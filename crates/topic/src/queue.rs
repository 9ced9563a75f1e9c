//! Consumer-group queue over an append-only log
//!
//! A [`TopicQueue`] keeps one read cursor per consumer group. A cursor is
//! created at the current end of the log the first time its group is seen,
//! so late joiners never receive backlog. Readers sharing a group compete
//! for successive records; readers in different groups each see everything.
//!
//! [`TopicQueue::fork`] opens a second set of cursors over the same log, so
//! two endpoints can read it without competing for the same groups.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::{Mutex, watch};
use topicmesh_storage::Storage;
use tracing::trace;

use crate::Error;

type Cursor = Arc<Mutex<u64>>;

/// Append-only log with per-group read offsets.
#[derive(Debug)]
pub struct TopicQueue<S: Storage> {
    storage: Arc<S>,
    cursors: parking_lot::Mutex<HashMap<Option<String>, Cursor>>,
    /// Length of the log as last published by `put`, shared with forks.
    appended: Arc<watch::Sender<u64>>,
}

impl<S: Storage> TopicQueue<S> {
    /// Wrap `storage`, no group has a cursor yet.
    pub fn new(storage: S) -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            storage: Arc::new(storage),
            cursors: parking_lot::Mutex::new(HashMap::new()),
            appended: Arc::new(appended),
        }
    }

    /// A queue over the same log with cursors of its own.
    ///
    /// Records put through either queue wake readers of both. Groups are
    /// independent: reading `None` here does not move `None` there.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            cursors: parking_lot::Mutex::new(HashMap::new()),
            appended: self.appended.clone(),
        }
    }

    /// Wrap `storage` in an [`Arc`] ready to be shared by endpoints.
    pub fn shared(storage: S) -> Arc<Self> {
        Arc::new(Self::new(storage))
    }

    /// The underlying log.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Append a record and wake every waiting reader.
    ///
    /// # Errors
    ///
    /// Fails if the log rejects the append.
    pub async fn put(&self, record: impl Into<Bytes> + Send) -> Result<u64, Error> {
        let index = self.storage.append(record.into()).await?;
        self.appended.send_modify(|length| *length = (*length).max(index + 1));
        trace!(index, "record appended");
        Ok(index)
    }

    /// Register `group` at the current end of the log without reading.
    ///
    /// Does nothing if the group already has a cursor.
    ///
    /// # Errors
    ///
    /// Fails if the log length cannot be read.
    pub async fn setup(&self, group: Option<&str>) -> Result<(), Error> {
        self.cursor(group).await.map(|_| ())
    }

    /// Take the next record for `group`, waiting until one is appended.
    ///
    /// Cancel safe: a dropped call never advances the cursor.
    ///
    /// # Errors
    ///
    /// Fails if the log cannot be read.
    pub async fn get(&self, group: Option<&str>) -> Result<Bytes, Error> {
        let cursor = self.cursor(group).await?;
        // subscribe before checking so an append in between is not missed
        let mut appended = self.appended.subscribe();

        loop {
            {
                let mut offset = cursor.lock().await;
                if *offset < self.storage.len().await? {
                    let record = self.storage.get(*offset).await?;
                    trace!(offset = *offset, ?group, "record taken");
                    *offset += 1;
                    return Ok(record);
                }
            }

            if appended.changed().await.is_err() {
                return Err(Error::QueueClosed);
            }
        }
    }

    /// Whether `group` has nothing left to read.
    ///
    /// A group that was never set up is empty.
    ///
    /// # Errors
    ///
    /// Fails if the log length cannot be read.
    pub async fn empty(&self, group: Option<&str>) -> Result<bool, Error> {
        let Some(cursor) = self.existing_cursor(group) else {
            return Ok(true);
        };
        let offset = *cursor.lock().await;
        Ok(offset >= self.storage.len().await?)
    }

    /// Current offset of `group`, `None` if the group was never seen.
    pub async fn offset(&self, group: Option<&str>) -> Option<u64> {
        let cursor = self.existing_cursor(group)?;
        let offset = *cursor.lock().await;
        Some(offset)
    }

    /// Endless stream of records for `group`.
    pub fn stream(
        self: Arc<Self>,
        group: Option<String>,
    ) -> impl Stream<Item = Result<Bytes, Error>> + Send + 'static {
        async_stream::try_stream! {
            loop {
                let record = self.get(group.as_deref()).await?;
                yield record;
            }
        }
    }

    fn existing_cursor(&self, group: Option<&str>) -> Option<Cursor> {
        self.cursors
            .lock()
            .get(&group.map(ToString::to_string))
            .cloned()
    }

    async fn cursor(&self, group: Option<&str>) -> Result<Cursor, Error> {
        if let Some(cursor) = self.existing_cursor(group) {
            return Ok(cursor);
        }

        let length = self.storage.len().await?;
        let cursor = self
            .cursors
            .lock()
            .entry(group.map(ToString::to_string))
            .or_insert_with(|| Arc::new(Mutex::new(length)))
            .clone();
        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use futures_util::StreamExt;
    use topicmesh_storage_memory::MemoryStorage;

    fn queue() -> Arc<TopicQueue<MemoryStorage>> {
        TopicQueue::shared(MemoryStorage::new())
    }

    #[tokio::test]
    async fn test_fifo_within_group() {
        let queue = queue();
        queue.setup(Some("g")).await.unwrap();

        for i in 0..10 {
            queue.put(format!("record-{i}")).await.unwrap();
        }

        for i in 0..10 {
            let record = queue.get(Some("g")).await.unwrap();
            assert_eq!(record, Bytes::from(format!("record-{i}")));
        }
        assert!(queue.empty(Some("g")).await.unwrap());
    }

    #[tokio::test]
    async fn test_groups_broadcast() {
        let queue = queue();
        queue.setup(Some("a")).await.unwrap();
        queue.setup(Some("b")).await.unwrap();

        for i in 0..5u8 {
            queue.put(vec![i]).await.unwrap();
        }

        // a drains fully before b starts, b is unaffected
        for i in 0..5u8 {
            assert_eq!(queue.get(Some("a")).await.unwrap(), Bytes::from(vec![i]));
        }
        assert_eq!(queue.offset(Some("a")).await, Some(5));
        assert_eq!(queue.offset(Some("b")).await, Some(0));
        for i in 0..5u8 {
            assert_eq!(queue.get(Some("b")).await.unwrap(), Bytes::from(vec![i]));
        }
    }

    #[tokio::test]
    async fn test_competing_consumers() {
        let queue = queue();
        queue.setup(Some("workers")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Ok(Ok(record)) =
                    tokio::time::timeout(Duration::from_millis(200), queue.get(Some("workers")))
                        .await
                {
                    taken.push(record);
                }
                taken
            }));
        }

        for i in 0..100 {
            queue.put(format!("{i}")).await.unwrap();
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for record in handle.await.unwrap() {
                total += 1;
                seen.insert(record);
            }
        }
        assert_eq!(total, 100);
        assert_eq!(seen.len(), 100);
    }

    #[tokio::test]
    async fn test_tail_join_skips_backlog() {
        let queue = queue();
        queue.put("old-1").await.unwrap();
        queue.put("old-2").await.unwrap();

        assert!(queue.empty(Some("late")).await.unwrap());
        assert_eq!(queue.offset(Some("late")).await, None);

        let reader = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get(Some("late")).await.unwrap() })
        };

        // give the reader time to register its cursor at the tail
        while queue.offset(Some("late")).await.is_none() {
            tokio::task::yield_now().await;
        }
        queue.put("new").await.unwrap();

        assert_eq!(reader.await.unwrap(), Bytes::from("new"));
    }

    #[tokio::test]
    async fn test_get_waits_for_put() {
        let queue = queue();
        queue.setup(None).await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), queue.get(None)).await;
        assert!(waiting.is_err());

        // the cancelled get must not have moved the cursor
        queue.put("x").await.unwrap();
        assert_eq!(queue.get(None).await.unwrap(), Bytes::from("x"));
    }

    #[tokio::test]
    async fn test_stream() {
        let queue = queue();
        queue.setup(Some("s")).await.unwrap();
        for record in ["a", "b", "c"] {
            queue.put(record).await.unwrap();
        }

        let records: Vec<_> = queue
            .clone()
            .stream(Some("s".to_string()))
            .take(3)
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(records, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fork_reads_independently() {
        let _ = tracing_subscriber::fmt::try_init();

        let queue = queue();
        let fork = Arc::new(queue.fork());
        queue.setup(None).await.unwrap();
        fork.setup(None).await.unwrap();

        let reader = {
            let fork = fork.clone();
            tokio::spawn(async move {
                let mut taken = Vec::new();
                for _ in 0..4 {
                    taken.push(fork.get(None).await.unwrap());
                }
                taken
            })
        };

        for i in 0..4 {
            queue.put(format!("{i}")).await.unwrap();
        }

        for i in 0..4 {
            assert_eq!(queue.get(None).await.unwrap(), Bytes::from(format!("{i}")));
        }
        let taken = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(taken, vec!["0", "1", "2", "3"]);
        assert!(queue.empty(None).await.unwrap());
        assert!(fork.empty(None).await.unwrap());
        assert_eq!(fork.storage().len().await.unwrap(), 4);
    }
}
