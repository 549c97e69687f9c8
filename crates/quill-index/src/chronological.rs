//! Building and reading the chronological index.

use std::sync::Arc;

use quill_dag::resolve_head;
use quill_refs::RefStore;
use quill_store::ObjectStore;
use quill_types::Hash;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, Instrument};

use crate::coordinator::{Coordinator, Message};
use crate::error::{IndexError, IndexResult};
use crate::fetch::{spawn_fetch, FetchContext};

/// Tuning knobs for an index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Capacity of the channel fetch tasks report on.
    pub channel_capacity: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Entry point for building a time-ordered view of the checkpoint DAG.
///
/// Every checkpoint reachable from a ref is fetched concurrently, one task
/// per parent edge. A single coordinator task collects the reports into a
/// table sorted by checkpoint date, skipping checkpoints reached along more
/// than one path, and serves it through an [`IndexCursor`].
pub struct ChronologicalIndex;

impl ChronologicalIndex {
    /// Start indexing `ref_name` and return a cursor immediately.
    ///
    /// Pulls on the cursor wait until the traversal has completed. Must be
    /// called from within a tokio runtime.
    pub fn start<O, R>(
        objects: Arc<O>,
        refs: &R,
        ref_name: &str,
        options: IndexOptions,
    ) -> IndexResult<IndexCursor>
    where
        O: ObjectStore + ?Sized + 'static,
        R: RefStore + ?Sized,
    {
        let head = resolve_head(refs, ref_name)?;
        let span = info_span!("index_build", ref_name, head = %head);

        let (outbox, inbox) = mpsc::channel(options.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let fetches = cancel.child_token();
        let (root_gate, root_reached) = watch::channel(false);
        let tracker = TaskTracker::new();

        let coordinator = Coordinator::new(inbox, cancel.clone(), fetches.clone(), root_gate);
        let coordinator = tokio::spawn(coordinator.run().instrument(span.clone()));

        let ctx = Arc::new(FetchContext {
            objects,
            outbox: outbox.clone(),
            tracker: tracker.clone(),
            token: fetches,
        });
        span.in_scope(|| spawn_fetch(ctx, head));
        tracker.close();

        Ok(IndexCursor {
            head,
            outbox,
            cancel,
            tracker,
            root_reached,
            coordinator,
            total: None,
        })
    }

    /// Index `ref_name` and return once the whole reachable DAG is in the
    /// table, or with the first error any fetch ran into.
    pub async fn build<O, R>(
        objects: Arc<O>,
        refs: &R,
        ref_name: &str,
        options: IndexOptions,
    ) -> IndexResult<IndexCursor>
    where
        O: ObjectStore + ?Sized + 'static,
        R: RefStore + ?Sized,
    {
        let mut cursor = Self::start(objects, refs, ref_name, options)?;
        let total = cursor.wait_ready().await?;
        info!(ref_name, checkpoints = total, "index built");
        Ok(cursor)
    }
}

/// Streams indexed checkpoint hashes in ascending date order.
///
/// Dropping the cursor cancels any traversal still in flight.
pub struct IndexCursor {
    head: Hash,
    outbox: mpsc::Sender<Message>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    root_reached: watch::Receiver<bool>,
    coordinator: JoinHandle<()>,
    total: Option<usize>,
}

impl IndexCursor {
    /// The checkpoint the ref resolved to.
    pub fn head(&self) -> &Hash {
        &self.head
    }

    /// Number of checkpoints in the finished table, once known.
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// Whether any parentless checkpoint has been reached yet.
    pub fn root_reached(&self) -> bool {
        *self.root_reached.borrow()
    }

    /// Wait for the traversal to finish and return the table size.
    pub async fn wait_ready(&mut self) -> IndexResult<usize> {
        if let Some(total) = self.total {
            return Ok(total);
        }
        let total = self.request(|reply| Message::Ready { reply }).await?;
        self.total = Some(total);
        Ok(total)
    }

    /// The next hash in date order, or `None` at the end of the table.
    pub async fn next(&mut self) -> IndexResult<Option<Hash>> {
        self.request(|reply| Message::Pull { reply }).await
    }

    /// Drain every remaining entry.
    pub async fn collect_all(&mut self) -> IndexResult<Vec<Hash>> {
        let mut hashes = Vec::new();
        while let Some(hash) = self.next().await? {
            hashes.push(hash);
        }
        Ok(hashes)
    }

    /// Stop the traversal and discard the table. Later pulls fail with
    /// [`IndexError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this index from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel and wait for every task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.tracker.wait().await;
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<IndexResult<T>>) -> Message,
    ) -> IndexResult<T> {
        if self.cancel.is_cancelled() || self.coordinator.is_finished() {
            return Err(IndexError::Cancelled);
        }
        let (reply, answer) = oneshot::channel();
        self.outbox
            .send(message(reply))
            .await
            .map_err(|_| IndexError::Cancelled)?;
        answer.await.map_err(|_| IndexError::Cancelled)?
    }
}

impl Drop for IndexCursor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for IndexCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCursor")
            .field("head", &self.head)
            .field("total", &self.total)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
