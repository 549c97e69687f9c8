//! Fetch tasks: one per DAG edge, each loading a single checkpoint.

use std::sync::Arc;

use quill_dag::ObjectLoader;
use quill_pack::Checkpoint;
use quill_store::ObjectStore;
use quill_types::Hash;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{trace, Instrument};

use crate::coordinator::Message;
use crate::error::{IndexError, IndexResult};

/// Everything a fetch task needs, shared by all of them.
pub(crate) struct FetchContext<O: ObjectStore + ?Sized> {
    pub objects: Arc<O>,
    pub outbox: mpsc::Sender<Message>,
    pub tracker: TaskTracker,
    pub token: CancellationToken,
}

/// Spawn a tracked fetch of `hash`.
///
/// This is a plain function so the recursive spawn does not make the task's
/// future type refer to itself.
pub(crate) fn spawn_fetch<O>(ctx: Arc<FetchContext<O>>, hash: Hash)
where
    O: ObjectStore + ?Sized + 'static,
{
    let tracker = ctx.tracker.clone();
    tracker.spawn(fetch(ctx, hash).in_current_span());
}

async fn fetch<O>(ctx: Arc<FetchContext<O>>, hash: Hash)
where
    O: ObjectStore + ?Sized + 'static,
{
    let token = ctx.token.clone();
    tokio::select! {
        biased;
        _ = token.cancelled() => trace!(hash = %hash, "fetch cancelled"),
        _ = visit(ctx, hash) => {}
    }
}

async fn visit<O>(ctx: Arc<FetchContext<O>>, hash: Hash)
where
    O: ObjectStore + ?Sized + 'static,
{
    let (reply, answer) = oneshot::channel();
    if ctx.outbox.send(Message::Claim { hash, reply }).await.is_err() {
        return;
    }
    // A dropped reply means the coordinator is gone.
    let Ok(first) = answer.await else {
        return;
    };
    if !first {
        let _ = ctx.outbox.send(Message::Duplicate).await;
        return;
    }

    let checkpoint = match load(&ctx, hash).await {
        Ok(checkpoint) => checkpoint,
        Err(err) => {
            let _ = ctx.outbox.send(Message::Failed(err)).await;
            return;
        }
    };
    let date = match checkpoint.date() {
        Ok(date) => date,
        Err(source) => {
            let _ = ctx
                .outbox
                .send(Message::Failed(IndexError::InvalidDate { hash, source }))
                .await;
            return;
        }
    };

    // Reported before any parent is spawned, so the coordinator counts the
    // parents before it can see them finish.
    let parents = checkpoint.parent_hashes;
    let report = Message::Fetched {
        hash,
        date,
        parents: parents.len(),
    };
    if ctx.outbox.send(report).await.is_err() {
        return;
    }
    for parent in parents {
        spawn_fetch(Arc::clone(&ctx), parent);
    }
}

/// Load a checkpoint off the async worker threads; stores are blocking.
async fn load<O>(ctx: &FetchContext<O>, hash: Hash) -> IndexResult<Checkpoint>
where
    O: ObjectStore + ?Sized + 'static,
{
    let objects = Arc::clone(&ctx.objects);
    tokio::task::spawn_blocking(move || ObjectLoader::new(&*objects).checkpoint(&hash))
        .await
        .map_err(|join| IndexError::Task {
            hash,
            reason: join.to_string(),
        })?
        .map_err(IndexError::from)
}
