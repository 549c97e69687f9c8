//! The single task that owns all index state.
//!
//! Fetch tasks and the cursor talk to the coordinator only through
//! [`Message`]s; nothing else touches the table, the counter or the cursor
//! position.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use quill_types::Hash;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{IndexError, IndexResult};
use crate::toc::{Toc, TocEntry};

pub(crate) enum Message {
    /// A fetch task asks whether it is the first to reach `hash`.
    Claim {
        hash: Hash,
        reply: oneshot::Sender<bool>,
    },
    /// A checkpoint was loaded. Sent before its parents are spawned.
    Fetched {
        hash: Hash,
        date: DateTime<Utc>,
        parents: usize,
    },
    /// A fetch task lost its claim to an earlier visitor.
    Duplicate,
    Failed(IndexError),
    /// The cursor wants the total once traversal completes.
    Ready {
        reply: oneshot::Sender<IndexResult<usize>>,
    },
    /// The cursor wants the next hash.
    Pull {
        reply: oneshot::Sender<IndexResult<Option<Hash>>>,
    },
}

enum Parked {
    Ready(oneshot::Sender<IndexResult<usize>>),
    Pull(oneshot::Sender<IndexResult<Option<Hash>>>),
}

impl Parked {
    fn fail(self, err: IndexError) {
        match self {
            Parked::Ready(reply) => {
                let _ = reply.send(Err(err));
            }
            Parked::Pull(reply) => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

enum Phase {
    Building,
    Complete,
    /// Holds the error until someone asks for it.
    Failed(Option<IndexError>),
}

pub(crate) struct Coordinator {
    inbox: mpsc::Receiver<Message>,
    /// Cancelled by the cursor; ends the coordinator.
    cancel: CancellationToken,
    /// Cancelled on failure; stops fetch tasks only.
    fetches: CancellationToken,
    claimed: HashSet<Hash>,
    outstanding: usize,
    toc: Toc,
    cursor: usize,
    root_gate: watch::Sender<bool>,
    parked: Option<Parked>,
    phase: Phase,
}

impl Coordinator {
    pub(crate) fn new(
        inbox: mpsc::Receiver<Message>,
        cancel: CancellationToken,
        fetches: CancellationToken,
        root_gate: watch::Sender<bool>,
    ) -> Self {
        Self {
            inbox,
            cancel,
            fetches,
            claimed: HashSet::new(),
            // The head fetch is outstanding before any message arrives.
            outstanding: 1,
            toc: Toc::new(),
            cursor: 0,
            root_gate,
            parked: None,
            phase: Phase::Building,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.discard();
                    return;
                }
                message = self.inbox.recv() => match message {
                    Some(message) => self.handle(message),
                    None => return,
                },
            }
        }
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Claim { hash, reply } => {
                let first = matches!(self.phase, Phase::Building) && self.claimed.insert(hash);
                let _ = reply.send(first);
            }
            Message::Fetched {
                hash,
                date,
                parents,
            } => {
                if !matches!(self.phase, Phase::Building) {
                    return;
                }
                self.outstanding += parents;
                if self.toc.insert(TocEntry { hash, date }).is_some() {
                    debug!(hash = %hash, %date, parents, "checkpoint indexed");
                }
                if parents == 0 {
                    self.reach_root(&hash);
                }
                self.finish_one();
            }
            Message::Duplicate => {
                if matches!(self.phase, Phase::Building) {
                    self.finish_one();
                }
            }
            Message::Failed(err) => self.fail(err),
            Message::Ready { reply } => match &mut self.phase {
                Phase::Building => self.park(Parked::Ready(reply)),
                Phase::Complete => {
                    let _ = reply.send(Ok(self.toc.len()));
                }
                Phase::Failed(err) => {
                    let _ = reply.send(Err(err.take().unwrap_or(IndexError::Cancelled)));
                }
            },
            Message::Pull { reply } => match &mut self.phase {
                Phase::Building => self.park(Parked::Pull(reply)),
                Phase::Complete => {
                    let next = self.advance();
                    let _ = reply.send(Ok(next));
                }
                Phase::Failed(err) => {
                    let _ = reply.send(Err(err.take().unwrap_or(IndexError::Cancelled)));
                }
            },
        }
    }

    /// Fire the one-shot root gate. Later roots leave it untouched.
    fn reach_root(&mut self, hash: &Hash) {
        let fired = self.root_gate.send_if_modified(|reached| {
            if *reached {
                false
            } else {
                *reached = true;
                true
            }
        });
        if fired {
            debug!(hash = %hash, "root checkpoint reached");
        }
    }

    fn finish_one(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.outstanding > 0 {
            return;
        }
        if !*self.root_gate.borrow() {
            self.fail(IndexError::NoRoot);
            return;
        }
        self.phase = Phase::Complete;
        info!(checkpoints = self.toc.len(), "chronological index complete");
        match self.parked.take() {
            Some(Parked::Ready(reply)) => {
                let _ = reply.send(Ok(self.toc.len()));
            }
            Some(Parked::Pull(reply)) => {
                let next = self.advance();
                let _ = reply.send(Ok(next));
            }
            None => {}
        }
    }

    fn advance(&mut self) -> Option<Hash> {
        let entry = self.toc.get(self.cursor)?;
        self.cursor += 1;
        Some(entry.hash)
    }

    fn park(&mut self, request: Parked) {
        if let Some(stale) = self.parked.replace(request) {
            stale.fail(IndexError::Cancelled);
        }
    }

    fn fail(&mut self, err: IndexError) {
        if !matches!(self.phase, Phase::Building) {
            return;
        }
        warn!(error = %err, "chronological index failed");
        self.fetches.cancel();
        self.toc.clear();
        self.claimed.clear();
        match self.parked.take() {
            Some(parked) => {
                parked.fail(err);
                self.phase = Phase::Failed(None);
            }
            None => self.phase = Phase::Failed(Some(err)),
        }
    }

    fn discard(&mut self) {
        debug!(discarded = self.toc.len(), "chronological index cancelled");
        self.fetches.cancel();
        self.toc.clear();
        if let Some(parked) = self.parked.take() {
            parked.fail(IndexError::Cancelled);
        }
    }
}
