// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Bus: one multiplexer per job. `publish()` is a
//! non-blocking `broadcast::Sender::send`; a subscriber that cannot keep up
//! gets `RecvError::Lagged` and resynchronizes from the persisted output
//! buffer rather than stalling the publisher or dropping chunks silently.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rke2_core::{JobId, OutputChunk};
use rke2_storage::TopologyStore;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<OutputChunk>,
    closed: AtomicBool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, closed: AtomicBool::new(false) }
    }

    /// Forward a chunk to every live subscriber. Never blocks beyond a
    /// short bounded enqueue: `broadcast::Sender::send` is synchronous and
    /// only fails if there are no receivers, which is not an error here.
    pub fn publish(&self, chunk: OutputChunk) {
        let _ = self.sender.send(chunk);
    }

    /// Sent on job terminal state; all subscriber streams end cleanly once
    /// they drain whatever is already queued.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns a bounded stream of pending chunks plus a snapshot of the
    /// output buffer up to the point of subscription: a late subscriber
    /// sees the whole log without duplication, de-duplicated by the
    /// monotonic chunk counter. After close, still returns the full buffer
    /// then ends immediately (no live receiver is attached).
    pub fn subscribe(&self, store: Arc<TopologyStore>, job_id: JobId, snapshot: Vec<OutputChunk>) -> JobOutputStream {
        let last_seq = snapshot.last().map(|c| c.seq);
        let receiver = if self.is_closed() { None } else { Some(self.sender.subscribe()) };
        JobOutputStream { snapshot: snapshot.into(), receiver, last_seq, store, job_id }
    }
}

/// Snapshot-then-live subscriber stream. Not a `futures::Stream` impl by
/// design: callers drive it with `next().await` in a loop (e.g. forwarding
/// into an SSE channel), which keeps the de-duplication and resync logic
/// in one place without hand-rolled `Pin`/`Poll` plumbing.
pub struct JobOutputStream {
    snapshot: VecDeque<OutputChunk>,
    receiver: Option<broadcast::Receiver<OutputChunk>>,
    last_seq: Option<u64>,
    store: Arc<TopologyStore>,
    job_id: JobId,
}

impl JobOutputStream {
    pub async fn next(&mut self) -> Option<OutputChunk> {
        if let Some(chunk) = self.snapshot.pop_front() {
            self.last_seq = Some(chunk.seq);
            return Some(chunk);
        }

        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(chunk) => {
                    if self.last_seq.is_some_and(|last| chunk.seq <= last) {
                        continue;
                    }
                    self.last_seq = Some(chunk.seq);
                    return Some(chunk);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(job_id = %self.job_id, skipped = n, "subscriber lagged; resyncing from persisted buffer");
                    if let Ok(job) = self.store.get_job(self.job_id).await {
                        let resync: VecDeque<OutputChunk> = job
                            .output
                            .into_iter()
                            .filter(|c| self.last_seq.is_none_or(|last| c.seq > last))
                            .collect();
                        self.snapshot = resync;
                    }
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
