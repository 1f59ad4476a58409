//! Request/response correlation.
//!
//! Every outbound command borrows a sequence id from the shared id space
//! (`1..=255`; `0` is the unsolicited sentinel) and registers a pending
//! entry the read loop completes when the matching response arrives.
//! The id space is gated by a semaphore with one permit per id, so when
//! all ids are in flight new sends suspend until a slot frees instead of
//! reusing a live id.
//!
//! A [`PendingTicket`] is the caller's side of one pending request. It
//! frees its id on drop, which makes cancellation implicit: dropping the
//! ticket (or the future awaiting it) deregisters the request without
//! sending anything to the remote side. A late reply then surfaces as an
//! unmatched-response event instead of resolving anything.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};

use crate::error::{PinwireError, Result};
use crate::protocol::{SEQUENCE_IDS, UNSOLICITED_SEQUENCE};

/// One registered request awaiting its response.
#[derive(Debug)]
struct PendingEntry {
    tx: oneshot::Sender<Bytes>,
    /// Registration order, used to fail requests oldest-first on close.
    created: u64,
}

#[derive(Debug)]
struct State {
    /// Next candidate sequence id (wrapping, skips live ids and the sentinel).
    next: u8,
    /// Monotonic registration stamp.
    stamp: u64,
    pending: HashMap<u8, PendingEntry>,
}

#[derive(Debug)]
struct Shared {
    /// One permit per allocatable sequence id.
    slots: Arc<Semaphore>,
    state: Mutex<State>,
}

/// Pending-request table shared between senders and the read loop.
///
/// Cheaply cloneable; all clones observe the same table.
#[derive(Debug, Clone)]
pub struct Correlator {
    shared: Arc<Shared>,
}

impl Correlator {
    /// Create a correlator with an empty pending table.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: Arc::new(Semaphore::new(SEQUENCE_IDS)),
                state: Mutex::new(State {
                    next: 1,
                    stamp: 0,
                    pending: HashMap::new(),
                }),
            }),
        }
    }

    /// Allocate a fresh sequence id and register a pending request.
    ///
    /// Suspends while the id space is exhausted. Fails with
    /// `ConnectionClosed` once [`fail_all`](Correlator::fail_all) has run.
    pub async fn begin(&self) -> Result<PendingTicket> {
        let permit = Arc::clone(&self.shared.slots)
            .acquire_owned()
            .await
            .map_err(|_| PinwireError::ConnectionClosed)?;

        let (tx, rx) = oneshot::channel();
        let sequence = {
            let mut state = lock(&self.shared.state);

            // fail_all closes the semaphore before draining under this
            // lock, so a registration slipping in between would never be
            // failed. Re-check under the lock.
            if self.shared.slots.is_closed() {
                return Err(PinwireError::ConnectionClosed);
            }

            // The permit guarantees at least one free id, so this scan
            // terminates.
            let mut candidate = state.next;
            while candidate == UNSOLICITED_SEQUENCE || state.pending.contains_key(&candidate) {
                candidate = candidate.wrapping_add(1);
            }
            state.next = candidate.wrapping_add(1);
            state.stamp += 1;
            let created = state.stamp;
            state.pending.insert(candidate, PendingEntry { tx, created });
            candidate
        };

        Ok(PendingTicket {
            shared: Arc::clone(&self.shared),
            sequence,
            rx: Some(rx),
            _permit: permit,
        })
    }

    /// Complete the pending request with this sequence id.
    ///
    /// Returns false when no live request matches (stale, duplicate, or
    /// cancelled id); the caller reports such frames as unmatched.
    pub fn resolve(&self, sequence: u8, payload: Bytes) -> bool {
        let entry = lock(&self.shared.state).pending.remove(&sequence);
        match entry {
            Some(entry) => entry.tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Fail every pending request with `ConnectionClosed`, oldest first,
    /// and refuse all future allocations.
    pub fn fail_all(&self) {
        self.shared.slots.close();

        let mut entries: Vec<PendingEntry> = {
            let mut state = lock(&self.shared.state);
            state.pending.drain().map(|(_, entry)| entry).collect()
        };
        entries.sort_by_key(|entry| entry.created);
        for entry in entries {
            // Dropping the sender wakes the waiter with a closed error.
            drop(entry.tx);
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_len(&self) -> usize {
        lock(&self.shared.state).pending.len()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

/// The caller's handle to one pending request.
///
/// Dropping the ticket cancels the request: the pending entry is removed
/// and the sequence id returns to the pool.
#[derive(Debug)]
pub struct PendingTicket {
    shared: Arc<Shared>,
    sequence: u8,
    rx: Option<oneshot::Receiver<Bytes>>,
    /// Held until the ticket drops; its release frees the id slot.
    _permit: OwnedSemaphorePermit,
}

impl PendingTicket {
    /// The sequence id assigned to this request.
    #[inline]
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Await the correlated response payload.
    ///
    /// Resolves with `RequestTimeout` once the deadline elapses and with
    /// `ConnectionClosed` when the connection fails all pending requests.
    /// Either way the sequence id is free for reuse afterwards.
    pub async fn wait(mut self, deadline: Duration) -> Result<Bytes> {
        let rx = match self.rx.take() {
            Some(rx) => rx,
            None => return Err(PinwireError::ConnectionClosed),
        };

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(PinwireError::ConnectionClosed),
            Err(_) => Err(PinwireError::RequestTimeout),
        }
        // Dropping self deregisters the entry (a no-op when the response
        // already resolved it) and releases the id permit.
    }
}

impl Drop for PendingTicket {
    fn drop(&mut self) {
        lock(&self.shared.state).pending.remove(&self.sequence);
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
