//! Per-peer result records shared between the samplers and the dashboard.
//!
//! Every record has exactly one [`ResultWriter`], handed to the worker that
//! samples that peer. The dashboard only ever sees [`ResultView`]s, which can
//! take snapshots but not mutate.

use meshdash_model::{Peer, ProbeResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Slot = Arc<Mutex<ProbeResult>>;

fn lock(slot: &Slot) -> MutexGuard<'_, ProbeResult> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct ResultWriter {
    peer: Peer,
    slot: Slot,
}

impl ResultWriter {
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn update<R>(&self, apply: impl FnOnce(&mut ProbeResult) -> R) -> R {
        let mut guard = lock(&self.slot);
        apply(&mut *guard)
    }

    pub fn view(&self) -> ResultView {
        ResultView {
            slot: Arc::clone(&self.slot),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultView {
    slot: Slot,
}

impl ResultView {
    pub fn snapshot(&self) -> ProbeResult {
        lock(&self.slot).clone()
    }

    pub fn is_done(&self) -> bool {
        lock(&self.slot).done
    }
}

#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub peer: Peer,
    pub view: ResultView,
}

#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    entries: Vec<StoreEntry>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record for `peer` and returns its only writer.
    pub fn register(&mut self, peer: Peer, initial: ProbeResult) -> ResultWriter {
        let writer = ResultWriter {
            peer: peer.clone(),
            slot: Arc::new(Mutex::new(initial)),
        };
        self.entries.push(StoreEntry {
            peer,
            view: writer.view(),
        });
        writer
    }

    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    pub fn get(&self, address: &str) -> Option<ProbeResult> {
        self.entries
            .iter()
            .find(|entry| entry.peer.address == address)
            .map(|entry| entry.view.snapshot())
    }

    pub fn all_done(&self) -> bool {
        self.entries.iter().all(|entry| entry.view.is_done())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
