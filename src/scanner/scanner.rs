//! Watch-entry registry: spawns, pauses and removes scan loops without touching
//! the others

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;
use crate::{
    admission::AdmissionController,
    config::{ConfigHandle, WatchEntry},
    errors::{BotError, BotResult},
    quotes::QuoteSources,
    types::{SpreadObservation, VenueId, WatchId},
};
use super::EntryWorker;

struct EntryHandle {
    paused: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Scanner {
    sources: Arc<QuoteSources>,
    admission: Arc<AdmissionController>,
    config: ConfigHandle,
    tx: mpsc::Sender<SpreadObservation>,
    entries: DashMap<WatchId, EntryHandle>,
    last_observation: Arc<Mutex<Option<Instant>>>,
}

impl Scanner {
    pub fn new(
        sources: Arc<QuoteSources>,
        admission: Arc<AdmissionController>,
        config: ConfigHandle,
        tx: mpsc::Sender<SpreadObservation>,
    ) -> Self {
        Self {
            sources,
            admission,
            config,
            tx,
            entries: DashMap::new(),
            last_observation: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts every entry in the current config snapshot.
    pub fn start_all(&self) -> BotResult<usize> {
        let snapshot = self.config.snapshot();
        for entry in &snapshot.config.watch {
            self.add(entry.clone())?;
        }
        Ok(snapshot.config.watch.len())
    }

    pub fn add(&self, entry: WatchEntry) -> BotResult<()> {
        self.config.snapshot().config.validate_entry(&entry)?;
        let source = |venue: &VenueId| {
            self.sources.get(venue).cloned().ok_or_else(|| BotError::MalformedWatchEntry {
                id: entry.id.to_string(),
                reason: format!("no quote source for venue '{}'", venue),
            })
        };
        let worker = EntryWorker::new(
            entry.clone(),
            source(&entry.venue_x)?,
            source(&entry.venue_y)?,
            self.admission.clone(),
            self.config.clone(),
        );

        match self.entries.entry(entry.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(BotError::MalformedWatchEntry {
                id: entry.id.to_string(),
                reason: "already running".to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let (paused_tx, paused_rx) = watch::channel(false);
                let task = tokio::spawn(worker.run(self.tx.clone(), paused_rx, self.last_observation.clone()));
                slot.insert(EntryHandle { paused: paused_tx, task });
                Ok(())
            }
        }
    }

    pub fn remove(&self, id: &WatchId) -> bool {
        match self.entries.remove(id) {
            Some((_, handle)) => {
                handle.task.abort();
                info!(watch_id = %id, "Watch entry removed");
                true
            }
            None => false,
        }
    }

    pub fn pause(&self, id: &WatchId) -> bool {
        self.set_paused(id, true)
    }

    pub fn resume(&self, id: &WatchId) -> bool {
        self.set_paused(id, false)
    }

    fn set_paused(&self, id: &WatchId, paused: bool) -> bool {
        match self.entries.get(id) {
            Some(handle) => {
                handle.paused.send_replace(paused);
                info!(watch_id = %id, paused, "Watch entry state changed");
                true
            }
            None => false,
        }
    }

    pub fn is_paused(&self, id: &WatchId) -> Option<bool> {
        self.entries.get(id).map(|h| *h.paused.borrow())
    }

    /// (running, paused)
    pub fn counts(&self) -> (usize, usize) {
        let paused = self.entries.iter().filter(|h| *h.paused.borrow()).count();
        (self.entries.len() - paused, paused)
    }

    pub fn last_observation(&self) -> Option<Instant> {
        *self.last_observation.lock()
    }

    pub fn shutdown(&self) {
        for handle in self.entries.iter() {
            handle.task.abort();
        }
        self.entries.clear();
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
