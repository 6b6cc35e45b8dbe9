//! In-memory document mirrored to durable slots.
//!
//! A mutation is applied to a working copy, the whole document is written,
//! and only then does the in-memory copy move forward. Projections are never
//! computed from a state that was not persisted first.

use crate::errors::AppResult;
use crate::storage::{decode_slot, SlotStorage, SlotWrite};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Everything one app persists, spread over one or more slots.
pub trait SlotDocument: Clone + Default {
    const APP: &'static str;

    fn decode(reader: &mut SlotReader<'_>) -> AppResult<Self>;

    fn encode(&self) -> AppResult<Vec<SlotWrite>>;
}

pub struct SlotReader<'a> {
    storage: &'a dyn SlotStorage,
    app: &'static str,
    quarantined: Vec<String>,
    repaired: bool,
}

impl<'a> SlotReader<'a> {
    fn new(storage: &'a dyn SlotStorage, app: &'static str) -> Self {
        Self {
            storage,
            app,
            quarantined: Vec::new(),
            repaired: false,
        }
    }

    /// Absent or unreadable slots yield the default value. Unreadable raw
    /// data is copied to `<key>.corrupt` first so it can be recovered by hand.
    pub fn read<T: DeserializeOwned + Default>(&mut self, key: &str) -> AppResult<T> {
        let Some(raw) = self.storage.read_slot(key)? else {
            return Ok(T::default());
        };

        match decode_slot::<T>(&raw) {
            Ok(value) => Ok(value),
            Err(error) => {
                tracing::warn!(app = self.app, slot = key, error = %error, "discarding unreadable slot");
                self.set_aside(key, raw);
                Ok(T::default())
            }
        }
    }

    /// True when `key` held data that could not be decoded on this load.
    pub fn was_quarantined(&self, key: &str) -> bool {
        self.quarantined.iter().any(|quarantined| quarantined == key)
    }

    /// Copies a readable slot to `<key>.corrupt` before decoding throws part
    /// of it away, or when its meaning depends on a slot that was quarantined.
    pub fn keep_copy(&mut self, key: &str) -> AppResult<()> {
        if let Some(raw) = self.storage.read_slot(key)? {
            tracing::warn!(app = self.app, slot = key, "copying slot aside before repair");
            self.set_aside(key, raw);
        }
        Ok(())
    }

    /// Decoding changed the data (ids assigned, dangling entries dropped).
    /// The repaired document is written back before the load returns.
    pub fn mark_repaired(&mut self) {
        self.repaired = true;
    }

    fn set_aside(&mut self, key: &str, raw: String) {
        let copy = SlotWrite {
            key: format!("{key}.corrupt"),
            value: raw,
        };
        if let Err(error) = self.storage.write_slots(&[copy]) {
            tracing::warn!(app = self.app, slot = key, error = %error, "failed to quarantine slot");
        }
        self.quarantined.push(key.to_string());
    }
}

pub struct Store<D: SlotDocument> {
    storage: Arc<dyn SlotStorage>,
    document: D,
}

impl<D: SlotDocument> Store<D> {
    pub fn load(storage: Arc<dyn SlotStorage>) -> AppResult<Self> {
        Self::load_with(storage, |_| {})
    }

    /// Loads and applies an in-memory fix-up. Repairs made while decoding are
    /// written back right away; the fix-up only goes out with the next mutation.
    pub fn load_with(storage: Arc<dyn SlotStorage>, normalize: impl FnOnce(&mut D)) -> AppResult<Self> {
        let (mut document, repaired) = {
            let mut reader = SlotReader::new(storage.as_ref(), D::APP);
            let document = D::decode(&mut reader)?;
            (document, reader.repaired)
        };
        if repaired {
            let writes = document.encode()?;
            storage.write_slots(&writes)?;
            tracing::info!(app = D::APP, slots = writes.len(), "repaired document written back");
        }
        normalize(&mut document);
        Ok(Self { storage, document })
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn mutate<R>(&mut self, change: impl FnOnce(&mut D) -> AppResult<R>) -> AppResult<R> {
        let mut next = self.document.clone();
        let outcome = change(&mut next).map_err(|error| {
            if !error.is_rejection() {
                tracing::warn!(app = D::APP, error = %error, "mutation failed");
            }
            error
        })?;
        let writes = next.encode()?;
        if let Err(error) = self.storage.write_slots(&writes) {
            tracing::warn!(app = D::APP, error = %error, "failed to persist document");
            return Err(error);
        }
        self.document = next;
        tracing::debug!(app = D::APP, slots = writes.len(), "document persisted");
        Ok(outcome)
    }
}

/// Receives every recomputed view, after the state behind it was persisted.
pub trait ViewSink<V>: Send {
    fn present(&mut self, view: &V);
}

impl<V, F> ViewSink<V> for F
where
    F: FnMut(&V) + Send,
{
    fn present(&mut self, view: &V) {
        self(view)
    }
}

pub struct Presenter<V> {
    sinks: Vec<Box<dyn ViewSink<V>>>,
}

impl<V> Default for Presenter<V> {
    fn default() -> Self {
        Self { sinks: Vec::new() }
    }
}

impl<V> Presenter<V> {
    pub fn subscribe(&mut self, sink: impl ViewSink<V> + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn present(&mut self, view: &V) {
        for sink in self.sinks.iter_mut() {
            sink.present(view);
        }
    }
}
