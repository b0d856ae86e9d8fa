//! Bounded linear undo/redo log of whole-surface snapshots.
//!
//! Navigation does not touch the surface directly: `undo`, `redo` and
//! `restore` move the cursor and hand back a [`RestoreRequest`]. Each request
//! carries a token; only the most recently issued token may still be applied,
//! so a slow decode finishing after a newer request is dropped by the caller.

use crate::codec;
use crate::error::{DrawError, DrawResult};
use image::RgbaImage;
use std::collections::VecDeque;
use std::sync::Arc;

pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Immutable encoded copy of the full surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(Arc<str>);

impl Snapshot {
    pub fn capture(surface: &RgbaImage) -> DrawResult<Self> {
        Ok(Self(codec::to_data_url(surface)?.into()))
    }

    /// Wrap an already encoded token without validating it.
    pub fn from_token(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }

    pub fn decode(&self) -> DrawResult<RgbaImage> {
        codec::from_data_url(&self.0)
    }
}

/// A pending request to put the snapshot at `index` back on the surface.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub token: u64,
    pub index: usize,
    pub snapshot: Snapshot,
}

impl RestoreRequest {
    pub fn decode(&self) -> DrawResult<RgbaImage> {
        self.snapshot.decode()
    }
}

#[derive(Debug)]
pub struct History {
    entries: VecDeque<Snapshot>,
    cursor: usize,
    max_entries: usize,
    next_token: u64,
    latest_token: Option<u64>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.max(1) + 1),
            cursor: 0,
            max_entries: max_entries.max(1),
            next_token: 0,
            latest_token: None,
        }
    }

    /// Append a snapshot after the cursor, discarding the redo branch.
    ///
    /// Any restore request still in flight becomes stale.
    pub fn record(&mut self, snapshot: Snapshot) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(snapshot);
        if self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
        self.latest_token = None;
    }

    pub fn undo(&mut self) -> Option<RestoreRequest> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.issue(self.cursor))
    }

    pub fn redo(&mut self) -> Option<RestoreRequest> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.issue(self.cursor))
    }

    /// Jump to `index` without recording anything.
    pub fn restore(&mut self, index: usize) -> DrawResult<RestoreRequest> {
        if index >= self.entries.len() {
            return Err(DrawError::MissingSnapshot(index));
        }
        self.cursor = index;
        Ok(self.issue(index))
    }

    /// Whether `token` is the newest request issued since the last record.
    pub fn is_current(&self, token: u64) -> bool {
        self.latest_token == Some(token)
    }

    /// Mark a request as applied so it cannot be applied twice.
    pub fn settle(&mut self, token: u64) {
        if self.is_current(token) {
            self.latest_token = None;
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.cursor < self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.cursor)
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    fn issue(&mut self, index: usize) -> RestoreRequest {
        self.next_token += 1;
        self.latest_token = Some(self.next_token);
        RestoreRequest {
            token: self.next_token,
            index,
            snapshot: self.entries[index].clone(),
        }
    }
}
