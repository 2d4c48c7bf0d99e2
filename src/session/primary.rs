// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! `PRIMARY` sessions and their subsessions (spec §3 "PrimarySession",
//! §4.6 "SESSION ADD/REMOVE").
//!
//! A `PRIMARY` session owns one I2CP destination and tunnel pool; `SESSION
//! ADD` attaches a `STREAM`/`DATAGRAM`/`RAW` subsession that shares it
//! instead of opening a new one. A subsession is tracked here by its id and
//! style; the registry continues to be the only place session records
//! themselves live.

use crate::error::Category;
use crate::session::{SessionId, Style};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-`PRIMARY`-session table of attached subsessions.
#[derive(Default)]
pub struct PrimarySession {
    subsessions: RwLock<HashMap<SessionId, Style>>,
}

impl PrimarySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subsession. Rejects `PRIMARY`/`MASTER` (a primary session
    /// cannot itself be a subsession, spec §4.6 "ADD") and a duplicate id.
    pub fn add(&self, id: SessionId, style: Style) -> Result<(), Category> {
        if style == Style::Primary {
            return Err(Category::InvalidKey(
                "PRIMARY cannot be added as a subsession".to_string(),
            ));
        }
        let mut subsessions = self.subsessions.write().expect("primary lock poisoned");
        if subsessions.contains_key(&id) {
            return Err(Category::DuplicateId);
        }
        subsessions.insert(id, style);
        Ok(())
    }

    /// Detach a subsession. Idempotent, matching [`crate::session::registry::Registry::unregister`].
    pub fn remove(&self, id: &SessionId) {
        self.subsessions
            .write()
            .expect("primary lock poisoned")
            .remove(id);
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.subsessions
            .read()
            .expect("primary lock poisoned")
            .contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.subsessions.read().expect("primary lock poisoned").len()
    }
}

/// Process-wide map of `PRIMARY` session id to its subsession table.
///
/// Unlike the main [`registry`](crate::session::registry), this needs no
/// cross-index atomicity — each entry is independent, keyed only by id — so
/// a sharded [`DashMap`] fits directly, matching `i2p-rs`'s session-table
/// style rather than the registry's single-lock design.
#[derive(Clone, Default)]
pub struct PrimaryTable {
    inner: Arc<DashMap<SessionId, Arc<PrimarySession>>>,
}

impl PrimaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or return the existing) subsession table for `id`.
    pub fn get_or_insert(&self, id: SessionId) -> Arc<PrimarySession> {
        self.inner
            .entry(id)
            .or_insert_with(|| Arc::new(PrimarySession::new()))
            .clone()
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<PrimarySession>> {
        self.inner.get(id).map(|entry| entry.clone())
    }

    pub fn remove(&self, id: &SessionId) {
        self.inner.remove(id);
    }
}
