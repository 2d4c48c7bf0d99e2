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

//! The process-wide session registry (spec §4.2).
//!
//! Three indices — by id, by destination, by style — must update
//! atomically on register/unregister, which is why this wraps a single
//! `RwLock<Inner>` rather than a set of independently-locked `DashMap`s: a
//! torn update between indices would let a lookup see a session registered
//! by id but not yet by destination.

use crate::error::Category;
use crate::session::{SessionId, SessionRecord, Style};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct Inner {
    by_id: HashMap<SessionId, Arc<SessionRecord>>,
    by_destination: HashMap<String, SessionId>,
    /// Most-recently-registered session of each style goes to the back;
    /// `most_recent_by_style` reads from there (spec §4.2 "Most-recent
    /// selection").
    by_style: HashMap<Style, Vec<SessionId>>,
}

/// Shared, thread-safe session registry. Cheap to clone (`Arc` inside).
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<Inner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. Fails with `DuplicateId` or `DuplicateDest`
    /// if either index already has an entry — both checks and both
    /// insertions happen under one write lock (spec §4.2 "Uniqueness
    /// contract").
    pub fn register(&self, record: SessionRecord) -> Result<Arc<SessionRecord>, Category> {
        let mut inner = self.inner.write().expect("registry lock poisoned");

        if inner.by_id.contains_key(&record.id) {
            return Err(Category::DuplicateId);
        }
        let canonical = record.destination.canonical().to_string();
        if inner.by_destination.contains_key(&canonical) {
            return Err(Category::DuplicateDest);
        }

        let id = record.id.clone();
        let style = record.style;
        let record = Arc::new(record);

        inner.by_id.insert(id.clone(), record.clone());
        inner.by_destination.insert(canonical, id.clone());
        inner.by_style.entry(style).or_default().push(id);

        Ok(record)
    }

    /// Remove a session by id. Idempotent: unregistering an id that is not
    /// present is not an error (spec §4.2 "Unregister").
    pub fn unregister(&self, id: &SessionId) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let Some(record) = inner.by_id.remove(id) else {
            return;
        };
        // Only clear the destination index if this id is actually the one
        // holding it: a subsession shares its primary's destination but
        // was never entered into `by_destination` (`register_subsession`),
        // so removing it must not evict the primary's entry.
        if inner.by_destination.get(record.destination.canonical()) == Some(id) {
            inner.by_destination.remove(record.destination.canonical());
        }
        if let Some(ids) = inner.by_style.get_mut(&record.style) {
            ids.retain(|existing| existing != id);
        }
    }

    /// Register a `PRIMARY` subsession. Subsessions share their primary's
    /// destination by design, so unlike [`register`](Self::register) this
    /// skips the destination-uniqueness index entirely (spec §4.6 "SESSION
    /// ADD shares the primary destination").
    pub fn register_subsession(&self, record: SessionRecord) -> Result<Arc<SessionRecord>, Category> {
        let mut inner = self.inner.write().expect("registry lock poisoned");

        if inner.by_id.contains_key(&record.id) {
            return Err(Category::DuplicateId);
        }

        let id = record.id.clone();
        let style = record.style;
        let record = Arc::new(record);

        inner.by_id.insert(id.clone(), record.clone());
        inner.by_style.entry(style).or_default().push(id);

        Ok(record)
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionRecord>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .by_id
            .get(id)
            .cloned()
    }

    pub fn get_by_destination(&self, canonical: &str) -> Option<Arc<SessionRecord>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let id = inner.by_destination.get(canonical)?;
        inner.by_id.get(id).cloned()
    }

    /// The most recently registered still-live session of `style`, used by
    /// `DATAGRAM SEND`/`RAW SEND` when no session id targets a specific
    /// session (spec §4.5).
    pub fn most_recent_by_style(&self, style: Style) -> Option<Arc<SessionRecord>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let ids = inner.by_style.get(&style)?;
        let id = ids.last()?;
        inner.by_id.get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<SessionRecord>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .by_id
            .values()
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::Destination;
    use crate::session::SessionConfig;

    fn record(id: &str, style: Style, dest_byte: u8) -> SessionRecord {
        SessionRecord::new(
            SessionId::new(id),
            style,
            Destination::from_bytes(vec![dest_byte]),
            SessionConfig::default(),
        )
    }

    #[test]
    fn register_rejects_duplicate_id() {
        let registry = Registry::new();
        registry.register(record("a", Style::Stream, 1)).unwrap();
        let err = registry
            .register(record("a", Style::Stream, 2))
            .unwrap_err();
        assert_eq!(err, Category::DuplicateId);
    }

    #[test]
    fn register_rejects_duplicate_destination() {
        let registry = Registry::new();
        registry.register(record("a", Style::Stream, 1)).unwrap();
        let err = registry
            .register(record("b", Style::Stream, 1))
            .unwrap_err();
        assert_eq!(err, Category::DuplicateDest);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = Registry::new();
        registry.register(record("a", Style::Stream, 1)).unwrap();
        registry.unregister(&SessionId::new("a"));
        registry.unregister(&SessionId::new("a"));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn subsession_sharing_destination_does_not_evict_primary_on_removal() {
        let registry = Registry::new();
        registry
            .register(record("primary", Style::Primary, 1))
            .unwrap();
        registry
            .register_subsession(record("sub", Style::Stream, 1))
            .unwrap();

        registry.unregister(&SessionId::new("sub"));

        let dest = Destination::from_bytes(vec![1]);
        assert!(registry.get_by_destination(dest.canonical()).is_some());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn most_recent_by_style_tracks_registration_order() {
        let registry = Registry::new();
        registry
            .register(record("first", Style::Datagram, 1))
            .unwrap();
        registry
            .register(record("second", Style::Datagram, 2))
            .unwrap();
        let recent = registry.most_recent_by_style(Style::Datagram).unwrap();
        assert_eq!(recent.id.as_str(), "second");

        registry.unregister(&SessionId::new("second"));
        let recent = registry.most_recent_by_style(Style::Datagram).unwrap();
        assert_eq!(recent.id.as_str(), "first");
    }

    #[test]
    fn get_by_destination_finds_registered_session() {
        let registry = Registry::new();
        registry.register(record("a", Style::Raw, 42)).unwrap();
        let dest = Destination::from_bytes(vec![42]);
        let found = registry.get_by_destination(dest.canonical()).unwrap();
        assert_eq!(found.id.as_str(), "a");
    }
}
