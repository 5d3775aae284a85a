//! Éléments vus récemment, conservés par identité de session
//!
//! Chaque identité possède un ensemble ordonné, le plus récent d'abord. Revoir
//! un élément le remet en tête et remplace son entrée.

use crate::models::ContentKind;
use crate::session::{PortalSession, SessionKey};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Entrées gardées par identité avant que les plus anciennes ne soient retirées
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentItem {
    pub id: String,
    pub kind: ContentKind,
    pub name: String,
    #[serde(default)]
    pub cmd: String,
    pub viewed_at: DateTime<Utc>,
}

impl RecentItem {
    pub fn new(id: impl Into<String>, kind: ContentKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            cmd: String::new(),
            viewed_at: Utc::now(),
        }
    }
}

pub struct RecentlyViewed {
    capacity: usize,
    entries: Mutex<HashMap<SessionKey, IndexMap<String, RecentItem>>>,
}

impl Default for RecentlyViewed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecentlyViewed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionKey, IndexMap<String, RecentItem>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enregistre une consultation, en plaçant `item` en tête
    pub fn add(&self, session: &PortalSession, item: RecentItem) {
        let mut entries = self.lock();
        let items = entries.entry(session.key()).or_default();
        items.shift_remove(&item.id);
        items.shift_insert(0, item.id.clone(), item);
        items.truncate(self.capacity);
    }

    /// Retire `id` ; les ids absents sont ignorés
    pub fn remove(&self, session: &PortalSession, id: &str) {
        if let Some(items) = self.lock().get_mut(&session.key()) {
            items.shift_remove(id);
        }
    }

    /// Éléments de `session`, le plus récent d'abord
    pub fn list(&self, session: &PortalSession) -> Vec<RecentItem> {
        self.lock()
            .get(&session.key())
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, session: &PortalSession, id: &str) -> bool {
        self.lock()
            .get(&session.key())
            .is_some_and(|items| items.contains_key(id))
    }

    pub fn clear(&self, session: &PortalSession) {
        self.lock().remove(&session.key());
    }

    /// Oublie toutes les identités
    pub fn reset(&self) {
        self.lock().clear();
    }
}
