//! Domain entity store
//!
//! Keyed collections for every entity type plus the complete application
//! state that is persisted as one record. All mutation goes through
//! [`crate::engine::SyncEngine`], which owns the single state lock.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::entities::{
    Alert, BeneficiaryProfile, Child, DailyLog, Enrollment, Entity, HealthLog, Language, Scheme,
    Theme, User,
};
use crate::queue::{DeadLetter, SyncQueueItem};

/// Ordered collection of entities, unique by id.
///
/// Lookups by id go through a position index kept beside the records.
/// Serializes as a plain JSON array so the persisted layout stays a list.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: PartialEq> PartialEq for Collection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.items)
    }
}

impl<'de, T: Entity + Deserialize<'de>> Deserialize<'de> for Collection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from_vec)
    }
}

impl<T: Entity> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from server data, keeping the last record for a
    /// repeated id.
    pub fn from_vec(items: Vec<T>) -> Self {
        let mut collection = Self {
            items: Vec::with_capacity(items.len()),
            index: HashMap::with_capacity(items.len()),
        };
        for item in items {
            collection.upsert(item);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).and_then(|&position| self.items.get(position))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn find<P>(&self, predicate: P) -> Option<&T>
    where
        P: Fn(&T) -> bool,
    {
        self.items.iter().find(|item| predicate(item))
    }

    pub fn filter<P>(&self, predicate: P) -> Vec<&T>
    where
        P: Fn(&T) -> bool,
    {
        self.items.iter().filter(|item| predicate(item)).collect()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        let position = *self.index.get(id)?;
        self.items.get_mut(position)
    }

    /// Positions shift after a removal or a front insert.
    fn reindex(&mut self) {
        self.index.clear();
        for (position, item) in self.items.iter().enumerate() {
            self.index.insert(item.id().to_string(), position);
        }
    }

    /// Insert at the end, or replace in place when the id already exists.
    ///
    /// Returns `true` when a new record was added.
    pub fn upsert(&mut self, item: T) -> bool {
        if let Some(existing) = self.get_mut(item.id()) {
            *existing = item;
            return false;
        }
        self.index.insert(item.id().to_string(), self.items.len());
        self.items.push(item);
        true
    }

    /// Insert at the front (newest first), or replace in place when the id
    /// already exists.
    pub fn upsert_front(&mut self, item: T) -> bool {
        if let Some(existing) = self.get_mut(item.id()) {
            *existing = item;
            return false;
        }
        self.items.insert(0, item);
        self.reindex();
        true
    }

    /// Apply `f` to the record with `id`. Returns `false` if absent.
    ///
    /// `f` must not change the record's id.
    pub fn update<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        match self.get_mut(id) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let position = self.index.remove(id)?;
        let removed = self.items.remove(position);
        self.reindex();
        Some(removed)
    }

    pub fn retain<P>(&mut self, predicate: P)
    where
        P: FnMut(&T) -> bool,
    {
        let before = self.items.len();
        self.items.retain(predicate);
        if self.items.len() != before {
            self.reindex();
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    /// Upsert every record of `other`
    pub fn absorb(&mut self, other: Collection<T>) {
        for item in other.items {
            self.upsert(item);
        }
    }
}

impl<T: Entity> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

/// Entity types the store holds one slice for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slice {
    Beneficiaries,
    Children,
    Schemes,
    Enrollments,
    DailyLogs,
    HealthLogs,
    Alerts,
}

impl Slice {
    pub const ALL: [Slice; 7] = [
        Slice::Beneficiaries,
        Slice::Children,
        Slice::Schemes,
        Slice::Enrollments,
        Slice::DailyLogs,
        Slice::HealthLogs,
        Slice::Alerts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slice::Beneficiaries => "beneficiaries",
            Slice::Children => "children",
            Slice::Schemes => "schemes",
            Slice::Enrollments => "enrollments",
            Slice::DailyLogs => "dailyLogs",
            Slice::HealthLogs => "healthLogs",
            Slice::Alerts => "alerts",
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity slices of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStore {
    #[serde(default)]
    pub beneficiaries: Collection<BeneficiaryProfile>,
    #[serde(default)]
    pub children: Collection<Child>,
    #[serde(default)]
    pub health_logs: Collection<HealthLog>,
    #[serde(default)]
    pub daily_logs: Collection<DailyLog>,
    #[serde(default)]
    pub alerts: Collection<Alert>,
    #[serde(default)]
    pub schemes: Collection<Scheme>,
    #[serde(default)]
    pub enrollments: Collection<Enrollment>,
}

impl EntityStore {
    pub fn len_of(&self, slice: Slice) -> usize {
        match slice {
            Slice::Beneficiaries => self.beneficiaries.len(),
            Slice::Children => self.children.len(),
            Slice::Schemes => self.schemes.len(),
            Slice::Enrollments => self.enrollments.len(),
            Slice::DailyLogs => self.daily_logs.len(),
            Slice::HealthLogs => self.health_logs.len(),
            Slice::Alerts => self.alerts.len(),
        }
    }

    /// Remove a beneficiary and every record that hangs off it.
    pub fn remove_beneficiary_cascade(&mut self, id: &str) -> Option<BeneficiaryProfile> {
        let removed = self.beneficiaries.remove(id);
        self.children.retain(|c| c.beneficiary_id != id);
        self.health_logs.retain(|l| l.beneficiary_id != id);
        self.alerts.retain(|a| a.beneficiary_id != id);
        self.enrollments.retain(|e| e.beneficiary_id != id);
        removed
    }

    /// Layer records created in memory on top of this store.
    pub fn absorb(&mut self, pending: EntityStore) {
        self.beneficiaries.absorb(pending.beneficiaries);
        self.children.absorb(pending.children);
        self.health_logs.absorb(pending.health_logs);
        self.daily_logs.absorb(pending.daily_logs);
        self.alerts.absorb(pending.alerts);
        self.schemes.absorb(pending.schemes);
        self.enrollments.absorb(pending.enrollments);
    }

    /// Drop the per-user slices on logout. Schemes are public and stay.
    pub fn clear_session_data(&mut self) {
        self.beneficiaries.clear();
        self.children.clear();
        self.health_logs.clear();
        self.daily_logs.clear();
        self.alerts.clear();
        self.enrollments.clear();
    }
}

/// Everything that is persisted as the single named state record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub current_user: Option<User>,
    #[serde(flatten)]
    pub entities: EntityStore,
    #[serde(default)]
    pub sync_queue: Vec<SyncQueueItem>,
    #[serde(default)]
    pub dead_letters: Vec<DeadLetter>,
}

impl AppState {
    /// Merge changes made before the persisted record was loaded. Records
    /// and queue entries from `pending` win; preferences stay as persisted.
    pub fn absorb(&mut self, pending: AppState) {
        if pending.current_user.is_some() {
            self.current_user = pending.current_user;
        }
        self.entities.absorb(pending.entities);
        self.sync_queue.extend(pending.sync_queue);
        self.dead_letters.extend(pending.dead_letters);
    }

    pub fn has_changes(&self) -> bool {
        *self != AppState::default()
    }
}
