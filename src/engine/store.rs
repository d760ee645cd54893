//! Scope state storage seam.
//!
//! The façade only talks to [`ScopeStore`]; [`MemoryScopeStore`] is the
//! in-process implementation that the replay host hydrates from and flushes to
//! SQLite. There is exactly one writer, the sequential event loop.

use super::scope::ScopeKey;
use super::state::ScopeState;
use super::timeseries::TimeseriesSnapshot;
use crate::domain::{Address, TokenType};
use std::collections::{BTreeSet, HashMap};

pub trait ScopeStore {
    fn get(&self, key: &ScopeKey) -> Option<&ScopeState>;

    /// Fetch the live state, zero-initializing it on first touch.
    fn fetch_or_init(&mut self, key: &ScopeKey) -> &mut ScopeState;

    /// Every System × TokenType scope that exists under `system`.
    fn token_type_scopes(&self, system: &Address) -> Vec<ScopeKey>;

    fn record_snapshot(&mut self, snapshot: TimeseriesSnapshot);

    /// States mutated since the last call.
    fn take_dirty(&mut self) -> Vec<ScopeState>;

    /// Snapshots recorded since the last call.
    fn take_snapshots(&mut self) -> Vec<TimeseriesSnapshot>;
}

#[derive(Debug, Default)]
pub struct MemoryScopeStore {
    states: HashMap<ScopeKey, ScopeState>,
    token_types: HashMap<Address, BTreeSet<TokenType>>,
    snapshots: Vec<TimeseriesSnapshot>,
    dirty: BTreeSet<ScopeKey>,
}

impl MemoryScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a persisted state without marking it dirty.
    pub fn insert(&mut self, state: ScopeState) {
        self.index(&state.key);
        self.states.insert(state.key.clone(), state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> impl Iterator<Item = &ScopeState> {
        self.states.values()
    }

    /// Snapshots recorded and not yet taken.
    pub fn snapshots(&self) -> &[TimeseriesSnapshot] {
        &self.snapshots
    }

    fn index(&mut self, key: &ScopeKey) {
        if let ScopeKey::SystemTokenType { system, token_type } = key {
            self.token_types
                .entry(system.clone())
                .or_default()
                .insert(token_type.clone());
        }
    }
}

impl ScopeStore for MemoryScopeStore {
    fn get(&self, key: &ScopeKey) -> Option<&ScopeState> {
        self.states.get(key)
    }

    fn fetch_or_init(&mut self, key: &ScopeKey) -> &mut ScopeState {
        if !self.states.contains_key(key) {
            self.index(key);
        }
        self.dirty.insert(key.clone());
        self.states
            .entry(key.clone())
            .or_insert_with(|| ScopeState::new(key.clone()))
    }

    fn token_type_scopes(&self, system: &Address) -> Vec<ScopeKey> {
        self.token_types
            .get(system)
            .into_iter()
            .flatten()
            .map(|token_type| ScopeKey::SystemTokenType {
                system: system.clone(),
                token_type: token_type.clone(),
            })
            .collect()
    }

    fn record_snapshot(&mut self, snapshot: TimeseriesSnapshot) {
        self.snapshots.push(snapshot);
    }

    fn take_dirty(&mut self) -> Vec<ScopeState> {
        std::mem::take(&mut self.dirty)
            .into_iter()
            .filter_map(|key| self.states.get(&key).cloned())
            .collect()
    }

    fn take_snapshots(&mut self) -> Vec<TimeseriesSnapshot> {
        std::mem::take(&mut self.snapshots)
    }
}
