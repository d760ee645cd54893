//! Event handlers that turn balance-affecting events into scope deltas.
//!
//! Each handler computes a signed exact delta, values it through
//! [`ValuationResolver`], applies it to every affected scope, repairs sibling
//! percentages when a token-type value moved, and finally records one snapshot
//! per touched scope. Zero deltas are skipped without touching any state.

use super::balances::{LeafBalanceChange, LeafBalances, LeafTransition};
use super::cascade::cascade_for_system;
use super::prices::PriceClaims;
use super::registry::{TokenRecord, TokenRegistry};
use super::scope::ScopeKey;
use super::state::{ScopeDelta, ScopeState};
use super::store::{MemoryScopeStore, ScopeStore};
use super::timeseries::{TimeseriesRecorder, TimeseriesSnapshot};
use super::valuation::ValuationResolver;
use crate::domain::{
    Address, Decimal, Event, EventId, EventKind, ExactAmount, FreezeDirection, TimeMs, TokenRef,
};
use tracing::debug;

/// Everything mutated since the last [`Aggregator::take_changes`].
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub scopes: Vec<ScopeState>,
    pub snapshots: Vec<TimeseriesSnapshot>,
    pub tokens: Vec<TokenRecord>,
    pub prices: Vec<(Address, Decimal)>,
    pub balances: Vec<LeafBalanceChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
            && self.snapshots.is_empty()
            && self.tokens.is_empty()
            && self.prices.is_empty()
            && self.balances.is_empty()
    }
}

pub struct Aggregator<S: ScopeStore = MemoryScopeStore> {
    store: S,
    registry: TokenRegistry,
    prices: PriceClaims,
    balances: LeafBalances,
}

impl Aggregator<MemoryScopeStore> {
    pub fn new() -> Self {
        Self::with_store(MemoryScopeStore::new())
    }
}

impl Default for Aggregator<MemoryScopeStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ScopeStore> Aggregator<S> {
    pub fn with_store(store: S) -> Self {
        Self::from_parts(
            store,
            TokenRegistry::new(),
            PriceClaims::new(),
            LeafBalances::new(),
        )
    }

    /// Assemble an aggregator from previously persisted state.
    pub fn from_parts(
        store: S,
        registry: TokenRegistry,
        prices: PriceClaims,
        balances: LeafBalances,
    ) -> Self {
        Self {
            store,
            registry,
            prices,
            balances,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn prices(&self) -> &PriceClaims {
        &self.prices
    }

    pub fn balances(&self) -> &LeafBalances {
        &self.balances
    }

    pub fn scope(&self, key: &ScopeKey) -> Option<&ScopeState> {
        self.store.get(key)
    }

    /// Unit price of `token` as currently resolved.
    pub fn unit_price(&self, token: &TokenRef) -> Decimal {
        ValuationResolver::new(&self.registry, &self.prices).unit_price(token)
    }

    /// Drain everything mutated since the previous call.
    pub fn take_changes(&mut self) -> ChangeSet {
        ChangeSet {
            scopes: self.store.take_dirty(),
            snapshots: self.store.take_snapshots(),
            tokens: self.registry.drain_dirty(),
            prices: self.prices.drain_dirty(),
            balances: self.balances.drain_dirty(),
        }
    }

    // =========================================================================
    // Event dispatch
    // =========================================================================

    /// Apply one event. Returns the number of snapshots recorded.
    pub fn handle(&mut self, event: &Event) -> usize {
        let mut recorder = TimeseriesRecorder::new(event.id, event.timestamp);
        let token = self.register(&mut recorder, &event.token);

        match &event.kind {
            EventKind::Created => self.token_created_in(&mut recorder, &token),
            EventKind::Mint { to, amount } => {
                self.increase_balance_in(&mut recorder, to, &token, amount);
                self.supply_changed_in(&mut recorder, &token, amount);
            }
            EventKind::Burn { from, amount } => {
                self.decrease_balance_in(&mut recorder, from, &token, amount);
                self.supply_changed_in(&mut recorder, &token, &-amount);
            }
            EventKind::Transfer { from, to, amount } => {
                self.decrease_balance_in(&mut recorder, from, &token, amount);
                self.increase_balance_in(&mut recorder, to, &token, amount);
            }
            EventKind::ForcedTransfer { from, to, amount } => {
                self.release_frozen_shortfall(&mut recorder, from, &token, amount);
                self.decrease_balance_in(&mut recorder, from, &token, amount);
                self.increase_balance_in(&mut recorder, to, &token, amount);
            }
            EventKind::FreezeDelta {
                account,
                direction,
                amount,
            } => match direction {
                FreezeDirection::Freeze => {
                    self.increase_frozen_in(&mut recorder, account, &token, amount)
                }
                FreezeDirection::Unfreeze => {
                    self.decrease_frozen_in(&mut recorder, account, &token, amount)
                }
            },
            EventKind::PriceChange {
                old_price,
                new_price,
            } => self.price_changed_in(&mut recorder, &token, old_price.as_ref(), new_price),
            EventKind::SupplyChange { delta } => {
                self.supply_changed_in(&mut recorder, &token, delta)
            }
            EventKind::Launch => self.token_launched_in(&mut recorder, &token),
        }

        let touched = recorder.touched().len();
        debug!(
            event = %event.id,
            kind = event.kind.name(),
            token = %token.address,
            touched,
            "Event applied"
        );
        recorder.flush(&mut self.store)
    }

    // =========================================================================
    // Single-operation entry points
    // =========================================================================

    pub fn increase_balance(
        &mut self,
        event: EventId,
        timestamp: TimeMs,
        account: &Address,
        token: &TokenRef,
        amount: &ExactAmount,
    ) -> usize {
        let mut recorder = TimeseriesRecorder::new(event, timestamp);
        let token = self.register(&mut recorder, token);
        self.increase_balance_in(&mut recorder, account, &token, amount);
        recorder.flush(&mut self.store)
    }

    pub fn decrease_balance(
        &mut self,
        event: EventId,
        timestamp: TimeMs,
        account: &Address,
        token: &TokenRef,
        amount: &ExactAmount,
    ) -> usize {
        let mut recorder = TimeseriesRecorder::new(event, timestamp);
        let token = self.register(&mut recorder, token);
        self.decrease_balance_in(&mut recorder, account, &token, amount);
        recorder.flush(&mut self.store)
    }

    pub fn increase_frozen(
        &mut self,
        event: EventId,
        timestamp: TimeMs,
        account: &Address,
        token: &TokenRef,
        amount: &ExactAmount,
    ) -> usize {
        let mut recorder = TimeseriesRecorder::new(event, timestamp);
        let token = self.register(&mut recorder, token);
        self.increase_frozen_in(&mut recorder, account, &token, amount);
        recorder.flush(&mut self.store)
    }

    pub fn decrease_frozen(
        &mut self,
        event: EventId,
        timestamp: TimeMs,
        account: &Address,
        token: &TokenRef,
        amount: &ExactAmount,
    ) -> usize {
        let mut recorder = TimeseriesRecorder::new(event, timestamp);
        let token = self.register(&mut recorder, token);
        self.decrease_frozen_in(&mut recorder, account, &token, amount);
        recorder.flush(&mut self.store)
    }

    pub fn price_changed(
        &mut self,
        event: EventId,
        timestamp: TimeMs,
        token: &TokenRef,
        old_price: Option<&Decimal>,
        new_price: &Decimal,
    ) -> usize {
        let mut recorder = TimeseriesRecorder::new(event, timestamp);
        let token = self.register(&mut recorder, token);
        self.price_changed_in(&mut recorder, &token, old_price, new_price);
        recorder.flush(&mut self.store)
    }

    pub fn supply_changed(
        &mut self,
        event: EventId,
        timestamp: TimeMs,
        token: &TokenRef,
        delta: &ExactAmount,
    ) -> usize {
        let mut recorder = TimeseriesRecorder::new(event, timestamp);
        let token = self.register(&mut recorder, token);
        self.supply_changed_in(&mut recorder, &token, delta);
        recorder.flush(&mut self.store)
    }

    pub fn token_created(&mut self, event: EventId, timestamp: TimeMs, token: &TokenRef) -> usize {
        let mut recorder = TimeseriesRecorder::new(event, timestamp);
        let token = self.register(&mut recorder, token);
        self.token_created_in(&mut recorder, &token);
        recorder.flush(&mut self.store)
    }

    pub fn token_launched(&mut self, event: EventId, timestamp: TimeMs, token: &TokenRef) -> usize {
        let mut recorder = TimeseriesRecorder::new(event, timestamp);
        let token = self.register(&mut recorder, token);
        self.token_launched_in(&mut recorder, &token);
        recorder.flush(&mut self.store)
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Upsert `token` and return the registered reference.
    ///
    /// Changed bond terms move the unit price, so holdings built at the old
    /// price are repriced within the current event.
    fn register(&mut self, recorder: &mut TimeseriesRecorder, token: &TokenRef) -> TokenRef {
        let before = self
            .registry
            .get(&token.address)
            .map(|record| record.token.clone())
            .filter(|registered| registered.bond != token.bond)
            .map(|registered| self.unit_price(&registered));

        let registered = self.registry.upsert(token).token.clone();

        if let Some(old_unit) = before {
            let unit_delta = &self.unit_price(&registered) - &old_unit;
            if !unit_delta.is_zero() {
                debug!(
                    token = %registered.address,
                    unit_delta = %unit_delta,
                    "Bond terms changed, repricing holdings"
                );
                self.reprice_in(recorder, &registered, &unit_delta);
            }
        }
        registered
    }

    fn increase_balance_in(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        account: &Address,
        token: &TokenRef,
        amount: &ExactAmount,
    ) {
        self.balance_delta_in(recorder, account, token, amount.clone());
    }

    fn decrease_balance_in(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        account: &Address,
        token: &TokenRef,
        amount: &ExactAmount,
    ) {
        self.balance_delta_in(recorder, account, token, -amount);
    }

    fn balance_delta_in(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        account: &Address,
        token: &TokenRef,
        delta: ExactAmount,
    ) {
        if delta.is_zero() {
            return;
        }
        let transition = self.balances.adjust_value(account, &token.address, &delta);
        let base_value = &delta.to_scaled(token.decimals) * &self.unit_price(token);

        let scope_delta = ScopeDelta::new(token.decimals)
            .value(delta)
            .base_value(base_value)
            .balances(transition.count_delta());
        for key in ScopeKey::balance_scopes(account, token) {
            self.apply(recorder, &key, &scope_delta);
        }
        self.holder_count_in(recorder, token, transition);
    }

    fn increase_frozen_in(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        account: &Address,
        token: &TokenRef,
        amount: &ExactAmount,
    ) {
        self.frozen_delta_in(recorder, account, token, amount.clone());
    }

    fn decrease_frozen_in(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        account: &Address,
        token: &TokenRef,
        amount: &ExactAmount,
    ) {
        self.frozen_delta_in(recorder, account, token, -amount);
    }

    fn frozen_delta_in(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        account: &Address,
        token: &TokenRef,
        delta: ExactAmount,
    ) {
        if delta.is_zero() {
            return;
        }
        let transition = self.balances.adjust_frozen(account, &token.address, &delta);
        let scope_delta = ScopeDelta::new(token.decimals)
            .frozen(delta)
            .balances(transition.count_delta());
        for key in ScopeKey::balance_scopes(account, token) {
            self.apply(recorder, &key, &scope_delta);
        }
        self.holder_count_in(recorder, token, transition);
    }

    /// A forced transfer may move frozen tokens; unfreeze what the sender lacks.
    fn release_frozen_shortfall(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        from: &Address,
        token: &TokenRef,
        amount: &ExactAmount,
    ) {
        let Some(leaf) = self.balances.get(from, &token.address) else {
            return;
        };
        let shortfall = amount - &leaf.available_exact();
        if shortfall.is_negative() || shortfall.is_zero() {
            return;
        }
        let release = shortfall.min(leaf.frozen_exact.clone());
        self.decrease_frozen_in(recorder, from, token, &release);
    }

    /// Keep supply-side holder counts in step with leaf creation and removal.
    fn holder_count_in(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        token: &TokenRef,
        transition: LeafTransition,
    ) {
        let count = transition.count_delta();
        if count == 0 {
            return;
        }
        let scope_delta = ScopeDelta::new(token.decimals).token_balances(count);
        for key in ScopeKey::supply_scopes(token) {
            self.apply(recorder, &key, &scope_delta);
        }
    }

    fn supply_changed_in(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        token: &TokenRef,
        delta: &ExactAmount,
    ) {
        if delta.is_zero() {
            return;
        }
        let base_value = &delta.to_scaled(token.decimals) * &self.unit_price(token);
        let scope_delta = ScopeDelta::new(token.decimals)
            .value(delta.clone())
            .base_value(base_value);
        self.apply_supply_delta(recorder, token, &scope_delta);
    }

    fn apply_supply_delta(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        token: &TokenRef,
        scope_delta: &ScopeDelta,
    ) {
        for key in ScopeKey::supply_scopes(token) {
            self.apply(recorder, &key, scope_delta);
        }
        if !scope_delta.base_value.is_zero() {
            cascade_for_system(&mut self.store, &token.system, &token.token_type, recorder);
        }
    }

    /// Reprice `token` and every bond denominated in it.
    ///
    /// The recorded claim is the baseline for the old price so totals stay equal
    /// to the sum of balance times current unit price.
    fn price_changed_in(
        &mut self,
        recorder: &mut TimeseriesRecorder,
        token: &TokenRef,
        old_price: Option<&Decimal>,
        new_price: &Decimal,
    ) {
        if let Some(old_price) = old_price {
            let recorded = self.prices.price_or_zero(&token.address);
            if *old_price != recorded {
                debug!(
                    token = %token.address,
                    reported = %old_price,
                    recorded = %recorded,
                    "Reported old price differs from recorded claim"
                );
            }
        }

        let mut affected = vec![token.clone()];
        affected.extend(
            self.registry
                .dependent_bonds(&token.address)
                .into_iter()
                .cloned(),
        );
        let before: Vec<Decimal> = affected.iter().map(|t| self.unit_price(t)).collect();

        self.prices.set(&token.address, new_price.clone());

        for (priced, old_unit) in affected.iter().zip(before) {
            let unit_delta = &self.unit_price(priced) - &old_unit;
            if unit_delta.is_zero() {
                continue;
            }
            self.reprice_in(recorder, priced, &unit_delta);
        }
    }

    fn reprice_in(&mut self, recorder: &mut TimeseriesRecorder, token: &TokenRef, unit_delta: &Decimal) {
        let supply = self
            .store
            .get(&ScopeKey::Token {
                token: token.address.clone(),
            })
            .map(|s| s.total_value.clone())
            .unwrap_or_default();
        let supply_delta = ScopeDelta::new(token.decimals).base_value(&supply * unit_delta);
        self.apply_supply_delta(recorder, token, &supply_delta);

        for (account, leaf) in self.balances.holders(&token.address) {
            let holder_delta = ScopeDelta::new(token.decimals)
                .base_value(&leaf.value_exact.to_scaled(token.decimals) * unit_delta);
            for key in ScopeKey::balance_scopes(&account, token) {
                self.apply(recorder, &key, &holder_delta);
            }
        }
    }

    fn token_created_in(&mut self, recorder: &mut TimeseriesRecorder, token: &TokenRef) {
        if !self.registry.mark_created(&token.address) {
            return;
        }
        let scope_delta = ScopeDelta::new(token.decimals).count(1);
        let [system, system_token_type, _] = ScopeKey::supply_scopes(token);
        self.apply(recorder, &system, &scope_delta);
        self.apply(recorder, &system_token_type, &scope_delta);
    }

    fn token_launched_in(&mut self, recorder: &mut TimeseriesRecorder, token: &TokenRef) {
        if !self.registry.mark_launched(&token.address) {
            debug!(token = %token.address, "Token already launched");
            return;
        }
        let system = ScopeKey::System {
            system: token.system.clone(),
        };
        self.apply(recorder, &system, &ScopeDelta::new(token.decimals).launched(1));
    }

    /// Apply `delta` to one scope. Zero deltas neither initialize nor touch it.
    fn apply(&mut self, recorder: &mut TimeseriesRecorder, key: &ScopeKey, delta: &ScopeDelta) -> bool {
        if delta.is_zero() {
            return false;
        }
        self.store.fetch_or_init(key).apply(delta);
        recorder.touch(key);
        true
    }
}
