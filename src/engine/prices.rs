//! Latest accepted price claim per token.

use crate::domain::{Address, Decimal};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub struct PriceClaims {
    prices: HashMap<Address, Decimal>,
    dirty: BTreeSet<Address>,
}

impl PriceClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded claim, if any. Unpriced tokens have no entry.
    pub fn get(&self, token: &Address) -> Option<&Decimal> {
        self.prices.get(token)
    }

    /// The recorded claim, or zero for an unpriced token.
    pub fn price_or_zero(&self, token: &Address) -> Decimal {
        self.prices.get(token).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, token: &Address, price: Decimal) {
        self.prices.insert(token.clone(), price);
        self.dirty.insert(token.clone());
    }

    /// Restore a persisted claim without marking it dirty.
    pub fn insert(&mut self, token: Address, price: Decimal) {
        self.prices.insert(token, price);
    }

    pub fn drain_dirty(&mut self) -> Vec<(Address, Decimal)> {
        std::mem::take(&mut self.dirty)
            .into_iter()
            .filter_map(|token| self.prices.get(&token).cloned().map(|p| (token, p)))
            .collect()
    }
}
