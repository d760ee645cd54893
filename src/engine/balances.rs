//! Per-account, per-token leaf balances.
//!
//! These rows are the source of every account-side delta. The engine only needs
//! to know when a leaf appears or disappears so scope balance counts follow.

use crate::domain::{Address, ExactAmount};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafBalance {
    pub value_exact: ExactAmount,
    pub frozen_exact: ExactAmount,
}

impl LeafBalance {
    pub fn available_exact(&self) -> ExactAmount {
        &self.value_exact - &self.frozen_exact
    }

    fn is_empty(&self) -> bool {
        self.value_exact.is_zero() && self.frozen_exact.is_zero()
    }
}

/// How a leaf changed existence after an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafTransition {
    Created,
    Removed,
    Unchanged,
}

impl LeafTransition {
    /// Contribution to a scope's balance counter.
    pub fn count_delta(self) -> i64 {
        match self {
            LeafTransition::Created => 1,
            LeafTransition::Removed => -1,
            LeafTransition::Unchanged => 0,
        }
    }
}

/// A persisted-form change: `balance == None` means the leaf was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafBalanceChange {
    pub token: Address,
    pub account: Address,
    pub balance: Option<LeafBalance>,
}

#[derive(Debug, Default)]
pub struct LeafBalances {
    /// token -> account -> balance
    balances: HashMap<Address, BTreeMap<Address, LeafBalance>>,
    dirty: BTreeSet<(Address, Address)>,
}

impl LeafBalances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account: &Address, token: &Address) -> Option<&LeafBalance> {
        self.balances.get(token).and_then(|holders| holders.get(account))
    }

    /// Add a signed delta to the leaf's value.
    pub fn adjust_value(
        &mut self,
        account: &Address,
        token: &Address,
        delta: &ExactAmount,
    ) -> LeafTransition {
        self.adjust(account, token, |leaf| leaf.value_exact += delta)
    }

    /// Add a signed delta to the leaf's frozen amount.
    pub fn adjust_frozen(
        &mut self,
        account: &Address,
        token: &Address,
        delta: &ExactAmount,
    ) -> LeafTransition {
        self.adjust(account, token, |leaf| leaf.frozen_exact += delta)
    }

    fn adjust(
        &mut self,
        account: &Address,
        token: &Address,
        change: impl FnOnce(&mut LeafBalance),
    ) -> LeafTransition {
        self.dirty.insert((token.clone(), account.clone()));
        let holders = self.balances.entry(token.clone()).or_default();
        let existed = holders.contains_key(account);
        let leaf = holders.entry(account.clone()).or_default();
        change(leaf);

        match (existed, leaf.is_empty()) {
            (true, true) => {
                holders.remove(account);
                LeafTransition::Removed
            }
            (false, true) => {
                holders.remove(account);
                LeafTransition::Unchanged
            }
            (false, false) => LeafTransition::Created,
            (true, false) => LeafTransition::Unchanged,
        }
    }

    /// Current holders of `token` with their balances, in account order.
    pub fn holders(&self, token: &Address) -> Vec<(Address, LeafBalance)> {
        self.balances
            .get(token)
            .map(|holders| {
                holders
                    .iter()
                    .map(|(account, leaf)| (account.clone(), leaf.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Restore a persisted leaf without marking it dirty.
    pub fn insert(&mut self, account: Address, token: Address, balance: LeafBalance) {
        self.balances.entry(token).or_default().insert(account, balance);
    }

    pub fn drain_dirty(&mut self) -> Vec<LeafBalanceChange> {
        std::mem::take(&mut self.dirty)
            .into_iter()
            .map(|(token, account)| {
                let balance = self.get(&account, &token).cloned();
                LeafBalanceChange {
                    token,
                    account,
                    balance,
                }
            })
            .collect()
    }
}
