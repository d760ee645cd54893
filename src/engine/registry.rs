//! Fetch-or-create cache of token reference data.

use crate::domain::{Address, TokenRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A registered token plus its one-shot lifecycle flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub token: TokenRef,
    pub created: bool,
    pub launched: bool,
}

#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: HashMap<Address, TokenRecord>,
    /// denomination asset -> bonds denominated in it
    dependents: HashMap<Address, BTreeSet<Address>>,
    dirty: BTreeSet<Address>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token`, or refresh its bond terms if they changed.
    ///
    /// System, token type and decimals are fixed by the first sighting; a later
    /// reference that disagrees keeps the registered values.
    pub fn upsert(&mut self, token: &TokenRef) -> &TokenRecord {
        let previous_bond = self.tokens.get(&token.address).map(|existing| {
            if existing.token.system != token.system
                || existing.token.token_type != token.token_type
                || existing.token.decimals != token.decimals
            {
                debug!(
                    token = %token.address,
                    "Ignoring changed token identity, keeping first registration"
                );
            }
            existing.token.bond.clone()
        });
        if previous_bond.as_ref().is_some_and(|bond| *bond == token.bond) {
            return &self.tokens[&token.address];
        }

        if let Some(asset) = previous_bond.flatten().map(|b| b.denomination_asset) {
            if let Some(bonds) = self.dependents.get_mut(&asset) {
                bonds.remove(&token.address);
            }
        }
        if let Some(bond) = &token.bond {
            self.dependents
                .entry(bond.denomination_asset.clone())
                .or_default()
                .insert(token.address.clone());
        }

        self.dirty.insert(token.address.clone());
        let record = self
            .tokens
            .entry(token.address.clone())
            .or_insert_with(|| TokenRecord {
                token: token.clone(),
                created: false,
                launched: false,
            });
        record.token.bond = token.bond.clone();
        record
    }

    /// Restore a persisted record without marking it dirty.
    pub fn insert_record(&mut self, record: TokenRecord) {
        if let Some(bond) = &record.token.bond {
            self.dependents
                .entry(bond.denomination_asset.clone())
                .or_default()
                .insert(record.token.address.clone());
        }
        self.tokens.insert(record.token.address.clone(), record);
    }

    pub fn get(&self, address: &Address) -> Option<&TokenRecord> {
        self.tokens.get(address)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns true only the first time a token is marked created.
    pub fn mark_created(&mut self, address: &Address) -> bool {
        match self.tokens.get_mut(address) {
            Some(record) if !record.created => {
                record.created = true;
                self.dirty.insert(address.clone());
                true
            }
            _ => false,
        }
    }

    /// Returns true only the first time a token is marked launched.
    pub fn mark_launched(&mut self, address: &Address) -> bool {
        match self.tokens.get_mut(address) {
            Some(record) if !record.launched => {
                record.launched = true;
                self.dirty.insert(address.clone());
                true
            }
            _ => false,
        }
    }

    /// Bonds whose value is derived from `asset`'s price, in address order.
    pub fn dependent_bonds(&self, asset: &Address) -> Vec<&TokenRef> {
        self.dependents
            .get(asset)
            .into_iter()
            .flatten()
            .filter_map(|bond| self.tokens.get(bond).map(|r| &r.token))
            .collect()
    }

    pub fn drain_dirty(&mut self) -> Vec<TokenRecord> {
        std::mem::take(&mut self.dirty)
            .into_iter()
            .filter_map(|address| self.tokens.get(&address).cloned())
            .collect()
    }
}
