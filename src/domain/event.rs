//! Normalized, balance-affecting events.

use super::{Address, Decimal, ExactAmount, TimeMs, TokenRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an event in the chain: block, then transaction, then log.
///
/// The derived ordering is the replay order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct EventId {
    pub block_number: u64,
    pub tx_index: u32,
    pub log_index: u32,
}

impl EventId {
    pub fn new(block_number: u64, tx_index: u32, log_index: u32) -> Self {
        Self {
            block_number,
            tx_index,
            log_index,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.block_number, self.tx_index, self.log_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreezeDirection {
    Freeze,
    Unfreeze,
}

/// What happened. Amounts are non-negative magnitudes unless noted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum EventKind {
    Created,
    Mint {
        to: Address,
        amount: ExactAmount,
    },
    Burn {
        from: Address,
        amount: ExactAmount,
    },
    Transfer {
        from: Address,
        to: Address,
        amount: ExactAmount,
    },
    ForcedTransfer {
        from: Address,
        to: Address,
        amount: ExactAmount,
    },
    FreezeDelta {
        account: Address,
        direction: FreezeDirection,
        amount: ExactAmount,
    },
    PriceChange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_price: Option<Decimal>,
        new_price: Decimal,
    },
    /// Signed supply adjustment not tied to an account balance.
    SupplyChange {
        delta: ExactAmount,
    },
    Launch,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Mint { .. } => "mint",
            EventKind::Burn { .. } => "burn",
            EventKind::Transfer { .. } => "transfer",
            EventKind::ForcedTransfer { .. } => "forcedTransfer",
            EventKind::FreezeDelta { .. } => "freezeDelta",
            EventKind::PriceChange { .. } => "priceChange",
            EventKind::SupplyChange { .. } => "supplyChange",
            EventKind::Launch => "launch",
        }
    }
}

/// A normalized event for one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub timestamp: TimeMs,
    pub token: TokenRef,
    pub kind: EventKind,
}

impl Event {
    pub fn new(id: EventId, timestamp: TimeMs, token: TokenRef, kind: EventKind) -> Self {
        Self {
            id,
            timestamp,
            token,
            kind,
        }
    }
}

/// Sort events into replay order.
pub fn sort_events_deterministic(events: &mut [Event]) {
    events.sort_by_key(|e| e.id);
}
