//! Deterministic aggregation engine.
//!
//! Everything in here is synchronous and free of I/O; the replay host feeds it
//! events in order and persists whatever [`Aggregator::take_changes`] returns.

pub mod aggregator;
pub mod balances;
pub mod cascade;
pub mod prices;
pub mod registry;
pub mod scope;
pub mod state;
pub mod store;
pub mod timeseries;
pub mod valuation;

pub use aggregator::{Aggregator, ChangeSet};
pub use balances::{LeafBalance, LeafBalanceChange, LeafBalances, LeafTransition};
pub use cascade::{cascade_after_token_type_change, percentage_of, PERCENTAGE_DP};
pub use prices::PriceClaims;
pub use registry::{TokenRecord, TokenRegistry};
pub use scope::{ScopeKey, ScopeKeyError, ScopeKind, UnknownScopeKind};
pub use state::{ScopeDelta, ScopeState};
pub use store::{MemoryScopeStore, ScopeStore};
pub use timeseries::{TimeseriesRecorder, TimeseriesSnapshot};
pub use valuation::ValuationResolver;
