//! Domain types for the token statistics engine.
//!
//! This module provides:
//! - Lossless numeric handling: `Decimal` (scaled) and `ExactAmount` (on-chain integer)
//! - Domain primitives: TimeMs, Address, TokenType
//! - Token reference data, including bond terms
//! - The normalized `Event` sum type and its deterministic replay order

pub mod decimal;
pub mod event;
pub mod exact;
pub mod primitives;
pub mod token;

pub use decimal::Decimal;
pub use event::{sort_events_deterministic, Event, EventId, EventKind, FreezeDirection};
pub use exact::ExactAmount;
pub use primitives::{Address, AddressParseError, TimeMs, TokenType};
pub use token::{BondTerms, TokenRef};
