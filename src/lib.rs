pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{DataSourceError, EventSource, JsonlEventSource, MockEventSource};
pub use db::{init_db, Repository};
pub use domain::{
    Address, BondTerms, Decimal, Event, EventId, EventKind, ExactAmount, FreezeDirection, TimeMs,
    TokenRef, TokenType,
};
pub use engine::{Aggregator, ChangeSet, ScopeKey, ScopeKind, ScopeState, TimeseriesSnapshot};
pub use error::AppError;
pub use orchestration::{ReplayError, ReplayResult, Replayer};
