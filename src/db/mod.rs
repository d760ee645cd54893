//! SQLite persistence: schema bootstrap plus the repository that stores scope
//! states, snapshots, reference data and the replay watermark.

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
