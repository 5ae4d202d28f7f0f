pub mod memory;
pub mod mysql;

pub use memory::InMemoryStore;
pub use mysql::MySqlStore;
pub use waypoint_core::{NotFoundStore, ReadRuleStore, Result, RuleStore, StorageError};
