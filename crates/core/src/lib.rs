pub mod config;
pub mod error;
pub mod ids;
pub mod naming;
pub mod ordering;
pub mod variation;

pub use config::VarsyncConfig;
pub use error::CoreError;
pub use ids::*;
pub use naming::{NameAllocator, NamingPolicy, SiblingNames};
pub use ordering::{BaselineOrder, SortOrderAssigner, by_sort_key_then_id};
pub use variation::{Aggregate, Record, RecordFields, Stub};
