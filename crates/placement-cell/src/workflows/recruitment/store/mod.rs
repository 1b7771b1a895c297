mod memory;
mod sqlite;

pub use memory::InMemoryPlacementStore;
pub use sqlite::SqlitePlacementStore;
