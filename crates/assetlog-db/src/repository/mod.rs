//! Store implementations.

mod memory;
mod rows;
mod surreal;

pub use memory::{MemoryStore, MemoryTx};
pub use surreal::{SurrealStore, SurrealTx};
