//! Survey progress persistence: the query contract the progression engine
//! runs against, with PostgreSQL and in-memory backends.

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryStore;
pub use postgres::PgProgressStore;
pub use traits::ProgressStore;
