pub mod accounts;
pub mod attachments;
pub mod audit;
pub mod categories;
pub mod classifications;
pub mod messages;
pub mod pool;
pub mod schema;
pub mod whitelist;

// Re-export the pool type so callers can do `use crate::adapters::sqlite::DbPool`
// instead of `use crate::adapters::sqlite::pool::DbPool`
pub use pool::DbPool;
