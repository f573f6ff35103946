//! Sink implementations for merged gym datasets.
//!
//! Available backends:
//! - `MemorySink` - In-memory sink (always available)
//! - `PostgresSink` - PostgreSQL tables (requires `postgres` feature)

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemorySink;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSink;
