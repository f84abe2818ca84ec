//! # Repository Layer
//!
//! Persistence for ingested events: the event repository and the table client
//! capability it writes through.

pub mod event;
pub mod memory;
pub mod table;

pub use event::{EventRepository, EventStore, StoreError};
pub use memory::InMemoryTableClient;
pub use table::{DynamoTableClient, TableClient, TableError};
