//! Clock, item factory and the per-kind stores.

pub mod clock;
pub mod factory;
pub mod memory_store;
pub mod short_term;

pub use clock::{MemoryClock, MemoryIdGenerator};
pub use factory::{authority_for_source, importance_for_event, ItemFactory, NewItem};
pub use memory_store::{MemoryStore, StoreOutcome};
pub use short_term::{ShortTermMemory, SummaryOutcome, SUMMARY_SOURCE};
