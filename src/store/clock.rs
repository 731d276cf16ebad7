//! Logical clock and sequential id generator. Owned state, never global.

use serde::{Deserialize, Serialize};

/// Monotonic logical clock. The first tick is 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryClock {
    next: u64,
}

impl MemoryClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a clock whose next tick is `next`.
    pub fn resume(next: u64) -> Self {
        Self { next }
    }

    /// Issue the next tick.
    pub fn next_tick(&mut self) -> u64 {
        let tick = self.next;
        self.next += 1;
        tick
    }

    /// The most recently issued tick, or 0 before any tick was issued.
    pub fn current(&self) -> u64 {
        self.next.saturating_sub(1)
    }

    /// The tick that will be issued next.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

/// Sequential id generator, independent per instance. The first id is 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryIdGenerator {
    next: u64,
}

impl MemoryIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a generator whose next id is `next`.
    pub fn resume(next: u64) -> Self {
        Self { next }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id that will be issued next.
    pub fn peek(&self) -> u64 {
        self.next
    }
}
