//! Allocator abstraction for device nodes and stage private data.
//!
//! The chain itself lives in ordinary Rust boxes; this layer accounts for
//! what a node and its private block cost, so that a budget can be enforced
//! and an install that cannot be paid for fails before anything is linked.

use crate::error::DeviceError;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Where an allocation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arena {
    /// Never collected; stage private data lives here.
    Stable,
    /// Collector-managed; device nodes live here.
    Collected,
}

/// A live allocation. Not `Clone`: it is handed back to `free` exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct Allocation {
    id: u64,
    arena: Arena,
    size: usize,
    client: &'static str,
}

static NEXT_ALLOCATION: AtomicU64 = AtomicU64::new(1);

impl Allocation {
    fn new(arena: Arena, size: usize, client: &'static str) -> Self {
        Self {
            id: NEXT_ALLOCATION.fetch_add(1, Ordering::Relaxed),
            arena,
            size,
            client,
        }
    }

    pub fn arena(&self) -> Arena {
        self.arena
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn client(&self) -> &'static str {
        self.client
    }
}

pub trait DeviceMemory: Send + Sync + Debug {
    /// Allocates `size` zeroed bytes from `arena`.
    fn alloc(&self, arena: Arena, size: usize, client: &'static str) -> Result<Allocation, DeviceError>;

    fn free(&self, allocation: Allocation);

    /// Bytes currently allocated from `arena`.
    fn in_use(&self, arena: Arena) -> usize;

    /// A human-readable name for this allocator (for logging/debugging).
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct Usage {
    stable: usize,
    collected: usize,
}

impl Usage {
    fn slot(&mut self, arena: Arena) -> &mut usize {
        match arena {
            Arena::Stable => &mut self.stable,
            Arena::Collected => &mut self.collected,
        }
    }

    fn total(&self) -> usize {
        self.stable + self.collected
    }
}

/// Unbounded allocator that only tracks live bytes.
#[derive(Debug, Default)]
pub struct HeapMemory {
    usage: Mutex<Usage>,
}

impl HeapMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceMemory for HeapMemory {
    fn alloc(&self, arena: Arena, size: usize, client: &'static str) -> Result<Allocation, DeviceError> {
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        *usage.slot(arena) += size;
        log::trace!("{}: {} bytes from {:?} for {}", self.name(), size, arena, client);
        Ok(Allocation::new(arena, size, client))
    }

    fn free(&self, allocation: Allocation) {
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = usage.slot(allocation.arena);
        *slot = slot.saturating_sub(allocation.size);
    }

    fn in_use(&self, arena: Arena) -> usize {
        *self.usage.lock().unwrap_or_else(PoisonError::into_inner).slot(arena)
    }

    fn name(&self) -> &'static str {
        "heap"
    }
}

/// Allocator with a fixed byte budget shared by both arenas.
///
/// Exhaustion is deterministic: a request fails exactly when it would take
/// the live total past the limit. Freed bytes return to the budget.
#[derive(Debug)]
pub struct BoundedMemory {
    limit: usize,
    usage: Mutex<Usage>,
}

impl BoundedMemory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            usage: Mutex::new(Usage::default()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        let usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        self.limit.saturating_sub(usage.total())
    }
}

impl DeviceMemory for BoundedMemory {
    fn alloc(&self, arena: Arena, size: usize, client: &'static str) -> Result<Allocation, DeviceError> {
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        if usage.total().saturating_add(size) > self.limit {
            log::debug!(
                "{}: refusing {} bytes from {:?} for {} ({} of {} in use)",
                self.name(),
                size,
                arena,
                client,
                usage.total(),
                self.limit
            );
            return Err(DeviceError::AllocationFailure { arena, requested: size, client });
        }
        *usage.slot(arena) += size;
        Ok(Allocation::new(arena, size, client))
    }

    fn free(&self, allocation: Allocation) {
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = usage.slot(allocation.arena);
        *slot = slot.saturating_sub(allocation.size);
    }

    fn in_use(&self, arena: Arena) -> usize {
        *self.usage.lock().unwrap_or_else(PoisonError::into_inner).slot(arena)
    }

    fn name(&self) -> &'static str {
        "bounded"
    }
}
