//! Memory accounting for pipeline runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common_error::{BasketError, BasketResult};

/// Tracks and limits memory usage across a run.
///
/// Accounting only — there is no spill-to-disk. A reservation that would
/// exceed the limit fails the requesting operation.
pub trait MemoryManager: Send + Sync + std::fmt::Debug {
    /// Reserve memory. Returns an error if the limit would be exceeded.
    fn reserve(&self, bytes: usize) -> BasketResult<()>;

    /// Release previously reserved memory.
    fn release(&self, bytes: usize);

    /// Current memory usage in bytes.
    fn used(&self) -> usize;

    /// Memory limit in bytes (0 = unlimited).
    fn limit(&self) -> usize;

    /// Available memory (limit - used, or `usize::MAX` if unlimited).
    fn available(&self) -> usize {
        let limit = self.limit();
        if limit == 0 {
            usize::MAX
        } else {
            limit.saturating_sub(self.used())
        }
    }
}

/// No-op manager for unlimited memory.
#[derive(Debug, Default)]
pub struct NoopMemoryManager;

impl NoopMemoryManager {
    /// Create a new no-op memory manager.
    pub fn new() -> Self {
        Self
    }
}

impl MemoryManager for NoopMemoryManager {
    fn reserve(&self, _bytes: usize) -> BasketResult<()> {
        Ok(())
    }

    fn release(&self, _bytes: usize) {}

    fn used(&self) -> usize {
        0
    }

    fn limit(&self) -> usize {
        0
    }
}

/// Tracking manager with limit enforcement.
#[derive(Debug)]
pub struct TrackingMemoryManager {
    used: AtomicUsize,
    limit: usize,
}

impl TrackingMemoryManager {
    /// Create a manager with the given limit in bytes (0 = unlimited).
    pub fn new(limit: usize) -> Self {
        Self {
            used: AtomicUsize::new(0),
            limit,
        }
    }

    /// Create an unlimited manager (accounting only).
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Usage as a fraction of the limit (0.0 if unlimited).
    pub fn usage_ratio(&self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.used() as f64 / self.limit as f64
        }
    }
}

impl Default for TrackingMemoryManager {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl MemoryManager for TrackingMemoryManager {
    fn reserve(&self, bytes: usize) -> BasketResult<()> {
        if bytes == 0 {
            return Ok(());
        }

        let mut current = self.used.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(bytes);
            if self.limit > 0 && next > self.limit {
                return Err(BasketError::resource_exhausted(format!(
                    "memory budget exceeded: {next} of {} bytes",
                    self.limit
                )));
            }
            match self
                .used
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, bytes: usize) {
        let mut current = self.used.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_sub(bytes);
            match self
                .used
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    fn limit(&self) -> usize {
        self.limit
    }
}

/// RAII reservation: releases its bytes when dropped, so memory is
/// returned on every exit path including failure.
#[derive(Debug)]
pub struct MemoryReservation {
    manager: Arc<dyn MemoryManager>,
    bytes: usize,
}

impl MemoryReservation {
    /// Reserve `bytes` against the manager.
    pub fn try_new(manager: Arc<dyn MemoryManager>, bytes: usize) -> BasketResult<Self> {
        manager.reserve(bytes)?;
        Ok(Self { manager, bytes })
    }

    /// Size of this reservation.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for MemoryReservation {
    fn drop(&mut self) {
        self.manager.release(self.bytes);
    }
}
