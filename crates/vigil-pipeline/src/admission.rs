//! Request admission control.
//!
//! Bounds how many frames run through the detectors at once. A frame must
//! hold an [`InFlightSlot`] for its whole detector run; the slot is released
//! when it is dropped, on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Admission ticket for one frame's detector run.
#[derive(Debug)]
pub struct InFlightSlot {
    _permit: OwnedSemaphorePermit,
    waited: Duration,
}

impl InFlightSlot {
    /// Time spent waiting for the slot.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

/// Fixed-size pool of in-flight detector runs.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    slots: Arc<Semaphore>,
    pool_size: usize,
    acquire_timeout: Duration,
}

impl AdmissionController {
    pub fn new(pool_size: usize, acquire_timeout: Duration) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            slots: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            acquire_timeout,
        }
    }

    /// Wait for a slot, up to the configured timeout.
    pub async fn acquire(&self) -> PipelineResult<InFlightSlot> {
        let start = Instant::now();

        match tokio::time::timeout(self.acquire_timeout, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => {
                let waited = start.elapsed();
                debug!(waited_ms = waited.as_millis() as u64, "Admission slot acquired");
                Ok(InFlightSlot {
                    _permit: permit,
                    waited,
                })
            }
            Ok(Err(_)) => Err(self.overloaded(start)),
            Err(_) => {
                warn!(
                    pool_size = self.pool_size,
                    timeout_ms = self.acquire_timeout.as_millis() as u64,
                    "No admission slot freed up in time"
                );
                Err(self.overloaded(start))
            }
        }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> PipelineResult<InFlightSlot> {
        match self.slots.clone().try_acquire_owned() {
            Ok(permit) => Ok(InFlightSlot {
                _permit: permit,
                waited: Duration::ZERO,
            }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => {
                Err(PipelineError::Overloaded { waited_ms: 0 })
            }
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Free slots.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.pool_size - self.available()
    }

    fn overloaded(&self, start: Instant) -> PipelineError {
        PipelineError::Overloaded {
            waited_ms: start.elapsed().as_millis() as u64,
        }
    }
}
