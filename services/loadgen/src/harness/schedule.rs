//! Constant-arrival-rate pacing and the bounded worker pool

use std::sync::Arc;
use std::time::Duration;

use common::config::ScenarioConfig;
use common::error::ConfigError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::LoadgenResult;

/// When iterations start and how many of them a scenario plans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalSchedule {
    /// Gap between two iteration starts
    pub interval: Duration,
    /// Iterations started over the whole duration
    pub iterations: u64,
    pub duration: Duration,
}

impl ArrivalSchedule {
    pub fn new(rate: u64, time_unit: Duration, duration: Duration) -> LoadgenResult<Self> {
        if rate == 0 || time_unit.is_zero() {
            return Err(
                ConfigError::Invalid("rate and time unit must be positive".to_string()).into(),
            );
        }

        let unit_nanos = time_unit.as_nanos();
        let interval_nanos = (unit_nanos / rate as u128).max(1);
        let iterations = duration.as_nanos() * rate as u128 / unit_nanos;

        Ok(Self {
            interval: Duration::from_nanos(u64::try_from(interval_nanos).unwrap_or(u64::MAX)),
            iterations: u64::try_from(iterations).unwrap_or(u64::MAX),
            duration,
        })
    }

    pub fn from_config(scenario: &ScenarioConfig) -> LoadgenResult<Self> {
        Self::new(scenario.rate, scenario.time_unit()?, scenario.duration()?)
    }
}

/// Worker slots: starts at the pre-allocated size, grows on demand up to a cap
#[derive(Debug)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    allocated: usize,
    max: usize,
}

impl WorkerPool {
    pub fn new(pre_allocated: usize, max: usize) -> Self {
        let pre_allocated = pre_allocated.min(max);
        Self {
            slots: Arc::new(Semaphore::new(pre_allocated)),
            allocated: pre_allocated,
            max,
        }
    }

    /// Take a free slot, allocating a new one if the pool may still grow
    ///
    /// Returns `None` when every slot up to the cap is busy.
    pub fn acquire(&mut self) -> Option<OwnedSemaphorePermit> {
        if let Ok(permit) = self.slots.clone().try_acquire_owned() {
            return Some(permit);
        }

        if self.allocated < self.max {
            self.slots.add_permits(1);
            self.allocated += 1;
            debug!("Worker pool grown to {}", self.allocated);
            return self.slots.clone().try_acquire_owned().ok();
        }

        None
    }

    /// Slots allocated so far
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}
