//! # Station State
//!
//! Bounded tables of heard stations and remote telemetry, shared between the
//! routing task and the status reporter.

pub mod heard;
pub mod telemetry;

use std::sync::{Arc, Mutex, TryLockError};

use tracing::warn;

pub use heard::{Origin, Sighting, SignalReport, StationRecord, StationTable};
pub use telemetry::{AnalogChannel, TelemetryRecord, TelemetryReport, TelemetryTable};

/// Lock-guarded table handle shared between tasks.
///
/// A poisoned lock is recovered rather than propagated: the tables hold plain
/// data and stay consistent after a panicking writer.
#[derive(Debug, Default)]
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// Run `f` with exclusive access, waiting for the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Recovering poisoned table lock");
                poisoned.into_inner()
            }
        };
        f(&mut guard)
    }

    /// Run `f` only if the lock is free right now.
    ///
    /// Returns `None` when another task holds the table; callers retry on
    /// their next tick.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        match self.0.try_lock() {
            Ok(mut guard) => Some(f(&mut guard)),
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("Recovering poisoned table lock");
                Some(f(&mut poisoned.into_inner()))
            }
            Err(TryLockError::WouldBlock) => None,
        }
    }
}
