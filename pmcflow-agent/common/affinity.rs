use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;
use parking_lot::{Mutex, MutexGuard};

use crate::common::port::RegisterPort;
use crate::error::{PmcError, Result};

/// Affinity mask of the calling thread
pub fn current_affinity() -> Result<CpuSet> {
    sched_getaffinity(Pid::from_raw(0))
        .map_err(|e| PmcError::AffinityError(format!("Failed to get affinity: {e}")))
}

/// Restrict the calling thread to a single hardware thread
pub fn pin_current_thread(cpu: usize) -> Result<()> {
    let mut new_affinity = CpuSet::new();
    new_affinity
        .set(cpu)
        .map_err(|e| PmcError::AffinityError(format!("Failed to set CPU {cpu} in set: {e}")))?;

    sched_setaffinity(Pid::from_raw(0), &new_affinity)
        .map_err(|e| PmcError::AffinityError(format!("Failed to set affinity to CPU {cpu}: {e}")))
}

pub fn restore_affinity(affinity: &CpuSet) -> Result<()> {
    sched_setaffinity(Pid::from_raw(0), affinity)
        .map_err(|e| PmcError::AffinityError(format!("Failed to restore affinity: {e}")))
}

/// Serializes pinning across all monitoring domains
///
/// Every domain loop shares one arbiter. Holding a [`PinGuard`] means holding
/// the arbiter, so two domains can never be mid-pin at the same time.
#[derive(Debug, Default)]
pub struct PinArbiter {
    pinned: Mutex<Option<usize>>,
}

impl PinArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.pinned.is_locked()
    }
}

/// Exclusive pin of the calling context to one hardware thread
///
/// Affinity is released when the guard drops, on every exit path.
pub struct PinGuard<'a> {
    port: &'a dyn RegisterPort,
    thread: usize,
    slot: MutexGuard<'a, Option<usize>>,
}

impl<'a> PinGuard<'a> {
    pub fn acquire(
        arbiter: &'a PinArbiter,
        port: &'a dyn RegisterPort,
        thread: usize,
    ) -> Result<Self> {
        let mut slot = arbiter.pinned.lock();
        port.set_affinity(thread)?;
        *slot = Some(thread);

        Ok(Self { port, thread, slot })
    }

    pub fn thread(&self) -> usize {
        self.thread
    }

    pub fn read(&self, address: u64) -> Result<u64> {
        self.port.read_register(self.thread, address)
    }

    pub fn write(&self, address: u64, value: u64) -> Result<()> {
        self.port.write_register(self.thread, address, value)
    }
}

impl Drop for PinGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.port.clear_affinity() {
            tracing::warn!("Failed to release pin on thread {}: {}", self.thread, e);
        }
        *self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePort;

    #[test]
    fn test_pin_guard_releases_on_drop() {
        let arbiter = PinArbiter::new();
        let port = FakePort::new();

        {
            let guard = PinGuard::acquire(&arbiter, &port, 3).unwrap();
            assert_eq!(guard.thread(), 3);
            assert_eq!(port.pinned(), Some(3));
            assert!(arbiter.is_held());
        }

        assert_eq!(port.pinned(), None);
        assert!(!arbiter.is_held());
    }

    #[test]
    fn test_pin_guard_releases_on_error_path() {
        let arbiter = PinArbiter::new();
        let port = FakePort::new();
        port.fail_reads(2, 0x10);

        let read = || -> Result<u64> {
            let guard = PinGuard::acquire(&arbiter, &port, 2)?;
            guard.read(0x10)
        };

        assert!(read().is_err());
        assert_eq!(port.pinned(), None);
        assert!(!arbiter.is_held());
    }

    #[test]
    fn test_pins_from_two_threads_never_overlap() {
        let arbiter = std::sync::Arc::new(PinArbiter::new());
        let port = std::sync::Arc::new(FakePort::new());

        let workers: Vec<_> = (0..2)
            .map(|cpu| {
                let arbiter = std::sync::Arc::clone(&arbiter);
                let port = std::sync::Arc::clone(&port);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let guard = PinGuard::acquire(&arbiter, port.as_ref(), cpu).unwrap();
                        assert_eq!(port.pinned(), Some(cpu));
                        drop(guard);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(port.max_concurrent_pins(), 1);
    }

    #[test]
    fn test_real_affinity_round_trip() {
        // Works without privileges; only the MSR device needs root
        let original = current_affinity().unwrap();
        if pin_current_thread(0).is_ok() {
            restore_affinity(&original).unwrap();
        }
        assert!(current_affinity().is_ok());
    }
}
