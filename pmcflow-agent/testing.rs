//! In-memory register port and clock for unit tests

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crate::common::clock::Clock;
use crate::common::port::RegisterPort;
use crate::error::{PmcError, Result};

/// Register file keyed by (thread, address)
///
/// Reads of registers never written return 0. Every access checks that the
/// caller is pinned to the thread it names.
#[derive(Default)]
pub struct FakePort {
    registers: Mutex<HashMap<(usize, u64), u64>>,
    failing: Mutex<HashSet<(usize, u64)>>,
    writes: Mutex<Vec<(usize, u64, u64)>>,
    pinned: Mutex<Option<usize>>,
    active_pins: AtomicUsize,
    max_pins: AtomicUsize,
}

impl FakePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, thread: usize, address: u64, value: u64) {
        self.registers.lock().insert((thread, address), value);
    }

    pub fn get(&self, thread: usize, address: u64) -> u64 {
        self.registers
            .lock()
            .get(&(thread, address))
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_reads(&self, thread: usize, address: u64) {
        self.failing.lock().insert((thread, address));
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn pinned(&self) -> Option<usize> {
        *self.pinned.lock()
    }

    pub fn max_concurrent_pins(&self) -> usize {
        self.max_pins.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<(usize, u64, u64)> {
        self.writes.lock().clone()
    }

    pub fn writes_to(&self, thread: usize, address: u64) -> Vec<u64> {
        self.writes
            .lock()
            .iter()
            .filter(|(t, a, _)| *t == thread && *a == address)
            .map(|(_, _, v)| *v)
            .collect()
    }

    fn check_pinned(&self, thread: usize, address: u64) -> Result<()> {
        match self.pinned() {
            Some(pinned) if pinned == thread => Ok(()),
            other => Err(PmcError::RegisterAccess {
                thread,
                address,
                reason: format!("caller pinned to {other:?}"),
            }),
        }
    }
}

impl RegisterPort for FakePort {
    fn set_affinity(&self, thread: usize) -> Result<()> {
        let active = self.active_pins.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_pins.fetch_max(active, Ordering::SeqCst);
        *self.pinned.lock() = Some(thread);
        Ok(())
    }

    fn clear_affinity(&self) -> Result<()> {
        *self.pinned.lock() = None;
        self.active_pins.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_register(&self, thread: usize, address: u64) -> Result<u64> {
        self.check_pinned(thread, address)?;
        if self.failing.lock().contains(&(thread, address)) {
            return Err(PmcError::RegisterAccess {
                thread,
                address,
                reason: "injected failure".to_string(),
            });
        }
        Ok(self.get(thread, address))
    }

    fn write_register(&self, thread: usize, address: u64, value: u64) -> Result<()> {
        self.check_pinned(thread, address)?;
        self.writes.lock().push((thread, address, value));
        self.set(thread, address, value);
        Ok(())
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
