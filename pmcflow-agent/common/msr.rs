use nix::sched::CpuSet;
use parking_lot::RwLock;
use pmcflow_raw::MsrFile;
use std::collections::HashMap;
use std::sync::Arc;

use crate::common::affinity;
use crate::common::port::RegisterPort;
use crate::error::{PmcError, Result};

/// Register port backed by the Linux `msr` driver
///
/// Device handles are opened lazily and cached per hardware thread.
pub struct MsrPort {
    handles: RwLock<HashMap<usize, Arc<MsrFile>>>,
    original_affinity: CpuSet,
}

impl MsrPort {
    pub fn new() -> Result<Self> {
        Ok(Self {
            handles: RwLock::new(HashMap::new()),
            original_affinity: affinity::current_affinity()?,
        })
    }

    fn handle(&self, thread: usize) -> Result<Arc<MsrFile>> {
        {
            let handles = self.handles.read();
            if let Some(handle) = handles.get(&thread) {
                return Ok(Arc::clone(handle));
            }
        }

        let mut handles = self.handles.write();
        if let Some(handle) = handles.get(&thread) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(MsrFile::open(thread as u32)?);
        tracing::info!("Opened MSR handle for thread {}", thread);
        handles.insert(thread, Arc::clone(&handle));
        Ok(handle)
    }

    fn access_error(thread: usize, address: u64, e: impl std::fmt::Display) -> PmcError {
        PmcError::RegisterAccess {
            thread,
            address,
            reason: e.to_string(),
        }
    }
}

impl RegisterPort for MsrPort {
    fn set_affinity(&self, thread: usize) -> Result<()> {
        affinity::pin_current_thread(thread)
    }

    fn clear_affinity(&self) -> Result<()> {
        affinity::restore_affinity(&self.original_affinity)
    }

    fn read_register(&self, thread: usize, address: u64) -> Result<u64> {
        let value = self
            .handle(thread)
            .and_then(|handle| handle.read(address).map_err(PmcError::from))
            .map_err(|e| Self::access_error(thread, address, e))?;

        tracing::debug!(
            "MSR read: CPU {} MSR 0x{:08x} = 0x{:016x}",
            thread,
            address,
            value
        );
        Ok(value)
    }

    fn write_register(&self, thread: usize, address: u64, value: u64) -> Result<()> {
        tracing::debug!(
            "MSR write: CPU {} MSR 0x{:08x} <- 0x{:016x}",
            thread,
            address,
            value
        );

        self.handle(thread)
            .and_then(|handle| handle.write(address, value).map_err(PmcError::from))
            .map_err(|e| Self::access_error(thread, address, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_register_access_error() {
        let port = MsrPort::new().unwrap();
        // No machine has this many hardware threads
        let err = port.read_register(65_000, 0x10).unwrap_err();

        match err {
            PmcError::RegisterAccess {
                thread, address, ..
            } => {
                assert_eq!(thread, 65_000);
                assert_eq!(address, 0x10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
