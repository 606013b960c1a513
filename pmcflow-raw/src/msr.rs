//! MSR (Model-Specific Register) read/write primitives
//!
//! This module provides low-level MSR access through `/dev/cpu/*/msr`.
//! For cached handles and affinity handling, use the port in pmcflow-agent.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileExt, OpenOptionsExt};

pub type Result<T> = std::result::Result<T, MsrError>;

/// Errors that can occur during MSR operations
#[derive(Debug, thiserror::Error)]
pub enum MsrError {
    #[error("Failed to open MSR device for CPU {cpu}: {source}")]
    OpenFailed { cpu: u32, source: std::io::Error },

    #[error("Failed to read MSR 0x{msr:X} on CPU {cpu}: {source}")]
    ReadFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },

    #[error("Failed to write MSR 0x{msr:X} on CPU {cpu}: {source}")]
    WriteFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },
}

impl MsrError {
    /// CPU the failed access targeted
    pub fn cpu(&self) -> u32 {
        match self {
            MsrError::OpenFailed { cpu, .. }
            | MsrError::ReadFailed { cpu, .. }
            | MsrError::WriteFailed { cpu, .. } => *cpu,
        }
    }
}

/// An open `/dev/cpu/N/msr` device
///
/// Reads and writes use positioned I/O, so one handle can be shared between
/// callers without a seek lock.
#[derive(Debug)]
pub struct MsrFile {
    file: File,
    cpu: u32,
}

impl MsrFile {
    /// Open the MSR device of `cpu` for reading and writing
    ///
    /// # Errors
    ///
    /// Fails when the `msr` kernel module is not loaded or the caller lacks
    /// CAP_SYS_RAWIO.
    pub fn open(cpu: u32) -> Result<Self> {
        let path = format!("/dev/cpu/{cpu}/msr");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC) // Ensure synchronous writes
            .open(&path)
            .map_err(|e| MsrError::OpenFailed { cpu, source: e })?;

        Ok(Self { file, cpu })
    }

    pub fn cpu(&self) -> u32 {
        self.cpu
    }

    /// Read a 64-bit value from `msr`
    pub fn read(&self, msr: u64) -> Result<u64> {
        let mut buffer = [0u8; 8];
        self.file
            .read_exact_at(&mut buffer, msr)
            .map_err(|e| MsrError::ReadFailed {
                cpu: self.cpu,
                msr,
                source: e,
            })?;

        Ok(u64::from_le_bytes(buffer))
    }

    /// Write a 64-bit value to `msr`
    ///
    /// Writing incorrect values to MSRs can cause system instability.
    /// Validate typed layouts with `RegisterLayout::validate()` first.
    pub fn write(&self, msr: u64, value: u64) -> Result<()> {
        self.file
            .write_all_at(&value.to_le_bytes(), msr)
            .map_err(|e| MsrError::WriteFailed {
                cpu: self.cpu,
                msr,
                source: e,
            })
    }
}

/// Read a 64-bit value from an MSR, opening the device for this call only
///
/// # Example
///
/// ```ignore
/// use pmcflow_raw::read_msr;
///
/// let tsc = read_msr(0, 0x10)?;
/// println!("TSC = 0x{:016X}", tsc);
/// ```
pub fn read_msr(cpu: u32, msr: u64) -> Result<u64> {
    MsrFile::open(cpu)?.read(msr)
}

/// Write a 64-bit value to an MSR, opening the device for this call only
pub fn write_msr(cpu: u32, msr: u64, value: u64) -> Result<()> {
    MsrFile::open(cpu)?.write(msr, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msr_error_display() {
        let err = MsrError::OpenFailed {
            cpu: 0,
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("Failed to open MSR device"));
    }

    #[test]
    fn test_msr_error_cpu() {
        let err = MsrError::ReadFailed {
            cpu: 7,
            msr: 0xC001_029A,
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        };
        assert_eq!(err.cpu(), 7);
        assert!(err.to_string().contains("0xC001029A"));
    }
}
