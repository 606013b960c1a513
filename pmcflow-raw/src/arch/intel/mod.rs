//! Intel Core (Haswell and later) register definitions
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Chapter 20: Performance Monitoring

pub mod core;
