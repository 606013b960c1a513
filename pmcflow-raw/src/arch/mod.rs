//! Architecture-specific register definitions
//!
//! Each CPU family exposes its counters through different MSR addresses and
//! event-select layouts. This module groups them by vendor.
//!
//! ## Supported Architectures
//!
//! - **AMD Zen** (`amd`) - core PMCs, per-CCX L3 PMCs, Data Fabric PMCs
//! - **Intel Core** (`intel`) - architectural fixed and general-purpose PMCs
//! - **RAPL** (`rapl`) - energy status units shared by both vendors

pub mod amd;
pub mod intel;
pub mod rapl;
