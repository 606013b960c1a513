//! AMD Family 17h-1Ah (Zen through Zen 5) register definitions
//!
//! ## Counter Domains
//!
//! - **Core** - six programmable counters per hardware thread, plus the
//!   architectural TSC, APERF/MPERF and the retired-instruction counter
//! - **L3** - six counters per core complex (CCX), programmed from any thread of
//!   the complex
//! - **Data Fabric** - four package-wide counters
//!
//! ## References
//!
//! - AMD Processor Programming Reference (PPR) for Family 17h Model 71h
//! - AMD PPR for Family 19h Model 61h and Family 1Ah Model 24h

pub mod core;
pub mod df;
pub mod l3;
