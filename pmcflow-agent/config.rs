use std::time::Duration;

use crate::error::{PmcError, Result};

/// Canonical sampling period
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Hardware threads eligible for sampling
    pub threads: Vec<usize>,
    /// Time between two ticks of a domain loop
    pub period: Duration,
}

impl MonitorConfig {
    pub fn new(threads: Vec<usize>, period: Duration) -> Self {
        Self { threads, period }
    }

    /// Monitor every online CPU at the canonical period
    pub fn auto_detect() -> Self {
        let threads = Self::detect_online_cpus();
        tracing::info!("Auto-detected {} hardware threads", threads.len());
        Self::new(threads, DEFAULT_PERIOD)
    }

    /// Detect online CPUs from /sys/devices/system/cpu/online
    pub fn detect_online_cpus() -> Vec<usize> {
        std::fs::read_to_string("/sys/devices/system/cpu/online")
            .ok()
            .and_then(|s| parse_cpu_list(&s))
            .unwrap_or_else(|| {
                let count = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                tracing::warn!("Failed to detect online CPUs, using 0-{}", count - 1);
                (0..count).collect()
            })
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::auto_detect()
    }
}

/// Parse a kernel CPU list like "0-3,8-11" into CPU ids
pub fn parse_cpu_list(s: &str) -> Option<Vec<usize>> {
    let mut cpus = Vec::new();
    for part in s.trim().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start.trim().parse().ok()?;
            let end: usize = end.trim().parse().ok()?;
            cpus.extend(start..=end);
        } else {
            cpus.push(part.parse().ok()?);
        }
    }
    Some(cpus)
}

/// Parse command-line range strings like ["0-3", "5", "8-11"]
///
/// Each input may itself be a comma-separated list. The result is sorted and
/// deduplicated.
pub fn parse_range_list(inputs: &[String]) -> Result<Vec<usize>> {
    let mut result = Vec::new();

    for input in inputs {
        let ids = parse_cpu_list(input)
            .ok_or_else(|| PmcError::ParseError(format!("Invalid CPU range list: {input}")))?;
        result.extend(ids);
    }

    result.sort_unstable();
    result.dedup();

    if result.is_empty() {
        return Err(PmcError::ConfigError(
            "No hardware threads selected".to_string(),
        ));
    }

    Ok(result)
}
