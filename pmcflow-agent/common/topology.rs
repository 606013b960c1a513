use std::collections::BTreeMap;

use crate::config::parse_cpu_list;
use crate::counters::SampleUnit;

/// Placement of one hardware thread
///
/// `core`, `l3` and `package` are opaque grouping keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub thread: usize,
    pub core: usize,
    pub l3: usize,
    pub package: usize,
}

/// Thread → core → L3 complex → package mapping for the monitored threads
#[derive(Debug, Clone, Default)]
pub struct Topology {
    threads: Vec<ThreadInfo>,
}

impl Topology {
    pub fn new(mut threads: Vec<ThreadInfo>) -> Self {
        threads.sort_by_key(|info| info.thread);
        threads.dedup_by_key(|info| info.thread);
        Self { threads }
    }

    /// Read the placement of `threads` from sysfs
    ///
    /// Missing entries fall back to one core per thread, package 0 and one L3
    /// per package.
    pub fn detect(threads: &[usize]) -> Self {
        let infos = threads
            .iter()
            .map(|&thread| {
                let base = format!("/sys/devices/system/cpu/cpu{thread}");
                let package = read_id(&format!("{base}/topology/physical_package_id")).unwrap_or(0);
                let core = read_id(&format!("{base}/topology/core_id")).unwrap_or(thread);
                let l3 = std::fs::read_to_string(format!("{base}/cache/index3/shared_cpu_list"))
                    .ok()
                    .and_then(|list| parse_cpu_list(&list))
                    .and_then(|cpus| cpus.into_iter().min())
                    .unwrap_or(package);

                ThreadInfo {
                    thread,
                    core,
                    l3,
                    package,
                }
            })
            .collect();

        let topology = Self::new(infos);
        tracing::info!(
            "Topology: {} threads, {} cores, {} L3 complexes, {} packages",
            topology.threads.len(),
            topology.core_units().iter().filter(|u| u.core_representative).count(),
            topology.l3_units().len(),
            topology.package_units().len()
        );
        topology
    }

    pub fn threads(&self) -> &[ThreadInfo] {
        &self.threads
    }

    pub fn info(&self, thread: usize) -> Option<&ThreadInfo> {
        self.threads.iter().find(|info| info.thread == thread)
    }

    /// Every thread, with the lowest-numbered thread of each physical core and
    /// of each package marked as the reader of their shared counters
    pub fn core_units(&self) -> Vec<SampleUnit> {
        let core_reps = Self::lowest_by(&self.threads, |info| (info.package, info.core));
        let package_reps = Self::lowest_by(&self.threads, |info| info.package);

        self.threads
            .iter()
            .map(|info| SampleUnit {
                thread: info.thread,
                core_representative: core_reps.values().any(|&t| t == info.thread),
                package_representative: package_reps.values().any(|&t| t == info.thread),
            })
            .collect()
    }

    /// One representative thread per L3 complex
    pub fn l3_units(&self) -> Vec<SampleUnit> {
        Self::lowest_by(&self.threads, |info| (info.package, info.l3))
            .into_values()
            .map(SampleUnit::representative)
            .collect()
    }

    /// One representative thread per package
    pub fn package_units(&self) -> Vec<SampleUnit> {
        Self::lowest_by(&self.threads, |info| info.package)
            .into_values()
            .map(SampleUnit::representative)
            .collect()
    }

    fn lowest_by<K: Ord>(threads: &[ThreadInfo], key: impl Fn(&ThreadInfo) -> K) -> BTreeMap<K, usize> {
        let mut lowest = BTreeMap::new();
        for info in threads {
            lowest
                .entry(key(info))
                .and_modify(|t: &mut usize| *t = (*t).min(info.thread))
                .or_insert(info.thread);
        }
        lowest
    }
}

fn read_id(path: &str) -> Option<usize> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2 packages × 2 CCX × 2 cores × 2 SMT threads; sibling of thread t is t + 8
    pub(crate) fn dual_socket() -> Topology {
        let threads = (0..16)
            .map(|thread| {
                let physical = thread % 8;
                ThreadInfo {
                    thread,
                    core: physical,
                    l3: physical / 2,
                    package: physical / 4,
                }
            })
            .collect();
        Topology::new(threads)
    }

    #[test]
    fn test_core_representatives_are_lowest_siblings() {
        let units = dual_socket().core_units();
        assert_eq!(units.len(), 16);

        let reps: Vec<usize> = units
            .iter()
            .filter(|u| u.core_representative)
            .map(|u| u.thread)
            .collect();
        assert_eq!(reps, (0..8).collect::<Vec<_>>());

        let pkg_reps: Vec<usize> = units
            .iter()
            .filter(|u| u.package_representative)
            .map(|u| u.thread)
            .collect();
        assert_eq!(pkg_reps, vec![0, 4]);
    }

    #[test]
    fn test_l3_and_package_units() {
        let topology = dual_socket();

        let l3: Vec<usize> = topology.l3_units().iter().map(|u| u.thread).collect();
        assert_eq!(l3, vec![0, 2, 4, 6]);

        let packages: Vec<usize> = topology.package_units().iter().map(|u| u.thread).collect();
        assert_eq!(packages, vec![0, 4]);
    }

    #[test]
    fn test_new_dedups_threads() {
        let info = ThreadInfo {
            thread: 1,
            core: 0,
            l3: 0,
            package: 0,
        };
        let topology = Topology::new(vec![info, info]);
        assert_eq!(topology.threads().len(), 1);
        assert_eq!(topology.info(1), Some(&info));
    }

    #[test]
    fn test_detect_falls_back_without_sysfs() {
        let topology = Topology::detect(&[100_000]);
        let info = topology.info(100_000).unwrap();
        assert_eq!(info.core, 100_000);
        assert_eq!(info.package, 0);
    }
}
