//! Monitoring configurations: what each domain counts and how it is derived
//!
//! A configuration is one event set bound to the units of one domain on one
//! CPU family. At most one configuration per domain holds the counter slots.

pub mod events;
pub mod intel;
pub mod program;
pub mod zen;

use crate::common::arch::{CpuArchitecture, CpuVendor};
use crate::common::topology::Topology;
use crate::counters::SampleContext;
use crate::error::{PmcError, Result};
use crate::metrics::{ConfigDescription, UpdateResults};

pub use events::{EventSet, EventSpec, MetricFn};
pub use intel::IntelCoreConfig;
pub use program::ProgrammedSet;
pub use zen::{L3Encoding, ZenCoreConfig, ZenDataFabricConfig, ZenL3Config};

crate::metric_enum! {
    /// Independent groups of counter slots, each with its own sampling loop
    pub enum MonitoringDomain {
        Core => "core",
        L3 => "l3",
        DataFabric => "df",
    }
}

impl MonitoringDomain {
    pub fn parse(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|domain| domain.name() == name)
    }
}

impl std::fmt::Display for MonitoringDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Capabilities every configuration provides
pub trait MonitoringConfig {
    /// Static metadata; pure data
    fn describe(&self) -> ConfigDescription;

    /// Program the slots of every unit and start a fresh sampler
    fn initialize(&mut self, ctx: SampleContext<'_>) -> Result<()>;

    /// Sample the domain and derive one row per unit plus the overall row
    fn update(&mut self, ctx: SampleContext<'_>) -> Result<UpdateResults>;

    /// Disable the event selects programmed by `initialize`
    fn release(&mut self, ctx: SampleContext<'_>) -> Result<()>;
}

pub enum Configuration {
    ZenCore(ZenCoreConfig),
    ZenL3(ZenL3Config),
    ZenDataFabric(ZenDataFabricConfig),
    IntelCore(IntelCoreConfig),
}

impl Configuration {
    pub fn domain(&self) -> MonitoringDomain {
        match self {
            Configuration::ZenCore(_) | Configuration::IntelCore(_) => MonitoringDomain::Core,
            Configuration::ZenL3(_) => MonitoringDomain::L3,
            Configuration::ZenDataFabric(_) => MonitoringDomain::DataFabric,
        }
    }

    pub fn set(&self) -> &'static EventSet {
        match self {
            Configuration::ZenCore(config) => config.set(),
            Configuration::ZenL3(config) => config.set(),
            Configuration::ZenDataFabric(config) => config.set(),
            Configuration::IntelCore(config) => config.set(),
        }
    }

    pub fn id(&self) -> &'static str {
        self.set().id
    }
}

impl MonitoringConfig for Configuration {
    fn describe(&self) -> ConfigDescription {
        self.set().describe()
    }

    fn initialize(&mut self, ctx: SampleContext<'_>) -> Result<()> {
        match self {
            Configuration::ZenCore(config) => config.initialize(ctx),
            Configuration::ZenL3(config) => config.initialize(ctx),
            Configuration::ZenDataFabric(config) => config.initialize(ctx),
            Configuration::IntelCore(config) => config.initialize(ctx),
        }
    }

    fn update(&mut self, ctx: SampleContext<'_>) -> Result<UpdateResults> {
        match self {
            Configuration::ZenCore(config) => config.update(ctx),
            Configuration::ZenL3(config) => config.update(ctx),
            Configuration::ZenDataFabric(config) => config.update(ctx),
            Configuration::IntelCore(config) => config.update(ctx),
        }
    }

    fn release(&mut self, ctx: SampleContext<'_>) -> Result<()> {
        match self {
            Configuration::ZenCore(config) => config.release(ctx),
            Configuration::ZenL3(config) => config.release(ctx),
            Configuration::ZenDataFabric(config) => config.release(ctx),
            Configuration::IntelCore(config) => config.release(ctx),
        }
    }
}

/// Event sets a domain offers on `arch`
pub fn available(arch: CpuArchitecture, domain: MonitoringDomain) -> Vec<&'static EventSet> {
    use CpuArchitecture::*;

    match (arch.vendor(), domain) {
        (CpuVendor::Amd, MonitoringDomain::Core) => match arch {
            Zen | Zen2 | Zen3 => vec![
                &zen::events::BRANCH_PREDICTION,
                &zen::events::OP_CACHE,
                &zen::events::DISPATCH_STALLS,
            ],
            _ => vec![&zen::events::BRANCH_PREDICTION, &zen::events::OP_CACHE],
        },
        (CpuVendor::Amd, MonitoringDomain::L3) => match arch {
            Zen2 | Zen3 => vec![&zen::events::L3_HIT_RATE_ZEN2],
            Zen4 | Zen5 => vec![&zen::events::L3_HIT_RATE_ZEN4],
            _ => Vec::new(),
        },
        (CpuVendor::Amd, MonitoringDomain::DataFabric) if arch.has_zen2_data_fabric() => {
            vec![&zen::events::DRAM_BANDWIDTH]
        }
        (CpuVendor::Intel, MonitoringDomain::Core) => vec![
            &intel::events::BRANCH_PREDICTION,
            &intel::events::CACHE_HIERARCHY,
        ],
        _ => Vec::new(),
    }
}

/// Every event set that exists for a domain on any architecture
fn known(domain: MonitoringDomain) -> Vec<&'static EventSet> {
    use CpuArchitecture::*;

    [Zen, Zen2, Zen4, IntelSkylake]
        .into_iter()
        .flat_map(|arch| available(arch, domain))
        .collect()
}

/// Bind the event set `id` of `domain` to the matching units of `topology`
pub fn build(
    arch: CpuArchitecture,
    domain: MonitoringDomain,
    id: &str,
    topology: &Topology,
) -> Result<Configuration> {
    if arch.vendor() == CpuVendor::Other {
        return Err(PmcError::UnsupportedArchitecture(arch.name().to_string()));
    }

    let Some(set) = available(arch, domain).into_iter().find(|set| set.id == id) else {
        if known(domain).iter().any(|set| set.id == id) {
            return Err(PmcError::UnsupportedConfiguration {
                config: id.to_string(),
                reason: format!("not available on {}", arch.name()),
            });
        }
        return Err(PmcError::UnknownConfiguration {
            domain: domain.to_string(),
            config: id.to_string(),
        });
    };

    let config = match (arch.vendor(), domain) {
        (CpuVendor::Intel, MonitoringDomain::Core) => {
            Configuration::IntelCore(IntelCoreConfig::new(set, topology.core_units()))
        }
        (_, MonitoringDomain::Core) => {
            Configuration::ZenCore(ZenCoreConfig::new(set, topology.core_units()))
        }
        (_, MonitoringDomain::L3) => {
            let encoding = if arch.has_zen3_l3_layout() {
                L3Encoding::CoreSelect
            } else {
                L3Encoding::SliceMask
            };
            Configuration::ZenL3(ZenL3Config::new(set, encoding, topology.l3_units()))
        }
        (_, MonitoringDomain::DataFabric) => {
            let units = topology
                .package_units()
                .into_iter()
                .map(|unit| {
                    let package = topology.info(unit.thread).map_or(0, |info| info.package);
                    (package, unit)
                })
                .collect();
            Configuration::ZenDataFabric(ZenDataFabricConfig::new(set, units))
        }
    };

    tracing::info!(
        "Built {} configuration '{}' for {}",
        domain,
        set.name,
        arch.name()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::topology::ThreadInfo;

    fn topology() -> Topology {
        Topology::new(
            (0..8)
                .map(|thread| ThreadInfo {
                    thread,
                    core: thread % 4,
                    l3: (thread % 4) / 2,
                    package: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_domain_names_round_trip() {
        for domain in MonitoringDomain::all() {
            assert_eq!(MonitoringDomain::parse(domain.name()), Some(domain));
        }
        assert_eq!(MonitoringDomain::parse("uncore"), None);
    }

    #[test]
    fn test_catalog_follows_architecture() {
        let ids = |arch, domain| -> Vec<&str> {
            available(arch, domain).iter().map(|set| set.id).collect()
        };

        assert_eq!(
            ids(CpuArchitecture::Zen2, MonitoringDomain::Core),
            vec!["branch", "opcache", "dispatch"]
        );
        assert_eq!(ids(CpuArchitecture::Zen5, MonitoringDomain::L3), vec!["l3-hitrate"]);
        assert!(ids(CpuArchitecture::Zen4, MonitoringDomain::DataFabric).is_empty());
        assert!(ids(CpuArchitecture::IntelSkylake, MonitoringDomain::L3).is_empty());
        assert!(ids(CpuArchitecture::Unknown, MonitoringDomain::Core).is_empty());
    }

    #[test]
    fn test_every_event_set_fits_its_counter_slots() {
        use crate::counters::MAX_SLOTS;
        use pmcflow_raw::arch::amd::{core::CORE_PMC_COUNTERS, df::DF_PMC_COUNTERS, l3::L3_PMC_COUNTERS};
        use pmcflow_raw::arch::intel::core::CORE_PMU_COUNTERS;

        use CpuArchitecture::*;
        for arch in [Zen, Zen2, Zen3, Zen4, Zen5, IntelSkylake] {
            for domain in MonitoringDomain::all() {
                let capacity = match (arch.vendor(), domain) {
                    (CpuVendor::Intel, _) => CORE_PMU_COUNTERS,
                    (_, MonitoringDomain::Core) => CORE_PMC_COUNTERS,
                    (_, MonitoringDomain::L3) => L3_PMC_COUNTERS,
                    (_, MonitoringDomain::DataFabric) => DF_PMC_COUNTERS,
                };
                for set in available(arch, domain) {
                    assert!(
                        set.events.len() <= capacity.min(MAX_SLOTS),
                        "{} on {} programs {} events",
                        set.id,
                        arch.name(),
                        set.events.len()
                    );
                }
            }
        }
    }

    #[test]
    fn test_build_selects_variant_and_units() {
        let topology = topology();

        let config = build(CpuArchitecture::Zen3, MonitoringDomain::L3, "l3-hitrate", &topology).unwrap();
        assert_eq!(config.domain(), MonitoringDomain::L3);
        assert!(matches!(&config, Configuration::ZenL3(_)));
        assert_eq!(config.describe().columns[0], "Item");

        let config = build(CpuArchitecture::IntelSkylake, MonitoringDomain::Core, "cache", &topology).unwrap();
        assert!(matches!(config, Configuration::IntelCore(_)));
        assert_eq!(config.id(), "cache");
    }

    #[test]
    fn test_build_rejects_unknown_and_unsupported() {
        let topology = topology();

        assert!(matches!(
            build(CpuArchitecture::Zen4, MonitoringDomain::Core, "nope", &topology),
            Err(PmcError::UnknownConfiguration { .. })
        ));
        assert!(matches!(
            build(CpuArchitecture::Zen4, MonitoringDomain::DataFabric, "dram-bw", &topology),
            Err(PmcError::UnsupportedConfiguration { .. })
        ));
        assert!(matches!(
            build(CpuArchitecture::Unknown, MonitoringDomain::Core, "branch", &topology),
            Err(PmcError::UnsupportedArchitecture(_))
        ));
    }
}
