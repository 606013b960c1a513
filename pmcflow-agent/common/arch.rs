// CPU architecture detection

use once_cell::sync::Lazy;

use crate::common::cpuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuVendor {
    Amd,
    Intel,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuArchitecture {
    Zen,
    Zen2,
    Zen3,
    Zen4,
    Zen5,
    IntelHaswell,
    IntelSkylake,
    IntelOther,
    Unknown,
}

impl CpuArchitecture {
    pub fn name(&self) -> &'static str {
        match self {
            CpuArchitecture::Zen => "Zen / Zen+",
            CpuArchitecture::Zen2 => "Zen 2",
            CpuArchitecture::Zen3 => "Zen 3",
            CpuArchitecture::Zen4 => "Zen 4",
            CpuArchitecture::Zen5 => "Zen 5",
            CpuArchitecture::IntelHaswell => "Haswell / Broadwell",
            CpuArchitecture::IntelSkylake => "Skylake",
            CpuArchitecture::IntelOther => "Intel (other)",
            CpuArchitecture::Unknown => "Unknown",
        }
    }

    pub fn vendor(&self) -> CpuVendor {
        match self {
            CpuArchitecture::Zen
            | CpuArchitecture::Zen2
            | CpuArchitecture::Zen3
            | CpuArchitecture::Zen4
            | CpuArchitecture::Zen5 => CpuVendor::Amd,
            CpuArchitecture::IntelHaswell
            | CpuArchitecture::IntelSkylake
            | CpuArchitecture::IntelOther => CpuVendor::Intel,
            CpuArchitecture::Unknown => CpuVendor::Other,
        }
    }

    /// Zen 3 moved the L3 counters to per-core/per-slice selection fields
    pub fn has_zen3_l3_layout(&self) -> bool {
        matches!(
            self,
            CpuArchitecture::Zen3 | CpuArchitecture::Zen4 | CpuArchitecture::Zen5
        )
    }

    /// Data Fabric DRAM channel events exist with the Zen 2 encoding
    pub fn has_zen2_data_fabric(&self) -> bool {
        matches!(self, CpuArchitecture::Zen2 | CpuArchitecture::Zen3)
    }
}

pub static CPU_ARCH: Lazy<CpuArchitecture> = Lazy::new(detect_architecture);

fn detect_architecture() -> CpuArchitecture {
    let vendor = match cpuid::vendor_string().as_str() {
        "AuthenticAMD" => CpuVendor::Amd,
        "GenuineIntel" => CpuVendor::Intel,
        _ => CpuVendor::Other,
    };

    let (eax, _ebx, _ecx, _edx) = cpuid::cpuid(1, 0);
    let (family, model, stepping) = cpuid::decode_signature(eax);

    tracing::info!(
        "CPU: {:?} Family {:X}, Model {:X}, Stepping {:X}",
        vendor,
        family,
        model,
        stepping
    );

    let arch = classify(vendor, family, model);
    tracing::info!("Detected CPU architecture: {}", arch.name());
    arch
}

/// Map a vendor and display family/model to an architecture
///
/// Reference: AMD PPRs and the Intel® 64 and IA-32 Architectures Software
/// Developer's Manual model tables
pub fn classify(vendor: CpuVendor, family: u32, model: u32) -> CpuArchitecture {
    match vendor {
        CpuVendor::Amd => match family {
            0x17 if model >= 0x30 => CpuArchitecture::Zen2,
            0x17 => CpuArchitecture::Zen,
            0x19 => match model {
                0x10..=0x1F | 0x60..=0x7F | 0xA0..=0xAF => CpuArchitecture::Zen4,
                _ => CpuArchitecture::Zen3,
            },
            0x1A => CpuArchitecture::Zen5,
            _ => {
                tracing::warn!("Unsupported AMD family: {:X}", family);
                CpuArchitecture::Unknown
            }
        },
        CpuVendor::Intel => {
            if family != 0x6 {
                tracing::warn!("Non family 6 Intel CPU detected");
                return CpuArchitecture::Unknown;
            }

            match model {
                // Haswell and Broadwell
                0x3C | 0x3F | 0x45 | 0x46 | 0x3D | 0x47 | 0x4F | 0x56 => {
                    CpuArchitecture::IntelHaswell
                }
                // Skylake and its client/server derivatives
                0x4E | 0x5E | 0x55 | 0x8E | 0x9E | 0xA5 | 0xA6 => CpuArchitecture::IntelSkylake,
                _ => {
                    tracing::warn!("Unknown Intel CPU model: {:X}", model);
                    CpuArchitecture::IntelOther
                }
            }
        }
        CpuVendor::Other => CpuArchitecture::Unknown,
    }
}
