#[cfg(target_arch = "x86_64")]
pub fn cpuid(eax: u32, ecx: u32) -> (u32, u32, u32, u32) {
    let mut ebx: u32;
    let mut edx: u32;
    let mut eax_out = eax;
    let mut ecx_out = ecx;

    unsafe {
        std::arch::asm!(
            "mov {0:r}, rbx",
            "cpuid",
            "xchg {0:r}, rbx",
            out(reg) ebx,
            inout("eax") eax_out,
            inout("ecx") ecx_out,
            out("edx") edx,
            options(nostack, preserves_flags)
        );
    }

    (eax_out, ebx, ecx_out, edx)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn cpuid(_eax: u32, _ecx: u32) -> (u32, u32, u32, u32) {
    (0, 0, 0, 0)
}

/// 12-byte vendor identification string from leaf 0
pub fn vendor_string() -> String {
    let (_eax, ebx, ecx, edx) = cpuid(0, 0);
    let bytes: Vec<u8> = [ebx, edx, ecx]
        .iter()
        .flat_map(|reg| reg.to_le_bytes())
        .collect();
    String::from_utf8_lossy(&bytes).trim_end_matches('\0').to_string()
}

/// Display family, display model and stepping decoded from a leaf 1 EAX value
pub fn decode_signature(eax: u32) -> (u32, u32, u32) {
    let stepping = eax & 0xF;
    let model = (eax >> 4) & 0xF;
    let family = (eax >> 8) & 0xF;
    let extended_model = (eax >> 16) & 0xF;
    let extended_family = (eax >> 20) & 0xFF;

    let display_family = if family == 0xF {
        family + extended_family
    } else {
        family
    };

    let display_model = if family == 0x6 || family == 0xF {
        (extended_model << 4) + model
    } else {
        model
    };

    (display_family, display_model, stepping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::similar_names)] // CPU register names are standard
    fn test_cpuid() {
        let (eax, ebx, ecx, edx) = cpuid(0, 0);
        println!("CPUID(0,0): EAX={eax:08X} EBX={ebx:08X} ECX={ecx:08X} EDX={edx:08X}");
    }

    #[test]
    fn test_decode_zen2_signature() {
        // Ryzen 9 3900X: family 17h, model 71h, stepping 0
        assert_eq!(decode_signature(0x0087_0F10), (0x17, 0x71, 0));
    }

    #[test]
    fn test_decode_intel_signature() {
        // Skylake-S: family 6, model 5Eh, stepping 3
        assert_eq!(decode_signature(0x0005_06E3), (0x6, 0x5E, 3));
    }
}
