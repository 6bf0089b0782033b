//! Runtime selection of the instruction-set tier.
//!
//! The tier is detected once and cached. Setting `INTGEMM_CPUID` to one of
//! `SSE2`, `SSSE3`, `AVX2` or `AVX512BW` caps it, which is how the slower
//! paths get exercised on a fast machine. The cap can only lower the tier.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use thiserror::Error;

/// Environment variable holding the tier cap.
pub const CPUID_ENV: &str = "INTGEMM_CPUID";

/// Instruction-set tiers, ordered from least to most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CpuType {
    /// No usable tier. Every dispatched entry point panics.
    Unsupported,
    /// 128-bit, 16-bit kernels only.
    Sse2,
    /// 128-bit, both kernels.
    Ssse3,
    /// 256-bit.
    Avx2,
    /// 512-bit with byte/word instructions.
    Avx512bw,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CpuTypeError {
    #[error("unknown CPU type {0:?}, expected one of SSE2, SSSE3, AVX2, AVX512BW")]
    Unknown(String),
}

impl CpuType {
    /// Best tier the running processor supports.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx512f") && is_x86_feature_detected!("avx512bw") {
                return CpuType::Avx512bw;
            }
            if is_x86_feature_detected!("avx2") {
                return CpuType::Avx2;
            }
            if is_x86_feature_detected!("ssse3") {
                return CpuType::Ssse3;
            }
            if is_x86_feature_detected!("sse2") {
                return CpuType::Sse2;
            }
        }
        CpuType::Unsupported
    }

    /// Register size of the tier, which is also the alignment its kernels
    /// require. Zero for `Unsupported`.
    pub fn register_bytes(self) -> usize {
        match self {
            CpuType::Unsupported => 0,
            CpuType::Sse2 | CpuType::Ssse3 => 16,
            CpuType::Avx2 => 32,
            CpuType::Avx512bw => 64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CpuType::Unsupported => "unsupported",
            CpuType::Sse2 => "SSE2",
            CpuType::Ssse3 => "SSSE3",
            CpuType::Avx2 => "AVX2",
            CpuType::Avx512bw => "AVX512BW",
        }
    }

    /// Lower `self` to `cap`. A cap above `self` has no effect.
    pub fn capped(self, cap: CpuType) -> Self {
        self.min(cap)
    }
}

impl fmt::Display for CpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CpuType {
    type Err = CpuTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SSE2" => Ok(CpuType::Sse2),
            "SSSE3" => Ok(CpuType::Ssse3),
            "AVX2" => Ok(CpuType::Avx2),
            "AVX512BW" => Ok(CpuType::Avx512bw),
            _ => Err(CpuTypeError::Unknown(s.to_string())),
        }
    }
}

/// Apply an optional cap read from the environment. Bad values are logged
/// and ignored.
pub fn apply_override(detected: CpuType, cap: Option<&str>) -> CpuType {
    let Some(cap) = cap else {
        return detected;
    };
    match cap.parse::<CpuType>() {
        Ok(cap) => {
            let tier = detected.capped(cap);
            log::debug!("{}={} caps detected {} to {}", CPUID_ENV, cap, detected, tier);
            tier
        }
        Err(e) => {
            log::warn!("ignoring {}: {}", CPUID_ENV, e);
            detected
        }
    }
}

/// The tier every dispatched entry point uses, detected on first call.
pub fn cpu_type() -> CpuType {
    static CPU_TYPE: OnceLock<CpuType> = OnceLock::new();
    *CPU_TYPE.get_or_init(|| {
        let detected = CpuType::detect();
        log::debug!("detected CPU type {}", detected);
        let cap = std::env::var(CPUID_ENV).ok();
        apply_override(detected, cap.as_deref())
    })
}
