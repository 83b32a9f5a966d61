//! Component types and their frozen wire codes.

use crate::error::{EepromError, Result};

// ── Frozen wire codes ────────────────────────────────────────────────────────

pub const CODE_PCM:      u8 = 0x00;
pub const CODE_PCL:      u8 = 0x01;
pub const CODE_KSP:      u8 = 0x02;
pub const CODE_KSM:      u8 = 0x03;
pub const CODE_PCM_KSP:  u8 = 0x04;
pub const CODE_PCM_KSM:  u8 = 0x05;
pub const CODE_PCL_KSP:  u8 = 0x06;
pub const CODE_PCL_KSM:  u8 = 0x07;
pub const CODE_PFL_G_PT: u8 = 0x08;
pub const CODE_PFL_G_SP: u8 = 0x09;
pub const CODE_PFL_G_KP: u8 = 0x0A;
pub const CODE_PFL_G_KM: u8 = 0x0B;
pub const CODE_INVALID:  u8 = 0xFF;

// ── ComponentType enum ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// Bare module.
    Pcm,
    /// Bare module, lite variant.
    Pcl,
    /// Standard kit.
    Ksp,
    /// Mini kit.
    Ksm,
    PcmKsp,
    PcmKsm,
    PclKsp,
    PclKsm,
    /// Flex module family.
    PflGPt,
    PflGSp,
    PflGKp,
    PflGKm,
    Invalid,
}

impl ComponentType {
    pub const ALL: [ComponentType; 13] = [
        ComponentType::Pcm,    ComponentType::Pcl,
        ComponentType::Ksp,    ComponentType::Ksm,
        ComponentType::PcmKsp, ComponentType::PcmKsm,
        ComponentType::PclKsp, ComponentType::PclKsm,
        ComponentType::PflGPt, ComponentType::PflGSp,
        ComponentType::PflGKp, ComponentType::PflGKm,
        ComponentType::Invalid,
    ];

    /// The frozen one-byte wire code.
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            ComponentType::Pcm     => CODE_PCM,
            ComponentType::Pcl     => CODE_PCL,
            ComponentType::Ksp     => CODE_KSP,
            ComponentType::Ksm     => CODE_KSM,
            ComponentType::PcmKsp  => CODE_PCM_KSP,
            ComponentType::PcmKsm  => CODE_PCM_KSM,
            ComponentType::PclKsp  => CODE_PCL_KSP,
            ComponentType::PclKsm  => CODE_PCL_KSM,
            ComponentType::PflGPt  => CODE_PFL_G_PT,
            ComponentType::PflGSp  => CODE_PFL_G_SP,
            ComponentType::PflGKp  => CODE_PFL_G_KP,
            ComponentType::PflGKm  => CODE_PFL_G_KM,
            ComponentType::Invalid => CODE_INVALID,
        }
    }

    /// Resolve a wire code. Unknown codes are corrupt or foreign data.
    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(EepromError::UnknownComponentType(code))
    }

    /// Canonical name, e.g. `"PCM-KSP"` or `"PFL-G-PT"`.
    pub fn name(self) -> &'static str {
        match self {
            ComponentType::Pcm     => "PCM",
            ComponentType::Pcl     => "PCL",
            ComponentType::Ksp     => "KSP",
            ComponentType::Ksm     => "KSM",
            ComponentType::PcmKsp  => "PCM-KSP",
            ComponentType::PcmKsm  => "PCM-KSM",
            ComponentType::PclKsp  => "PCL-KSP",
            ComponentType::PclKsm  => "PCL-KSM",
            ComponentType::PflGPt  => "PFL-G-PT",
            ComponentType::PflGSp  => "PFL-G-SP",
            ComponentType::PflGKp  => "PFL-G-KP",
            ComponentType::PflGKm  => "PFL-G-KM",
            ComponentType::Invalid => "INVALID",
        }
    }

    /// Parse a canonical name. Unknown names map to [`ComponentType::Invalid`].
    pub fn from_name(s: &str) -> Self {
        let upper = s.to_ascii_uppercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == upper)
            .unwrap_or(ComponentType::Invalid)
    }

    pub fn is_module(self) -> bool {
        (CODE_PCM..=CODE_PCL).contains(&self.code())
    }

    pub fn is_kit(self) -> bool {
        (CODE_KSP..=CODE_KSM).contains(&self.code())
    }

    pub fn is_module_with_kit(self) -> bool {
        (CODE_PCM_KSP..=CODE_PCL_KSM).contains(&self.code())
    }

    pub fn is_module_flex(self) -> bool {
        (CODE_PFL_G_PT..=CODE_PFL_G_KM).contains(&self.code())
    }

    /// Option-id prefix of a flex module (`"PT"`, `"SP"`, `"KP"`, `"KM"`).
    pub fn flex_prefix(self) -> Option<&'static str> {
        match self {
            ComponentType::PflGPt => Some("PT"),
            ComponentType::PflGSp => Some("SP"),
            ComponentType::PflGKp => Some("KP"),
            ComponentType::PflGKm => Some("KM"),
            _                     => None,
        }
    }

    /// Module half of the name (`"PCM"` for `PCM-KSP`, `"PFL"` for flex).
    pub fn module_part(self) -> &'static str {
        self.name().split('-').next().unwrap_or("")
    }

    /// Second name segment (`"KSP"` for `PCM-KSP`, `"G"` for `PFL-G-PT`).
    pub fn second_part(self) -> Option<&'static str> {
        self.name().split('-').nth(1)
    }
}
