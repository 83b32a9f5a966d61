//! Canonical product names derived from a decoded header.
//!
//! Only header fields are used, so a name can be computed from the first
//! bytes of a raw image before any per-product table is loaded.

use crate::component::ComponentType;
use crate::error::{EepromError, Result};
use crate::header::IdHeader;

/// 16-bit kit index stored as `kit_number` (high byte) and
/// `base_article_number` (low byte).
pub fn kit_index(header: &IdHeader) -> u16 {
    ((header.kit_number as u16) << 8) | header.base_article_number as u16
}

/// Option id of a flex module, e.g. `"PT003"`.
pub fn flex_option_id(header: &IdHeader) -> Option<String> {
    header
        .component
        .flex_prefix()
        .map(|prefix| format!("{prefix}{:03}", header.kit_number))
}

/// `PCM-066`, `KSP-0300`, `PFL-G-01`, …
pub fn base_name(header: &IdHeader) -> Result<String> {
    let c = header.component;
    let module = c.module_part();
    let name = if c.is_module() || c.is_module_with_kit() {
        format!("{module}-{:03}", header.base_article_number)
    } else if c.is_kit() {
        format!("{module}-{:04}", kit_index(header))
    } else if c.is_module_flex() {
        format!("{module}-{}-{:02}", c.second_part().unwrap_or_default(), header.base_article_number)
    } else {
        return Err(EepromError::UnknownComponentType(c.code()));
    };
    Ok(name)
}

/// Base name plus options and BOM revision, e.g. `PCM-066-3022210I.A0`.
///
/// For plain modules the last `extended_options` option characters are not
/// part of the product name.
pub fn full_name(header: &IdHeader, extended_options: usize) -> Result<String> {
    let base = base_name(header)?;
    let c = header.component;
    let name = if c.is_module() {
        let keep = header.kit_options.chars().count().saturating_sub(extended_options);
        let options: String = header.kit_options.chars().take(keep).collect();
        format!("{base}-{options}")
    } else if c.is_kit() {
        base
    } else if c.is_module_with_kit() {
        format!("{base}-{}{:02}", c.second_part().unwrap_or_default(), header.kit_number)
    } else {
        // base_name already rejected everything but flex modules.
        format!("{base}-{}", flex_option_id(header).unwrap_or_default())
    };
    Ok(format!("{name}.{}", header.bom_revision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ApiVersion;

    fn header(component: ComponentType, base: u8, kit: u8, options: &str) -> IdHeader {
        IdHeader {
            api_version:         ApiVersion::V2,
            pcb_revision:        1,
            pcb_sub_revision:    0,
            opttree_revision:    0,
            component,
            base_article_number: base,
            kit_number:          kit,
            kit_options:         options.to_string(),
            bom_revision:        "A0".to_string(),
        }
    }

    #[test]
    fn module_names() {
        let h = header(ComponentType::Pcm, 66, 0, "3022210I");
        assert_eq!(base_name(&h).unwrap(), "PCM-066");
        assert_eq!(full_name(&h, 0).unwrap(), "PCM-066-3022210I.A0");
        assert_eq!(full_name(&h, 2).unwrap(), "PCM-066-302221.A0");

        let h = header(ComponentType::Pcl, 7, 0, "ABC");
        assert_eq!(full_name(&h, 10).unwrap(), "PCL-007-.A0");
    }

    #[test]
    fn kit_names_use_sixteen_bit_index() {
        let h = header(ComponentType::Ksp, 0x2C, 0x01, "");
        assert_eq!(kit_index(&h), 300);
        assert_eq!(base_name(&h).unwrap(), "KSP-0300");
        assert_eq!(full_name(&h, 0).unwrap(), "KSP-0300.A0");

        let h = header(ComponentType::Ksm, 12, 0, "");
        assert_eq!(full_name(&h, 0).unwrap(), "KSM-0012.A0");
    }

    #[test]
    fn module_with_kit_names() {
        let h = header(ComponentType::PclKsp, 66, 8, "1234");
        assert_eq!(base_name(&h).unwrap(), "PCL-066");
        assert_eq!(full_name(&h, 0).unwrap(), "PCL-066-KSP08.A0");
    }

    #[test]
    fn flex_names() {
        let h = header(ComponentType::PflGPt, 1, 3, "");
        assert_eq!(base_name(&h).unwrap(), "PFL-G-01");
        assert_eq!(flex_option_id(&h).unwrap(), "PT003");
        assert_eq!(full_name(&h, 0).unwrap(), "PFL-G-01-PT003.A0");
    }

    #[test]
    fn invalid_component_has_no_name() {
        let h = header(ComponentType::Invalid, 1, 0, "");
        assert!(matches!(base_name(&h), Err(EepromError::UnknownComponentType(0xFF))));
        assert!(full_name(&h, 0).is_err());
    }

    #[test]
    fn names_are_deterministic() {
        let h = header(ComponentType::PcmKsm, 5, 2, "");
        assert_eq!(full_name(&h, 0).unwrap(), full_name(&h.clone(), 0).unwrap());
    }
}
