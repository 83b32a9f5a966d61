//! Product arguments → identity record.
//!
//! Products are named on the command line the way they appear on the
//! label: `--som PCM-066`, `--ksx KSP-0300`, `--som PCL-066 --ksx KSP-08`
//! or `--som PFL-G-01 --id PT003`. The component type is derived from the
//! name prefixes, the numeric parts fill the article and kit fields.

use log::debug;

use crate::component::ComponentType;
use crate::config::ProductConfig;
use crate::error::{EepromError, Result};
use crate::header::{IdHeader, MAX_KIT_OPTIONS};
use crate::record::EepromRecord;
use crate::revision::{format_revision, parse_revision, MAX_SUB_REVISION};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductArgs {
    pub som: Option<String>,
    pub ksx: Option<String>,
    /// Option id of a flex module, e.g. `PT003`.
    pub id:  Option<String>,
    /// Kit options; dashes are ignored.
    pub kit: String,
    pub pcb: String,
    pub bom: String,
    /// Option-tree revision override; defaults to the product table.
    pub opt: Option<u8>,
}

impl ProductArgs {
    /// Stem of the product table to load: the SOM name, else the KSx name.
    pub fn config_stem(&self) -> Option<&str> {
        self.som.as_deref().or(self.ksx.as_deref())
    }

    pub fn component(&self) -> ComponentType {
        let som = self.som.as_deref().unwrap_or_default();
        let ksx = self.ksx.as_deref().unwrap_or_default();

        let name = if som.starts_with("PFL-") {
            let family = som.get(..som.len().saturating_sub(3)).unwrap_or_default();
            let option = self.id.as_deref().and_then(|id| id.get(..2)).unwrap_or_default();
            format!("{family}-{option}")
        } else if !som.is_empty() && !ksx.is_empty() {
            format!("{}-{}", prefix(som), prefix(ksx))
        } else if !ksx.is_empty() {
            prefix(ksx).to_string()
        } else {
            prefix(som).to_string()
        };
        ComponentType::from_name(&name)
    }

    /// Kit options with the separating dashes removed.
    pub fn kit_options(&self) -> String {
        self.kit.chars().filter(|&c| c != '-').collect()
    }

    /// Resolve the arguments against a product table into a record that is
    /// ready to encode.
    pub fn build(&self, config: &ProductConfig) -> Result<EepromRecord> {
        let api_version = config.api_version()?;

        let (major, pcb_sub_revision) = parse_revision(&self.pcb)?;
        let pcb_revision = u8::try_from(major).map_err(|_| EepromError::OutOfBounds {
            field: "pcb revision",
            value: major as u64,
            max:   u8::MAX as u64,
        })?;

        let opttree_revision = self.opt.unwrap_or(config.product.optiontree_rev);
        if opttree_revision > MAX_SUB_REVISION {
            return Err(EepromError::OutOfBounds {
                field: "option-tree revision",
                value: opttree_revision as u64,
                max:   MAX_SUB_REVISION as u64,
            });
        }

        let component = self.component();
        let (base_article_number, kit_number) = self.article_numbers(component)?;

        let kit_options = self.kit_options();
        let count = kit_options.chars().count();
        if count > MAX_KIT_OPTIONS {
            return Err(EepromError::FieldTooLong {
                field: "kit options",
                len:   count,
                max:   MAX_KIT_OPTIONS,
            });
        }
        let expected = config.option_count();
        if expected != 0 && count != expected {
            return Err(EepromError::InvalidProduct(format!(
                "kit options {kit_options:?} do not match the {expected} options of this product"
            )));
        }

        let header = IdHeader {
            api_version,
            pcb_revision,
            pcb_sub_revision,
            opttree_revision,
            component,
            base_article_number,
            kit_number,
            kit_options,
            bom_revision: self.bom.clone(),
        };
        // Reject anything the layout cannot hold before handing it out.
        header.to_bytes()?;
        debug!("resolved {:?} to {} ({})", self.config_stem(), component.name(), api_version.as_u8());
        Ok(EepromRecord::new(header))
    }

    /// Default output file name for `create`, e.g. `PCM-066-3022210I.A0_3a_1`.
    pub fn file_name(&self, record: &EepromRecord) -> String {
        let c = record.header.component;
        let som = self.som.as_deref().unwrap_or_default();
        let ksx = self.ksx.as_deref().unwrap_or_default();
        let stem = if c.is_module() || c.is_module_flex() {
            som.to_string()
        } else if c.is_kit() {
            ksx.to_string()
        } else {
            format!("{som}-{ksx}")
        };
        let h = &record.header;
        format!(
            "{stem}-{}.{}_{}_{}",
            self.kit,
            h.bom_revision,
            format_revision(h.pcb_revision, h.pcb_sub_revision),
            h.opttree_revision
        )
    }

    /// `(base_article_number, kit_number)` for the component type.
    fn article_numbers(&self, component: ComponentType) -> Result<(u8, u8)> {
        if component.is_module() {
            let som = self.require(&self.som, "--som")?;
            Ok((byte("product number", number(som, 4)?)?, 0))
        } else if component.is_kit() {
            let ksx = self.require(&self.ksx, "--ksx")?;
            let index = number(ksx, 4)?;
            if index > u16::MAX as u64 {
                return Err(EepromError::OutOfBounds {
                    field: "kit number",
                    value: index,
                    max:   u16::MAX as u64,
                });
            }
            Ok(((index & 0xFF) as u8, (index >> 8) as u8))
        } else if component.is_module_with_kit() {
            let som = self.require(&self.som, "--som")?;
            let ksx = self.require(&self.ksx, "--ksx")?;
            Ok((byte("product number", number(som, 4)?)?, byte("KSx number", number(ksx, 3)?)?))
        } else if component.is_module_flex() {
            let som = self.require(&self.som, "--som")?;
            let id = self.require(&self.id, "--id")?;
            let base = number(som, som.len().saturating_sub(2))?;
            Ok((byte("product number", base)?, byte("option id", number(id, 2)?)?))
        } else {
            Err(EepromError::UnknownComponentType(component.code()))
        }
    }

    fn require<'a>(&self, value: &'a Option<String>, flag: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EepromError::InvalidProduct(format!("{flag} is required for this product")))
    }
}

fn prefix(name: &str) -> &str {
    name.get(..3).unwrap_or(name)
}

/// Decimal number following the first `skip` bytes of `name`; a leading
/// dash is tolerated (`KSP-08` and `KSP08` are the same).
fn number(name: &str, skip: usize) -> Result<u64> {
    name.get(skip..)
        .map(|digits| digits.trim_start_matches('-'))
        .and_then(|digits| digits.parse::<u64>().ok())
        .ok_or_else(|| EepromError::InvalidProduct(format!("{name:?} carries no article number")))
}

fn byte(field: &'static str, value: u64) -> Result<u8> {
    u8::try_from(value).map_err(|_| EepromError::OutOfBounds {
        field,
        value,
        max: u8::MAX as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ApiVersion;

    fn args(som: Option<&str>, ksx: Option<&str>, kit: &str, pcb: &str, bom: &str) -> ProductArgs {
        ProductArgs {
            som: som.map(str::to_string),
            ksx: ksx.map(str::to_string),
            id:  None,
            kit: kit.to_string(),
            pcb: pcb.to_string(),
            bom: bom.to_string(),
            opt: None,
        }
    }

    fn config(api: u8, opttree: u8, options: usize) -> ProductConfig {
        let mut cfg = ProductConfig::default();
        cfg.product.api = api;
        cfg.product.optiontree_rev = opttree;
        for i in 0..options {
            cfg.kit.insert(i, format!("Option {i}"));
        }
        cfg
    }

    #[test]
    fn component_selection() {
        assert_eq!(args(Some("PCM-066"), None, "", "1", "A0").component(), ComponentType::Pcm);
        assert_eq!(args(None, Some("KSP-0300"), "", "1", "A0").component(), ComponentType::Ksp);
        assert_eq!(
            args(Some("PCL-066"), Some("KSM-08"), "", "1", "A0").component(),
            ComponentType::PclKsm
        );
        let mut flex = args(Some("PFL-G-01"), None, "", "1", "A0");
        flex.id = Some("SP012".to_string());
        assert_eq!(flex.component(), ComponentType::PflGSp);
        assert_eq!(args(Some("XYZ-001"), None, "", "1", "A0").component(), ComponentType::Invalid);
    }

    #[test]
    fn module_matches_reference_image() {
        let a = args(Some("PCM-066"), None, "3022-210I", "3a", "A0");
        let record = a.build(&config(2, 1, 8)).unwrap();
        assert_eq!(
            hex::encode(record.encode().unwrap()),
            "02031100420033303232323130490000000000000000004130000000000000af"
        );
        assert_eq!(record.full_name(0).unwrap(), "PCM-066-3022210I.A0");
        assert_eq!(a.file_name(&record), "PCM-066-3022-210I.A0_3a_1");
    }

    #[test]
    fn kit_splits_sixteen_bit_index() {
        let a = args(None, Some("KSP-0300"), "", "1", "A1");
        let record = a.build(&config(2, 0, 0)).unwrap();
        assert_eq!(record.header.base_article_number, 0x2C);
        assert_eq!(record.header.kit_number, 0x01);
        assert_eq!(
            hex::encode(record.encode().unwrap()),
            "020100022c01000000000000000000000000000000000041310000000000000c"
        );
        assert_eq!(record.base_name().unwrap(), "KSP-0300");

        let too_big = args(None, Some("KSP-70000"), "", "1", "A1");
        assert!(matches!(
            too_big.build(&config(2, 0, 0)),
            Err(EepromError::OutOfBounds { field: "kit number", .. })
        ));
    }

    #[test]
    fn module_with_kit_and_flex() {
        let a = args(Some("PCL-066"), Some("KSP-08"), "1234", "2", "B1");
        let record = a.build(&config(3, 0, 4)).unwrap();
        assert_eq!(record.api_version(), ApiVersion::V3);
        assert_eq!(record.full_name(0).unwrap(), "PCL-066-KSP08.B1");

        let big = args(Some("PCL-066"), Some("KSP-300"), "1234", "2", "B1");
        assert!(matches!(big.build(&config(3, 0, 4)), Err(EepromError::OutOfBounds { .. })));

        let mut flex = args(Some("PFL-G-01"), None, "", "1", "A0");
        flex.id = Some("PT003".to_string());
        let record = flex.build(&config(2, 0, 0)).unwrap();
        assert_eq!(record.full_name(0).unwrap(), "PFL-G-01-PT003.A0");

        flex.id = None;
        assert!(matches!(flex.build(&config(2, 0, 0)), Err(EepromError::InvalidProduct(_))));
    }

    #[test]
    fn rejects_bad_arguments() {
        let cfg = config(2, 0, 3);
        let unknown = args(Some("XYZ-001"), None, "123", "1", "A0");
        assert!(matches!(unknown.build(&cfg), Err(EepromError::UnknownComponentType(0xFF))));

        let wrong_count = args(Some("PCM-066"), None, "12", "1", "A0");
        assert!(matches!(wrong_count.build(&cfg), Err(EepromError::InvalidProduct(_))));

        let bad_pcb = args(Some("PCM-066"), None, "123", "1A", "A0");
        assert!(matches!(bad_pcb.build(&cfg), Err(EepromError::MalformedRevision(_))));

        let big_pcb = args(Some("PCM-066"), None, "123", "256", "A0");
        assert!(matches!(big_pcb.build(&cfg), Err(EepromError::OutOfBounds { .. })));

        let long_bom = args(Some("PCM-066"), None, "123", "1", "A00");
        assert!(matches!(long_bom.build(&cfg), Err(EepromError::FieldTooLong { .. })));

        let mut high_opt = args(Some("PCM-066"), None, "123", "1", "A0");
        high_opt.opt = Some(16);
        assert!(matches!(
            high_opt.build(&cfg),
            Err(EepromError::OutOfBounds { field: "option-tree revision", .. })
        ));
    }
}
