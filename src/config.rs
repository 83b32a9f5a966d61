//! Per-product configuration table.
//!
//! One JSON document per product, e.g. `PCM-066.json`:
//!
//! ```json
//! {
//!   "product": { "api": 3, "optiontree_rev": 1, "extended_options": 1,
//!                "max_image_size": 256, "i2c_bus": 0, "i2c_dev": 81 },
//!   "kit":     { "0": "Controller", "1": "RAM" },
//!   "options": { "Controller": { "3": "i.MX 8M Plus" },
//!                "RAM":        { "0": "1 GiB", "2": "4 GiB" } }
//! }
//! ```
//!
//! `kit` maps option positions in the kit string to option names;
//! `options` maps each name to the meaning of every option character.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{EepromError, Result};
use crate::header::ApiVersion;

fn default_api() -> u8 {
    2
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    #[serde(default = "default_api")]
    pub api:              u8,
    #[serde(default)]
    pub optiontree_rev:   u8,
    /// Trailing kit option characters that are not part of the product name.
    #[serde(default)]
    pub extended_options: usize,
    /// Capacity of the identity EEPROM in bytes.
    #[serde(default)]
    pub max_image_size:   Option<usize>,
    #[serde(default)]
    pub i2c_bus:          Option<u32>,
    #[serde(default)]
    pub i2c_dev:          Option<u16>,
}

impl Default for ProductInfo {
    fn default() -> Self {
        Self {
            api:              default_api(),
            optiontree_rev:   0,
            extended_options: 0,
            max_image_size:   None,
            i2c_bus:          None,
            i2c_dev:          None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ProductConfig {
    #[serde(default)]
    pub product: ProductInfo,
    #[serde(default)]
    pub kit:     BTreeMap<usize, String>,
    #[serde(default)]
    pub options: HashMap<String, BTreeMap<String, String>>,
}

impl ProductConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| EepromError::Config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EepromError::Config(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EepromError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn api_version(&self) -> Result<ApiVersion> {
        ApiVersion::try_from(self.product.api)
    }

    /// Number of configurable kit option positions (0 = unconstrained).
    pub fn option_count(&self) -> usize {
        self.kit.len()
    }

    /// Meaning of option character `code` at `position`. A NUL character
    /// is looked up as `"0"`.
    pub fn describe_option(&self, position: usize, code: char) -> Option<(&str, &str)> {
        let name = self.kit.get(&position)?;
        let code = if code == '\0' { "0".to_string() } else { code.to_string() };
        let meaning = self.options.get(name)?.get(&code)?;
        Some((name.as_str(), meaning.as_str()))
    }
}
