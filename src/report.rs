//! Human-readable dump of a record.

use std::io::Write;

use crate::config::ProductConfig;
use crate::error::{EepromError, Result};
use crate::record::EepromRecord;
use crate::revision::{format_revision, render_sub_revision};

const LABEL_WIDTH: usize = 17;

/// Render `record` for the console.
pub fn render(record: &EepromRecord, config: Option<&ProductConfig>) -> Result<String> {
    let mut out = Vec::new();
    write_report(&mut out, record, config)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn write_report<W: Write>(
    out: &mut W,
    record: &EepromRecord,
    config: Option<&ProductConfig>,
) -> Result<()> {
    let h = &record.header;
    let extended = config.map_or(0, |c| c.product.extended_options);

    let shown: Vec<char> = h.kit_options.chars().map(|c| if c == '\0' { '#' } else { c }).collect();
    let split = shown.len().saturating_sub(extended);
    let options: String = shown[..split].iter().collect();
    let ext_options: String = if extended > 0 { shown[split..].iter().collect() } else { "-".to_string() };
    let ksx = if h.kit_number != 0 { h.kit_number.to_string() } else { "-".to_string() };
    let sub = render_sub_revision(h.pcb_sub_revision).unwrap_or_else(|_| "?".to_string());

    writeln!(out, "EEPROM Content")?;
    writeln!(out, "##############")?;
    writeln!(out)?;
    section(out, "Decoded Information")?;
    line(out, "Full name", record.full_name(extended).unwrap_or_else(|e| e.to_string()))?;
    line(out, "PCB revision", format_revision(h.pcb_revision, h.pcb_sub_revision))?;
    writeln!(out)?;
    section(out, "Raw Information")?;
    line(out, "API version", h.api_version.as_u8())?;
    line(out, "PCB rev.", format!("{}-{sub}", h.pcb_revision))?;
    line(out, "Optiontree rev.", h.opttree_revision)?;
    line(out, "Component", h.component.name())?;
    writeln!(out)?;
    writeln!(out, "Base Article Number")?;
    writeln!(out, "===================")?;
    line(out, "Product number", h.base_article_number)?;
    line(out, "KSx number", &ksx)?;
    line(out, "Options", &options)?;
    line(out, "Extended Options", &ext_options)?;

    if let Some(cfg) = config.filter(|c| c.option_count() > 0) {
        writeln!(out)?;
        section(out, "Verbose Kit Options")?;
        verbose_options(out, &h.kit_options, cfg)?;
    }

    writeln!(out)?;
    section(out, "Extras")?;
    line(out, "CRC-Checksum", format!("0x{:x}", h.checksum()?))?;

    if let Some(data_header) = record.data_header() {
        writeln!(out)?;
        writeln!(out, "API v3 Content")?;
        writeln!(out, "##############")?;
        line(out, "API sub version", data_header.sub_version)?;
        line(out, "Number of blocks", data_header.block_count)?;
        line(out, "CRC-Checksum", format!("0x{:x}", data_header.checksum()))?;
        for block in record.blocks() {
            writeln!(out)?;
            writeln!(out, "{block}")?;
        }
    }
    Ok(())
}

/// One line per configured option position: `<name> : <meaning>`.
fn verbose_options<W: Write>(out: &mut W, kit_options: &str, config: &ProductConfig) -> Result<()> {
    if kit_options.chars().count() != config.option_count() {
        return Err(EepromError::InvalidProduct(format!(
            "kit options {kit_options:?} mismatch the {} options of this product",
            config.option_count()
        )));
    }
    let width = config
        .kit
        .values()
        .map(|name| name.len() + 1)
        .max()
        .unwrap_or(0)
        .max(LABEL_WIDTH);

    let codes: Vec<char> = kit_options.chars().collect();
    for (&position, name) in &config.kit {
        let code = codes.get(position).copied().unwrap_or('\0');
        let meaning = config
            .describe_option(position, code)
            .map_or("unknown", |(_, meaning)| meaning);
        writeln!(out, "{name:<width$}:  {meaning}")?;
    }
    Ok(())
}

fn section<W: Write>(out: &mut W, title: &str) -> Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "*".repeat(title.len()))?;
    Ok(())
}

fn line<W: Write>(out: &mut W, label: &str, value: impl std::fmt::Display) -> Result<()> {
    writeln!(out, "{label:<LABEL_WIDTH$}:  {value}")?;
    Ok(())
}
