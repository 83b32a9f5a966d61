//! Image transfer to and from EEPROM devices and plain files.
//!
//! # Reading
//! The record length is only known after the headers are decoded, so
//! [`EepromReader`] reads in two phases: first the fixed prefix (32 bytes,
//! 40 for v3), then exactly `payload_length` bytes of blocks. Nothing past
//! the image is touched, which matters for EEPROMs whose remaining space
//! belongs to someone else.
//!
//! # Writing
//! [`EepromWriter`] encodes the whole image before the first byte goes out;
//! an image that does not fit the device is rejected up front.
//!
//! # Devices
//! Linux exposes I2C EEPROMs as a seekable sysfs file, see
//! [`sysfs_eeprom_path`].

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use log::{debug, info};

use crate::config::ProductConfig;
use crate::error::{EepromError, Result};
use crate::header::{ApiVersion, IdHeader, DATA_HEADER_SIZE, HEADER_SIZE};
use crate::record::{decode_header, EepromRecord, PartialRecord};

/// `/sys/class/i2c-dev/i2c-{bus}/device/{bus}-{dev:04X}/eeprom`
pub fn sysfs_eeprom_path(bus: u32, dev: u16) -> PathBuf {
    PathBuf::from(format!("/sys/class/i2c-dev/i2c-{bus}/device/{bus}-{dev:04X}/eeprom"))
}

/// Device node named by a product table.
pub fn device_path(config: &ProductConfig) -> Result<PathBuf> {
    match (config.product.i2c_bus, config.product.i2c_dev) {
        (Some(bus), Some(dev)) => Ok(sysfs_eeprom_path(bus, dev)),
        _ => Err(EepromError::Config("product table lacks i2c_bus / i2c_dev".to_string())),
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct EepromReader<R: Read + Seek> {
    reader: R,
    offset: u64,
}

impl<R: Read + Seek> EepromReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_offset(reader, 0)
    }

    /// Image starts `offset` bytes into the device.
    pub fn with_offset(reader: R, offset: u64) -> Self {
        Self { reader, offset }
    }

    /// Phase one: the fixed-size prefix. The header checksum is verified
    /// before its version byte decides whether a data header follows.
    pub fn read_header(&mut self) -> Result<PartialRecord> {
        let mut prefix = self.fill(0, HEADER_SIZE)?;
        let header = IdHeader::read(&prefix)?;
        if header.api_version == ApiVersion::V3 {
            prefix.extend(self.fill(HEADER_SIZE, DATA_HEADER_SIZE)?);
        }
        decode_header(&prefix)
    }

    /// Both phases: header, then exactly the advertised block area.
    pub fn read_record(&mut self) -> Result<EepromRecord> {
        let partial = self.read_header()?;
        let payload = self.fill(partial.prefix_size(), partial.payload_length())?;
        let record = partial.finish(&payload)?;
        info!(
            "read {} byte image at offset {} ({} blocks)",
            record.api_version().prefix_size() + payload.len(),
            self.offset,
            record.block_count()
        );
        Ok(record)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read `len` bytes starting `start` bytes into the image.
    fn fill(&mut self, start: usize, len: usize) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(self.offset + start as u64))?;
        let mut buf = Vec::with_capacity(len);
        (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() < len {
            return Err(EepromError::Truncated { needed: start + len, got: start + buf.len() });
        }
        debug!("read {len} bytes at image offset {start}");
        Ok(buf)
    }
}

/// Read and decode the record stored `offset` bytes into `reader`.
pub fn read_record<R: Read + Seek>(reader: R, offset: u64) -> Result<EepromRecord> {
    EepromReader::with_offset(reader, offset).read_record()
}

/// Base name of the product whose image `reader` holds, without loading
/// any product table; used to pick the table.
pub fn detect_base_name<R: Read + Seek>(reader: R) -> Result<String> {
    let partial = EepromReader::new(reader).read_header()?;
    let name = crate::naming::base_name(partial.header())?;
    info!("detected product {name}");
    Ok(name)
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct EepromWriter<W: Write + Seek> {
    writer:             W,
    offset:             u64,
    pub max_image_size: Option<usize>,
}

impl<W: Write + Seek> EepromWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, offset: 0, max_image_size: None }
    }

    pub fn with_options(writer: W, offset: u64, max_image_size: Option<usize>) -> Self {
        Self { writer, offset, max_image_size }
    }

    /// Encode and write `record`. Returns the image size.
    pub fn write_record(&mut self, record: &EepromRecord) -> Result<usize> {
        let image = record.encode()?;
        if let Some(max) = self.max_image_size {
            if image.len() > max {
                return Err(EepromError::ImageTooLarge { size: image.len(), max });
            }
        }
        self.writer.seek(SeekFrom::Start(self.offset))?;
        self.writer.write_all(&image)?;
        self.writer.flush()?;
        info!("wrote {} byte image at offset {}", image.len(), self.offset);
        Ok(image.len())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Encode `record` and write it at the start of `writer`.
pub fn write_record<W: Write + Seek>(
    writer: W,
    record: &EepromRecord,
    max_image_size: Option<usize>,
) -> Result<usize> {
    EepromWriter::with_options(writer, 0, max_image_size).write_record(record)
}
