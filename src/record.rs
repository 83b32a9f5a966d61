//! Record assembler: a complete identity image.
//!
//! # Encoding
//! [`EepromRecord::encode`] emits the 32-byte header and, for API v3, the
//! data header followed by every block in insertion order. Nothing is
//! returned unless the whole image could be built.
//!
//! # Decoding
//! The block area length is only known once the v3 data header has been
//! read, so decoding is two-phase:
//!
//! ```
//! use eeprom_id::header::V3_PREFIX_SIZE;
//! use eeprom_id::record::{decode_header, EepromRecord};
//!
//! let mut record = EepromRecord::default();
//! record.add_key_value_block("serial", "0042")?;
//! let image = record.encode()?;
//!
//! let partial = decode_header(&image[..V3_PREFIX_SIZE])?;
//! let payload = &image[V3_PREFIX_SIZE..][..partial.payload_length()];
//! assert_eq!(partial.finish(payload)?, record);
//! # Ok::<(), eeprom_id::EepromError>(())
//! ```
//!
//! [`decode`] does both phases over one complete buffer.

use log::debug;

use crate::block::{Block, BlockPayload, KeyValueBlock, MacBlock};
use crate::component::ComponentType;
use crate::error::{EepromError, Result};
use crate::header::{ApiVersion, DataHeader, IdHeader, API_V3_SUB_VERSION, HEADER_SIZE};
use crate::naming;

/// Most blocks the one-byte `block_count` can announce.
pub const MAX_BLOCKS: usize = u8::MAX as usize;

// ── EepromRecord ─────────────────────────────────────────────────────────────

/// A decoded (or to-be-encoded) identity record.
///
/// The block list is append-only; blocks enter only through
/// [`add_mac_block`](Self::add_mac_block) and
/// [`add_key_value_block`](Self::add_key_value_block), which enforce the
/// uniqueness rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EepromRecord {
    pub header:      IdHeader,
    /// v3 block set revision.
    pub sub_version: u8,
    blocks:          Vec<Block>,
}

impl Default for EepromRecord {
    fn default() -> Self {
        Self::new(IdHeader {
            api_version:         ApiVersion::V3,
            pcb_revision:        0,
            pcb_sub_revision:    0,
            opttree_revision:    0,
            component:           ComponentType::Pcm,
            base_article_number: 0,
            kit_number:          0,
            kit_options:         String::new(),
            bom_revision:        String::new(),
        })
    }
}

impl EepromRecord {
    pub fn new(header: IdHeader) -> Self {
        Self { header, sub_version: API_V3_SUB_VERSION, blocks: Vec::new() }
    }

    pub fn api_version(&self) -> ApiVersion {
        self.header.api_version
    }

    pub fn is_v3(&self) -> bool {
        self.header.api_version == ApiVersion::V3
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Sum of all block lengths; also the offset the next block would get.
    pub fn payload_length(&self) -> usize {
        self.blocks.iter().map(Block::len).sum()
    }

    /// Header checksum as stored on the wire.
    pub fn checksum(&self) -> Result<u8> {
        self.header.checksum()
    }

    /// The v3 data header describing the current block list.
    pub fn data_header(&self) -> Option<DataHeader> {
        if !self.is_v3() {
            return None;
        }
        Some(DataHeader {
            // Both bounded by the checks in `push_block`.
            payload_length: self.payload_length() as u16,
            block_count:    self.blocks.len() as u8,
            sub_version:    self.sub_version,
        })
    }

    pub fn base_name(&self) -> Result<String> {
        naming::base_name(&self.header)
    }

    pub fn full_name(&self, extended_options: usize) -> Result<String> {
        naming::full_name(&self.header, extended_options)
    }

    // ── Blocks ───────────────────────────────────────────────────────────────

    /// Append a MAC block. Fails without touching the record if the
    /// interface or the address is already present.
    pub fn add_mac_block(&mut self, interface: u16, mac: &str) -> Result<()> {
        let candidate = MacBlock::new(interface, mac)?;
        for existing in self.mac_blocks() {
            if existing.mac == candidate.mac {
                return Err(EepromError::DuplicateBlock(format!(
                    "image already contains MAC address {}",
                    existing.mac_string()
                )));
            }
            if existing.interface == candidate.interface {
                return Err(EepromError::DuplicateBlock(format!(
                    "image already contains a MAC for interface {}",
                    existing.interface
                )));
            }
        }
        self.push_block(BlockPayload::Mac(candidate))
    }

    /// Append a key/value block. Fails without touching the record if the
    /// key is already present.
    pub fn add_key_value_block(&mut self, key: &str, value: &str) -> Result<()> {
        let candidate = KeyValueBlock::new(key, value)?;
        if self.key_value(key).is_some() {
            return Err(EepromError::DuplicateBlock(format!(
                "image already contains a value for key {key:?}"
            )));
        }
        self.push_block(BlockPayload::KeyValue(candidate))
    }

    pub fn mac_blocks(&self) -> impl Iterator<Item = &MacBlock> {
        self.blocks.iter().filter_map(|b| match b.payload() {
            BlockPayload::Mac(m) => Some(m),
            _                    => None,
        })
    }

    pub fn key_values(&self) -> impl Iterator<Item = &KeyValueBlock> {
        self.blocks.iter().filter_map(|b| match b.payload() {
            BlockPayload::KeyValue(kv) => Some(kv),
            _                          => None,
        })
    }

    pub fn mac_block(&self, interface: u8) -> Option<&MacBlock> {
        self.mac_blocks().find(|m| m.interface == interface)
    }

    pub fn key_value(&self, key: &str) -> Option<&KeyValueBlock> {
        self.key_values().find(|kv| kv.key == key)
    }

    fn push_block(&mut self, payload: BlockPayload) -> Result<()> {
        if !self.is_v3() {
            return Err(EepromError::Unsupported(format!(
                "blocks require API v3, record is v{}",
                self.header.api_version.as_u8()
            )));
        }
        if self.blocks.len() >= MAX_BLOCKS {
            return Err(EepromError::OutOfBounds {
                field: "block count",
                value: self.blocks.len() as u64 + 1,
                max:   MAX_BLOCKS as u64,
            });
        }
        let start = u16::try_from(self.payload_length()).map_err(|_| EepromError::OutOfBounds {
            field: "block area length",
            value: self.payload_length() as u64,
            max:   u16::MAX as u64,
        })?;
        let block = Block::new(payload, start)?;
        debug!("appending {:?} block at {start}, next at {}", block.block_type(), block.next_block());
        self.blocks.push(block);
        Ok(())
    }

    // ── Encoding ─────────────────────────────────────────────────────────────

    pub fn encode(&self) -> Result<Vec<u8>> {
        let header = self.header.to_bytes()?;

        let mut out = Vec::with_capacity(self.header.api_version.prefix_size() + self.payload_length());
        out.extend_from_slice(&header);

        match self.data_header() {
            Some(dh) => {
                dh.write(&mut out)?;
                for block in &self.blocks {
                    block.write(&mut out)?;
                }
            }
            None if !self.blocks.is_empty() => {
                return Err(EepromError::Unsupported(format!(
                    "{} block(s) cannot be stored with API v{}",
                    self.blocks.len(),
                    self.header.api_version.as_u8()
                )));
            }
            // Only the v3 data header carries a sub-version.
            None if self.sub_version != API_V3_SUB_VERSION => {
                return Err(EepromError::Unsupported(format!(
                    "sub-version {} cannot be stored with API v{}",
                    self.sub_version,
                    self.header.api_version.as_u8()
                )));
            }
            None => {}
        }
        debug!("encoded v{} image, {} bytes", self.header.api_version.as_u8(), out.len());
        Ok(out)
    }
}

// ── Two-phase decoding ───────────────────────────────────────────────────────

/// A record whose header (and v3 data header) has been decoded but whose
/// block area has not been read yet.
#[derive(Debug, Clone)]
pub struct PartialRecord {
    record:      EepromRecord,
    data_header: Option<DataHeader>,
}

impl PartialRecord {
    pub fn header(&self) -> &IdHeader {
        &self.record.header
    }

    pub fn data_header(&self) -> Option<&DataHeader> {
        self.data_header.as_ref()
    }

    /// Bytes consumed by phase one (32, or 40 for v3).
    pub fn prefix_size(&self) -> usize {
        self.record.header.api_version.prefix_size()
    }

    /// Bytes phase two needs (0 unless v3).
    pub fn payload_length(&self) -> usize {
        self.data_header.map_or(0, |dh| dh.payload_length as usize)
    }

    /// Walk the block chain in `payload` (exactly the block area, or a
    /// longer buffer whose extra bytes are ignored).
    pub fn finish(self, payload: &[u8]) -> Result<EepromRecord> {
        let mut record = self.record;
        let Some(dh) = self.data_header else {
            return Ok(record);
        };

        let declared = dh.payload_length as usize;
        if payload.len() < declared {
            return Err(EepromError::Truncated { needed: declared, got: payload.len() });
        }
        let area = &payload[..declared];

        let mut cursor = 0usize;
        for _ in 0..dh.block_count {
            let block = Block::decode(&area[cursor..])?;
            cursor += block.len();
            if block.next_block() as usize != cursor {
                return Err(EepromError::ChainMismatch {
                    expected: cursor as u16,
                    found:    block.next_block(),
                });
            }
            record.blocks.push(block);
        }
        if cursor != declared {
            return Err(EepromError::ChainMismatch {
                expected: dh.payload_length,
                found:    cursor as u16,
            });
        }
        record.sub_version = dh.sub_version;
        Ok(record)
    }
}

/// Phase one: decode the header, and for v3 the data header that follows
/// it. `buf` must hold at least 32 bytes (40 for v3).
pub fn decode_header(buf: &[u8]) -> Result<PartialRecord> {
    let header = IdHeader::read(buf)?;
    let data_header = match header.api_version {
        ApiVersion::V3 => {
            let rest = &buf[HEADER_SIZE..];
            if rest.len() < crate::header::DATA_HEADER_SIZE {
                return Err(EepromError::Truncated {
                    needed: header.api_version.prefix_size(),
                    got:    buf.len(),
                });
            }
            Some(DataHeader::read(rest)?)
        }
        _ => None,
    };
    Ok(PartialRecord { record: EepromRecord::new(header), data_header })
}

/// Decode a complete image in one call.
pub fn decode(buf: &[u8]) -> Result<EepromRecord> {
    let partial = decode_header(buf)?;
    let prefix = partial.prefix_size();
    partial.finish(&buf[prefix..])
}

/// Encode `record`; see [`EepromRecord::encode`].
pub fn encode(record: &EepromRecord) -> Result<Vec<u8>> {
    record.encode()
}
