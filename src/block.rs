//! v3 extension blocks.
//!
//! Every block is self-describing:
//!
//! ```text
//! 0   block_type     u8
//! 1   next_block     u16 LE   offset of the following block, relative to
//!                             the start of the block area
//! 3   header_crc     u8       CRC-8 over bytes 0..3
//! 4   payload        [u8]     type specific
//! n-1 payload_crc    u8       CRC-8 over the payload
//! ```
//!
//! The header CRC leaves a zero residue, so the CRC over the whole block
//! (header, payload and trailer) is zero exactly when both checksums hold.
//!
//! Payloads:
//! - `MAC` (type 0): `interface u8 | mac [u8; 6]`, 12 bytes per block.
//! - `KEY_VALUE` (type 1): `key_len u8 | value_len u8 | key | value`.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::{Cursor, Write};
use log::debug;

use crate::checksum::{crc8, crc8_verify};
use crate::error::{ChecksumRegion, EepromError, Result};

pub const BLOCK_HEADER_SIZE:  usize = 4;
pub const BLOCK_TRAILER_SIZE: usize = 1;
pub const MAC_PAYLOAD_SIZE:   usize = 7;
pub const MAC_BLOCK_SIZE:     usize = BLOCK_HEADER_SIZE + MAC_PAYLOAD_SIZE + BLOCK_TRAILER_SIZE;
/// Key and value are each prefixed by a one-byte length.
pub const MAX_KEY_VALUE_LEN:  usize = u8::MAX as usize;
/// Length bytes of a key/value payload before the key itself.
const KEY_VALUE_PREFIX_SIZE:  usize = 2;

// ── BlockType ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    Mac      = 0,
    KeyValue = 1,
}

impl TryFrom<u8> for BlockType {
    type Error = EepromError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(BlockType::Mac),
            1 => Ok(BlockType::KeyValue),
            _ => Err(EepromError::UnknownBlockType(v)),
        }
    }
}

// ── Payloads ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacBlock {
    pub interface: u8,
    pub mac:       [u8; 6],
}

impl MacBlock {
    /// Parse `interface` and a textual MAC (`aa:bb:cc:dd:ee:ff`,
    /// `aa-bb-…` or `aabbccddeeff`, any case).
    pub fn new(interface: u16, mac: &str) -> Result<Self> {
        let interface = u8::try_from(interface).map_err(|_| EepromError::OutOfBounds {
            field: "ethernet interface",
            value: interface as u64,
            max:   u8::MAX as u64,
        })?;
        Ok(Self { interface, mac: parse_mac(mac)? })
    }

    /// Lowercase, colon separated.
    pub fn mac_string(&self) -> String {
        self.mac.iter().map(|b| hex::encode([*b])).collect::<Vec<_>>().join(":")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueBlock {
    pub key:   String,
    pub value: String,
}

impl KeyValueBlock {
    pub fn new(key: &str, value: &str) -> Result<Self> {
        for (field, text) in [("key", key), ("value", value)] {
            if text.len() > MAX_KEY_VALUE_LEN {
                return Err(EepromError::FieldTooLong {
                    field,
                    len: text.len(),
                    max: MAX_KEY_VALUE_LEN,
                });
            }
        }
        Ok(Self { key: key.to_string(), value: value.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockPayload {
    Mac(MacBlock),
    KeyValue(KeyValueBlock),
}

impl BlockPayload {
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockPayload::Mac(_)      => BlockType::Mac,
            BlockPayload::KeyValue(_) => BlockType::KeyValue,
        }
    }

    /// Payload bytes between header and trailer.
    pub fn encoded_len(&self) -> usize {
        match self {
            BlockPayload::Mac(_) => MAC_PAYLOAD_SIZE,
            BlockPayload::KeyValue(kv) => KEY_VALUE_PREFIX_SIZE + kv.key.len() + kv.value.len(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        match self {
            BlockPayload::Mac(m) => {
                buf.push(m.interface);
                buf.extend_from_slice(&m.mac);
            }
            BlockPayload::KeyValue(kv) => {
                // Both lengths are bounded by `KeyValueBlock::new`.
                buf.push(kv.key.len() as u8);
                buf.push(kv.value.len() as u8);
                buf.extend_from_slice(kv.key.as_bytes());
                buf.extend_from_slice(kv.value.as_bytes());
            }
        }
        buf
    }
}

// ── Block ────────────────────────────────────────────────────────────────────

/// One immutable, positioned block of the v3 chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    next_block: u16,
    payload:    BlockPayload,
}

impl Block {
    /// Place `payload` at offset `start` of the block area. The block's
    /// length, and with it `next_block`, is fixed here before any checksum
    /// is taken.
    pub fn new(payload: BlockPayload, start: u16) -> Result<Self> {
        let len = BLOCK_HEADER_SIZE + payload.encoded_len() + BLOCK_TRAILER_SIZE;
        let end = start as usize + len;
        let next_block = u16::try_from(end).map_err(|_| EepromError::OutOfBounds {
            field: "block area length",
            value: end as u64,
            max:   u16::MAX as u64,
        })?;
        Ok(Self { next_block, payload })
    }

    pub fn payload(&self) -> &BlockPayload {
        &self.payload
    }

    pub fn block_type(&self) -> BlockType {
        self.payload.block_type()
    }

    pub fn next_block(&self) -> u16 {
        self.next_block
    }

    /// Total on-wire length: header, payload and trailer.
    pub fn len(&self) -> usize {
        BLOCK_HEADER_SIZE + self.payload.encoded_len() + BLOCK_TRAILER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn header_checksum(&self) -> u8 {
        self.to_bytes()[BLOCK_HEADER_SIZE - 1]
    }

    pub fn payload_checksum(&self) -> u8 {
        self.to_bytes()[self.len() - 1]
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let [next_lo, next_hi] = self.next_block.to_le_bytes();
        let mut header = [self.block_type() as u8, next_lo, next_hi, 0];
        header[BLOCK_HEADER_SIZE - 1] = crc8(&header[..BLOCK_HEADER_SIZE - 1]);

        let payload = self.payload.to_bytes();
        let mut buf = Vec::with_capacity(self.len());
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&payload);
        buf.push(crc8(&payload));
        buf
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Decode the block at the start of `buf`. The cursor advance is
    /// [`Block::len`] of the result.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        // 1. Header peek.
        if buf.len() < BLOCK_HEADER_SIZE {
            return Err(EepromError::Truncated { needed: BLOCK_HEADER_SIZE, got: buf.len() });
        }
        let header = &buf[..BLOCK_HEADER_SIZE];

        // 2. Header CRC.
        if !crc8_verify(header) {
            return Err(EepromError::ChecksumMismatch {
                region:   ChecksumRegion::BlockHeader,
                expected: crc8(&header[..BLOCK_HEADER_SIZE - 1]),
                found:    header[BLOCK_HEADER_SIZE - 1],
            });
        }
        let mut reader = Cursor::new(header);
        let raw_type = reader.read_u8()?;
        let next_block = reader.read_u16::<LittleEndian>()?;

        // 3. Dispatch; 4. type-specific length discovery.
        let block_type = BlockType::try_from(raw_type)?;
        let payload_len = match block_type {
            BlockType::Mac => MAC_PAYLOAD_SIZE,
            BlockType::KeyValue => {
                let lens = take(buf, BLOCK_HEADER_SIZE, KEY_VALUE_PREFIX_SIZE)?;
                KEY_VALUE_PREFIX_SIZE + lens[0] as usize + lens[1] as usize
            }
        };
        let total = BLOCK_HEADER_SIZE + payload_len + BLOCK_TRAILER_SIZE;
        let block = take(buf, 0, total)?;

        // 5. Trailer CRC over the complete block.
        if !crc8_verify(block) {
            let payload = &block[BLOCK_HEADER_SIZE..total - 1];
            return Err(EepromError::ChecksumMismatch {
                region:   ChecksumRegion::BlockPayload,
                expected: crc8(payload),
                found:    block[total - 1],
            });
        }

        let payload = &block[BLOCK_HEADER_SIZE..total - 1];
        let payload = match block_type {
            BlockType::Mac => {
                let mut mac = [0u8; 6];
                mac.copy_from_slice(&payload[1..]);
                BlockPayload::Mac(MacBlock { interface: payload[0], mac })
            }
            BlockType::KeyValue => {
                let key_len = payload[0] as usize;
                let key_end = KEY_VALUE_PREFIX_SIZE + key_len;
                let key = std::str::from_utf8(&payload[KEY_VALUE_PREFIX_SIZE..key_end])
                    .map_err(|_| EepromError::InvalidText("key"))?;
                let value = std::str::from_utf8(&payload[key_end..])
                    .map_err(|_| EepromError::InvalidText("value"))?;
                BlockPayload::KeyValue(KeyValueBlock {
                    key:   key.to_string(),
                    value: value.to_string(),
                })
            }
        };
        debug!("decoded {block_type:?} block, {total} bytes, next at {next_block}");

        Ok(Self { next_block, payload })
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self.payload {
            BlockPayload::Mac(_)      => "MAC Address block",
            BlockPayload::KeyValue(_) => "Key Value block",
        };
        writeln!(f, "{title}")?;
        writeln!(f, "{}", "*".repeat(title.len()))?;
        match &self.payload {
            BlockPayload::Mac(m) => {
                writeln!(f, "{:<16}:  {}", "Interface", m.interface)?;
                writeln!(f, "{:<16}:  {}", "MAC", m.mac_string())?;
            }
            BlockPayload::KeyValue(kv) => {
                writeln!(f, "{:<16}:  {}", "Key", kv.key)?;
                writeln!(f, "{:<16}:  {}", "Value", kv.value)?;
            }
        }
        write!(f, "{:<16}:  0x{:x}", "CRC-Checksum", self.payload_checksum())
    }
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn take(buf: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    buf.get(offset..offset + len)
        .ok_or(EepromError::Truncated { needed: offset + len, got: buf.len() })
}

fn parse_mac(text: &str) -> Result<[u8; 6]> {
    let invalid = || EepromError::InvalidMac(text.to_string());
    let lower = text.to_ascii_lowercase();

    let digits: String = match lower.len() {
        12 => lower,
        17 => {
            let sep = lower.as_bytes()[2];
            if sep != b':' && sep != b'-' {
                return Err(invalid());
            }
            let groups: Vec<&str> = lower.split(sep as char).collect();
            if groups.len() != 6 || groups.iter().any(|g| g.len() != 2) {
                return Err(invalid());
            }
            groups.concat()
        }
        _ => return Err(invalid()),
    };

    let mut mac = [0u8; 6];
    hex::decode_to_slice(&digits, &mut mac).map_err(|_| invalid())?;
    Ok(mac)
}
