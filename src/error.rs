//! Error kinds shared by every layer of the codec.
//!
//! The variants fall into three groups a caller usually wants to tell
//! apart:
//!
//! - **corrupt data**: [`EepromError::ChecksumMismatch`],
//!   [`EepromError::Truncated`], [`EepromError::ChainMismatch`],
//!   [`EepromError::UnknownBlockType`], [`EepromError::UnknownComponentType`]
//! - **unsupported layout**: [`EepromError::UnknownApiVersion`],
//!   [`EepromError::Unsupported`]
//! - **caller misuse**: [`EepromError::MalformedRevision`],
//!   [`EepromError::FieldTooLong`], [`EepromError::DuplicateBlock`],
//!   [`EepromError::OutOfBounds`], [`EepromError::InvalidMac`],
//!   [`EepromError::InvalidProduct`]

use std::fmt;
use std::io;
use thiserror::Error;

/// Byte range a failed checksum was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumRegion {
    /// CRC-8 over the 32-byte v2/v3 header.
    Header,
    /// Set-bit count over the 32-byte v1 header.
    Popcount,
    /// CRC-8 over the 8-byte v3 data header.
    DataHeader,
    /// CRC-8 over a 4-byte block header.
    BlockHeader,
    /// CRC-8 over a block payload and its trailer.
    BlockPayload,
}

impl fmt::Display for ChecksumRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChecksumRegion::Header       => "header",
            ChecksumRegion::Popcount     => "v1 popcount",
            ChecksumRegion::DataHeader   => "data header",
            ChecksumRegion::BlockHeader  => "block header",
            ChecksumRegion::BlockPayload => "block payload",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum EepromError {
    #[error("Malformed revision {0:?}: sub-revision must be a letter between 'a' and 'o'")]
    MalformedRevision(String),

    #[error("Checksum mismatch in {region}: expected 0x{expected:02x}, found 0x{found:02x}")]
    ChecksumMismatch { region: ChecksumRegion, expected: u8, found: u8 },

    #[error("Unknown API version: {0}")]
    UnknownApiVersion(u8),

    #[error("Unknown block type: {0}")]
    UnknownBlockType(u8),

    #[error("Unknown component type: 0x{0:02x}")]
    UnknownComponentType(u8),

    #[error("{field} is {len} bytes long, maximum is {max}")]
    FieldTooLong { field: &'static str, len: usize, max: usize },

    #[error("Duplicate block: {0}")]
    DuplicateBlock(String),

    #[error("{field} out of bounds: {value} (maximum {max})")]
    OutOfBounds { field: &'static str, value: u64, max: u64 },

    #[error("Buffer truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("Block chain broken: expected offset {expected}, found {found}")]
    ChainMismatch { expected: u16, found: u16 },

    #[error("MAC {0:?} is not in XX:XX:XX:XX:XX:XX format")]
    InvalidMac(String),

    #[error("{0} is not valid text for its field")]
    InvalidText(&'static str),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    #[error("Image is {size} bytes, device holds at most {max}")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, EepromError>;

impl EepromError {
    /// True for errors caused by damaged or foreign bytes rather than by
    /// the caller.
    pub fn is_corrupt_data(&self) -> bool {
        matches!(
            self,
            EepromError::ChecksumMismatch { .. }
                | EepromError::Truncated { .. }
                | EepromError::ChainMismatch { .. }
                | EepromError::UnknownBlockType(_)
                | EepromError::UnknownComponentType(_)
        )
    }
}
