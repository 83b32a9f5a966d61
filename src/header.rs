//! Fixed-size header layouts.
//!
//! # v1 (32 bytes, legacy)
//! ```text
//! 0   api_version          u8   = 1
//! 1   pcb_revision         u8
//! 2   reserved             [u8; 2]
//! 4   kit options + BOM    [u8; 21]  NUL padded
//! 25  reserved             [u8; 6]
//! 31  popcount             u8   set bits over bytes 0..31
//! ```
//!
//! # v2 / v3 (32 bytes)
//! ```text
//! 0   api_version          u8   = 2 | 3
//! 1   pcb_revision         u8
//! 2   sub_revisions        u8   opttree << 4 | pcb_sub_revision
//! 3   component            u8
//! 4   base_article_number  u8
//! 5   kit_number           u8
//! 6   kit_options          [u8; 17]  NUL padded
//! 23  bom_revision         [u8; 2]   NUL padded
//! 25  reserved             [u8; 6]
//! 31  crc8                 u8   CRC-8 over bytes 0..31
//! ```
//!
//! # v3 data header (8 bytes, directly after the v3 header)
//! ```text
//! 0   payload_length       u16 LE
//! 2   block_count          u8
//! 3   sub_version          u8
//! 4   reserved             [u8; 3]
//! 7   crc8                 u8   CRC-8 over bytes 0..7
//! ```
//!
//! Reserved bytes are always written as zero.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use log::{debug, warn};

use crate::checksum::{crc8, crc8_verify, popcount_checksum};
use crate::component::ComponentType;
use crate::error::{ChecksumRegion, EepromError, Result};
use crate::revision::MAX_SUB_REVISION;

pub const HEADER_SIZE:       usize = 32;
pub const DATA_HEADER_SIZE:  usize = 8;
/// Header plus data header: everything a v3 reader needs before it knows
/// the block area length.
pub const V3_PREFIX_SIZE:    usize = HEADER_SIZE + DATA_HEADER_SIZE;
pub const MAX_KIT_OPTIONS:   usize = 17;
pub const BOM_LEN:           usize = 2;
pub const V1_STRING_LEN:     usize = 21;
/// The only product ever shipped with the v1 layout.
pub const V1_ARTICLE_NUMBER: u8    = 57;
/// Block set understood by this build. Bump when block types are added.
pub const API_V3_SUB_VERSION: u8   = 0;

// ── ApiVersion ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApiVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
}

impl TryFrom<u8> for ApiVersion {
    type Error = EepromError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            1 => Ok(ApiVersion::V1),
            2 => Ok(ApiVersion::V2),
            3 => Ok(ApiVersion::V3),
            _ => Err(EepromError::UnknownApiVersion(v)),
        }
    }
}

impl ApiVersion {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Bytes a reader must fetch before the block area (if any).
    pub fn prefix_size(self) -> usize {
        match self {
            ApiVersion::V3 => V3_PREFIX_SIZE,
            _              => HEADER_SIZE,
        }
    }
}

// ── IdHeader ─────────────────────────────────────────────────────────────────

/// Scalar identity fields shared by all layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdHeader {
    pub api_version:         ApiVersion,
    pub pcb_revision:        u8,
    /// Nibble; 0 means no sub-revision.
    pub pcb_sub_revision:    u8,
    /// Nibble.
    pub opttree_revision:    u8,
    pub component:           ComponentType,
    pub base_article_number: u8,
    pub kit_number:          u8,
    pub kit_options:         String,
    pub bom_revision:        String,
}

impl IdHeader {
    /// The packed `opttree << 4 | pcb_sub_revision` byte.
    pub fn sub_revisions(&self) -> Result<u8> {
        check_nibble("pcb sub-revision", self.pcb_sub_revision)?;
        check_nibble("option-tree revision", self.opttree_revision)?;
        Ok((self.opttree_revision << 4) | self.pcb_sub_revision)
    }

    /// Checksum byte this header carries on the wire: the set-bit count for
    /// v1, CRC-8 otherwise.
    pub fn checksum(&self) -> Result<u8> {
        Ok(self.to_bytes()?[HEADER_SIZE - 1])
    }

    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut buf = match self.api_version {
            ApiVersion::V1 => self.pack_v1()?,
            _              => self.pack_v2()?,
        };
        debug_assert_eq!(buf.len(), HEADER_SIZE - 1);
        let checksum = match self.api_version {
            ApiVersion::V1 => popcount_checksum(&buf),
            _              => crc8(&buf),
        };
        buf.push(checksum);

        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&buf);
        Ok(out)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Everything but the checksum byte of a v1 header.
    ///
    /// v1 has no fields for the component, article numbers or sub-revisions;
    /// a decoder fills in the values of the one v1 product, so any other
    /// value is refused here.
    fn pack_v1(&self) -> Result<Vec<u8>> {
        let conflict = if self.component != ComponentType::Pcm {
            Some(format!("{} components", self.component.name()))
        } else if self.base_article_number != V1_ARTICLE_NUMBER {
            Some(format!("article number {}", self.base_article_number))
        } else if self.kit_number != 0 {
            Some(format!("kit number {}", self.kit_number))
        } else if self.pcb_sub_revision != 0 || self.opttree_revision != 0 {
            Some(format!(
                "sub-revisions (pcb {}, option tree {})",
                self.pcb_sub_revision, self.opttree_revision
            ))
        } else if self.bom_revision.len() != BOM_LEN {
            Some(format!("BOM revision {:?}, it must be {BOM_LEN} characters", self.bom_revision))
        } else {
            None
        };
        if let Some(what) = conflict {
            return Err(EepromError::Unsupported(format!("API v1 cannot store {what}")));
        }
        // The BOM is found again by position, so the options may not end in padding.
        check_text("kit options", &self.kit_options)?;

        let full = format!("{}{}", self.kit_options, self.bom_revision);
        let text = padded::<V1_STRING_LEN>("kit options + BOM revision", &full)?;

        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.write_u8(ApiVersion::V1.as_u8())?;
        buf.write_u8(self.pcb_revision)?;
        buf.write_all(&[0u8; 2])?;
        buf.write_all(&text)?;
        buf.write_all(&[0u8; 6])?;
        Ok(buf)
    }

    /// Everything but the checksum byte of a v2/v3 header.
    fn pack_v2(&self) -> Result<Vec<u8>> {
        let kit_options = padded::<MAX_KIT_OPTIONS>("kit options", &self.kit_options)?;
        let bom = padded::<BOM_LEN>("BOM revision", &self.bom_revision)?;

        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.write_u8(self.api_version.as_u8())?;
        buf.write_u8(self.pcb_revision)?;
        buf.write_u8(self.sub_revisions()?)?;
        buf.write_u8(self.component.code())?;
        buf.write_u8(self.base_article_number)?;
        buf.write_u8(self.kit_number)?;
        buf.write_all(&kit_options)?;
        buf.write_all(&bom)?;
        buf.write_all(&[0u8; 6])?;
        Ok(buf)
    }

    /// Decode the first [`HEADER_SIZE`] bytes of `buf`. The checksum is
    /// verified before any field is interpreted.
    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(EepromError::Truncated { needed: HEADER_SIZE, got: buf.len() });
        }
        let head = &buf[..HEADER_SIZE];
        let stored = head[HEADER_SIZE - 1];

        if head[0] == ApiVersion::V1.as_u8() {
            let expected = popcount_checksum(&head[..HEADER_SIZE - 1]);
            if expected != stored {
                return Err(EepromError::ChecksumMismatch {
                    region: ChecksumRegion::Popcount,
                    expected,
                    found: stored,
                });
            }
            return Self::unpack_v1(head);
        }

        if !crc8_verify(head) {
            return Err(EepromError::ChecksumMismatch {
                region:   ChecksumRegion::Header,
                expected: crc8(&head[..HEADER_SIZE - 1]),
                found:    stored,
            });
        }
        ApiVersion::try_from(head[0])?;
        Self::unpack_v2(head)
    }

    fn unpack_v1(head: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(head);
        reader.read_u8()?;
        let pcb_revision = reader.read_u8()?;
        let mut reserved = [0u8; 2];
        reader.read_exact(&mut reserved)?;
        let mut text = [0u8; V1_STRING_LEN];
        reader.read_exact(&mut text)?;
        if reserved.iter().any(|&b| b != 0) {
            warn!("v1 reserved bytes are not zero: {}", hex::encode(reserved));
        }

        let full = unpadded("kit options + BOM revision", &text)?;
        let split = full.len().saturating_sub(BOM_LEN);
        let (kit_options, bom_revision) = full.split_at(split);
        debug!("decoded v1 header: pcb {pcb_revision}, options {kit_options:?}, bom {bom_revision:?}");

        Ok(Self {
            api_version:         ApiVersion::V1,
            pcb_revision,
            pcb_sub_revision:    0,
            opttree_revision:    0,
            component:           ComponentType::Pcm,
            base_article_number: V1_ARTICLE_NUMBER,
            kit_number:          0,
            kit_options:         kit_options.to_string(),
            bom_revision:        bom_revision.to_string(),
        })
    }

    fn unpack_v2(head: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(head);
        let api_version = ApiVersion::try_from(reader.read_u8()?)?;
        let pcb_revision = reader.read_u8()?;
        let sub_revisions = reader.read_u8()?;
        let component = ComponentType::from_code(reader.read_u8()?)?;
        let base_article_number = reader.read_u8()?;
        let kit_number = reader.read_u8()?;
        let mut kit_options = [0u8; MAX_KIT_OPTIONS];
        reader.read_exact(&mut kit_options)?;
        let mut bom = [0u8; BOM_LEN];
        reader.read_exact(&mut bom)?;
        let mut reserved = [0u8; 6];
        reader.read_exact(&mut reserved)?;
        if reserved.iter().any(|&b| b != 0) {
            warn!("header reserved bytes are not zero: {}", hex::encode(reserved));
        }

        let header = Self {
            api_version,
            pcb_revision,
            pcb_sub_revision: sub_revisions & 0x0F,
            opttree_revision: sub_revisions >> 4,
            component,
            base_article_number,
            kit_number,
            kit_options:      unpadded("kit options", &kit_options)?,
            bom_revision:     unpadded("BOM revision", &bom)?,
        };
        debug!(
            "decoded v{} header: {} base {} kit {}",
            api_version.as_u8(),
            component.name(),
            base_article_number,
            kit_number
        );
        Ok(header)
    }
}

// ── DataHeader ───────────────────────────────────────────────────────────────

/// The v3 data header announcing the block area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub payload_length: u16,
    pub block_count:    u8,
    pub sub_version:    u8,
}

impl DataHeader {
    pub fn checksum(&self) -> u8 {
        self.to_bytes()[DATA_HEADER_SIZE - 1]
    }

    pub fn to_bytes(&self) -> [u8; DATA_HEADER_SIZE] {
        let mut out = [0u8; DATA_HEADER_SIZE];
        out[..2].copy_from_slice(&self.payload_length.to_le_bytes());
        out[2] = self.block_count;
        out[3] = self.sub_version;
        out[DATA_HEADER_SIZE - 1] = crc8(&out[..DATA_HEADER_SIZE - 1]);
        out
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Decode the first [`DATA_HEADER_SIZE`] bytes of `buf`.
    ///
    /// The reserved bytes are written as zero but not required to be zero on
    /// read: the CRC covers them, so a non-zero value is an image from a newer
    /// writer rather than corruption. It is logged with `warn!` and dropped,
    /// as is a `sub_version` newer than [`API_V3_SUB_VERSION`].
    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < DATA_HEADER_SIZE {
            return Err(EepromError::Truncated { needed: DATA_HEADER_SIZE, got: buf.len() });
        }
        let raw = &buf[..DATA_HEADER_SIZE];
        if !crc8_verify(raw) {
            return Err(EepromError::ChecksumMismatch {
                region:   ChecksumRegion::DataHeader,
                expected: crc8(&raw[..DATA_HEADER_SIZE - 1]),
                found:    raw[DATA_HEADER_SIZE - 1],
            });
        }

        let mut reader = Cursor::new(raw);
        let payload_length = reader.read_u16::<LittleEndian>()?;
        let block_count = reader.read_u8()?;
        let sub_version = reader.read_u8()?;
        let mut reserved = [0u8; 3];
        reader.read_exact(&mut reserved)?;
        if reserved != [0u8; 3] {
            warn!("data header reserved bytes are not zero: {}", hex::encode(reserved));
        }
        if sub_version > API_V3_SUB_VERSION {
            warn!("data header sub-version {sub_version} is newer than {API_V3_SUB_VERSION}");
        }
        debug!("decoded data header: {payload_length} bytes in {block_count} block(s)");

        Ok(Self { payload_length, block_count, sub_version })
    }
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn check_nibble(field: &'static str, value: u8) -> Result<()> {
    if value > MAX_SUB_REVISION {
        return Err(EepromError::OutOfBounds {
            field,
            value: value as u64,
            max:   MAX_SUB_REVISION as u64,
        });
    }
    Ok(())
}

/// Text fields are ASCII. A trailing NUL would be read back as padding, so
/// only interior NULs are allowed.
fn check_text(field: &'static str, text: &str) -> Result<()> {
    if !text.is_ascii() || text.ends_with('\0') {
        return Err(EepromError::InvalidText(field));
    }
    Ok(())
}

/// ASCII text NUL padded to exactly `N` bytes.
fn padded<const N: usize>(field: &'static str, text: &str) -> Result<[u8; N]> {
    check_text(field, text)?;
    if text.len() > N {
        return Err(EepromError::FieldTooLong { field, len: text.len(), max: N });
    }
    let mut out = [0u8; N];
    out[..text.len()].copy_from_slice(text.as_bytes());
    Ok(out)
}

/// Inverse of [`padded`]: trailing NULs are padding, interior NULs are kept.
fn unpadded(field: &'static str, raw: &[u8]) -> Result<String> {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let text = &raw[..end];
    if !text.is_ascii() {
        return Err(EepromError::InvalidText(field));
    }
    Ok(String::from_utf8_lossy(text).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_header(api_version: ApiVersion) -> IdHeader {
        IdHeader {
            api_version,
            pcb_revision:        3,
            pcb_sub_revision:    1,
            opttree_revision:    1,
            component:           ComponentType::Pcm,
            base_article_number: 66,
            kit_number:          0,
            kit_options:         "3022210I".to_string(),
            bom_revision:        "A0".to_string(),
        }
    }

    fn v1_header() -> IdHeader {
        IdHeader {
            api_version:         ApiVersion::V1,
            pcb_revision:        2,
            pcb_sub_revision:    0,
            opttree_revision:    0,
            component:           ComponentType::Pcm,
            base_article_number: V1_ARTICLE_NUMBER,
            kit_number:          0,
            kit_options:         "1234567".to_string(),
            bom_revision:        "A0".to_string(),
        }
    }

    const V2_FIXTURE: &str =
        "02031100420033303232323130490000000000000000004130000000000000af";

    #[test]
    fn v2_layout_is_byte_exact() {
        let bytes = module_header(ApiVersion::V2).to_bytes().unwrap();
        assert_eq!(hex::encode(bytes), V2_FIXTURE);
    }

    #[test]
    fn v2_decodes_fixture() {
        let raw = hex::decode(V2_FIXTURE).unwrap();
        let header = IdHeader::read(&raw).unwrap();
        assert_eq!(header, module_header(ApiVersion::V2));
        assert_eq!(header.checksum().unwrap(), 0xaf);
        assert_eq!(header.sub_revisions().unwrap(), 0x11);
    }

    #[test]
    fn v1_layout_uses_popcount() {
        let header = v1_header();
        let bytes = header.to_bytes().unwrap();
        assert_eq!(
            hex::encode(bytes),
            "0102000031323334353637413000000000000000000000000000000000000020"
        );
        assert_eq!(IdHeader::read(&bytes).unwrap(), header);
    }

    #[test]
    fn v1_popcount_mismatch() {
        let mut bytes = v1_header().to_bytes().unwrap();
        bytes[1] ^= 0x01;
        assert!(matches!(
            IdHeader::read(&bytes),
            Err(EepromError::ChecksumMismatch { region: ChecksumRegion::Popcount, .. })
        ));
    }

    #[test]
    fn v1_rejects_kits() {
        let mut header = v1_header();
        header.component = ComponentType::Ksp;
        assert!(matches!(header.to_bytes(), Err(EepromError::Unsupported(_))));
    }

    #[test]
    fn v1_refuses_fields_it_cannot_store() {
        let edits: [fn(&mut IdHeader); 7] = [
            |h| h.component = ComponentType::PflGPt,
            |h| h.component = ComponentType::PcmKsp,
            |h| h.base_article_number = 66,
            |h| h.kit_number = 1,
            |h| h.pcb_sub_revision = 1,
            |h| h.opttree_revision = 1,
            |h| h.bom_revision = "A".to_string(),
        ];
        for (i, edit) in edits.iter().enumerate() {
            let mut header = v1_header();
            edit(&mut header);
            assert!(matches!(header.to_bytes(), Err(EepromError::Unsupported(_))), "edit {i}");
        }

        // The BOM is always the last two characters of the text field.
        let mut header = v1_header();
        header.bom_revision = "7A".to_string();
        header.kit_options = "123456".to_string();
        assert_eq!(IdHeader::read(&header.to_bytes().unwrap()).unwrap(), header);
    }

    #[test]
    fn trailing_nul_in_text_is_rejected() {
        let mut header = module_header(ApiVersion::V2);
        header.kit_options = "30\0".to_string();
        assert!(matches!(header.to_bytes(), Err(EepromError::InvalidText("kit options"))));

        let mut header = module_header(ApiVersion::V2);
        header.bom_revision = "A\0".to_string();
        assert!(matches!(header.to_bytes(), Err(EepromError::InvalidText("BOM revision"))));

        let mut header = v1_header();
        header.kit_options = "30\0".to_string();
        assert!(matches!(header.to_bytes(), Err(EepromError::InvalidText("kit options"))));

        // Interior NULs are option values and survive.
        let mut header = module_header(ApiVersion::V2);
        header.kit_options = "3\00".to_string();
        assert_eq!(IdHeader::read(&header.to_bytes().unwrap()).unwrap(), header);
    }

    #[test]
    fn crc_is_checked_before_version() {
        let mut bytes = module_header(ApiVersion::V2).to_bytes().unwrap();
        bytes[0] = 7;
        assert!(matches!(
            IdHeader::read(&bytes),
            Err(EepromError::ChecksumMismatch { region: ChecksumRegion::Header, .. })
        ));

        // A well-formed buffer with an unknown version byte.
        bytes[HEADER_SIZE - 1] = crc8(&bytes[..HEADER_SIZE - 1]);
        assert!(matches!(IdHeader::read(&bytes), Err(EepromError::UnknownApiVersion(7))));
    }

    #[test]
    fn unknown_component_code() {
        let mut bytes = module_header(ApiVersion::V2).to_bytes().unwrap();
        bytes[3] = 0x42;
        bytes[HEADER_SIZE - 1] = crc8(&bytes[..HEADER_SIZE - 1]);
        assert!(matches!(IdHeader::read(&bytes), Err(EepromError::UnknownComponentType(0x42))));
    }

    #[test]
    fn field_widths_are_enforced() {
        let mut header = module_header(ApiVersion::V2);
        header.kit_options = "X".repeat(MAX_KIT_OPTIONS + 1);
        assert!(matches!(
            header.to_bytes(),
            Err(EepromError::FieldTooLong { max: MAX_KIT_OPTIONS, .. })
        ));

        let mut header = module_header(ApiVersion::V2);
        header.bom_revision = "A01".to_string();
        assert!(matches!(header.to_bytes(), Err(EepromError::FieldTooLong { max: BOM_LEN, .. })));

        let mut header = module_header(ApiVersion::V2);
        header.opttree_revision = 16;
        assert!(matches!(header.to_bytes(), Err(EepromError::OutOfBounds { .. })));

        let mut header = module_header(ApiVersion::V2);
        header.kit_options = "ü".to_string();
        assert!(matches!(header.to_bytes(), Err(EepromError::InvalidText(_))));
    }

    #[test]
    fn short_buffer_is_truncated() {
        assert!(matches!(
            IdHeader::read(&[2u8; 10]),
            Err(EepromError::Truncated { needed: HEADER_SIZE, got: 10 })
        ));
    }

    #[test]
    fn data_header_layout() {
        let dh = DataHeader { payload_length: 12, block_count: 1, sub_version: 0 };
        assert_eq!(hex::encode(dh.to_bytes()), "0c000100000000fd");
        assert_eq!(dh.checksum(), 0xfd);
        assert_eq!(DataHeader::read(&dh.to_bytes()).unwrap(), dh);
    }

    #[test]
    fn data_header_tolerates_reserved_bytes() {
        let mut raw = DataHeader { payload_length: 12, block_count: 1, sub_version: 1 }.to_bytes();
        raw[4] = 0x5a;
        raw[DATA_HEADER_SIZE - 1] = crc8(&raw[..DATA_HEADER_SIZE - 1]);
        let dh = DataHeader::read(&raw).unwrap();
        assert_eq!(dh, DataHeader { payload_length: 12, block_count: 1, sub_version: 1 });
    }

    #[test]
    fn data_header_crc_mismatch() {
        let mut raw = DataHeader { payload_length: 12, block_count: 1, sub_version: 0 }.to_bytes();
        raw[0] = 13;
        assert!(matches!(
            DataHeader::read(&raw),
            Err(EepromError::ChecksumMismatch { region: ChecksumRegion::DataHeader, .. })
        ));
    }
}
