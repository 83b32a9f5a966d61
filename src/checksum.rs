//! CRC-8/SMBUS and the v1 set-bit checksum.

const CRC8_POLYNOMIAL: u8 = 0x07;

/// CRC-8/SMBUS over `data`.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0x00;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// True when `region` ends with a correct CRC-8 of everything before it.
#[inline]
pub fn crc8_verify(region: &[u8]) -> bool {
    crc8(region) == 0
}

/// Number of set bits across `data`.
///
/// Only ever applied to the first 31 bytes of a v1 header, so the count
/// (at most 248) always fits a byte.
pub fn popcount_checksum(data: &[u8]) -> u8 {
    data.iter().map(|b| b.count_ones()).sum::<u32>() as u8
}
