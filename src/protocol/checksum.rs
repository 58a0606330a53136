//! CRC16-CCITT frame checksum.
//!
//! Polynomial `0x1021`, MSB-first, seeded with `0xFFFF`, result inverted.
//! The lookup table is generated at compile time and matches the table
//! baked into the device firmware byte for byte.
//!
//! The checksum of a frame covers `[sequence, length, payload…]`, i.e.
//! every byte after the type and control bytes, and is transmitted
//! little-endian after the payload.

const POLY: u16 = 0x1021;

const CRC_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the BluFi checksum over `data`.
pub fn checksum(data: &[u8]) -> u16 {
    let crc = data.iter().fold(0xFFFF_u16, |crc, &b| {
        (crc << 8) ^ CRC_TABLE[usize::from((crc >> 8) as u8 ^ b)]
    });
    !crc
}

// ── Tests ────────────────────────────────────────────────────
