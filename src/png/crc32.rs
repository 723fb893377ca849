//! The CRC-32 (ISO-HDLC) checksum engine used for PNG chunk integrity.
//!
//! Reflected form, generator polynomial `0xEDB88320`. A running checksum
//! starts at [`CRC_SEED`], bytes are folded in with [`update`] or
//! [`update_byte`] in any split, and [`finalize`] is applied exactly once at
//! the end to get the on-wire value.

/// Starting value for a running checksum.
pub const CRC_SEED: u32 = u32::MAX;

const CRC_TABLE: [u32; 256] = make_crc_table();

const fn make_crc_table() -> [u32; 256] {
  let mut out = [0; 256];
  let mut n = 0;
  while n < 256 {
    let mut c = n as u32;
    let mut k = 0;
    while k < 8 {
      if (c & 1) != 0 {
        c = 0xEDB8_8320_u32 ^ (c >> 1);
      } else {
        c = c >> 1;
      }
      //
      k += 1;
    }
    out[n] = c;
    //
    n += 1;
  }
  out
}

/// Folds one byte into a running checksum.
#[inline]
#[must_use]
pub const fn update_byte(crc: u32, byte: u8) -> u32 {
  CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
}

/// Folds a buffer of bytes into a running checksum.
///
/// Feeding a message in pieces gives the same result as one call over the
/// concatenation.
#[inline]
#[must_use]
pub fn update(mut crc: u32, bytes: &[u8]) -> u32 {
  for byte in bytes.iter().copied() {
    crc = update_byte(crc, byte);
  }
  crc
}

/// The final xor, applied exactly once after all bytes are folded in.
#[inline]
#[must_use]
pub const fn finalize(crc: u32) -> u32 {
  crc ^ u32::MAX
}

/// One-shot checksum of a complete buffer.
#[inline]
#[must_use]
pub fn compute(bytes: &[u8]) -> u32 {
  finalize(update(CRC_SEED, bytes))
}
