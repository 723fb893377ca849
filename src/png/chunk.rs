use core::fmt::{Debug, Write as FmtWrite};
use std::io::{self, Write};

use chrono::{Datelike, NaiveDateTime, Timelike};

use super::crc32;

/// A four byte PNG chunk type tag.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PngChunkTy(pub [u8; 4]);
#[allow(nonstandard_style)]
impl PngChunkTy {
  pub const tEXt: Self = Self(*b"tEXt");
  pub const tIME: Self = Self(*b"tIME");
  pub const IEND: Self = Self(*b"IEND");
}
impl Debug for PngChunkTy {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_char(self.0[0] as char)?;
    f.write_char(self.0[1] as char)?;
    f.write_char(self.0[2] as char)?;
    f.write_char(self.0[3] as char)?;
    Ok(())
  }
}

/// Reduces a string to the printable ASCII subset PNG text chunks carry.
///
/// Every byte outside `0x20..=0x7E` becomes `?`, the same substitution an
/// ASCII encoding pass makes for characters it can't represent. This also
/// keeps NUL out of keys and values, so a synthesized payload can never gain
/// a stray separator.
#[must_use]
pub fn to_png_ascii(s: &str) -> Vec<u8> {
  s.bytes().map(|b| if (0x20..=0x7E).contains(&b) { b } else { b'?' }).collect()
}

/// Writes one complete `tEXt` chunk, checksum included.
///
/// The payload is `key ‖ 0x00 ‖ value` with both sides passed through
/// [`to_png_ascii`]. The checksum covers the type tag and the payload, in
/// that order.
pub fn write_text_chunk<W: Write>(sink: &mut W, key: &str, value: &str) -> io::Result<()> {
  let key = to_png_ascii(key);
  let value = to_png_ascii(value);

  let data_len = (key.len() + 1 + value.len()) as u32;
  sink.write_all(&data_len.to_be_bytes())?;
  sink.write_all(&PngChunkTy::tEXt.0)?;
  sink.write_all(&key)?;
  sink.write_all(&[0])?;
  sink.write_all(&value)?;

  let mut crc = crc32::update(crc32::CRC_SEED, &PngChunkTy::tEXt.0);
  crc = crc32::update(crc, &key);
  crc = crc32::update_byte(crc, 0);
  crc = crc32::update(crc, &value);
  sink.write_all(&crc32::finalize(crc).to_be_bytes())?;

  Ok(())
}

/// Writes one complete `tIME` chunk, checksum included.
///
/// The fixed 7-byte payload is the year as a big-endian `u16` followed by
/// month, day, hour, minute, and second as single bytes (1-based month and
/// day, 24-hour clock).
pub fn write_time_chunk<W: Write>(sink: &mut W, dt: &NaiveDateTime) -> io::Result<()> {
  let year = dt.year();
  let payload: [u8; 7] = [
    (year >> 8) as u8,
    year as u8,
    dt.month() as u8,
    dt.day() as u8,
    dt.hour() as u8,
    dt.minute() as u8,
    dt.second() as u8,
  ];

  sink.write_all(&(payload.len() as u32).to_be_bytes())?;
  sink.write_all(&PngChunkTy::tIME.0)?;
  sink.write_all(&payload)?;

  let crc = crc32::update(crc32::update(crc32::CRC_SEED, &PngChunkTy::tIME.0), &payload);
  sink.write_all(&crc32::finalize(crc).to_be_bytes())?;

  Ok(())
}
