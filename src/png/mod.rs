//! Tools for rewriting PNG chunk streams.
//!
//! * [Portable Network Graphics Specification (Second Edition)][png-spec]
//!
//! [png-spec]: https://www.w3.org/TR/2003/REC-PNG-20031110/
//!
//! A PNG data stream is a fixed 8-byte signature followed by a series of
//! "chunks", each framed as a big-endian `u32` length, a 4-byte ASCII type
//! tag, `length` payload bytes, and a CRC-32 over the type and payload. The
//! stream ends with a zero-length `IEND` chunk.
//!
//! [`rewrite`] streams chunks from a reader to a writer in a single pass. It
//! never buffers the whole stream and never seeks: chunk payloads (image data
//! in particular) can be large, so the loop reuses one scratch buffer that
//! only ever grows. Chunks the rewriter copies through keep their original
//! checksum untouched; only chunks it synthesizes get a fresh checksum from
//! the [`crc32`] engine.

mod chunk;
pub use chunk::*;

pub mod crc32;

mod rewrite;
pub use rewrite::*;

use thiserror::Error;

/// The first eight bytes of a PNG datastream should match these bytes.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// An error from rewriting one PNG stream.
///
/// Both framing variants are fatal for the stream they occur in and nothing
/// else: the rewriter returns on the first violation and performs no
/// resynchronization. The caller decides what to do with the partial sink
/// output (the archive layer discards it and falls back to a verbatim copy).
#[derive(Debug, Error)]
pub enum RewriteError {
  /// The stream doesn't open with [`PNG_SIGNATURE`].
  ///
  /// Carries the bytes actually read, zero-padded if the stream was shorter
  /// than eight bytes.
  #[error("invalid png signature: {0:02x?}")]
  InvalidSignature([u8; 8]),
  /// The stream ended in the middle of a frame element.
  #[error("truncated png stream while reading {0}")]
  TruncatedStream(&'static str),
  /// An underlying read or write failed for a reason other than a short read.
  #[error(transparent)]
  Io(#[from] std::io::Error),
}
