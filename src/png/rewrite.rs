use std::collections::HashSet;
use std::io::{self, Read, Write};

use chrono::NaiveDateTime;
use log::debug;

use super::{write_text_chunk, write_time_chunk, PngChunkTy, RewriteError, PNG_SIGNATURE};

/// Starting scratch capacity. Matches a common payload size for image data
/// chunks so most streams never reallocate.
const INITIAL_SCRATCH: usize = 80 * 1024;

/// Streams a PNG from `source` to `sink`, stamping metadata chunks in.
///
/// The stream is copied in a single pass. Immediately before the terminating
/// `IEND` chunk the rewriter emits one `tEXt` chunk per `(key, value)` pair in
/// `metadata` (in order) and one `tIME` chunk built from `timestamp`, with
/// two suppression rules:
///
/// * a pair whose key already appeared in a `tEXt` chunk earlier in the
///   stream is skipped, never duplicated;
/// * the `tIME` chunk is only emitted when the source stream has none.
///
/// Every chunk read from `source` is written through verbatim, original
/// checksum included. Checksums are computed only for the synthesized chunks.
///
/// Keys and values are reduced to printable ASCII on the way out, see
/// [`to_png_ascii`](super::to_png_ascii).
///
/// On error the sink is left with whatever prefix was already written; the
/// caller is expected to discard it.
pub fn rewrite<R: Read, W: Write>(
  source: &mut R, sink: &mut W, metadata: &[(String, String)], timestamp: NaiveDateTime,
) -> Result<(), RewriteError> {
  let mut signature = [0_u8; 8];
  let got = read_some(source, &mut signature)?;
  if got < signature.len() || signature != PNG_SIGNATURE {
    return Err(RewriteError::InvalidSignature(signature));
  }
  sink.write_all(&signature)?;

  let mut scratch = vec![0_u8; INITIAL_SCRATCH];
  let mut seen_keys: HashSet<String> = HashSet::new();
  let mut seen_time = false;

  loop {
    let mut len_bytes = [0_u8; 4];
    read_frame(source, &mut len_bytes, "chunk length")?;
    let data_len = u32::from_be_bytes(len_bytes) as usize;

    let mut ty_bytes = [0_u8; 4];
    read_frame(source, &mut ty_bytes, "chunk type")?;
    let ty = PngChunkTy(ty_bytes);

    if ty == PngChunkTy::tEXt {
      grow_scratch(&mut scratch, data_len);
      read_frame(source, &mut scratch[..data_len], "tEXt payload")?;
      if let Some(nul) = scratch[..data_len].iter().position(|&b| b == 0) {
        let key = String::from_utf8_lossy(&scratch[..nul]).into_owned();
        debug!("existing tEXt key: {key:?}");
        seen_keys.insert(key);
      }
      sink.write_all(&len_bytes)?;
      sink.write_all(&ty_bytes)?;
      sink.write_all(&scratch[..data_len])?;
      let mut crc_bytes = [0_u8; 4];
      read_frame(source, &mut crc_bytes, "tEXt crc")?;
      sink.write_all(&crc_bytes)?;
      continue;
    }

    if ty == PngChunkTy::tIME {
      seen_time = true;
    } else if ty == PngChunkTy::IEND {
      // The new chunks go in right before the terminator.
      for (key, value) in metadata {
        if seen_keys.contains(key) {
          debug!("skipping duplicate tEXt key: {key:?}");
          continue;
        }
        write_text_chunk(sink, key, value)?;
      }
      if !seen_time {
        write_time_chunk(sink, &timestamp)?;
      }
    }

    // Generic verbatim copy: payload and trailing crc as one block.
    sink.write_all(&len_bytes)?;
    sink.write_all(&ty_bytes)?;
    let block_len = data_len + 4;
    grow_scratch(&mut scratch, block_len);
    read_frame(source, &mut scratch[..block_len], "chunk payload and crc")?;
    sink.write_all(&scratch[..block_len])?;

    if ty == PngChunkTy::IEND {
      return Ok(());
    }
  }
}

/// Grown, never shrunk: one scratch allocation serves the whole stream.
#[inline]
fn grow_scratch(scratch: &mut Vec<u8>, needed: usize) {
  if scratch.len() < needed {
    scratch.resize(needed, 0);
  }
}

/// `read_exact`, with a short read mapped to [`RewriteError::TruncatedStream`]
/// naming the frame element that was cut off.
fn read_frame<R: Read>(
  source: &mut R, buf: &mut [u8], what: &'static str,
) -> Result<(), RewriteError> {
  source.read_exact(buf).map_err(|e| match e.kind() {
    io::ErrorKind::UnexpectedEof => RewriteError::TruncatedStream(what),
    _ => RewriteError::Io(e),
  })
}

/// Reads until `buf` is full or the stream ends, returning how many bytes
/// landed. Used for the signature, where a short read has its own error.
fn read_some<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
  let mut filled = 0;
  while filled < buf.len() {
    match source.read(&mut buf[filled..]) {
      Ok(0) => break,
      Ok(n) => filled += n,
      Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
      Err(e) => return Err(e),
    }
  }
  Ok(filled)
}
