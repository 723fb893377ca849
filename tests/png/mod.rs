use pngstamp::png::{crc32, rewrite, RewriteError, PNG_SIGNATURE};

use crate::{chunk, chunk_with_crc, chunks_of, minimal_png, rand_bytes, ts};

fn title_and_creation_time() -> Vec<(String, String)> {
  vec![
    ("Title".to_owned(), "x.png".to_owned()),
    ("Creation Time".to_owned(), "2024:01:02 03:04:05".to_owned()),
  ]
}

fn crc_of(ty: &[u8; 4], payload: &[u8]) -> u32 {
  crc32::finalize(crc32::update(crc32::update(crc32::CRC_SEED, ty), payload))
}

#[test]
fn round_trip_inserts_before_iend() {
  let src = minimal_png(&[chunk(b"IDAT", &rand_bytes(256))]);
  let mut out = Vec::new();
  rewrite(&mut src.as_slice(), &mut out, &title_and_creation_time(), ts(2024, 1, 2, 3, 4, 5))
    .unwrap();

  assert_eq!(&out[..8], &PNG_SIGNATURE);
  let parsed = chunks_of(&out[8..]);
  let types: Vec<&[u8; 4]> = parsed.iter().map(|(ty, _, _)| ty).collect();
  assert_eq!(types, [b"IHDR", b"IDAT", b"tEXt", b"tEXt", b"tIME", b"IEND"]);

  // the two tEXt chunks, in metadata order, with checksums from the engine
  assert_eq!(parsed[2].1, b"Title\0x.png");
  assert_eq!(parsed[2].2, crc_of(b"tEXt", b"Title\0x.png"));
  assert_eq!(parsed[3].1, b"Creation Time\02024:01:02 03:04:05");
  assert_eq!(parsed[3].2, crc_of(b"tEXt", b"Creation Time\02024:01:02 03:04:05"));

  // the tIME payload is 2024-01-02T03:04:05 in fixed 7-byte layout
  assert_eq!(parsed[4].1, [0x07, 0xE8, 0x01, 0x02, 0x03, 0x04, 0x05]);
  assert_eq!(parsed[4].2, crc_of(b"tIME", &[0x07, 0xE8, 0x01, 0x02, 0x03, 0x04, 0x05]));

  // everything before the first synthesized chunk is the source, verbatim
  let src_body_len = src.len() - chunk(b"IEND", &[]).len();
  assert_eq!(&out[..src_body_len], &src[..src_body_len]);
  // and the IEND tail is verbatim too
  assert_eq!(&out[out.len() - 12..], &src[src.len() - 12..]);
}

#[test]
fn existing_key_is_not_duplicated() {
  let src = minimal_png(&[chunk(b"tEXt", b"Title\0the old title")]);
  let mut out = Vec::new();
  let metadata = vec![
    ("Title".to_owned(), "replacement".to_owned()),
    ("Author".to_owned(), "nobody".to_owned()),
  ];
  rewrite(&mut src.as_slice(), &mut out, &metadata, ts(2024, 1, 2, 3, 4, 5)).unwrap();

  let parsed = chunks_of(&out[8..]);
  let text_payloads: Vec<&[u8]> =
    parsed.iter().filter(|(ty, _, _)| ty == b"tEXt").map(|(_, p, _)| p.as_slice()).collect();
  assert_eq!(text_payloads, [b"Title\0the old title".as_slice(), b"Author\0nobody".as_slice()]);
}

#[test]
fn text_chunk_without_null_records_no_key() {
  // a malformed tEXt payload with no separator still passes through, and the
  // key it fails to declare is still free for the new metadata
  let src = minimal_png(&[chunk(b"tEXt", b"Title no separator")]);
  let mut out = Vec::new();
  let metadata = vec![("Title".to_owned(), "fresh".to_owned())];
  rewrite(&mut src.as_slice(), &mut out, &metadata, ts(2024, 1, 2, 3, 4, 5)).unwrap();

  let parsed = chunks_of(&out[8..]);
  let text_payloads: Vec<&[u8]> =
    parsed.iter().filter(|(ty, _, _)| ty == b"tEXt").map(|(_, p, _)| p.as_slice()).collect();
  assert_eq!(text_payloads, [b"Title no separator".as_slice(), b"Title\0fresh".as_slice()]);
}

#[test]
fn existing_time_chunk_suppresses_synthesis() {
  // deliberately bogus checksum: pass-through must not touch it
  let old_time = chunk_with_crc(b"tIME", &[0x07, 0xC0, 6, 7, 8, 9, 10], 0xDEAD_BEEF);
  let src = minimal_png(&[old_time.clone()]);
  let mut out = Vec::new();
  rewrite(&mut src.as_slice(), &mut out, &[], ts(2024, 1, 2, 3, 4, 5)).unwrap();

  let parsed = chunks_of(&out[8..]);
  let times: Vec<_> = parsed.iter().filter(|(ty, _, _)| ty == b"tIME").collect();
  assert_eq!(times.len(), 1);
  assert_eq!(times[0].1, [0x07, 0xC0, 6, 7, 8, 9, 10]);
  assert_eq!(times[0].2, 0xDEAD_BEEF);
  // byte-exact: the whole pass-through region is identical
  assert!(out.windows(old_time.len()).any(|w| w == old_time.as_slice()));
}

#[test]
fn unknown_chunks_pass_through_byte_exact() {
  // an unknown chunk whose checksum would never validate
  let weird = chunk_with_crc(b"abCD", &rand_bytes(64), 0x0123_4567);
  let src = minimal_png(&[weird.clone()]);
  let mut out = Vec::new();
  rewrite(&mut src.as_slice(), &mut out, &[], ts(2024, 1, 2, 3, 4, 5)).unwrap();
  assert!(out.windows(weird.len()).any(|w| w == weird.as_slice()));
}

#[test]
fn empty_metadata_still_adds_time() {
  let src = minimal_png(&[]);
  let mut out = Vec::new();
  rewrite(&mut src.as_slice(), &mut out, &[], ts(2020, 12, 31, 23, 59, 58)).unwrap();

  let parsed = chunks_of(&out[8..]);
  let types: Vec<&[u8; 4]> = parsed.iter().map(|(ty, _, _)| ty).collect();
  assert_eq!(types, [b"IHDR", b"tIME", b"IEND"]);
  assert_eq!(parsed[1].1, [0x07, 0xE4, 12, 31, 23, 59, 58]);
}

#[test]
fn large_chunk_payloads_survive() {
  // bigger than the rewriter's starting scratch buffer
  let big = rand_bytes(300 * 1024);
  let src = minimal_png(&[chunk(b"IDAT", &big)]);
  let mut out = Vec::new();
  rewrite(&mut src.as_slice(), &mut out, &[], ts(2024, 1, 2, 3, 4, 5)).unwrap();
  assert!(out.windows(12).any(|w| w == &src[8..20]));
  let parsed = chunks_of(&out[8..]);
  assert_eq!(parsed[1].1, big);
}

#[test]
fn declared_length_past_end_is_truncated() {
  let mut src = PNG_SIGNATURE.to_vec();
  src.extend_from_slice(&100_u32.to_be_bytes());
  src.extend_from_slice(b"IDAT");
  src.extend_from_slice(&[0_u8; 10]); // 94 bytes short of payload + crc
  let mut out = Vec::new();
  let err = rewrite(&mut src.as_slice(), &mut out, &[], ts(2024, 1, 2, 3, 4, 5));
  assert!(matches!(err, Err(RewriteError::TruncatedStream("chunk payload and crc"))));
}

#[test]
fn truncated_text_payload() {
  let mut src = PNG_SIGNATURE.to_vec();
  src.extend_from_slice(&50_u32.to_be_bytes());
  src.extend_from_slice(b"tEXt");
  src.extend_from_slice(b"Title\0cut off");
  let mut out = Vec::new();
  let err = rewrite(&mut src.as_slice(), &mut out, &[], ts(2024, 1, 2, 3, 4, 5));
  assert!(matches!(err, Err(RewriteError::TruncatedStream("tEXt payload"))));
}

#[test]
fn truncated_chunk_type() {
  let mut src = PNG_SIGNATURE.to_vec();
  src.extend_from_slice(&0_u32.to_be_bytes());
  src.extend_from_slice(b"IE"); // cut mid-tag
  let mut out = Vec::new();
  let err = rewrite(&mut src.as_slice(), &mut out, &[], ts(2024, 1, 2, 3, 4, 5));
  assert!(matches!(err, Err(RewriteError::TruncatedStream("chunk type"))));
}

#[test]
fn non_ascii_metadata_is_sanitized() {
  let src = minimal_png(&[]);
  let mut out = Vec::new();
  let metadata = vec![("Comment".to_owned(), "caf\u{e9} \u{1F600}".to_owned())];
  rewrite(&mut src.as_slice(), &mut out, &metadata, ts(2024, 1, 2, 3, 4, 5)).unwrap();

  let parsed = chunks_of(&out[8..]);
  let text = parsed.iter().find(|(ty, _, _)| ty == b"tEXt").unwrap();
  // every non-printable-ascii byte of the value became '?'
  assert_eq!(text.1, b"Comment\0caf?? ????");
}
