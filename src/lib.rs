#![forbid(unsafe_code)]

//! A crate for stamping metadata into PNG data streams.
//!
//! The [`png`] module is the core: a single-pass, streaming rewriter for the
//! PNG chunk framing format that inserts `tEXt` and `tIME` chunks immediately
//! before `IEND` while copying every other chunk through byte-for-byte.
//!
//! The [`archive`] module is the outer surface: it walks a zip archive,
//! rewrites each PNG entry through the core, renames stamped entries by their
//! last-modified time, and copies everything else (and anything that fails)
//! through untouched.

pub mod archive;

pub mod png;
