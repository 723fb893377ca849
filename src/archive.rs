//! The zip archive layer.
//!
//! Walks every entry of one archive in order. PNG entries are streamed
//! through [`png::rewrite`] into a new entry named after their last-modified
//! time; everything else is copied across with its original compressed bytes.
//! A PNG entry that fails to rewrite is not fatal: the partial entry is
//! aborted, the original bytes are copied through under the original name,
//! and the failure is reported at the end of the run.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use log::{error, info};
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::png;

/// Predefined `tEXt` keyword for a short (one line) title or caption.
const TEXT_KEY_TITLE: &str = "Title";
/// Predefined `tEXt` keyword for the time of original image creation.
const TEXT_KEY_CREATION_TIME: &str = "Creation Time";

/// An error that aborts processing of a whole archive.
///
/// Per-entry rewrite failures never show up here; those are absorbed into the
/// verbatim-copy fallback and surface in [`StampReport::failures`].
#[derive(Debug, Error)]
pub enum StampError {
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),
  #[error("zip path has no file stem: {0}")]
  BadZipPath(PathBuf),
}

/// What happened while stamping one archive.
#[derive(Debug, Default)]
pub struct StampReport {
  /// PNG entries stamped and renamed.
  pub stamped: usize,
  /// Entries copied through untouched (non-PNG entries and directories).
  pub copied: usize,
  /// Full names of PNG entries that failed to rewrite and were copied
  /// verbatim instead.
  pub failures: Vec<String>,
}

/// Stamps every PNG entry of the zip archive at `src_path`, in place.
///
/// The rewritten archive is built as a sibling `<stem>.tmp.zip` and only
/// swapped in once every entry has been handled: the source archive becomes
/// `<stem>.old.zip` and the new archive takes its path.
pub fn stamp_zip_file(src_path: &Path) -> Result<StampReport, StampError> {
  info!("target zip file: {}", src_path.display());

  let tmp_path = sibling_with_suffix(src_path, ".tmp.zip")?;
  if tmp_path.exists() {
    fs::remove_file(&tmp_path)?;
  }

  let mut report = StampReport::default();
  {
    let mut archive = ZipArchive::new(BufReader::new(File::open(src_path)?))?;
    let mut writer = ZipWriter::new(BufWriter::new(File::create(&tmp_path)?));
    // counts entries per last-modified second, for collision-free names
    let mut per_second: HashMap<NaiveDateTime, u32> = HashMap::new();

    for index in 0..archive.len() {
      stamp_entry(&mut archive, &mut writer, index, &mut per_second, &mut report)?;
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
  }

  let old_path = sibling_with_suffix(src_path, ".old.zip")?;
  fs::rename(src_path, &old_path)?;
  fs::rename(&tmp_path, src_path)?;

  if !report.failures.is_empty() {
    error!(
      "there are {} png entries that encountered errors during processing",
      report.failures.len()
    );
  }
  Ok(report)
}

/// Handles one archive entry: raw copy, or rewrite with fallback.
fn stamp_entry<R: std::io::Read + std::io::Seek, W: Write + std::io::Seek>(
  archive: &mut ZipArchive<R>, writer: &mut ZipWriter<W>, index: usize,
  per_second: &mut HashMap<NaiveDateTime, u32>, report: &mut StampReport,
) -> Result<(), StampError> {
  let (entry_name, modified) = {
    let entry = archive.by_index_raw(index)?;
    let name = entry.name().to_owned();
    if entry.is_dir() || !name.to_ascii_lowercase().ends_with(".png") {
      writer.raw_copy_file(entry)?;
      report.copied += 1;
      info!("[{index}] copied {name}");
      return Ok(());
    }
    (name, entry.last_modified())
  };

  let timestamp = civil_from_zip(modified);
  let seq = per_second.entry(timestamp).or_insert(0);
  let new_name = renamed_entry(&entry_name, timestamp, *seq);
  *seq += 1;

  let file_name = entry_name.rsplit('/').next().unwrap_or(&entry_name).to_owned();
  let metadata = [
    (TEXT_KEY_TITLE.to_owned(), file_name),
    (
      TEXT_KEY_CREATION_TIME.to_owned(),
      timestamp.format("%Y:%m:%d %H:%M:%S").to_string(),
    ),
  ];
  let options = FileOptions::<()>::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(modified);

  let outcome = {
    let mut entry = archive.by_index(index)?;
    writer.start_file(new_name.as_str(), options)?;
    png::rewrite(&mut entry, writer, &metadata, timestamp)
  };
  match outcome {
    Ok(()) => {
      report.stamped += 1;
      info!("[{index}] {entry_name} -> {new_name}");
    }
    Err(err) => {
      error!("[{index}] failed to stamp {entry_name}: {err}");
      writer.abort_file()?;
      let entry = archive.by_index_raw(index)?;
      writer.raw_copy_file(entry)?;
      report.failures.push(entry_name);
    }
  }
  Ok(())
}

/// `dir/old.png` at 2024-01-02 03:04:05, sequence 1, becomes
/// `dir/cluster_2024-01-02_03-04-05_001.png`.
fn renamed_entry(full_name: &str, timestamp: NaiveDateTime, seq: u32) -> String {
  let file_name = format!("cluster_{}_{seq:03}.png", timestamp.format("%Y-%m-%d_%H-%M-%S"));
  match full_name.rsplit_once('/') {
    Some((dir, _)) => format!("{dir}/{file_name}"),
    None => file_name,
  }
}

/// Converts a zip last-modified stamp into a civil date-time. Out-of-range
/// field values fall back to the epoch rather than failing the entry.
fn civil_from_zip(dt: zip::DateTime) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(i32::from(dt.year()), u32::from(dt.month()), u32::from(dt.day()))
    .and_then(|d| {
      d.and_hms_opt(u32::from(dt.hour()), u32::from(dt.minute()), u32::from(dt.second()))
    })
    .unwrap_or_default()
}

/// Keeps the directory, swaps the extension-bearing tail: `a/b/c.zip` with
/// suffix `.tmp.zip` becomes `a/b/c.tmp.zip`.
fn sibling_with_suffix(path: &Path, suffix: &str) -> Result<PathBuf, StampError> {
  let stem = path.file_stem().ok_or_else(|| StampError::BadZipPath(path.to_owned()))?;
  let mut name = stem.to_os_string();
  name.push(suffix);
  Ok(path.with_file_name(name))
}
