//! JSON-lines snapshots of the whole archive.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::archive::FeatureMap;

#[derive(Serialize)]
struct SnapshotRecord<'a> {
    num_evaluated: usize,
    archive: &'a FeatureMap,
}

/// Appends one JSON line per snapshot, each holding the evaluation count and
/// the full archive state at that point.
pub struct SnapshotLog {
    writer: BufWriter<File>,
}

impl SnapshotLog {
    /// Creates the log file (and its parent directories).
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    /// Appends one snapshot line.
    pub fn append(&mut self, map: &FeatureMap, num_evaluated: usize) -> io::Result<()> {
        let record = SnapshotRecord {
            num_evaluated,
            archive: map,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        writeln!(self.writer)?;
        self.writer.flush()
    }
}
