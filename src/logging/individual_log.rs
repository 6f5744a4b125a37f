//! CSV log of every evaluated individual.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::search::Candidate;

/// Appends one row per evaluated candidate.
///
/// The header depends on the feature and parameter counts, so it is written
/// lazily from the first candidate logged.
pub struct IndividualLog {
    writer: BufWriter<File>,
    initiated: bool,
}

impl IndividualLog {
    /// Creates the log file (and its parent directories).
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            initiated: false,
        })
    }

    /// Appends one candidate row, writing the header first if this is the
    /// first row.
    pub fn append(&mut self, candidate: &Candidate) -> io::Result<()> {
        if !self.initiated {
            self.write_header(candidate)?;
            self.initiated = true;
        }

        // Candidates without an owning emitter log the sentinel -1.
        let emitter = candidate.emitter.map(|index| index as i64).unwrap_or(-1);
        write!(
            self.writer,
            "{},{},{},{}",
            candidate.id, emitter, candidate.generation, candidate.fitness
        )?;
        for feature in &candidate.features {
            write!(self.writer, ",{}", feature)?;
        }
        for param in &candidate.params {
            write!(self.writer, ",{}", param)?;
        }
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn write_header(&mut self, candidate: &Candidate) -> io::Result<()> {
        write!(self.writer, "Individual,Emitter,Generation,Fitness")?;
        for index in 0..candidate.features.len() {
            write!(self.writer, ",Feature:{}", index)?;
        }
        for index in 0..candidate.params.len() {
            write!(self.writer, ",Weight:{}", index)?;
        }
        writeln!(self.writer)
    }
}
