//! CSV log of archive statistics over the run.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::archive::MapSummary;

/// Appends one row of archive statistics per logging interval.
pub struct SummaryLog {
    writer: BufWriter<File>,
}

impl SummaryLog {
    /// Creates the log file (and its parent directories) and writes the
    /// header row.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(
            writer,
            "NumEvaluated,QD-Score,MeanNormFitness,MedianNormFitness,CellsOccupied,PercentOccupied,MaxNormFitness"
        )?;
        writer.flush()?;
        Ok(Self { writer })
    }

    /// Appends one summary row and flushes so the file can be tailed.
    pub fn append(&mut self, summary: &MapSummary) -> io::Result<()> {
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{}",
            summary.num_evaluated,
            summary.qd_score,
            summary.mean_norm_fitness,
            summary.median_norm_fitness,
            summary.cells_occupied,
            summary.percent_occupied,
            summary.max_norm_fitness
        )?;
        self.writer.flush()
    }
}
