//! Sample log: one JSON object per sampling pass.

use crate::samples::Samples;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// The samples of one pass with the time the pass started
#[derive(Debug, Clone, Serialize)]
pub struct PassRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub samples: &'a Samples,
}

/// Writes pass records as JSON Lines
pub struct SampleLogger<W: Write> {
    writer: W,
    records_written: u64,
}

impl SampleLogger<BufWriter<File>> {
    /// Create a logger writing to the specified file, truncating it
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to create sample log {}", path.display()))?;

        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> SampleLogger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
        }
    }

    /// Append one pass to the log
    pub fn log(&mut self, record: &PassRecord<'_>) -> Result<()> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        self.records_written += 1;

        // Flush every 10 passes to avoid losing data on crash
        if self.records_written % 10 == 0 {
            self.writer.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

impl<W: Write> Drop for SampleLogger<W> {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
