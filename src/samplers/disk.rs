//! Whole-system disk I/O totals from /proc/diskstats.

use super::diskstats::DiskStatLine;
use super::{read_required, Sampler};
use crate::config::SamplerConfig;
use crate::error::{Error, Result};
use crate::samples::{MetricDescriptor, Samples, Semantics, Units};
use std::path::PathBuf;

pub const DESCRIPTIONS: &[MetricDescriptor] = &[
    MetricDescriptor::new("disk.all.read", Units::Bytes, Semantics::Counter, false),
    MetricDescriptor::new("disk.all.written", Units::Bytes, Semantics::Counter, false),
    MetricDescriptor::new("disk.all.ops", Units::Count, Semantics::Counter, false),
];

/// Sums I/O over physical whole disks, skipping partitions and stacked
/// devices so nothing is counted twice.
pub struct DiskSampler {
    diskstats_path: PathBuf,
}

impl DiskSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            diskstats_path: config.proc_file("diskstats"),
        }
    }
}

impl Sampler for DiskSampler {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn descriptions(&self) -> &'static [MetricDescriptor] {
        DESCRIPTIONS
    }

    fn collect(&self, samples: &mut Samples) -> Result<()> {
        let diskstats = read_required(&self.diskstats_path)?;

        let mut bytes_read: u64 = 0;
        let mut bytes_written: u64 = 0;
        let mut num_ops: u64 = 0;

        for line in diskstats.lines().filter(|l| !l.trim().is_empty()) {
            let stats = DiskStatLine::parse(line)
                .map_err(|message| Error::parse(&self.diskstats_path, line, message))?;

            if stats.is_excluded_from_totals() {
                continue;
            }

            bytes_read += stats.bytes_read();
            bytes_written += stats.bytes_written();
            num_ops += stats.reads_merged + stats.writes_merged;
        }

        samples.set("disk.all.read", bytes_read);
        samples.set("disk.all.written", bytes_written);
        samples.set("disk.all.ops", num_ops);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn collect(content: &str) -> Result<Samples> {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("diskstats"), content).unwrap();
        let sampler = DiskSampler::new(&SamplerConfig::new().with_proc_root(dir.path()));
        let mut samples = Samples::new(DESCRIPTIONS);
        sampler.collect(&mut samples).map(|_| samples)
    }

    #[test]
    fn test_totals_skip_partitions_and_stacked_devices() {
        let samples = collect(
            "   8       0 sda 100 3 10 0 200 4 20 0 0 0 0 0 0 0 0\n\
                8       1 sda1 100 3 10 0 200 4 20 0 0 0 0 0 0 0 0\n\
              253       0 dm-0 999 99 9999 0 999 99 9999 0 0 0 0 0 0 0 0\n\
                9       0 md0 999 99 9999 0 999 99 9999 0 0 0 0 0 0 0 0\n\
              259       0 nvme0n1 50 1 2 0 60 2 4 0 0 0 0 0 0 0 0\n\
              259       1 nvme0n1p1 50 1 2 0 60 2 4 0 0 0 0 0 0 0 0\n",
        )
        .unwrap();

        assert_eq!(samples.scalar("disk.all.read"), Some(((10 + 2) * 512) as f64));
        assert_eq!(samples.scalar("disk.all.written"), Some(((20 + 4) * 512) as f64));
        assert_eq!(samples.scalar("disk.all.ops"), Some((3 + 4 + 1 + 2) as f64));
    }

    #[test]
    fn test_device_mapper_contributes_nothing() {
        let samples =
            collect("253 0 dm-0 999 99 9999 0 999 99 9999 0 0 0 0 0 0 0 0\n").unwrap();
        assert_eq!(samples.scalar("disk.all.read"), Some(0.0));
        assert_eq!(samples.scalar("disk.all.written"), Some(0.0));
        assert_eq!(samples.scalar("disk.all.ops"), Some(0.0));
    }

    #[test]
    fn test_malformed_line_is_error() {
        assert!(matches!(collect("8 0 sda 1 2\n"), Err(Error::Parse { .. })));
    }
}
