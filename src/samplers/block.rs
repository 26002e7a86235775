//! Per-device I/O counters from /proc/diskstats.

use super::diskstats::DiskStatLine;
use super::{read_required, Sampler};
use crate::config::SamplerConfig;
use crate::error::Result;
use crate::samples::{MetricDescriptor, Samples, Semantics, Units};
use std::path::PathBuf;
use tracing::debug;

pub const DESCRIPTIONS: &[MetricDescriptor] = &[
    MetricDescriptor::new("block.device.read", Units::Bytes, Semantics::Counter, true),
    MetricDescriptor::new("block.device.written", Units::Bytes, Semantics::Counter, true),
];

/// Reports bytes read and written for every block device the kernel lists,
/// partitions and stacked devices included.
pub struct BlockSampler {
    diskstats_path: PathBuf,
}

impl BlockSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            diskstats_path: config.proc_file("diskstats"),
        }
    }
}

impl Sampler for BlockSampler {
    fn name(&self) -> &'static str {
        "block"
    }

    fn descriptions(&self) -> &'static [MetricDescriptor] {
        DESCRIPTIONS
    }

    fn collect(&self, samples: &mut Samples) -> Result<()> {
        let diskstats = read_required(&self.diskstats_path)?;

        for line in diskstats.lines().filter(|l| !l.trim().is_empty()) {
            let stats = match DiskStatLine::parse(line) {
                Ok(stats) => stats,
                Err(e) => {
                    debug!("Skipping diskstats line {line:?}: {e}");
                    continue;
                }
            };

            samples.set_instance("block.device.read", stats.name, stats.bytes_read());
            samples.set_instance("block.device.written", stats.name, stats.bytes_written());
        }

        Ok(())
    }
}
