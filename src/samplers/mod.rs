//! Metric samplers, one per kernel data source, and the registry of all of them.

pub mod block;
pub mod cgroup;
pub mod cpu;
pub mod disk;
mod diskstats;
pub mod memory;
pub mod mount;
pub mod network;
pub mod temperature;

pub use block::BlockSampler;
pub use cgroup::CgroupSampler;
pub use cpu::CpuSampler;
pub use disk::DiskSampler;
pub use memory::MemorySampler;
pub use mount::MountSampler;
pub use network::NetworkSampler;
pub use temperature::CpuTemperatureSampler;

use crate::config::SamplerConfig;
use crate::error::{Error, Result};
use crate::samples::{MetricDescriptor, Samples};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// A source of metrics.
///
/// `collect` reads the kernel files synchronously and writes into the shared
/// sink. Instances live for the whole process and may be shared between
/// worker threads, so any state carried across passes must be internally
/// synchronized.
pub trait Sampler: Send + Sync {
    /// Short identifier, used in logs and on the command line.
    fn name(&self) -> &'static str;

    /// Metrics this sampler may write.
    fn descriptions(&self) -> &'static [MetricDescriptor];

    /// Run one sampling pass.
    ///
    /// # Errors
    ///
    /// Returns an error when a required file or key is missing or malformed.
    /// Optional data is skipped instead.
    fn collect(&self, samples: &mut Samples) -> Result<()>;
}

/// Every sampler the crate provides, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    Block,
    Cgroup,
    Cpu,
    CpuTemperature,
    Disk,
    Memory,
    Mount,
    Network,
}

impl SamplerKind {
    pub const ALL: [SamplerKind; 8] = [
        SamplerKind::Block,
        SamplerKind::Cgroup,
        SamplerKind::Cpu,
        SamplerKind::CpuTemperature,
        SamplerKind::Disk,
        SamplerKind::Memory,
        SamplerKind::Mount,
        SamplerKind::Network,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SamplerKind::Block => "block",
            SamplerKind::Cgroup => "cgroup",
            SamplerKind::Cpu => "cpu",
            SamplerKind::CpuTemperature => "cpu-temperature",
            SamplerKind::Disk => "disk",
            SamplerKind::Memory => "memory",
            SamplerKind::Mount => "mount",
            SamplerKind::Network => "network",
        }
    }

    pub fn descriptions(self) -> &'static [MetricDescriptor] {
        match self {
            SamplerKind::Block => block::DESCRIPTIONS,
            SamplerKind::Cgroup => cgroup::DESCRIPTIONS,
            SamplerKind::Cpu => cpu::DESCRIPTIONS,
            SamplerKind::CpuTemperature => temperature::DESCRIPTIONS,
            SamplerKind::Disk => disk::DESCRIPTIONS,
            SamplerKind::Memory => memory::DESCRIPTIONS,
            SamplerKind::Mount => mount::DESCRIPTIONS,
            SamplerKind::Network => network::DESCRIPTIONS,
        }
    }

    pub fn build(self, config: &SamplerConfig) -> Box<dyn Sampler> {
        match self {
            SamplerKind::Block => Box::new(BlockSampler::new(config)),
            SamplerKind::Cgroup => Box::new(CgroupSampler::new(config)),
            SamplerKind::Cpu => Box::new(CpuSampler::new(config)),
            SamplerKind::CpuTemperature => Box::new(CpuTemperatureSampler::new(config)),
            SamplerKind::Disk => Box::new(DiskSampler::new(config)),
            SamplerKind::Memory => Box::new(MemorySampler::new(config)),
            SamplerKind::Mount => Box::new(MountSampler::new(config)),
            SamplerKind::Network => Box::new(NetworkSampler::new(config)),
        }
    }
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for SamplerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SamplerKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = SamplerKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown sampler '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// Instantiate every registered sampler.
pub fn all(config: &SamplerConfig) -> Vec<Box<dyn Sampler>> {
    SamplerKind::ALL.iter().map(|kind| kind.build(config)).collect()
}

/// Descriptors of every registered sampler.
pub fn all_descriptions() -> impl Iterator<Item = &'static MetricDescriptor> {
    SamplerKind::ALL
        .into_iter()
        .flat_map(|kind| kind.descriptions().iter())
}

/// Read a file every pass depends on.
pub(crate) fn read_required(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Read a file that may legitimately be absent. Other read failures are
/// logged and treated the same way.
pub(crate) fn read_optional(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            debug!("Could not read {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_order() {
        let names: Vec<&str> = SamplerKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            [
                "block",
                "cgroup",
                "cpu",
                "cpu-temperature",
                "disk",
                "memory",
                "mount",
                "network"
            ]
        );
    }

    #[test]
    fn test_metric_names_unique() {
        let mut seen = HashSet::new();
        for descriptor in all_descriptions() {
            assert!(seen.insert(descriptor.name), "duplicate metric {}", descriptor.name);
        }
        assert_eq!(seen.len(), 28);
    }

    #[test]
    fn test_built_sampler_matches_kind() {
        let config = SamplerConfig::new();
        for kind in SamplerKind::ALL {
            let sampler = kind.build(&config);
            assert_eq!(sampler.name(), kind.name());
            assert_eq!(sampler.descriptions(), kind.descriptions());
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("cpu-temperature".parse::<SamplerKind>(), Ok(SamplerKind::CpuTemperature));
        assert!("gpu".parse::<SamplerKind>().is_err());
    }

    #[test]
    fn test_read_optional_missing() {
        assert!(read_optional(Path::new("/nonexistent/hostsampler/file")).is_none());
        assert!(read_required(Path::new("/nonexistent/hostsampler/file")).is_err());
    }
}
