//! Memory usage from /proc/meminfo.

use super::{read_required, Sampler};
use crate::config::SamplerConfig;
use crate::error::{Error, Result};
use crate::samples::{MetricDescriptor, Samples, Semantics, Units};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

pub const DESCRIPTIONS: &[MetricDescriptor] = &[
    MetricDescriptor::new("memory.free", Units::Bytes, Semantics::Instant, false),
    MetricDescriptor::new("memory.used", Units::Bytes, Semantics::Instant, false),
    MetricDescriptor::new("memory.cached", Units::Bytes, Semantics::Instant, false),
    MetricDescriptor::new("memory.swap-used", Units::Bytes, Semantics::Instant, false),
];

/// Samples system memory and swap usage in bytes.
pub struct MemorySampler {
    meminfo_path: PathBuf,
}

impl MemorySampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            meminfo_path: config.proc_file("meminfo"),
        }
    }
}

impl Sampler for MemorySampler {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn descriptions(&self) -> &'static [MetricDescriptor] {
        DESCRIPTIONS
    }

    fn collect(&self, samples: &mut Samples) -> Result<()> {
        let meminfo = read_required(&self.meminfo_path)?;
        let items = parse_meminfo(&meminfo);

        let kb = |key: &'static str| {
            items.get(key).copied().ok_or_else(|| Error::MissingKey {
                path: self.meminfo_path.clone(),
                key,
            })
        };

        let total = kb("MemTotal")?;
        let free = kb("MemFree")?;
        let available = kb("MemAvailable")?;
        let buffers = kb("Buffers")?;
        let cached = kb("Cached")?;
        let swap_total = kb("SwapTotal")?;
        let swap_free = kb("SwapFree")?;

        let bytes = |kb: u64| kb * 1024;

        samples.set("memory.free", bytes(free));
        samples.set("memory.cached", bytes(buffers + cached));

        // A racing update can leave the subtrahend above the total
        match total.checked_sub(available) {
            Some(used) => samples.set("memory.used", bytes(used)),
            None => debug!("MemAvailable {available} kB exceeds MemTotal {total} kB, skipping"),
        }
        match swap_total.checked_sub(swap_free) {
            Some(used) => samples.set("memory.swap-used", bytes(used)),
            None => debug!("SwapFree {swap_free} kB exceeds SwapTotal {swap_total} kB, skipping"),
        }

        Ok(())
    }
}

/// Parse `Key:   value kB` lines. Values are kilobytes; lines that do not
/// parse are left out.
fn parse_meminfo(content: &str) -> HashMap<&str, u64> {
    content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let value = value.trim();
            let value = value.strip_suffix("kB").unwrap_or(value).trim();
            Some((key.trim(), value.parse().ok()?))
        })
        .collect()
}
