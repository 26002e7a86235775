//! CPU time accounting from /proc/stat.

use super::{read_required, Sampler};
use crate::config::SamplerConfig;
use crate::error::{Error, Result};
use crate::samples::{MetricDescriptor, Samples, Semantics, Units};
use std::path::PathBuf;

pub const DESCRIPTIONS: &[MetricDescriptor] = &[
    MetricDescriptor::new("cpu.basic.nice", Units::Millisec, Semantics::Counter, false),
    MetricDescriptor::new("cpu.basic.user", Units::Millisec, Semantics::Counter, false),
    MetricDescriptor::new("cpu.basic.system", Units::Millisec, Semantics::Counter, false),
    MetricDescriptor::new("cpu.basic.iowait", Units::Millisec, Semantics::Counter, false),
    MetricDescriptor::new("cpu.core.nice", Units::Millisec, Semantics::Counter, true),
    MetricDescriptor::new("cpu.core.user", Units::Millisec, Semantics::Counter, true),
    MetricDescriptor::new("cpu.core.system", Units::Millisec, Semantics::Counter, true),
    MetricDescriptor::new("cpu.core.iowait", Units::Millisec, Semantics::Counter, true),
];

/// Raw clock tick counts from one `cpu` line of /proc/stat
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub iowait: u64,
}

/// Samples aggregate and per-core CPU time in milliseconds.
pub struct CpuSampler {
    stat_path: PathBuf,
    ms_per_tick: f64,
}

impl CpuSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            stat_path: config.proc_file("stat"),
            ms_per_tick: config.ms_per_tick(),
        }
    }
}

impl Sampler for CpuSampler {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn descriptions(&self) -> &'static [MetricDescriptor] {
        DESCRIPTIONS
    }

    fn collect(&self, samples: &mut Samples) -> Result<()> {
        let stat_content = read_required(&self.stat_path)?;

        // Parse every line before writing so a bad line leaves no partial pass
        let cpus = stat_content
            .lines()
            .filter(|line| line.starts_with("cpu"))
            .map(|line| {
                parse_cpu_line(line).map_err(|message| Error::parse(&self.stat_path, line, message))
            })
            .collect::<Result<Vec<_>>>()?;

        let ms = |ticks: u64| ticks as f64 * self.ms_per_tick;
        for (core, times) in cpus {
            if core.is_empty() {
                samples.set("cpu.basic.nice", ms(times.nice));
                samples.set("cpu.basic.user", ms(times.user));
                samples.set("cpu.basic.system", ms(times.system));
                samples.set("cpu.basic.iowait", ms(times.iowait));
            } else {
                samples.set_instance("cpu.core.nice", core, ms(times.nice));
                samples.set_instance("cpu.core.user", core, ms(times.user));
                samples.set_instance("cpu.core.system", core, ms(times.system));
                samples.set_instance("cpu.core.iowait", core, ms(times.iowait));
            }
        }

        Ok(())
    }
}

/// Split a `cpuN user nice system idle iowait ...` line into the core id
/// (empty for the aggregate line) and its tick counts.
fn parse_cpu_line(line: &str) -> std::result::Result<(&str, CpuTimes), String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 6 {
        return Err(format!("expected at least 6 fields, found {}", parts.len()));
    }

    let field = |i: usize| {
        parts[i]
            .parse::<u64>()
            .map_err(|e| format!("field {i} ({:?}): {e}", parts[i]))
    };

    let times = CpuTimes {
        user: field(1)?,
        nice: field(2)?,
        system: field(3)?,
        iowait: field(5)?,
    };

    let label = parts[0];
    Ok((&label[3..], times))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const STAT: &str = "\
cpu  200 20 100 5000 40 0 3 0 0 0
cpu0 100 10 50 0 20 0 0 0 0 0
cpu1 100 10 50 5000 20 0 3 0 0 0
intr 12345 0 0
ctxt 987654
btime 1700000000
";

    fn sampler_for(content: &str, ticks: u64) -> (TempDir, CpuSampler) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stat"), content).unwrap();
        let config = SamplerConfig::new()
            .with_proc_root(dir.path())
            .with_clock_ticks(ticks);
        (dir, CpuSampler::new(&config))
    }

    #[test]
    fn test_per_core_milliseconds() {
        let (_dir, sampler) = sampler_for(STAT, 100);
        let mut samples = Samples::new(DESCRIPTIONS);
        sampler.collect(&mut samples).unwrap();

        assert_eq!(samples.instance("cpu.core.user", "0"), Some(1000.0));
        assert_eq!(samples.instance("cpu.core.nice", "0"), Some(100.0));
        assert_eq!(samples.instance("cpu.core.system", "0"), Some(500.0));
        assert_eq!(samples.instance("cpu.core.iowait", "0"), Some(200.0));
        assert_eq!(samples.instances("cpu.core.user").count(), 2);
    }

    #[test]
    fn test_aggregate_line_is_scalar() {
        let (_dir, sampler) = sampler_for(STAT, 100);
        let mut samples = Samples::new(DESCRIPTIONS);
        sampler.collect(&mut samples).unwrap();

        assert_eq!(samples.scalar("cpu.basic.user"), Some(2000.0));
        assert_eq!(samples.scalar("cpu.basic.nice"), Some(200.0));
        assert_eq!(samples.scalar("cpu.basic.system"), Some(1000.0));
        assert_eq!(samples.scalar("cpu.basic.iowait"), Some(400.0));
        assert!(samples.instance("cpu.core.user", "").is_none());
    }

    #[test]
    fn test_tick_rate_scaling() {
        let (_dir, sampler) = sampler_for("cpu0 250 0 0 0 0\n", 250);
        let mut samples = Samples::new(DESCRIPTIONS);
        sampler.collect(&mut samples).unwrap();
        assert_eq!(samples.instance("cpu.core.user", "0"), Some(1000.0));
    }

    #[test]
    fn test_truncated_line_is_error() {
        let (_dir, sampler) = sampler_for("cpu0 1 2 3\n", 100);
        let mut samples = Samples::new(DESCRIPTIONS);
        assert!(matches!(
            sampler.collect(&mut samples),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_bad_core_line_writes_nothing() {
        let stat = "cpu  100 10 50 0 20\ncpu0 100 10 50 0 20\ncpu1 oops\n";
        let (_dir, sampler) = sampler_for(stat, 100);
        let mut samples = Samples::new(DESCRIPTIONS);
        assert!(sampler.collect(&mut samples).is_err());
        assert!(samples.scalar("cpu.basic.user").is_none());
        assert!(samples.instance("cpu.core.user", "0").is_none());
        assert!(samples.is_empty());
    }

    #[test]
    fn test_missing_stat_is_error() {
        let dir = TempDir::new().unwrap();
        let sampler = CpuSampler::new(&SamplerConfig::new().with_proc_root(dir.path()));
        let mut samples = Samples::new(DESCRIPTIONS);
        assert!(matches!(sampler.collect(&mut samples), Err(Error::Io { .. })));
    }
}
