//! Per-cgroup memory and CPU usage from the unified (v2) cgroup hierarchy.
//!
//! Every directory below the cgroup root is one instance, keyed by its path
//! relative to the root. Controller files are optional per cgroup: a missing
//! file, the literal `max`, zero and out-of-range values all mean "nothing
//! to report" and are skipped.
//!
//! Hosts with only the legacy v1 hierarchy produce no cgroup samples.

use super::{read_optional, Sampler};
use crate::config::SamplerConfig;
use crate::error::{Error, Result};
use crate::samples::{MetricDescriptor, Samples, Semantics, Units};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

pub const DESCRIPTIONS: &[MetricDescriptor] = &[
    MetricDescriptor::new("cgroup.memory.usage", Units::Bytes, Semantics::Instant, true),
    MetricDescriptor::new("cgroup.memory.limit", Units::Bytes, Semantics::Instant, true),
    MetricDescriptor::new("cgroup.memory.sw-usage", Units::Bytes, Semantics::Instant, true),
    MetricDescriptor::new("cgroup.memory.sw-limit", Units::Bytes, Semantics::Instant, true),
    MetricDescriptor::new("cgroup.cpu.usage", Units::Millisec, Semantics::Counter, true),
    MetricDescriptor::new("cgroup.cpu.shares", Units::Count, Semantics::Instant, true),
];

/// Single-value controller files and the metric each one feeds
const INTEGER_STATS: &[(&str, &str)] = &[
    ("memory.current", "cgroup.memory.usage"),
    ("memory.max", "cgroup.memory.limit"),
    ("memory.swap.current", "cgroup.memory.sw-usage"),
    ("memory.swap.max", "cgroup.memory.sw-limit"),
    ("cpu.weight", "cgroup.cpu.shares"),
];

pub struct CgroupSampler {
    root: PathBuf,
    unified: OnceLock<bool>,
}

impl CgroupSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            root: config.cgroup_root().to_path_buf(),
            unified: OnceLock::new(),
        }
    }

    /// Whether the host mounts the unified hierarchy. Probed once.
    pub fn is_unified(&self) -> bool {
        *self.unified.get_or_init(|| {
            let unified = self.root.join("cgroup.controllers").exists();
            if !unified {
                info!(
                    "No cgroup v2 hierarchy at {}, cgroup sampling disabled",
                    self.root.display()
                );
            }
            unified
        })
    }

    fn walk(&self, dir: &Path, samples: &mut Samples) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let cgroup = relative.to_string_lossy().into_owned();

            sample_cgroup(&path, &cgroup, samples);

            // Cgroups can be removed while we walk them
            if let Err(e) = self.walk(&path, samples) {
                debug!("Could not walk {}: {e}", path.display());
            }
        }

        Ok(())
    }
}

impl Sampler for CgroupSampler {
    fn name(&self) -> &'static str {
        "cgroup"
    }

    fn descriptions(&self) -> &'static [MetricDescriptor] {
        DESCRIPTIONS
    }

    fn collect(&self, samples: &mut Samples) -> Result<()> {
        if !self.is_unified() {
            return Ok(());
        }

        self.walk(&self.root, samples)
            .map_err(|e| Error::io(&self.root, e))
    }
}

fn sample_cgroup(dir: &Path, cgroup: &str, samples: &mut Samples) {
    for &(file, metric) in INTEGER_STATS {
        if let Some(value) = read_integer_stat(&dir.join(file)) {
            samples.set_instance(metric, cgroup, value);
        }
    }

    if let Some(usec) = read_keyed_stat(&dir.join("cpu.stat"), "usage_usec") {
        samples.set_instance("cgroup.cpu.usage", cgroup, usec as f64 / 1000.0);
    }
}

/// Values outside (0, i64::MAX) are unset or "unlimited".
fn meaningful(value: i64) -> Option<u64> {
    (value > 0 && value < i64::MAX).then_some(value.unsigned_abs())
}

/// A file holding one integer, e.g. `memory.current`. `max` and other
/// non-numeric contents yield `None`.
fn read_integer_stat(path: &Path) -> Option<u64> {
    let content = read_optional(path)?;
    content.trim().parse::<i64>().ok().and_then(meaningful)
}

/// The value on the `key value` line of a flat-keyed file such as `cpu.stat`.
fn read_keyed_stat(path: &Path, key: &str) -> Option<u64> {
    let content = read_optional(path)?;
    content
        .lines()
        .find_map(|line| {
            let mut parts = line.split_whitespace();
            if parts.next() != Some(key) {
                return None;
            }
            parts.last()
        })
        .and_then(|value| value.parse::<i64>().ok())
        .and_then(meaningful)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unified_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cgroup.controllers"), "cpu memory io\n").unwrap();
        fs::write(dir.path().join("memory.current"), "999999\n").unwrap();
        dir
    }

    fn cgroup(root: &TempDir, relative: &str, files: &[(&str, &str)]) {
        let path = root.path().join(relative);
        fs::create_dir_all(&path).unwrap();
        for (name, content) in files {
            fs::write(path.join(name), content).unwrap();
        }
    }

    fn collect(root: &TempDir) -> Samples {
        let sampler = CgroupSampler::new(&SamplerConfig::new().with_cgroup_root(root.path()));
        let mut samples = Samples::new(DESCRIPTIONS);
        sampler.collect(&mut samples).unwrap();
        samples
    }

    #[test]
    fn test_nested_cgroups_keyed_by_relative_path() {
        let root = unified_root();
        cgroup(
            &root,
            "system.slice/sshd.service",
            &[
                ("memory.current", "4096\n"),
                ("memory.max", "1073741824\n"),
                ("memory.swap.current", "512\n"),
                ("memory.swap.max", "2048\n"),
                ("cpu.weight", "100\n"),
                (
                    "cpu.stat",
                    "usage_usec 2500000\nuser_usec 2000000\nsystem_usec 500000\n",
                ),
            ],
        );

        let samples = collect(&root);
        let key = "system.slice/sshd.service";
        assert_eq!(samples.instance("cgroup.memory.usage", key), Some(4096.0));
        assert_eq!(samples.instance("cgroup.memory.limit", key), Some(1073741824.0));
        assert_eq!(samples.instance("cgroup.memory.sw-usage", key), Some(512.0));
        assert_eq!(samples.instance("cgroup.memory.sw-limit", key), Some(2048.0));
        assert_eq!(samples.instance("cgroup.cpu.shares", key), Some(100.0));
        assert_eq!(samples.instance("cgroup.cpu.usage", key), Some(2500.0));

        // The root is never an instance, and the bare slice has no files
        assert!(samples.instances("cgroup.memory.usage").all(|(k, _)| !k.is_empty()));
        assert_eq!(samples.instances("cgroup.memory.usage").count(), 1);
    }

    #[test]
    fn test_sentinels_skipped() {
        let root = unified_root();
        cgroup(
            &root,
            "user.slice",
            &[
                ("memory.current", "0\n"),
                ("memory.max", "max\n"),
                ("memory.swap.max", "9223372036854775807\n"),
                ("cpu.stat", "usage_usec 0\n"),
            ],
        );

        let samples = collect(&root);
        assert!(samples.instance("cgroup.memory.usage", "user.slice").is_none());
        assert!(samples.instance("cgroup.memory.limit", "user.slice").is_none());
        assert!(samples.instance("cgroup.memory.sw-limit", "user.slice").is_none());
        assert!(samples.instance("cgroup.cpu.usage", "user.slice").is_none());
        assert!(samples.is_empty());
    }

    #[test]
    fn test_missing_files_skipped_per_cgroup() {
        let root = unified_root();
        cgroup(&root, "a", &[("cpu.weight", "50\n")]);
        cgroup(&root, "b", &[("memory.current", "123\n")]);

        let samples = collect(&root);
        assert_eq!(samples.instance("cgroup.cpu.shares", "a"), Some(50.0));
        assert!(samples.instance("cgroup.memory.usage", "a").is_none());
        assert_eq!(samples.instance("cgroup.memory.usage", "b"), Some(123.0));
        assert!(samples.instance("cgroup.cpu.shares", "b").is_none());
    }

    #[test]
    fn test_legacy_hierarchy_produces_nothing() {
        let root = TempDir::new().unwrap();
        cgroup(&root, "memory", &[("memory.usage_in_bytes", "4096\n")]);

        let samples = collect(&root);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_version_probe_resolved_once() {
        let root = unified_root();
        cgroup(&root, "a", &[("memory.current", "10\n")]);
        let sampler = CgroupSampler::new(&SamplerConfig::new().with_cgroup_root(root.path()));
        assert!(sampler.is_unified());

        fs::remove_file(root.path().join("cgroup.controllers")).unwrap();
        assert!(sampler.is_unified());

        let mut samples = Samples::new(DESCRIPTIONS);
        sampler.collect(&mut samples).unwrap();
        assert_eq!(samples.instance("cgroup.memory.usage", "a"), Some(10.0));
    }

    #[test]
    fn test_keyed_stat_matches_whole_key() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("cpu.stat");
        fs::write(&path, "usage_usec_total 7\nusage_usec 3000\n").unwrap();
        assert_eq!(read_keyed_stat(&path, "usage_usec"), Some(3000));
        assert_eq!(read_keyed_stat(&path, "nr_periods"), None);
    }
}
