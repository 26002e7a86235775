//! Network interface counters from /proc/net/dev.

use super::{read_required, Sampler};
use crate::config::SamplerConfig;
use crate::error::Result;
use crate::samples::{MetricDescriptor, Samples, Semantics, Units};
use std::path::PathBuf;
use tracing::debug;

pub const DESCRIPTIONS: &[MetricDescriptor] = &[
    MetricDescriptor::new("network.interface.tx", Units::Bytes, Semantics::Counter, true),
    MetricDescriptor::new("network.interface.rx", Units::Bytes, Semantics::Counter, true),
];

/// Receive and transmit byte counters per interface, loopback included.
pub struct NetworkSampler {
    netdev_path: PathBuf,
}

impl NetworkSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            netdev_path: config.proc_root.join("net").join("dev"),
        }
    }
}

impl Sampler for NetworkSampler {
    fn name(&self) -> &'static str {
        "network"
    }

    fn descriptions(&self) -> &'static [MetricDescriptor] {
        DESCRIPTIONS
    }

    fn collect(&self, samples: &mut Samples) -> Result<()> {
        let netdev = read_required(&self.netdev_path)?;

        for line in netdev.lines() {
            // Header lines carry no "iface:" prefix
            let Some((interface, counters)) = line.split_once(':') else {
                continue;
            };

            match parse_counters(counters) {
                Some((rx, tx)) => {
                    let interface = interface.trim();
                    samples.set_instance("network.interface.rx", interface, rx);
                    samples.set_instance("network.interface.tx", interface, tx);
                }
                None => debug!("Skipping /proc/net/dev line {line:?}"),
            }
        }

        Ok(())
    }
}

/// Receive bytes are the first counter, transmit bytes the ninth.
fn parse_counters(counters: &str) -> Option<(u64, u64)> {
    let parts: Vec<&str> = counters.split_whitespace().collect();
    let rx = parts.first()?.parse().ok()?;
    let tx = parts.get(8)?.parse().ok()?;
    Some((rx, tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::Value;
    use std::fs;
    use tempfile::TempDir;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  123456     100    0    0    0     0          0         0   123456     100    0    0    0     0       0          0
  eth0: 98765432  65432    1    2    0     0          0        10 12345678  43210    0    0    0     0       0          0
  eth1:4294967296 1 0 0 0 0 0 0 17 1 0 0 0 0 0 0
";

    #[test]
    fn test_interfaces_keyed_by_name() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("net")).unwrap();
        fs::write(dir.path().join("net").join("dev"), NET_DEV).unwrap();
        let sampler = NetworkSampler::new(&SamplerConfig::new().with_proc_root(dir.path()));
        let mut samples = Samples::new(DESCRIPTIONS);
        sampler.collect(&mut samples).unwrap();

        assert_eq!(samples.instance("network.interface.rx", "lo"), Some(123456.0));
        assert_eq!(samples.instance("network.interface.tx", "lo"), Some(123456.0));
        assert_eq!(samples.instance("network.interface.rx", "eth0"), Some(98765432.0));
        assert_eq!(samples.instance("network.interface.tx", "eth0"), Some(12345678.0));
        assert_eq!(samples.instance("network.interface.rx", "eth1"), Some(4294967296.0));
        assert_eq!(samples.instance("network.interface.tx", "eth1"), Some(17.0));
        assert_eq!(samples.instances("network.interface.rx").count(), 3);
    }

    #[test]
    fn test_counters_past_float_precision_exact() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("net")).unwrap();
        fs::write(
            dir.path().join("net").join("dev"),
            "  eth0: 9007199254740993 1 0 0 0 0 0 0 18446744073709551615 1 0 0 0 0 0 0\n",
        )
        .unwrap();
        let sampler = NetworkSampler::new(&SamplerConfig::new().with_proc_root(dir.path()));
        let mut samples = Samples::new(DESCRIPTIONS);
        sampler.collect(&mut samples).unwrap();

        assert_eq!(
            samples.instance_value("network.interface.rx", "eth0"),
            Some(Value::Integer(9_007_199_254_740_993))
        );
        assert_eq!(
            samples.instance_value("network.interface.tx", "eth0"),
            Some(Value::Integer(u64::MAX))
        );
    }

    #[test]
    fn test_short_counter_row_skipped() {
        assert_eq!(parse_counters(" 1 2 3"), None);
        assert_eq!(parse_counters(" 1 2 3 4 5 6 7 8 9"), Some((1, 9)));
    }
}
