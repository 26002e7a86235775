//! CPU temperature from hwmon sensors.
//!
//! Sensors are discovered once under `/sys/class/hwmon` and cached for the
//! lifetime of the sampler, since hardware monitors cannot be hotplugged.
//! Only devices driven by a known CPU sensor driver are considered.

use super::{read_optional, read_required, Sampler};
use crate::config::SamplerConfig;
use crate::error::{Error, Result};
use crate::samples::{MetricDescriptor, Samples, Semantics, Units};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

pub const DESCRIPTIONS: &[MetricDescriptor] = &[MetricDescriptor::new(
    "cpu.temperature",
    Units::Celsius,
    Semantics::Instant,
    true,
)];

/// hwmon driver names that report CPU temperatures
const CPU_SENSOR_DRIVERS: &[&str] = &["coretemp", "cpu_thermal", "k8temp", "k10temp", "atk0110"];

/// Samples every discovered CPU temperature sensor, keyed by its input path.
pub struct CpuTemperatureSampler {
    hwmon_root: PathBuf,
    sensors: OnceLock<Vec<PathBuf>>,
}

impl CpuTemperatureSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            hwmon_root: config.hwmon_root(),
            sensors: OnceLock::new(),
        }
    }

    /// Cached sensor input files, discovering them on first use.
    pub fn sensors(&self) -> &[PathBuf] {
        self.sensors.get_or_init(|| {
            let sensors = discover_cpu_sensors(&self.hwmon_root);
            info!("Discovered {} CPU temperature sensor(s)", sensors.len());
            sensors
        })
    }
}

impl Sampler for CpuTemperatureSampler {
    fn name(&self) -> &'static str {
        "cpu-temperature"
    }

    fn descriptions(&self) -> &'static [MetricDescriptor] {
        DESCRIPTIONS
    }

    fn collect(&self, samples: &mut Samples) -> Result<()> {
        let mut readings = Vec::with_capacity(self.sensors().len());

        for sensor_path in self.sensors() {
            let raw = read_required(sensor_path)?;
            let millidegrees: i64 = raw
                .trim()
                .parse()
                .map_err(|e| Error::parse(sensor_path, raw.trim(), format!("{e}")))?;

            // Sensors read 0 until the driver has a first measurement
            if millidegrees == 0 {
                debug!("{} not ready, skipping temperatures this pass", sensor_path.display());
                return Ok(());
            }

            readings.push((sensor_path, millidegrees as f64 / 1000.0));
        }

        for (sensor_path, celsius) in readings {
            samples.set_instance(
                "cpu.temperature",
                sensor_path.to_string_lossy(),
                celsius,
            );
        }

        Ok(())
    }
}

/// Walk `hwmon0`, `hwmon1`, ... until one is missing and collect the CPU
/// sensor inputs of every device driven by a known CPU driver.
fn discover_cpu_sensors(hwmon_root: &Path) -> Vec<PathBuf> {
    let mut sensors = Vec::new();

    for index in 0.. {
        let device = hwmon_root.join(format!("hwmon{index}"));
        if !device.exists() {
            break;
        }

        let Some(name) = read_optional(&device.join("name")) else {
            continue;
        };
        let name = name.trim();
        if CPU_SENSOR_DRIVERS.contains(&name) {
            sensors.extend(detect_device_sensors(&device, name));
        }
    }

    sensors
}

/// `temp1_input`, `temp2_input`, ... of one hwmon device, filtered by label.
fn detect_device_sensors(device: &Path, name: &str) -> Vec<PathBuf> {
    let mut sensors = Vec::new();

    for index in 1.. {
        let input = device.join(format!("temp{index}_input"));
        if !input.exists() {
            break;
        }

        let label = read_optional(&device.join(format!("temp{index}_label")))
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty());

        if is_cpu_sensor(name, label.as_deref()) {
            sensors.push(input);
        }
    }

    sensors
}

fn is_cpu_sensor(name: &str, label: Option<&str>) -> bool {
    match label {
        // atk0110 boards expose many sensors; only one is the CPU
        Some(label) if name == "atk0110" && label != "CPU Temperature" => false,
        // Tctl is the AMD fan control target, offset from the real die temperature
        Some("Tctl") => false,
        Some(_) => true,
        // ARM thermal zones are unlabelled
        None => name == "cpu_thermal",
    }
}
