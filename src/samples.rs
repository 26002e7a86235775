//! Metric descriptors and the per-pass sample sink.
//!
//! Every sampler declares a static table of [`MetricDescriptor`]s. A
//! [`Samples`] sink is shaped from those tables before a pass: scalar metrics
//! hold one number, instanced metrics hold a map from instance key (core id,
//! device name, cgroup path, ...) to number.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Physical unit of a metric. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Bytes,
    Millisec,
    Celsius,
    Count,
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Units::Bytes => "bytes",
            Units::Millisec => "millisec",
            Units::Celsius => "celsius",
            Units::Count => "count",
        })
    }
}

/// How consecutive values of a metric relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Semantics {
    /// Monotonically non-decreasing; consumers difference successive samples.
    Counter,
    /// Point-in-time gauge.
    Instant,
}

impl fmt::Display for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Semantics::Counter => "counter",
            Semantics::Instant => "instant",
        })
    }
}

/// Static metadata for one metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub units: Units,
    pub semantics: Semantics,
    pub instanced: bool,
}

impl MetricDescriptor {
    pub const fn new(
        name: &'static str,
        units: Units,
        semantics: Semantics,
        instanced: bool,
    ) -> Self {
        Self {
            name,
            units,
            semantics,
            instanced,
        }
    }
}

/// One number in a pass.
///
/// Byte and event counters stay integers so they remain exact past 2^53;
/// derived quantities (milliseconds from ticks, degrees) are floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(u64),
    Float(f64),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Integer(v) => v as f64,
            Value::Float(v) => v,
        }
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

/// The value of one metric within a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    Scalar(Value),
    Instanced(BTreeMap<String, Value>),
}

impl SampleValue {
    pub fn as_scalar(&self) -> Option<Value> {
        match self {
            SampleValue::Scalar(v) => Some(*v),
            SampleValue::Instanced(_) => None,
        }
    }

    pub fn as_instanced(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            SampleValue::Instanced(map) => Some(map),
            SampleValue::Scalar(_) => None,
        }
    }
}

/// Sink written by all samplers during one pass.
///
/// The shape of each metric is fixed by its descriptor when the sink is
/// built. Writes to undeclared names, or writes of the wrong shape, are
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct Samples {
    instanced: BTreeMap<&'static str, bool>,
    values: BTreeMap<&'static str, SampleValue>,
}

impl Samples {
    /// Build a sink shaped for the given descriptors.
    pub fn new<'a>(descriptors: impl IntoIterator<Item = &'a MetricDescriptor>) -> Self {
        let mut samples = Self::default();
        for descriptor in descriptors {
            samples.declare(descriptor);
        }
        samples
    }

    fn declare(&mut self, descriptor: &MetricDescriptor) {
        self.instanced.insert(descriptor.name, descriptor.instanced);
        if descriptor.instanced {
            self.values
                .entry(descriptor.name)
                .or_insert_with(|| SampleValue::Instanced(BTreeMap::new()));
        }
    }

    /// Record the value of a scalar metric.
    pub fn set(&mut self, name: &'static str, value: impl Into<Value>) {
        match self.instanced.get(name) {
            Some(false) => {
                self.values.insert(name, SampleValue::Scalar(value.into()));
            }
            _ => {
                tracing::warn!(metric = name, "dropping scalar write to non-scalar metric");
            }
        }
    }

    /// Record the value of one instance of an instanced metric.
    pub fn set_instance(
        &mut self,
        name: &'static str,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) {
        match self.values.get_mut(name) {
            Some(SampleValue::Instanced(map)) => {
                map.insert(key.into(), value.into());
            }
            _ => {
                tracing::warn!(metric = name, "dropping instance write to non-instanced metric");
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SampleValue> {
        self.values.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name)
            .and_then(SampleValue::as_scalar)
            .map(Value::as_f64)
    }

    pub fn instance(&self, name: &str, key: &str) -> Option<f64> {
        self.instance_value(name, key).map(Value::as_f64)
    }

    /// The stored value of one instance, without conversion to float.
    pub fn instance_value(&self, name: &str, key: &str) -> Option<Value> {
        self.get(name)
            .and_then(SampleValue::as_instanced)
            .and_then(|map| map.get(key).copied())
    }

    /// Instances recorded for `name`, empty if none or not instanced.
    pub fn instances(&self, name: &str) -> impl Iterator<Item = (&str, f64)> {
        self.get(name)
            .and_then(SampleValue::as_instanced)
            .into_iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v.as_f64())))
    }

    /// Fold a sink filled by one sampler into this one.
    pub fn merge(&mut self, other: Samples) {
        for (name, instanced) in other.instanced {
            self.instanced.entry(name).or_insert(instanced);
        }
        for (name, value) in other.values {
            match value {
                SampleValue::Instanced(src) => match self.values.get_mut(name) {
                    Some(SampleValue::Instanced(dst)) => dst.extend(src),
                    _ => {
                        self.values.insert(name, SampleValue::Instanced(src));
                    }
                },
                scalar => {
                    self.values.insert(name, scalar);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &SampleValue)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }

    /// Number of metrics holding at least one value.
    pub fn len(&self) -> usize {
        self.values
            .values()
            .filter(|v| !matches!(v, SampleValue::Instanced(map) if map.is_empty()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Samples {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}
