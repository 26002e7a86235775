//! Host metric samplers for Linux.
//!
//! Each [`Sampler`] parses one family of kernel pseudo-files (`/proc`,
//! `/sys/class/hwmon`, `/sys/fs/cgroup`) and writes normalized values into a
//! shared [`Samples`] sink. The scheduling of passes and the transport of
//! the resulting samples are left to the caller; see `src/main.rs` for a
//! minimal driver.

pub mod config;
pub mod error;
pub mod logging;
pub mod pass;
pub mod samplers;
pub mod samples;

pub use config::SamplerConfig;
pub use error::{Error, Result};
pub use pass::{collect_pass, collect_pass_parallel};
pub use samplers::{Sampler, SamplerKind};
pub use samples::{MetricDescriptor, SampleValue, Samples, Semantics, Units, Value};
