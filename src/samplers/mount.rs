//! Filesystem capacity for block-device mounts listed in /proc/mounts.

use super::{read_required, Sampler};
use crate::config::SamplerConfig;
use crate::error::{Error, Result};
use crate::samples::{MetricDescriptor, Samples, Semantics, Units};
use std::ffi::CString;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DESCRIPTIONS: &[MetricDescriptor] = &[
    MetricDescriptor::new("mount.total", Units::Bytes, Semantics::Instant, true),
    MetricDescriptor::new("mount.used", Units::Bytes, Semantics::Instant, true),
];

/// Capacity of one mounted filesystem, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsUsage {
    pub total: u64,
    pub used: u64,
}

impl FsUsage {
    /// Capacity from statvfs block counts. Used space counts blocks reserved
    /// for root as used (`f_bfree`, not `f_bavail`).
    pub fn from_blocks(fragment_size: u64, blocks: u64, free_blocks: u64) -> Self {
        let total = fragment_size * blocks;
        let free = fragment_size * free_blocks;
        Self {
            total,
            used: total.saturating_sub(free),
        }
    }
}

/// Samples total and used bytes per mount point.
pub struct MountSampler {
    mounts_path: PathBuf,
}

impl MountSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            mounts_path: config.proc_file("mounts"),
        }
    }
}

impl Sampler for MountSampler {
    fn name(&self) -> &'static str {
        "mount"
    }

    fn descriptions(&self) -> &'static [MetricDescriptor] {
        DESCRIPTIONS
    }

    fn collect(&self, samples: &mut Samples) -> Result<()> {
        let mounts = read_required(&self.mounts_path)?;

        for line in mounts.lines() {
            // Only real devices; proc, tmpfs, cgroup2 and friends don't start with '/'
            if !line.starts_with('/') {
                continue;
            }

            let Some(mount_point) = line.split_whitespace().nth(1) else {
                continue;
            };
            let mount_point = unescape_mount_path(mount_point);

            match fs_usage(Path::new(&mount_point)) {
                Ok(usage) => {
                    samples.set_instance("mount.total", mount_point.as_str(), usage.total);
                    samples.set_instance("mount.used", mount_point, usage.used);
                }
                Err(e) => debug!("Skipping mount: {e}"),
            }
        }

        Ok(())
    }
}

/// Decode the octal escapes the kernel uses for whitespace and backslashes
/// in mount paths (`\040` for space, `\134` for backslash).
fn unescape_mount_path(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(digits) = bytes.get(i + 1..i + 4) {
                if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                    let value = digits
                        .iter()
                        .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                    if let Ok(value) = u8::try_from(value) {
                        out.push(value);
                        i += 4;
                        continue;
                    }
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Query statvfs(3) for the filesystem containing `path`.
pub fn fs_usage(path: &Path) -> Result<FsUsage> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| Error::Statvfs {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, e),
    })?;
    let mut statvfs = MaybeUninit::<libc::statvfs>::uninit();

    let result = unsafe { libc::statvfs(c_path.as_ptr(), statvfs.as_mut_ptr()) };
    if result != 0 {
        return Err(Error::Statvfs {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }

    let statvfs = unsafe { statvfs.assume_init() };
    Ok(FsUsage::from_blocks(
        statvfs.f_frsize as u64,
        statvfs.f_blocks as u64,
        statvfs.f_bfree as u64,
    ))
}
