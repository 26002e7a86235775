//! Line parser for /proc/diskstats, shared by the disk and block samplers.
//!
//! Column layout (Documentation/ABI/testing/procfs-diskstats):
//! major, minor, name, reads completed, reads merged, sectors read,
//! ms reading, writes completed, writes merged, sectors written, ...

/// The kernel always reports diskstats sectors in 512-byte units
pub(crate) const SECTOR_SIZE: u64 = 512;

/// Device-mapper major number
const DM_MAJOR: u32 = 253;
/// Software RAID (md) major number
const MD_MAJOR: u32 = 9;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DiskStatLine<'a> {
    pub major: u32,
    pub name: &'a str,
    pub reads_merged: u64,
    pub sectors_read: u64,
    pub writes_merged: u64,
    pub sectors_written: u64,
}

impl<'a> DiskStatLine<'a> {
    pub fn parse(line: &'a str) -> Result<Self, String> {
        let parts: Vec<&'a str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            return Err(format!("expected at least 10 fields, found {}", parts.len()));
        }

        let field = |i: usize| {
            parts[i]
                .parse::<u64>()
                .map_err(|e| format!("field {i} ({:?}): {e}", parts[i]))
        };

        Ok(Self {
            major: parts[0]
                .parse()
                .map_err(|e| format!("major number ({:?}): {e}", parts[0]))?,
            name: parts[2],
            reads_merged: field(4)?,
            sectors_read: field(5)?,
            writes_merged: field(8)?,
            sectors_written: field(9)?,
        })
    }

    pub fn bytes_read(&self) -> u64 {
        self.sectors_read * SECTOR_SIZE
    }

    pub fn bytes_written(&self) -> u64 {
        self.sectors_written * SECTOR_SIZE
    }

    /// Whether the line must stay out of whole-system totals: stacked
    /// devices (dm, md) and partitions would count the same I/O twice.
    pub fn is_excluded_from_totals(&self) -> bool {
        if self.major == DM_MAJOR || self.major == MD_MAJOR {
            return true;
        }

        let name = self.name;
        let ends_with_digit = name.chars().last().is_some_and(|c| c.is_ascii_digit());
        if ["sd", "hd", "vd"].iter().any(|p| name.starts_with(p)) && ends_with_digit {
            return true;
        }

        name.starts_with("nvme") && name.contains('p')
    }
}
