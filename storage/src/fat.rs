//! File Allocation Table (FAT16) volume editing.
//!
//! Everything here works directly on the bytes of a volume image:
//! nothing is mounted and no state survives between two calls,
//! the geometry is re-derived from the boot sector every time.
use crate::device::DeviceError;
use std::{io, path::PathBuf};
use thiserror::Error;

pub mod bs;
pub mod dir;
pub mod dirent;
#[expect(clippy::module_inception, reason = "FS is named after this table")]
pub mod fat;
pub mod format;
pub mod geometry;
pub mod inject;

pub use bs::BootParamBlock;
pub use dir::find_free_root_entry_run;
pub use dirent::{DirEntry, encode_short_name};
pub use fat::find_free_cluster_run;
pub use format::{FormatOptions, Formatted, format_volume};
pub use geometry::{MultiFatWarning, VolumeGeometry, read_geometry};
pub use inject::{Batch, InjectedFile, inject_file};

/// Sector size used by the formatter.
pub const SECTOR_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A FAT16 cluster index.
///
/// Clusters 0 and 1 are reserved, the data region starts at cluster 2.
pub struct Cluster(u16);

impl Cluster {
    /// First cluster of the data region.
    pub const FIRST: Self = Self(2);
    /// Last value that can designate a data cluster.
    const MAX_VALID: u16 = 0xFFEF;

    #[must_use]
    #[inline]
    pub const fn new(cluster: u16) -> Self {
        Self(cluster)
    }

    #[must_use]
    #[inline]
    pub const fn value(&self) -> u16 {
        self.0
    }

    #[must_use]
    #[inline]
    /// Returns true if the index can designate a data cluster.
    pub const fn is_valid(&self) -> bool {
        self.0 >= 2 && self.0 <= Self::MAX_VALID
    }

    #[must_use]
    #[inline]
    /// Returns the cluster `count` positions further, if it exists.
    pub const fn offset(self, count: u16) -> Option<Self> {
        match self.0.checked_add(count) {
            Some(cluster) => Some(Self(cluster)),
            None => None,
        }
    }
}

impl core::fmt::Display for Cluster {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
/// Error type for FAT filesystem operations
pub enum FatError {
    #[error("Unsupported filesystem: {0}")]
    UnsupportedFilesystem(&'static str),
    #[error("Not enough consecutive free clusters ({requested} requested)")]
    InsufficientClusterSpace { requested: u32 },
    #[error("Cannot find {requested} consecutive free root directory entries")]
    InsufficientDirectorySpace { requested: u16 },
    #[error("I/O error")]
    Device(#[from] DeviceError),
    #[error("Cannot read source file")]
    Source(#[source] io::Error),
    #[error("Source ended after {copied} of {expected} bytes")]
    UnexpectedEof { expected: u64, copied: u64 },
    #[error("Volume too small: {0} sectors (more than 8400 required)")]
    VolumeTooSmall(u64),
    #[error("Volume too large: {0} sectors (at most 4194304 supported)")]
    VolumeTooLarge(u64),
    #[error("Unsupported target {}: not a regular file or block device", .0.display())]
    UnsupportedTarget(PathBuf),
    #[error("File too large for FAT16: {0} bytes")]
    FileTooLarge(u64),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

pub type FatResult<T> = Result<T, FatError>;
