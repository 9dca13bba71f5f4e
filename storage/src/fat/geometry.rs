//! Volume layout derived from the BPB.
use super::{BootParamBlock, Cluster, FatError, FatResult, dirent::DIR_ENTRY_SIZE};
use crate::device::Device;
use thiserror::Error;

/// Smallest cluster count of a FAT16 volume.
pub const MIN_CLUSTERS: u32 = 4085;
/// Largest cluster count of a FAT16 volume.
pub const MAX_CLUSTERS: u32 = 65524;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unsupported number of FATs ({fat_count} != 1): only the first FAT is updated")]
/// Non-fatal condition: secondary FAT copies are left stale.
pub struct MultiFatWarning {
    pub fat_count: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Absolute byte offsets of the regions of a FAT16 volume.
pub struct VolumeGeometry {
    fat_offset: u64,
    fat_size: u64,
    root_dir_offset: u64,
    data_offset: u64,
    cluster_count: u32,
    bytes_per_cluster: u32,
    root_entries: u16,
    warning: Option<MultiFatWarning>,
}

impl VolumeGeometry {
    /// Derives the volume layout from `bpb`.
    ///
    /// The volume is rejected unless it is shaped like a FAT16 volume:
    /// `sectors_per_fat` must be set and the cluster count must lie
    /// within [`MIN_CLUSTERS`]..=[`MAX_CLUSTERS`].
    pub fn from_bpb(bpb: &BootParamBlock) -> FatResult<Self> {
        if bpb.sectors_per_fat() == 0 {
            return Err(FatError::UnsupportedFilesystem("sectors per FAT is 0"));
        }
        if bpb.bytes_per_sector() == 0 || bpb.sectors_per_cluster() == 0 {
            return Err(FatError::UnsupportedFilesystem(
                "sector or cluster size is 0",
            ));
        }

        let bytes_per_sector = u64::from(bpb.bytes_per_sector());
        let root_dir_sectors = u64::from(bpb.root_dir_sectors());
        let fat_sectors = u64::from(bpb.sectors_per_fat()) * u64::from(bpb.fat_count());

        let data_sectors = u64::from(bpb.total_sectors())
            .checked_sub(u64::from(bpb.reserved_sectors()) + fat_sectors + root_dir_sectors)
            .ok_or(FatError::UnsupportedFilesystem(
                "metadata regions exceed the volume size",
            ))?;
        let cluster_count = u32::try_from(data_sectors / u64::from(bpb.sectors_per_cluster()))
            .ok()
            .filter(|count| (MIN_CLUSTERS..=MAX_CLUSTERS).contains(count))
            .ok_or(FatError::UnsupportedFilesystem(
                "cluster count is outside of the FAT16 range",
            ))?;

        let fat_offset = bytes_per_sector * u64::from(bpb.reserved_sectors());
        let root_dir_offset = fat_offset + bytes_per_sector * fat_sectors;
        let data_offset = root_dir_offset + bytes_per_sector * root_dir_sectors;

        Ok(Self {
            fat_offset,
            fat_size: bytes_per_sector * u64::from(bpb.sectors_per_fat()),
            root_dir_offset,
            data_offset,
            cluster_count,
            bytes_per_cluster: bpb.bytes_per_cluster(),
            root_entries: bpb.root_entries(),
            warning: (bpb.fat_count() != 1).then_some(MultiFatWarning {
                fat_count: bpb.fat_count(),
            }),
        })
    }

    #[must_use]
    #[inline]
    /// Byte offset of the first FAT.
    pub const fn fat_offset(&self) -> u64 {
        self.fat_offset
    }

    #[must_use]
    #[inline]
    /// Size of one FAT copy, in bytes.
    pub const fn fat_size(&self) -> u64 {
        self.fat_size
    }

    #[must_use]
    #[inline]
    pub const fn root_dir_offset(&self) -> u64 {
        self.root_dir_offset
    }

    #[must_use]
    #[inline]
    pub const fn data_offset(&self) -> u64 {
        self.data_offset
    }

    #[must_use]
    #[inline]
    /// Number of data clusters.
    pub const fn cluster_count(&self) -> u32 {
        self.cluster_count
    }

    #[must_use]
    #[inline]
    pub const fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_cluster
    }

    #[must_use]
    #[inline]
    pub const fn root_entries(&self) -> u16 {
        self.root_entries
    }

    #[must_use]
    #[inline]
    pub const fn warning(&self) -> Option<MultiFatWarning> {
        self.warning
    }

    #[must_use]
    #[inline]
    /// Byte offset of the first byte of `cluster`.
    pub fn cluster_offset(&self, cluster: Cluster) -> u64 {
        debug_assert!(cluster.is_valid());
        self.data_offset
            + u64::from(self.bytes_per_cluster) * u64::from(cluster.value().saturating_sub(2))
    }

    #[must_use]
    #[inline]
    /// Byte offset of the entry of `cluster` in the first FAT.
    pub fn fat_entry_offset(&self, cluster: Cluster) -> u64 {
        self.fat_offset + 2 * u64::from(cluster.value())
    }

    #[must_use]
    #[inline]
    /// Byte offset of the root directory slot `index`.
    pub fn root_entry_offset(&self, index: u16) -> u64 {
        self.root_dir_offset + DIR_ENTRY_SIZE as u64 * u64::from(index)
    }

    #[must_use]
    #[inline]
    /// Returns a human readable description of the volume.
    pub const fn summary<'a>(&'a self, bpb: &'a BootParamBlock) -> Summary<'a> {
        Summary {
            bpb,
            geometry: self,
        }
    }
}

/// Reads the BPB of the volume held by `device` and derives its geometry.
pub fn read_geometry<D: Device + ?Sized>(
    device: &mut D,
) -> FatResult<(BootParamBlock, VolumeGeometry)> {
    let bpb = BootParamBlock::read(device)?;
    let geometry = VolumeGeometry::from_bpb(&bpb)?;

    log::debug!(
        "FAT at {:#x}, root directory at {:#x}, data at {:#x}, {} clusters",
        geometry.fat_offset,
        geometry.root_dir_offset,
        geometry.data_offset,
        geometry.cluster_count
    );
    if let Some(warning) = geometry.warning {
        log::warn!("{warning}");
    }

    Ok((bpb, geometry))
}

/// Display adapter returned by [`VolumeGeometry::summary`].
pub struct Summary<'a> {
    bpb: &'a BootParamBlock,
    geometry: &'a VolumeGeometry,
}

impl core::fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let bpb = self.bpb;
        writeln!(f, "{} bytes per sector", bpb.bytes_per_sector())?;
        writeln!(f, "{} sectors per cluster", bpb.sectors_per_cluster())?;
        writeln!(f, "{} reserved sectors", bpb.reserved_sectors())?;
        writeln!(f, "{} FATs", bpb.fat_count())?;
        writeln!(f, "{} entries in root directory", bpb.root_entries())?;
        writeln!(f, "{} sectors total", bpb.total_sectors())?;
        writeln!(f, "{} sectors per FAT", bpb.sectors_per_fat())?;
        writeln!(f, "{} data clusters", self.geometry.cluster_count)?;
        writeln!(f, "FAT region at offset {:#x}", self.geometry.fat_offset)?;
        writeln!(
            f,
            "Root directory region at offset {:#x}",
            self.geometry.root_dir_offset
        )?;
        write!(f, "Data region at offset {:#x}", self.geometry.data_offset)
    }
}
