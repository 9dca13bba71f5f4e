use super::{Cluster, FatError, FatResult, VolumeGeometry};
use crate::device::Device;

/// Raw end-of-chain marker written by this crate.
pub const END_OF_CHAIN: u16 = 0xFFFF;
/// Raw value of FAT entry 0 on a fixed-disk volume (media descriptor echo).
pub const MEDIA_ENTRY: u16 = 0xFFF8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// FAT16 table entry
pub enum FatEntry {
    /// Free cluster
    Free,
    /// Used cluster, pointing to the next cluster in the chain
    Next(Cluster),
    /// Last cluster in the chain
    EndOfChain,
    /// Bad cluster
    Bad,
    /// Reserved cluster
    Reserved,
}

impl FatEntry {
    #[must_use]
    pub const fn from_raw(value: u16) -> Self {
        match value {
            0 => Self::Free,
            0xFFF7 => Self::Bad,
            0xFFF0..=0xFFF6 => Self::Reserved,
            0xFFF8..=0xFFFF => Self::EndOfChain,
            val => Self::Next(Cluster::new(val)),
        }
    }

    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            Self::Free => 0,
            Self::Next(next) => next.value(),
            Self::EndOfChain => END_OF_CHAIN,
            Self::Bad => 0xFFF7,
            Self::Reserved => 0xFFF6,
        }
    }
}

/// FAT16 entry handling over an in-memory copy of the table
pub(crate) mod fat16 {
    use super::{Cluster, FatEntry};

    pub fn read_fat_entry(fat: &[u8], cluster: Cluster) -> Option<FatEntry> {
        let offset = usize::from(cluster.value()) * 2;
        let bytes = fat.get(offset..offset + 2)?;
        Some(FatEntry::from_raw(u16::from_le_bytes([bytes[0], bytes[1]])))
    }
}

/// A view over the bytes of the first FAT.
pub struct FatTable<'a> {
    raw: &'a [u8],
}

impl<'a> FatTable<'a> {
    #[must_use]
    #[inline]
    pub const fn new(raw: &'a [u8]) -> Self {
        Self { raw }
    }

    #[must_use]
    #[inline]
    /// Returns the entry for `cluster`, or `None` past the end of the table.
    pub fn get(&self, cluster: Cluster) -> Option<FatEntry> {
        fat16::read_fat_entry(self.raw, cluster)
    }

    #[must_use]
    /// Returns the first cluster of the first run of `count` free entries.
    ///
    /// Clusters are scanned from [`Cluster::FIRST`] while below `limit`;
    /// a run has to end below that bound to qualify.
    pub fn find_free_run(&self, count: u16, limit: u32) -> Option<Cluster> {
        let mut run_start = Cluster::FIRST;
        let mut run_len = 0u16;

        for value in 2..limit {
            let cluster = Cluster::new(u16::try_from(value).ok()?);
            if self.get(cluster)? == FatEntry::Free {
                if run_len == 0 {
                    run_start = cluster;
                }
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            } else {
                run_len = 0;
            }
        }
        None
    }

    #[must_use]
    /// Counts the free entries among the data clusters.
    pub fn count_free(&self, cluster_count: u32) -> u32 {
        let last = u16::try_from(cluster_count + 1).unwrap_or(u16::MAX);
        let free = (Cluster::FIRST.value()..=last)
            .map_while(|value| self.get(Cluster::new(value)))
            .filter(|entry| *entry == FatEntry::Free)
            .count();
        u32::try_from(free).unwrap_or(u32::MAX)
    }
}

/// Reads the part of the first FAT that covers the data clusters.
pub fn read_table<D: Device + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
) -> FatResult<Vec<u8>> {
    let wanted = (u64::from(geometry.cluster_count()) + 2) * 2;
    let len = usize::try_from(wanted.min(geometry.fat_size()))
        .map_err(|_| FatError::InvalidParameter("FAT does not fit in memory"))?;

    let mut raw = vec![0u8; len];
    device.read_at(&mut raw, geometry.fat_offset())?;
    Ok(raw)
}

/// Finds the first run of `count` contiguous free clusters.
///
/// The scan starts at cluster 2 and stops at `cluster_count - count`.
pub fn find_free_cluster_run<D: Device + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
    count: u16,
) -> FatResult<Cluster> {
    if count == 0 {
        return Err(FatError::InvalidParameter("cluster count must be positive"));
    }

    let raw = read_table(device, geometry)?;
    let limit = geometry.cluster_count().saturating_sub(u32::from(count));

    let first = FatTable::new(&raw)
        .find_free_run(count, limit)
        .ok_or(FatError::InsufficientClusterSpace {
            requested: u32::from(count),
        })?;
    log::debug!("Found {count} free clusters starting at cluster {first}");
    Ok(first)
}

/// Counts the free data clusters of the first FAT.
pub fn count_free_clusters<D: Device + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
) -> FatResult<u32> {
    let raw = read_table(device, geometry)?;
    Ok(FatTable::new(&raw).count_free(geometry.cluster_count()))
}

/// Links `count` clusters starting at `first` into a single chain.
///
/// Only the first FAT copy is written.
pub fn write_chain<D: Device + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
    first: Cluster,
    count: u16,
) -> FatResult<()> {
    if count == 0 {
        return Ok(());
    }
    let last = first
        .offset(count - 1)
        .filter(Cluster::is_valid)
        .ok_or(FatError::InvalidParameter("cluster chain out of range"))?;

    let mut raw = vec![0u8; usize::from(count) * 2];
    let mut next = first;
    for slot in raw.chunks_exact_mut(2) {
        next = next
            .offset(1)
            .ok_or(FatError::InvalidParameter("cluster chain out of range"))?;
        let entry = if next > last {
            FatEntry::EndOfChain
        } else {
            FatEntry::Next(next)
        };
        slot.copy_from_slice(&entry.to_raw().to_le_bytes());
    }

    device.write_at(&raw, geometry.fat_entry_offset(first))?;
    log::debug!("Linked clusters {first}..={last}");
    Ok(())
}

/// Reads the FAT entry of `cluster` from the first FAT.
pub fn read_entry<D: Device + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
    cluster: Cluster,
) -> FatResult<FatEntry> {
    let mut raw = [0u8; 2];
    device.read_at(&mut raw, geometry.fat_entry_offset(cluster))?;
    Ok(FatEntry::from_raw(u16::from_le_bytes(raw)))
}
