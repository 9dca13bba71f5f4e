//! Blank FAT16 volume creation.
use super::{
    BootParamBlock, FatError, FatResult, SECTOR_SIZE,
    bs::BootSector,
    fat::{END_OF_CHAIN, MEDIA_ENTRY},
    geometry::MAX_CLUSTERS,
};
use crate::device::Device;
use std::time::{SystemTime, UNIX_EPOCH};

/// Volumes of at most this many sectors are refused.
pub const MIN_SECTORS: u64 = 8400;
/// Largest supported volume, in sectors (2 GiB).
pub const MAX_SECTORS: u64 = 4_194_304;

/// Fixed disk.
const MEDIA_DESCRIPTOR: u8 = 0xF8;
/// FAT16 entries per 512-byte sector.
const ENTRIES_PER_SECTOR: u64 = 256;
/// Sectors zeroed per write.
const CLEAR_CHUNK_SECTORS: u64 = 64;

/// Upper sector bound, sectors per cluster and root entries of each size tier.
const TIERS: [(u64, u8, u16); 6] = [
    (32_680, 2, 128),
    (262_144, 4, 256),
    (524_288, 8, 512),
    (1_048_576, 16, 512),
    (2_097_152, 32, 512),
    (MAX_SECTORS, 64, 512),
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Parameters of [`format_volume`].
pub struct FormatOptions {
    total_sectors: Option<u64>,
    volume_id: Option<u32>,
    volume_label: Option<[u8; 11]>,
}

impl FormatOptions {
    #[must_use]
    #[inline]
    /// Formats `total_sectors` sectors instead of the whole device.
    pub const fn with_total_sectors(mut self, total_sectors: u64) -> Self {
        self.total_sectors = Some(total_sectors);
        self
    }

    #[must_use]
    #[inline]
    /// Pins the volume serial number. Defaults to the current time.
    pub const fn with_volume_id(mut self, volume_id: u32) -> Self {
        self.volume_id = Some(volume_id);
        self
    }

    #[must_use]
    /// Sets the volume label stored in the boot sector.
    ///
    /// The label is upper-cased, cut at 11 characters and padded with spaces.
    pub fn with_volume_label(mut self, label: &str) -> Self {
        let mut raw = [b' '; 11];
        for (slot, c) in raw.iter_mut().zip(label.chars()) {
            *slot = if c.is_ascii() && !c.is_ascii_control() {
                c.to_ascii_uppercase() as u8
            } else {
                b'_'
            };
        }
        self.volume_label = Some(raw);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Outcome of [`format_volume`].
pub struct Formatted {
    bpb: BootParamBlock,
    volume_id: u32,
    data_bytes: u64,
}

impl Formatted {
    #[must_use]
    #[inline]
    pub const fn bpb(&self) -> &BootParamBlock {
        &self.bpb
    }

    #[must_use]
    #[inline]
    pub const fn volume_id(&self) -> u32 {
        self.volume_id
    }

    #[must_use]
    #[inline]
    /// Bytes left for file data once the metadata regions are laid out.
    pub const fn data_bytes(&self) -> u64 {
        self.data_bytes
    }
}

/// Computes the BPB of a blank FAT16 volume of `total_sectors` 512-byte sectors.
///
/// When the size tier would yield more clusters than FAT16 allows, the
/// recorded sector count is lowered so that the volume ends after the last
/// addressable cluster.
pub fn compute_bpb(total_sectors: u64) -> FatResult<BootParamBlock> {
    if total_sectors <= MIN_SECTORS {
        return Err(FatError::VolumeTooSmall(total_sectors));
    }
    if total_sectors > MAX_SECTORS {
        return Err(FatError::VolumeTooLarge(total_sectors));
    }

    let (_, sectors_per_cluster, root_entries) = TIERS
        .into_iter()
        .find(|(limit, _, _)| total_sectors <= *limit)
        .ok_or(FatError::VolumeTooLarge(total_sectors))?;
    let spc = u64::from(sectors_per_cluster);

    let root_dir_sectors = (u64::from(root_entries) * 32).div_ceil(SECTOR_SIZE as u64);
    let usable = total_sectors - 1 - root_dir_sectors - 2 * spc;
    let mut sectors_per_fat = usable.div_ceil(1 + ENTRIES_PER_SECTOR * spc);

    let clusters_for = |sectors_per_fat: u64| {
        (total_sectors - 1 - root_dir_sectors - sectors_per_fat) / spc
    };
    while ENTRIES_PER_SECTOR * sectors_per_fat < clusters_for(sectors_per_fat) + 2 {
        sectors_per_fat += 1;
    }

    let max_clusters = u64::from(MAX_CLUSTERS);
    let recorded_sectors = if clusters_for(sectors_per_fat) > max_clusters {
        let capped = 1 + root_dir_sectors + sectors_per_fat + max_clusters * spc;
        log::debug!("Volume capped at {capped} of {total_sectors} sectors");
        capped
    } else {
        total_sectors
    };

    // Both fit: the size was checked against MAX_SECTORS and the FAT never
    // exceeds 256 sectors.
    let recorded_sectors = u32::try_from(recorded_sectors)
        .map_err(|_| FatError::VolumeTooLarge(total_sectors))?;
    let sectors_per_fat = u16::try_from(sectors_per_fat)
        .map_err(|_| FatError::VolumeTooLarge(total_sectors))?;

    Ok(BootParamBlock::default()
        .with_bytes_per_sector(SECTOR_SIZE as u16)
        .with_sectors_per_cluster(sectors_per_cluster)
        .with_reserved_sectors(1)
        .with_fat_count(1)
        .with_root_entries(root_entries)
        .with_total_sectors(recorded_sectors)
        .with_media_descriptor(MEDIA_DESCRIPTOR)
        .with_sectors_per_fat(sectors_per_fat)
        .with_chs(1, 1))
}

/// Writes a blank FAT16 volume onto `device`.
///
/// The volume spans the whole device unless
/// [`FormatOptions::with_total_sectors`] says otherwise. Only the boot
/// sector, the FAT and the root directory are written: the data region is
/// left untouched.
pub fn format_volume<D: Device + ?Sized>(
    device: &mut D,
    options: &FormatOptions,
) -> FatResult<Formatted> {
    let total_sectors = match options.total_sectors {
        Some(total_sectors) => total_sectors,
        None => device.size()? / SECTOR_SIZE as u64,
    };
    let bpb = compute_bpb(total_sectors)?;

    let volume_id = options.volume_id.unwrap_or_else(volume_id_from_time);
    let boot_sector = BootSector::new_fat16(bpb)
        .with_volume_id(volume_id)
        .with_volume_label(options.volume_label.unwrap_or(BootSector::NO_NAME));
    device.write_at(&boot_sector.encode(), 0)?;

    let cleared = u64::from(bpb.reserved_sectors()) - 1
        + u64::from(bpb.root_dir_sectors())
        + u64::from(bpb.fat_count()) * u64::from(bpb.sectors_per_fat());
    clear_sectors(device, 1, cleared)?;

    let mut reserved_entries = [0u8; 4];
    reserved_entries[..2].copy_from_slice(&MEDIA_ENTRY.to_le_bytes());
    reserved_entries[2..].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    let fat_offset = u64::from(bpb.reserved_sectors()) * SECTOR_SIZE as u64;
    device.write_at(&reserved_entries, fat_offset)?;
    device.sync()?;

    let sector_bytes = SECTOR_SIZE as u64;
    let data_bytes = sector_bytes * u64::from(bpb.total_sectors()) - sector_bytes * (1 + cleared);
    log::info!(
        "Formatted {} sectors: {} sectors per cluster, {} root entries, {} sectors per FAT, {} bytes usable",
        bpb.total_sectors(),
        bpb.sectors_per_cluster(),
        bpb.root_entries(),
        bpb.sectors_per_fat(),
        data_bytes
    );

    Ok(Formatted {
        bpb,
        volume_id,
        data_bytes,
    })
}

/// Zeroes `count` sectors starting at sector `first`.
fn clear_sectors<D: Device + ?Sized>(device: &mut D, first: u64, count: u64) -> FatResult<()> {
    let zeros = [0u8; SECTOR_SIZE * CLEAR_CHUNK_SECTORS as usize];
    let mut sector = first;
    let end = first + count;

    while sector < end {
        let chunk = (end - sector).min(CLEAR_CHUNK_SECTORS);
        let len = usize::try_from(chunk).unwrap_or(CLEAR_CHUNK_SECTORS as usize) * SECTOR_SIZE;
        device.write_at(&zeros[..len], sector * SECTOR_SIZE as u64)?;
        sector += chunk;
    }
    log::debug!("Cleared sectors {first}..{end}");
    Ok(())
}

fn volume_id_from_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u32::try_from(elapsed.as_secs() % (1 << 32)).unwrap_or_default()
        })
}
