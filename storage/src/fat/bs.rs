//! Boot sector and BIOS Parameter Block (BPB).
//!
//! Both structures are encoded and decoded field by field, in little-endian,
//! from plain byte buffers.
use super::{FatError, FatResult, SECTOR_SIZE};
use crate::device::Device;

/// Byte offset of the BPB within the volume.
pub const BPB_OFFSET: u64 = 0x0B;
/// Size of the encoded BPB, in bytes.
pub const BPB_SIZE: usize = 25;

/// BIOS Parameter Block (BPB) for FAT12/16 file systems.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootParamBlock {
    /// Bytes per sector.
    bytes_per_sector: u16,
    /// Sectors per cluster.
    sectors_per_cluster: u8,
    /// Reserved sectors, boot sector included.
    reserved_sectors: u16,
    /// Number of FATs.
    fat_count: u8,
    /// Number of 32-byte slots in the root directory.
    root_entries: u16,
    /// Total sectors in the file system.
    ///
    /// If the total number of sectors exceeds `u16::MAX`, this field is set to 0
    /// and `total_sectors_large` is used instead.
    total_sectors: u16,
    /// Driver type.
    ///
    /// Example: 0xF8 for fixed disk and 0xF0 for removable disk.
    media_descriptor: u8,
    /// Sectors per FAT.
    ///
    /// This field is 0 on FAT32 file systems.
    sectors_per_fat: u16,
    sectors_per_track: u16,
    heads: u16,
    hidden_sectors: u32,
    total_sectors_large: u32,
}

impl BootParamBlock {
    #[must_use]
    /// Decodes a BPB from its 25-byte on-disk representation.
    pub fn decode(raw: &[u8; BPB_SIZE]) -> Self {
        let u16_at = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);

        Self {
            bytes_per_sector: u16_at(0),
            sectors_per_cluster: raw[2],
            reserved_sectors: u16_at(3),
            fat_count: raw[5],
            root_entries: u16_at(6),
            total_sectors: u16_at(8),
            media_descriptor: raw[10],
            sectors_per_fat: u16_at(11),
            sectors_per_track: u16_at(13),
            heads: u16_at(15),
            hidden_sectors: u32_at(17),
            total_sectors_large: u32_at(21),
        }
    }

    #[must_use]
    /// Encodes the BPB into its 25-byte on-disk representation.
    pub fn encode(&self) -> [u8; BPB_SIZE] {
        let mut raw = [0; BPB_SIZE];
        raw[0..2].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        raw[2] = self.sectors_per_cluster;
        raw[3..5].copy_from_slice(&self.reserved_sectors.to_le_bytes());
        raw[5] = self.fat_count;
        raw[6..8].copy_from_slice(&self.root_entries.to_le_bytes());
        raw[8..10].copy_from_slice(&self.total_sectors.to_le_bytes());
        raw[10] = self.media_descriptor;
        raw[11..13].copy_from_slice(&self.sectors_per_fat.to_le_bytes());
        raw[13..15].copy_from_slice(&self.sectors_per_track.to_le_bytes());
        raw[15..17].copy_from_slice(&self.heads.to_le_bytes());
        raw[17..21].copy_from_slice(&self.hidden_sectors.to_le_bytes());
        raw[21..25].copy_from_slice(&self.total_sectors_large.to_le_bytes());
        raw
    }

    /// Reads the BPB of the volume held by `device`.
    pub fn read<D: Device + ?Sized>(device: &mut D) -> FatResult<Self> {
        let mut raw = [0; BPB_SIZE];
        device.read_at(&mut raw, BPB_OFFSET)?;
        Ok(Self::decode(&raw))
    }

    #[must_use]
    #[inline]
    /// Returns the number of bytes per sector.
    pub const fn bytes_per_sector(&self) -> u16 {
        self.bytes_per_sector
    }

    #[must_use]
    #[inline]
    /// Returns the number of sectors per cluster.
    pub const fn sectors_per_cluster(&self) -> u8 {
        self.sectors_per_cluster
    }

    #[must_use]
    #[inline]
    /// Returns the number of reserved sectors.
    pub const fn reserved_sectors(&self) -> u16 {
        self.reserved_sectors
    }

    #[must_use]
    #[inline]
    /// Returns the number of FATs.
    pub const fn fat_count(&self) -> u8 {
        self.fat_count
    }

    #[must_use]
    #[inline]
    /// Returns the number of root directory entries.
    pub const fn root_entries(&self) -> u16 {
        self.root_entries
    }

    #[must_use]
    #[inline]
    /// Returns the number of sectors in the file system.
    ///
    /// The 32-bit field takes precedence whenever it is set.
    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_large != 0 {
            self.total_sectors_large
        } else {
            u32::from(self.total_sectors)
        }
    }

    #[must_use]
    #[inline]
    /// Returns the media descriptor.
    pub const fn media_descriptor(&self) -> u8 {
        self.media_descriptor
    }

    #[must_use]
    #[inline]
    /// Returns the number of sectors per FAT.
    pub const fn sectors_per_fat(&self) -> u16 {
        self.sectors_per_fat
    }

    #[must_use]
    #[inline]
    pub const fn sectors_per_track(&self) -> u16 {
        self.sectors_per_track
    }

    #[must_use]
    #[inline]
    pub const fn heads(&self) -> u16 {
        self.heads
    }

    #[must_use]
    #[inline]
    /// Returns the number of bytes per cluster.
    pub fn bytes_per_cluster(&self) -> u32 {
        u32::from(self.bytes_per_sector) * u32::from(self.sectors_per_cluster)
    }

    #[must_use]
    #[inline]
    /// Returns the number of sectors occupied by the root directory.
    ///
    /// `bytes_per_sector` must not be 0.
    pub fn root_dir_sectors(&self) -> u32 {
        (u32::from(self.root_entries) * super::dirent::DIR_ENTRY_SIZE as u32)
            .div_ceil(u32::from(self.bytes_per_sector))
    }

    #[must_use]
    #[inline]
    pub const fn with_bytes_per_sector(mut self, bytes_per_sector: u16) -> Self {
        self.bytes_per_sector = bytes_per_sector;
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_sectors_per_cluster(mut self, sectors_per_cluster: u8) -> Self {
        self.sectors_per_cluster = sectors_per_cluster;
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_reserved_sectors(mut self, reserved_sectors: u16) -> Self {
        self.reserved_sectors = reserved_sectors;
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_fat_count(mut self, fat_count: u8) -> Self {
        self.fat_count = fat_count;
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_root_entries(mut self, root_entries: u16) -> Self {
        self.root_entries = root_entries;
        self
    }

    #[must_use]
    #[inline]
    /// Sets the total number of sectors, picking the 16 or 32-bit field.
    pub const fn with_total_sectors(mut self, total_sectors: u32) -> Self {
        if total_sectors <= u16::MAX as u32 {
            self.total_sectors = total_sectors as u16;
            self.total_sectors_large = 0;
        } else {
            self.total_sectors = 0;
            self.total_sectors_large = total_sectors;
        }
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_media_descriptor(mut self, media_descriptor: u8) -> Self {
        self.media_descriptor = media_descriptor;
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_sectors_per_fat(mut self, sectors_per_fat: u16) -> Self {
        self.sectors_per_fat = sectors_per_fat;
        self
    }

    #[must_use]
    #[inline]
    /// Sets the CHS geometry hints. Irrelevant for images but read by some BIOSes.
    pub const fn with_chs(mut self, sectors_per_track: u16, heads: u16) -> Self {
        self.sectors_per_track = sectors_per_track;
        self.heads = heads;
        self
    }
}

/// Boot sector of a FAT12/16 volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSector {
    oem_name: [u8; 8],
    bpb: BootParamBlock,
    drive_number: u8,
    volume_id: u32,
    volume_label: [u8; 11],
    fs_type: [u8; 8],
}

impl BootSector {
    /// Short jump over the BPB, followed by a NOP.
    pub const JUMP: [u8; 3] = [0xEB, 0x3C, 0x90];
    /// Marks the presence of the volume id, label and fs type fields.
    pub const EXTENDED_SIGNATURE: u8 = 0x29;
    /// Boot sector signature, at offset 510.
    pub const SIGNATURE: [u8; 2] = [0x55, 0xAA];
    /// Label of volumes that have none.
    pub const NO_NAME: [u8; 11] = *b"NO NAME    ";

    const OEM_OFFSET: usize = 0x03;
    const DRIVE_NUMBER_OFFSET: usize = 0x24;
    const EXTENDED_SIGNATURE_OFFSET: usize = 0x26;
    const VOLUME_ID_OFFSET: usize = 0x27;
    const VOLUME_LABEL_OFFSET: usize = 0x2B;
    const FS_TYPE_OFFSET: usize = 0x36;
    const SIGNATURE_OFFSET: usize = 0x1FE;

    #[must_use]
    #[inline]
    /// Creates a FAT16 boot sector for a fixed disk.
    pub const fn new_fat16(bpb: BootParamBlock) -> Self {
        Self {
            oem_name: *b"FATPACK ",
            bpb,
            drive_number: 0x80,
            volume_id: 0,
            volume_label: Self::NO_NAME,
            fs_type: *b"FAT16   ",
        }
    }

    #[must_use]
    #[inline]
    pub const fn with_volume_id(mut self, volume_id: u32) -> Self {
        self.volume_id = volume_id;
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_volume_label(mut self, volume_label: [u8; 11]) -> Self {
        self.volume_label = volume_label;
        self
    }

    #[must_use]
    #[inline]
    pub const fn volume_id(&self) -> u32 {
        self.volume_id
    }

    #[must_use]
    #[inline]
    pub const fn volume_label(&self) -> [u8; 11] {
        self.volume_label
    }

    #[must_use]
    #[inline]
    pub const fn fs_type(&self) -> [u8; 8] {
        self.fs_type
    }

    #[must_use]
    /// Encodes the whole 512-byte sector. The boot code area is left zeroed.
    pub fn encode(&self) -> [u8; SECTOR_SIZE] {
        let mut raw = [0; SECTOR_SIZE];
        raw[..3].copy_from_slice(&Self::JUMP);
        raw[Self::OEM_OFFSET..Self::OEM_OFFSET + 8].copy_from_slice(&self.oem_name);
        raw[BPB_OFFSET as usize..BPB_OFFSET as usize + BPB_SIZE]
            .copy_from_slice(&self.bpb.encode());
        raw[Self::DRIVE_NUMBER_OFFSET] = self.drive_number;
        raw[Self::EXTENDED_SIGNATURE_OFFSET] = Self::EXTENDED_SIGNATURE;
        raw[Self::VOLUME_ID_OFFSET..Self::VOLUME_ID_OFFSET + 4]
            .copy_from_slice(&self.volume_id.to_le_bytes());
        raw[Self::VOLUME_LABEL_OFFSET..Self::VOLUME_LABEL_OFFSET + 11]
            .copy_from_slice(&self.volume_label);
        raw[Self::FS_TYPE_OFFSET..Self::FS_TYPE_OFFSET + 8].copy_from_slice(&self.fs_type);
        raw[Self::SIGNATURE_OFFSET..].copy_from_slice(&Self::SIGNATURE);
        raw
    }

    /// Decodes a boot sector.
    ///
    /// Volumes without the extended signature get an empty id and the `NO NAME` label.
    pub fn decode(raw: &[u8; SECTOR_SIZE]) -> FatResult<Self> {
        if raw[Self::SIGNATURE_OFFSET..] != Self::SIGNATURE {
            return Err(FatError::UnsupportedFilesystem(
                "missing boot sector signature",
            ));
        }

        let mut bpb = [0; BPB_SIZE];
        bpb.copy_from_slice(&raw[BPB_OFFSET as usize..BPB_OFFSET as usize + BPB_SIZE]);

        let mut sector = Self::new_fat16(BootParamBlock::decode(&bpb));
        sector
            .oem_name
            .copy_from_slice(&raw[Self::OEM_OFFSET..Self::OEM_OFFSET + 8]);
        sector.drive_number = raw[Self::DRIVE_NUMBER_OFFSET];

        if raw[Self::EXTENDED_SIGNATURE_OFFSET] == Self::EXTENDED_SIGNATURE {
            let id = &raw[Self::VOLUME_ID_OFFSET..Self::VOLUME_ID_OFFSET + 4];
            sector.volume_id = u32::from_le_bytes([id[0], id[1], id[2], id[3]]);
            sector
                .volume_label
                .copy_from_slice(&raw[Self::VOLUME_LABEL_OFFSET..Self::VOLUME_LABEL_OFFSET + 11]);
            sector
                .fs_type
                .copy_from_slice(&raw[Self::FS_TYPE_OFFSET..Self::FS_TYPE_OFFSET + 8]);
        } else {
            sector.fs_type = [b' '; 8];
        }

        Ok(sector)
    }

    /// Reads the boot sector of the volume held by `device`.
    pub fn read<D: Device + ?Sized>(device: &mut D) -> FatResult<Self> {
        let mut raw = [0; SECTOR_SIZE];
        device.read_at(&mut raw, 0)?;
        Self::decode(&raw)
    }
}
