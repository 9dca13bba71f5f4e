//! Root directory access.
use super::{
    BootParamBlock, FatError, FatResult, VolumeGeometry,
    dirent::{DIR_ENTRY_SIZE, DirEntry},
};
use crate::device::Device;

/// Reads the whole root directory region.
fn read_root_dir<D: Device + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
) -> FatResult<Vec<u8>> {
    let mut raw = vec![0u8; usize::from(geometry.root_entries()) * DIR_ENTRY_SIZE];
    device.read_at(&mut raw, geometry.root_dir_offset())?;
    Ok(raw)
}

/// Returns the index of the first slot of a run of `count` free root
/// directory slots.
///
/// A slot is free when its first byte is 0x00 (never used) or 0xE5 (deleted).
pub fn find_free_root_entry_run<D: Device + ?Sized>(
    device: &mut D,
    bpb: &BootParamBlock,
    geometry: &VolumeGeometry,
    count: u16,
) -> FatResult<u16> {
    if count == 0 {
        return Err(FatError::InvalidParameter("entry count must be positive"));
    }

    let raw = read_root_dir(device, geometry)?;
    let first_bytes = raw.chunks_exact(DIR_ENTRY_SIZE).map(|slot| slot[0]);

    let mut run_start = 0;
    let mut run_len = 0u16;
    for (index, first_byte) in (0..bpb.root_entries()).zip(first_bytes) {
        if first_byte == DirEntry::END_OF_ENTRIES || first_byte == DirEntry::DELETED_ENTRY {
            if run_len == 0 {
                run_start = index;
            }
            run_len += 1;
            if run_len == count {
                log::debug!("Found {count} free root directory entries starting at #{run_start}");
                return Ok(run_start);
            }
        } else {
            run_len = 0;
        }
    }

    Err(FatError::InsufficientDirectorySpace { requested: count })
}

/// Writes `entry` into root directory slot `index`.
pub fn write_entry<D: Device + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
    index: u16,
    entry: &DirEntry,
) -> FatResult<()> {
    if index >= geometry.root_entries() {
        return Err(FatError::InvalidParameter(
            "root directory entry index out of range",
        ));
    }
    device.write_at(&entry.encode(), geometry.root_entry_offset(index))?;
    Ok(())
}

/// Returns the files of the root directory along with their slot index.
///
/// Free and deleted slots, volume labels, directories and long name
/// fragments are skipped. The scan stops at the end-of-directory marker.
pub fn list_root_dir<D: Device + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
) -> FatResult<Vec<(u16, DirEntry)>> {
    let raw = read_root_dir(device, geometry)?;

    let entries = (0..geometry.root_entries())
        .zip(raw.chunks_exact(DIR_ENTRY_SIZE))
        .map(|(index, slot)| {
            let mut buf = [0u8; DIR_ENTRY_SIZE];
            buf.copy_from_slice(slot);
            (index, DirEntry::decode(&buf))
        })
        .take_while(|(_, entry)| !entry.is_free())
        .filter(|(_, entry)| entry.is_file())
        .collect();
    Ok(entries)
}
