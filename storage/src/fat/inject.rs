//! Writing files straight into the root directory of a volume.
//!
//! Each file gets one directory entry, one contiguous cluster chain and its
//! payload copied into the data region, in that order. Nothing is written
//! until the cluster run has been found.
use super::{
    BootParamBlock, Cluster, FatError, FatResult, VolumeGeometry,
    dir::{find_free_root_entry_run, write_entry},
    dirent::{DirEntry, encode_short_name, padded_name},
    fat::{find_free_cluster_run, write_chain},
    read_geometry,
};
use crate::device::Device;
use std::io::{self, Read};

/// Size of the buffer used to copy payloads.
const COPY_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Outcome of a single injection.
pub struct InjectedFile {
    name: [u8; 11],
    first_cluster: Cluster,
    clusters: u16,
    entry_index: u16,
    size: u32,
}

impl InjectedFile {
    #[must_use]
    #[inline]
    pub const fn name(&self) -> &[u8; 11] {
        &self.name
    }

    #[must_use]
    #[inline]
    /// First cluster of the file, 0 for an empty file.
    pub const fn first_cluster(&self) -> Cluster {
        self.first_cluster
    }

    #[must_use]
    #[inline]
    pub const fn clusters(&self) -> u16 {
        self.clusters
    }

    #[must_use]
    #[inline]
    pub const fn entry_index(&self) -> u16 {
        self.entry_index
    }

    #[must_use]
    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }
}

impl core::fmt::Display for InjectedFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} ({} clusters, starting at cluster {}, root directory entry #{})",
            padded_name(&self.name),
            self.clusters,
            self.first_cluster,
            self.entry_index
        )
    }
}

/// Injects `size` bytes read from `source` as `filename` into root directory slot `entry_index`.
///
/// The slot is overwritten unconditionally: callers are expected to have
/// reserved it with [`find_free_root_entry_run`] (see [`Batch`]).
/// Only the first FAT is updated.
pub fn inject_file<D: Device + ?Sized, R: Read + ?Sized>(
    device: &mut D,
    bpb: &BootParamBlock,
    geometry: &VolumeGeometry,
    source: &mut R,
    size: u64,
    filename: &str,
    entry_index: u16,
) -> FatResult<InjectedFile> {
    if entry_index >= bpb.root_entries() {
        return Err(FatError::InvalidParameter(
            "root directory entry index out of range",
        ));
    }
    let name = encode_short_name(filename);
    if name[0] == b' ' {
        return Err(FatError::InvalidParameter("file name has an empty base"));
    }
    let file_size = u32::try_from(size).map_err(|_| FatError::FileTooLarge(size))?;

    let requested = file_size.div_ceil(geometry.bytes_per_cluster());
    let clusters = u16::try_from(requested)
        .map_err(|_| FatError::InsufficientClusterSpace { requested })?;

    let first_cluster = if clusters == 0 {
        Cluster::new(0)
    } else {
        find_free_cluster_run(device, geometry, clusters)?
    };

    write_entry(
        device,
        geometry,
        entry_index,
        &DirEntry::new_file(name, first_cluster, file_size),
    )?;

    if clusters != 0 {
        write_chain(device, geometry, first_cluster, clusters)?;
        copy_payload(device, source, geometry.cluster_offset(first_cluster), size)?;
    }

    let injected = InjectedFile {
        name,
        first_cluster,
        clusters,
        entry_index,
        size: file_size,
    };
    log::info!("{injected}");
    Ok(injected)
}

/// Copies exactly `size` bytes from `source` to the device, starting at `offset`.
fn copy_payload<D: Device + ?Sized, R: Read + ?Sized>(
    device: &mut D,
    source: &mut R,
    offset: u64,
    size: u64,
) -> FatResult<()> {
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    while copied < size {
        let wanted = usize::try_from(size - copied).map_or(buf.len(), |left| left.min(buf.len()));
        let read = match source.read(&mut buf[..wanted]) {
            Ok(0) => {
                return Err(FatError::UnexpectedEof {
                    expected: size,
                    copied,
                });
            }
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FatError::Source(err)),
        };
        device.write_at(&buf[..read], offset + copied)?;
        copied += read as u64;
    }
    Ok(())
}

/// A run of root directory slots reserved for a group of files.
///
/// Geometry is read and the slots are located once, then every injected file
/// takes the next slot of the run.
pub struct Batch<'d, D: Device + ?Sized> {
    device: &'d mut D,
    bpb: BootParamBlock,
    geometry: VolumeGeometry,
    next: u16,
    end: u16,
}

impl<'d, D: Device + ?Sized> Batch<'d, D> {
    /// Reserves `count` consecutive free root directory slots.
    pub fn reserve(device: &'d mut D, count: u16) -> FatResult<Self> {
        let (bpb, geometry) = read_geometry(device)?;
        let first = find_free_root_entry_run(device, &bpb, &geometry, count)?;

        Ok(Self {
            device,
            bpb,
            geometry,
            next: first,
            end: first + count,
        })
    }

    #[must_use]
    #[inline]
    pub const fn bpb(&self) -> &BootParamBlock {
        &self.bpb
    }

    #[must_use]
    #[inline]
    pub const fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    #[must_use]
    #[inline]
    /// Number of reserved slots still unused.
    pub const fn remaining(&self) -> u16 {
        self.end - self.next
    }

    /// Injects a file into the next reserved slot.
    ///
    /// The slot is consumed only if the injection succeeds.
    pub fn inject<R: Read + ?Sized>(
        &mut self,
        source: &mut R,
        size: u64,
        filename: &str,
    ) -> FatResult<InjectedFile> {
        if self.remaining() == 0 {
            return Err(FatError::InvalidParameter(
                "no reserved root directory entry left",
            ));
        }

        let injected = inject_file(
            self.device,
            &self.bpb,
            &self.geometry,
            source,
            size,
            filename,
            self.next,
        )?;
        self.next += 1;
        Ok(injected)
    }

    /// Flushes the device.
    pub fn finish(self) -> FatResult<()> {
        self.device.sync()?;
        Ok(())
    }
}
