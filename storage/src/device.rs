//! Byte-addressed access to disk images and block devices.
use crate::fat::{FatError, FatResult};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
/// An error that can occur when performing device operations.
pub enum DeviceError {
    #[error("cannot open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot stat {}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read of {len} bytes at offset {offset:#x} failed")]
    Read {
        offset: u64,
        len: usize,
        #[source]
        source: io::Error,
    },
    #[error("write of {len} bytes at offset {offset:#x} failed")]
    Write {
        offset: u64,
        len: usize,
        #[source]
        source: io::Error,
    },
    #[error("seek failed")]
    Seek(#[source] io::Error),
    #[error("flush failed")]
    Flush(#[source] io::Error),
}

/// A seekable, readable and writable byte store holding a volume.
///
/// Every access is positioned explicitly, so no cursor state leaks between
/// two operations.
pub trait Device {
    /// Fill `dst` with the bytes starting at `offset`.
    ///
    /// ## Errors
    ///
    /// This function returns an error if the device cannot provide `dst.len()` bytes.
    fn read_at(&mut self, dst: &mut [u8], offset: u64) -> Result<(), DeviceError>;
    /// Write the whole of `src` starting at `offset`.
    ///
    /// ## Errors
    ///
    /// This function returns an error if the write operation failed or was short.
    fn write_at(&mut self, src: &[u8], offset: u64) -> Result<(), DeviceError>;
    /// Returns the capacity of the device in bytes.
    fn size(&mut self) -> Result<u64, DeviceError>;
    /// Push buffered writes down to the underlying storage.
    fn sync(&mut self) -> Result<(), DeviceError>;
}

impl<T: Read + Write + Seek> Device for T {
    fn read_at(&mut self, dst: &mut [u8], offset: u64) -> Result<(), DeviceError> {
        self.seek(SeekFrom::Start(offset))
            .map_err(DeviceError::Seek)?;
        self.read_exact(dst).map_err(|source| DeviceError::Read {
            offset,
            len: dst.len(),
            source,
        })
    }

    fn write_at(&mut self, src: &[u8], offset: u64) -> Result<(), DeviceError> {
        self.seek(SeekFrom::Start(offset))
            .map_err(DeviceError::Seek)?;
        self.write_all(src).map_err(|source| DeviceError::Write {
            offset,
            len: src.len(),
            source,
        })
    }

    #[inline]
    fn size(&mut self) -> Result<u64, DeviceError> {
        // Also the capacity query for block devices, whose metadata length is 0.
        self.seek(SeekFrom::End(0)).map_err(DeviceError::Seek)
    }

    #[inline]
    fn sync(&mut self) -> Result<(), DeviceError> {
        self.flush().map_err(DeviceError::Flush)
    }
}

/// Opens `path` for in-place editing.
///
/// Regular files are always accepted. On Unix, block devices are accepted as well.
/// Anything else (directories, character devices, pipes...) is rejected with
/// [`FatError::UnsupportedTarget`].
pub fn open_target(path: &Path) -> FatResult<File> {
    let metadata = fs::metadata(path).map_err(|source| DeviceError::Metadata {
        path: path.to_path_buf(),
        source,
    })?;

    if !is_supported_target(&metadata.file_type()) {
        return Err(FatError::UnsupportedTarget(path.to_path_buf()));
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| DeviceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file)
}

fn is_supported_target(file_type: &fs::FileType) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt as _;
        if file_type.is_block_device() {
            return true;
        }
    }
    file_type.is_file()
}
