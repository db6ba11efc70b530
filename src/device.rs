//! Block device interface and the in-memory floppy image.

use std::any::Any;
use std::fs;
use std::path::Path;

use spin::RwLock;

use crate::error::FsError;
use crate::{BLOCK_SIZE, FLOPPY_CAPACITY};

pub trait BlockDevice: Send + Sync + Any {
    /// Read blocks from the device.
    ///
    /// - offset must be a multiple of BLOCK_SIZE
    /// - block_cnt = buf.len() / BLOCK_SIZE
    fn read_blocks(&self, buf: &mut [u8], offset: usize, block_cnt: usize) -> Result<(), FsError>;

    /// Write blocks to the device.
    ///
    /// - buf.len() must be a multiple of BLOCK_SIZE
    /// - offset must be a multiple of BLOCK_SIZE
    /// - block_cnt = buf.len() / BLOCK_SIZE
    fn write_blocks(&self, buf: &[u8], offset: usize, block_cnt: usize) -> Result<(), FsError>;
}

/// A 3.5" 1.44 MB floppy image held as a contiguous byte buffer.
///
/// The image knows nothing about FAT; it only hands out sectors. The
/// capacity is fixed at 1 474 560 bytes and the sector size at 512.
pub struct FloppyImage {
    data: RwLock<Vec<u8>>,
}

impl FloppyImage {
    /// A blank image with no file system on it.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(vec![0u8; FLOPPY_CAPACITY]),
        }
    }

    /// Wrap raw image bytes. The buffer must be exactly one 1.44 MB floppy.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FsError> {
        if data.len() != FLOPPY_CAPACITY {
            return Err(FsError::UnsupportedGeometry);
        }
        Ok(Self {
            data: RwLock::new(data),
        })
    }

    /// Open an existing image file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FsError> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Save the image into a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FsError> {
        fs::write(path, &*self.data.read())?;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        FLOPPY_CAPACITY
    }

    pub fn read(&self, offset: usize, length: usize) -> Result<Vec<u8>, FsError> {
        let data = self.data.read();
        let end = offset.checked_add(length).ok_or(FsError::InvalidArgument)?;
        if end > data.len() {
            return Err(FsError::InvalidArgument);
        }
        Ok(data[offset..end].to_vec())
    }

    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<(), FsError> {
        let mut data = self.data.write();
        let end = offset
            .checked_add(bytes.len())
            .ok_or(FsError::InvalidArgument)?;
        if end > data.len() {
            return Err(FsError::InvalidArgument);
        }
        data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_sectors(&self, sector: usize, count: usize) -> Result<Vec<u8>, FsError> {
        self.read(sector * BLOCK_SIZE, count * BLOCK_SIZE)
    }

    pub fn write_sectors(&self, sector: usize, count: usize, bytes: &[u8]) -> Result<(), FsError> {
        if bytes.len() != count * BLOCK_SIZE {
            return Err(FsError::InvalidArgument);
        }
        self.write(sector * BLOCK_SIZE, bytes)
    }
}

impl Default for FloppyImage {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice for FloppyImage {
    fn read_blocks(&self, buf: &mut [u8], offset: usize, _block_cnt: usize) -> Result<(), FsError> {
        if offset % BLOCK_SIZE != 0 || buf.len() % BLOCK_SIZE != 0 {
            return Err(FsError::InvalidArgument);
        }
        let data = self.data.read();
        let end = offset + buf.len();
        if end > data.len() {
            return Err(FsError::InvalidArgument);
        }
        buf.copy_from_slice(&data[offset..end]);
        Ok(())
    }

    fn write_blocks(&self, buf: &[u8], offset: usize, _block_cnt: usize) -> Result<(), FsError> {
        if offset % BLOCK_SIZE != 0 || buf.len() % BLOCK_SIZE != 0 {
            return Err(FsError::InvalidArgument);
        }
        let mut data = self.data.write();
        let end = offset + buf.len();
        if end > data.len() {
            return Err(FsError::InvalidArgument);
        }
        data[offset..end].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_bounds_are_checked() {
        let image = FloppyImage::new();
        assert_eq!(image.capacity(), FLOPPY_CAPACITY);
        assert!(image.read_sectors(0, 1).is_ok());
        assert!(image.read_sectors(2879, 1).is_ok());
        assert!(image.read_sectors(2880, 1).is_err());
        assert!(image.write_sectors(2880, 1, &[0u8; BLOCK_SIZE]).is_err());
        assert!(image.write_sectors(0, 1, &[0u8; 13]).is_err());
    }

    #[test]
    fn writes_are_readable_back() {
        let image = FloppyImage::new();
        let sector = vec![0xA5u8; BLOCK_SIZE];
        image.write_sectors(7, 1, &sector).unwrap();
        assert_eq!(image.read_sectors(7, 1).unwrap(), sector);
        assert_eq!(image.read(7 * BLOCK_SIZE + 10, 4).unwrap(), vec![0xA5; 4]);
    }

    #[test]
    fn from_bytes_requires_floppy_capacity() {
        assert!(FloppyImage::from_bytes(vec![0u8; 1024]).is_err());
        assert!(FloppyImage::from_bytes(vec![0u8; FLOPPY_CAPACITY]).is_ok());
    }
}
