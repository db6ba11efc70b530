//! Write-back sector cache in front of the block device.
//!
//! Every sector access of the volume goes through one [`SectorCache`] so a
//! sector is never aliased between a cached copy and the raw device. Dirty
//! sectors are written back on [`SectorCache::sync_all`] (every public
//! mutation ends with one) and as a last resort when a cache entry drops.

use std::sync::Arc;

use lru::LruCache;
use spin::RwLock;

use crate::device::BlockDevice;
use crate::error::FsError;
use crate::BLOCK_SIZE;

pub struct BlockCache {
    cache: [u8; BLOCK_SIZE],
    // the sector id on the disk, not within the cluster
    block_id: usize,
    device: Arc<dyn BlockDevice>,
    modified: bool,
}

impl BlockCache {
    /// Load a sector from the device.
    pub fn new(block_id: usize, device: Arc<dyn BlockDevice>) -> Result<Self, FsError> {
        let mut cache = [0u8; BLOCK_SIZE];
        device.read_blocks(&mut cache, block_id * BLOCK_SIZE, 1)?;
        Ok(Self {
            cache,
            block_id,
            device,
            modified: false,
        })
    }

    pub fn read<V>(&self, f: impl FnOnce(&[u8; BLOCK_SIZE]) -> V) -> V {
        f(&self.cache)
    }

    pub fn modify<V>(&mut self, f: impl FnOnce(&mut [u8; BLOCK_SIZE]) -> V) -> V {
        self.modified = true;
        f(&mut self.cache)
    }

    /// Write the sector back to the device if it changed.
    pub fn sync(&mut self) -> Result<(), FsError> {
        if self.modified {
            self.modified = false;
            self.device
                .write_blocks(&self.cache, self.block_id * BLOCK_SIZE, 1)?;
        }
        Ok(())
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        let _ = self.sync();
    }
}

/// LRU map of cached sectors, owned by the volume that uses it.
pub struct SectorCache {
    device: Arc<dyn BlockDevice>,
    lru: RwLock<LruCache<usize, Arc<RwLock<BlockCache>>>>,
}

impl SectorCache {
    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            // a floppy only has 2880 sectors, eviction gains nothing
            lru: RwLock::new(LruCache::unbounded()),
        }
    }

    fn get(&self, block_id: usize) -> Result<Arc<RwLock<BlockCache>>, FsError> {
        let mut lru = self.lru.write();
        if let Some(cache) = lru.get(&block_id) {
            return Ok(Arc::clone(cache));
        }
        let fresh = Arc::new(RwLock::new(BlockCache::new(
            block_id,
            Arc::clone(&self.device),
        )?));
        lru.put(block_id, Arc::clone(&fresh));
        Ok(fresh)
    }

    pub fn read_sector<V>(
        &self,
        sector: usize,
        f: impl FnOnce(&[u8; BLOCK_SIZE]) -> V,
    ) -> Result<V, FsError> {
        Ok(self.get(sector)?.read().read(f))
    }

    pub fn modify_sector<V>(
        &self,
        sector: usize,
        f: impl FnOnce(&mut [u8; BLOCK_SIZE]) -> V,
    ) -> Result<V, FsError> {
        Ok(self.get(sector)?.write().modify(f))
    }

    /// Read `count` consecutive sectors into one buffer.
    pub fn read_range(&self, sector: usize, count: usize) -> Result<Vec<u8>, FsError> {
        let mut out = vec![0u8; count * BLOCK_SIZE];
        for i in 0..count {
            self.read_sector(sector + i, |s| {
                out[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE].copy_from_slice(s)
            })?;
        }
        Ok(out)
    }

    /// Write a whole-sector-sized buffer over consecutive sectors.
    pub fn write_range(&self, sector: usize, bytes: &[u8]) -> Result<(), FsError> {
        if bytes.len() % BLOCK_SIZE != 0 {
            return Err(FsError::InvalidArgument);
        }
        for (i, chunk) in bytes.chunks(BLOCK_SIZE).enumerate() {
            self.modify_sector(sector + i, |s| s.copy_from_slice(chunk))?;
        }
        Ok(())
    }

    /// Flush every dirty sector to the device.
    pub fn sync_all(&self) -> Result<(), FsError> {
        for (_, cache) in self.lru.read().iter() {
            cache.write().sync()?;
        }
        Ok(())
    }
}
