//! Directory regions: the fixed root area and subdirectory cluster chains.
//!
//! Two iteration modes exist. The root directory is a fixed run of sectors
//! right after the FAT copies and cannot grow; a subdirectory is an
//! ordinary cluster chain whose first cluster always starts with the `.`
//! and `..` slots. Iteration stops at the first slot whose first byte is
//! 0x00 and skips 0xE5 slots. Filtering label/device records (attribute
//! mask 0xC8) is left to the callers so the volume-label logic can still
//! see them.

use crate::bpb::BiosParameterBlock;
use crate::cache::SectorCache;
use crate::entry::{encode_search_name, DirEntry, ShortDirEntry};
use crate::error::FsError;
use crate::fat::{self, Fat};
use crate::{
    BLOCK_SIZE, DIRENT_SIZE, DIR_ENTRY_LAST_AND_UNUSED, DIR_ENTRY_UNUSED, FREE_CLUSTER,
};

/// A directory reference. The root directory has no cluster number of its
/// own, so it gets a variant instead of a sentinel integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirRef {
    Root,
    Cluster(u16),
}

/// Where a 32-byte slot lives: the owning region (the whole root area, or
/// one cluster of a subdirectory chain) and the byte offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocation {
    pub dir: DirRef,
    pub offset: usize,
}

fn region_base_and_len(bpb: &BiosParameterBlock, dir: DirRef) -> (usize, usize) {
    match dir {
        DirRef::Root => (bpb.root_dir_sector(), bpb.root_dir_sectors()),
        DirRef::Cluster(cluster) => (
            bpb.cluster_sector(cluster),
            bpb.sectors_per_cluster as usize,
        ),
    }
}

fn slot_sector(bpb: &BiosParameterBlock, loc: EntryLocation) -> Result<(usize, usize), FsError> {
    let (base, sectors) = region_base_and_len(bpb, loc.dir);
    if loc.offset % DIRENT_SIZE != 0 || loc.offset + DIRENT_SIZE > sectors * BLOCK_SIZE {
        return Err(FsError::InvalidArgument);
    }
    Ok((base + loc.offset / BLOCK_SIZE, loc.offset % BLOCK_SIZE))
}

/// Read a whole region: the root area, or one cluster.
pub(crate) fn read_region(
    cache: &SectorCache,
    bpb: &BiosParameterBlock,
    dir: DirRef,
) -> Result<Vec<u8>, FsError> {
    let (base, sectors) = region_base_and_len(bpb, dir);
    cache.read_range(base, sectors)
}

pub(crate) fn write_region(
    cache: &SectorCache,
    bpb: &BiosParameterBlock,
    dir: DirRef,
    bytes: &[u8],
) -> Result<(), FsError> {
    let (base, sectors) = region_base_and_len(bpb, dir);
    if bytes.len() != sectors * BLOCK_SIZE {
        return Err(FsError::InvalidArgument);
    }
    cache.write_range(base, bytes)
}

pub(crate) fn read_entry(
    cache: &SectorCache,
    bpb: &BiosParameterBlock,
    loc: EntryLocation,
) -> Result<[u8; DIRENT_SIZE], FsError> {
    let (sector, offset) = slot_sector(bpb, loc)?;
    cache.read_sector(sector, |s| {
        let mut raw = [0u8; DIRENT_SIZE];
        raw.copy_from_slice(&s[offset..offset + DIRENT_SIZE]);
        raw
    })
}

pub(crate) fn write_entry(
    cache: &SectorCache,
    bpb: &BiosParameterBlock,
    loc: EntryLocation,
    raw: &[u8; DIRENT_SIZE],
) -> Result<(), FsError> {
    let (sector, offset) = slot_sector(bpb, loc)?;
    cache.modify_sector(sector, |s| {
        s[offset..offset + DIRENT_SIZE].copy_from_slice(raw)
    })
}

fn scan_region(
    region: &[u8],
    dir: DirRef,
    out: &mut Vec<(EntryLocation, ShortDirEntry)>,
) -> bool {
    for (i, slot) in region.chunks_exact(DIRENT_SIZE).enumerate() {
        match DirEntry::parse(slot) {
            DirEntry::EndOfDir => return true,
            DirEntry::Free => continue,
            DirEntry::Valid(entry) => out.push((
                EntryLocation {
                    dir,
                    offset: i * DIRENT_SIZE,
                },
                entry,
            )),
        }
    }
    false
}

/// Every in-use entry of a directory, in slot order, until the
/// end-of-directory sentinel.
pub(crate) fn entries(
    cache: &SectorCache,
    bpb: &BiosParameterBlock,
    fat: &Fat,
    dir: DirRef,
) -> Result<Vec<(EntryLocation, ShortDirEntry)>, FsError> {
    let mut out = Vec::new();
    match dir {
        DirRef::Root => {
            let region = read_region(cache, bpb, dir)?;
            scan_region(&region, dir, &mut out);
        }
        DirRef::Cluster(first) => {
            for cluster in fat.chain(first) {
                let region = read_region(cache, bpb, DirRef::Cluster(cluster))?;
                if scan_region(&region, DirRef::Cluster(cluster), &mut out) {
                    break;
                }
            }
        }
    }
    Ok(out)
}

/// Case-insensitive lookup on the 11-byte canonical name. Label and
/// device records do not take part. A name that cannot be encoded cannot
/// match anything.
pub(crate) fn find(
    cache: &SectorCache,
    bpb: &BiosParameterBlock,
    fat: &Fat,
    dir: DirRef,
    name: &str,
) -> Result<Option<(EntryLocation, ShortDirEntry)>, FsError> {
    let Ok(canonical) = encode_search_name(name) else {
        return Ok(None);
    };
    for (loc, entry) in entries(cache, bpb, fat, dir)? {
        if !entry.is_enumerable() {
            continue;
        }
        if entry.matches_name(&canonical) {
            return Ok(Some((loc, entry)));
        }
    }
    Ok(None)
}

/// Find the subdirectory entry that points at a given cluster. Used to
/// turn the runtime parent chain back into path components.
pub(crate) fn find_subdir(
    cache: &SectorCache,
    bpb: &BiosParameterBlock,
    fat: &Fat,
    dir: DirRef,
    cluster: u16,
) -> Result<Option<(EntryLocation, ShortDirEntry)>, FsError> {
    for (loc, entry) in entries(cache, bpb, fat, dir)? {
        if !entry.is_enumerable() {
            continue;
        }
        if entry.is_dir() && entry.start_cluster() == cluster {
            return Ok(Some((loc, entry)));
        }
    }
    Ok(None)
}

/// Claim a free 32-byte slot. The root cannot grow, so a full root fails
/// with `RootFull`; a full subdirectory gets a fresh zero-filled cluster
/// attached to its chain tail and hands back that cluster's slot 0.
pub(crate) fn alloc_entry(
    cache: &SectorCache,
    bpb: &BiosParameterBlock,
    fat: &mut Fat,
    dir: DirRef,
) -> Result<EntryLocation, FsError> {
    match dir {
        DirRef::Root => {
            let region = read_region(cache, bpb, dir)?;
            for (i, slot) in region.chunks_exact(DIRENT_SIZE).enumerate() {
                if slot[0] == DIR_ENTRY_LAST_AND_UNUSED || slot[0] == DIR_ENTRY_UNUSED {
                    return Ok(EntryLocation {
                        dir,
                        offset: i * DIRENT_SIZE,
                    });
                }
            }
            Err(FsError::RootFull)
        }
        DirRef::Cluster(first) => {
            let mut tail = first;
            for cluster in fat.chain(first) {
                tail = cluster;
                let region = read_region(cache, bpb, DirRef::Cluster(cluster))?;
                for (i, slot) in region.chunks_exact(DIRENT_SIZE).enumerate() {
                    if slot[0] == DIR_ENTRY_LAST_AND_UNUSED || slot[0] == DIR_ENTRY_UNUSED {
                        return Ok(EntryLocation {
                            dir: DirRef::Cluster(cluster),
                            offset: i * DIRENT_SIZE,
                        });
                    }
                }
            }
            let fresh = fat.alloc_cluster(Some(tail))?;
            write_region(
                cache,
                bpb,
                DirRef::Cluster(fresh),
                &vec![0u8; bpb.cluster_size()],
            )?;
            Ok(EntryLocation {
                dir: DirRef::Cluster(fresh),
                offset: 0,
            })
        }
    }
}

/// Mark a slot deleted. A subdirectory cluster left without any in-use
/// slot is unlinked from the chain, unless it is the directory's first
/// cluster (that one always keeps the dotfiles).
pub(crate) fn remove_entry(
    cache: &SectorCache,
    bpb: &BiosParameterBlock,
    fat: &mut Fat,
    loc: EntryLocation,
    parent: DirRef,
) -> Result<(), FsError> {
    let (sector, offset) = slot_sector(bpb, loc)?;
    cache.modify_sector(sector, |s| s[offset] = DIR_ENTRY_UNUSED)?;

    if let (DirRef::Cluster(cluster), DirRef::Cluster(first)) = (loc.dir, parent) {
        if cluster == first {
            return Ok(());
        }
        let region = read_region(cache, bpb, DirRef::Cluster(cluster))?;
        let dead = region
            .chunks_exact(DIRENT_SIZE)
            .all(|s| s[0] == DIR_ENTRY_LAST_AND_UNUSED || s[0] == DIR_ENTRY_UNUSED);
        if dead {
            // splice the predecessor over the dead cluster
            let mut prev = first;
            while fat.next(prev) != cluster {
                prev = fat.next(prev);
                if !fat::is_data_cluster(prev) {
                    // the chain never reaches it; leave the table alone
                    return Ok(());
                }
            }
            fat.set(prev, fat.next(cluster));
            fat.set(cluster, FREE_CLUSTER);
        }
    }
    Ok(())
}
