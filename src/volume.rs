//! The volume layer: mount, format, path resolution and every mutation.
//!
//! A `Volume` owns the parsed BPB, the unpacked FAT and a sector cache
//! over the block image. FAT edits happen in memory; directory-entry bytes
//! go through the cache as they are produced; `commit` writes the label,
//! the BPB ranges and all FAT copies back and flushes the cache. Every
//! public mutation leaves the image flushed.
//!
//! The current working directory is a `(DirRef, parents)` pair. On-disk
//! `..` entries of subdirectories record cluster 0 (historic DOS
//! behavior), so navigation keeps the chain of directories from the root
//! to the cwd at runtime and never trusts the dotfile cluster fields.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use log::debug;

use crate::bpb::BiosParameterBlock;
use crate::cache::SectorCache;
use crate::device::BlockDevice;
use crate::dir::{self, DirRef, EntryLocation};
use crate::entry::ShortDirEntry;
use crate::error::FsError;
use crate::fat::{self, Fat};
use crate::{
    ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_EDIT_MASK, ATTR_KEEP_MASK, ATTR_SYSTEM, ATTR_VOLUME_ID,
    BLOCK_SIZE, DIRENT_SIZE, DIR_ENTRY_LAST_AND_UNUSED, DIR_ENTRY_UNUSED, SPACE,
};

// The non-bootable stub: push cs / pop ds, print the message below through
// int 10h teletype output, wait for a key, then int 19h reboot.
const BOOT_JUMP: [u8; 3] = [0xEB, 0x3C, 0x90];
const OEM_NAME: &[u8; 8] = b"fat12.rs";
const BOOT_CODE: [u8; 29] = [
    0x0E, 0x1F, 0xBE, 0x5B, 0x7C, 0xAC, 0x20, 0xC0, 0x74, 0x0B, 0x56, 0xB4, 0x0E, 0xBB, 0x07,
    0x00, 0xCD, 0x10, 0x5E, 0xEB, 0xF0, 0x31, 0xC0, 0xCD, 0x16, 0xCD, 0x19, 0xEB, 0xFC,
];
const BOOT_MESSAGE: &[u8] =
    b"\r\nThis is not a bootable floppy.\r\nPlease remove this disk and press any key...\r\n\0";
const BOOT_CODE_OFFSET: usize = 0x3E;
const BOOT_MESSAGE_OFFSET: usize = 0x5B;
const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;

/// What `stat` and the listing calls hand out. `modified` and `size` are
/// absent for directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub attributes: u8,
    pub modified: Option<NaiveDateTime>,
    pub starting_cluster: u16,
    pub size: Option<u32>,
}

/// A mounted FAT12 volume. Not safe for concurrent use; exclusive access
/// is the caller's business.
pub struct Volume {
    cache: SectorCache,
    bpb: BiosParameterBlock,
    fat: Fat,
    label: [u8; 11],
    write_label: bool,
    cwd: DirRef,
    parents: Vec<DirRef>,
}

impl Volume {
    /// Mount an existing file system: parse the BPB, unpack the first FAT
    /// copy, pick up the label, start out at the root.
    pub fn open(device: Arc<dyn BlockDevice>) -> Result<Self, FsError> {
        let cache = SectorCache::new(device);
        let bpb = cache.read_sector(0, |s| BiosParameterBlock::parse(s))??;
        let fat_bytes = cache.read_range(bpb.fat_start_sector as usize, bpb.sectors_per_fat as usize)?;
        let fat = Fat::unpack(&fat_bytes, bpb.data_clusters())?;
        let mut volume = Self {
            cache,
            bpb,
            fat,
            label: [SPACE; 11],
            write_label: false,
            cwd: DirRef::Root,
            parents: Vec::new(),
        };
        volume.read_label()?;
        debug!(
            "mounted fat12 volume: {} sectors, {} root entries, label {:?}",
            volume.bpb.logical_sectors,
            volume.bpb.root_entries,
            volume.label()
        );
        Ok(volume)
    }

    /// Create a fresh 1.44 MB file system on the image and mount it.
    pub fn format(device: Arc<dyn BlockDevice>, label: &str) -> Result<Self, FsError> {
        let label = encode_label(label)?;
        let serial: [u8; 4] = rand::random();
        let bpb = BiosParameterBlock::floppy_1440(serial, label);

        let mut boot = [0u8; BLOCK_SIZE];
        boot[..3].copy_from_slice(&BOOT_JUMP);
        boot[3..11].copy_from_slice(OEM_NAME);
        bpb.write_to(&mut boot);
        boot[BOOT_CODE_OFFSET..BOOT_CODE_OFFSET + BOOT_CODE.len()].copy_from_slice(&BOOT_CODE);
        boot[BOOT_MESSAGE_OFFSET..BOOT_MESSAGE_OFFSET + BOOT_MESSAGE.len()]
            .copy_from_slice(BOOT_MESSAGE);
        boot[BOOT_SIGNATURE_OFFSET] = 0x55;
        boot[BOOT_SIGNATURE_OFFSET + 1] = 0xAA;
        device.write_blocks(&boot, 0, 1)?;

        // wipe the FAT region and the root directory of whatever was there
        let zero = [0u8; BLOCK_SIZE];
        for sector in bpb.fat_start_sector as usize..bpb.first_data_sector() {
            device.write_blocks(&zero, sector * BLOCK_SIZE, 1)?;
        }

        let fat = Fat::fresh(&bpb);
        let mut volume = Self {
            cache: SectorCache::new(device),
            bpb,
            fat,
            label,
            write_label: true,
            cwd: DirRef::Root,
            parents: Vec::new(),
        };
        debug!("formatted 1.44 MB image, label {:?}", volume.label());
        volume.commit()?;
        Ok(volume)
    }

    pub fn bpb(&self) -> &BiosParameterBlock {
        &self.bpb
    }

    /// Write the label, the BPB/EBPB ranges and all FAT copies back to the
    /// image and flush the sector cache.
    pub fn commit(&mut self) -> Result<(), FsError> {
        self.update_label()?;
        if let Some(ebpb) = self.bpb.ebpb.as_mut() {
            ebpb.label = self.label;
        }
        let bpb = self.bpb.clone();
        self.cache.modify_sector(0, |s| bpb.write_to(s))?;

        let packed = self.fat.pack(self.bpb.fat_bytes());
        for copy in 0..self.bpb.fat_count as usize {
            let start = self.bpb.fat_start_sector as usize + copy * self.bpb.sectors_per_fat as usize;
            self.cache.write_range(start, &packed)?;
        }
        self.cache.sync_all()
    }

    // ---- label ----------------------------------------------------------

    /// The label, CP437-decoded with the padding stripped.
    pub fn label(&self) -> String {
        let s: String = self
            .label
            .iter()
            .map(|&b| crate::entry::decode_cp437(b))
            .collect();
        s.trim_end_matches(|c| c == ' ' || c == '\0').to_string()
    }

    /// Set the volume label. Both stores are updated: the root-directory
    /// label entry and, when an EBPB is present, its label mirror.
    pub fn set_label(&mut self, label: &str) -> Result<(), FsError> {
        self.label = encode_label(label)?;
        self.write_label = true;
        self.commit()
    }

    /// The authoritative label is the first root entry with the volume-id
    /// bit; the EBPB mirror is the fallback.
    fn read_label(&mut self) -> Result<(), FsError> {
        self.write_label = false;
        let region = dir::read_region(&self.cache, &self.bpb, DirRef::Root)?;
        for slot in region.chunks_exact(DIRENT_SIZE) {
            match slot[0] {
                DIR_ENTRY_LAST_AND_UNUSED => break,
                DIR_ENTRY_UNUSED => continue,
                _ => {}
            }
            if slot[0x0B] & ATTR_VOLUME_ID != 0 {
                self.label.copy_from_slice(&slot[..11]);
                return Ok(());
            }
        }
        self.label = self
            .bpb
            .ebpb
            .as_ref()
            .map(|e| e.label)
            .unwrap_or([SPACE; 11]);
        Ok(())
    }

    fn update_label(&mut self) -> Result<(), FsError> {
        if !self.write_label {
            return Ok(());
        }
        self.write_label = false;
        let mut region = dir::read_region(&self.cache, &self.bpb, DirRef::Root)?;

        let first_byte = region[0];
        let first_attr = region[0x0B];
        if first_byte != DIR_ENTRY_LAST_AND_UNUSED
            && first_byte != DIR_ENTRY_UNUSED
            && first_attr & ATTR_VOLUME_ID != 0
        {
            // slot 0 already is the label entry, patch the name in place
            region[..11].copy_from_slice(&self.label);
            return dir::write_region(&self.cache, &self.bpb, DirRef::Root, &region);
        }

        // Re-add the label at slot 0 when there is room: drop old label
        // entries, shift the rest down one slot. A root without a free
        // slot keeps only the EBPB copy.
        let slot_count = region.len() / DIRENT_SIZE;
        let mut sentinel = None;
        for i in 0..slot_count {
            if region[i * DIRENT_SIZE] == DIR_ENTRY_LAST_AND_UNUSED {
                sentinel = Some(i);
                break;
            }
        }
        let Some(end) = sentinel else {
            return Ok(());
        };

        let mut rebuilt: Vec<[u8; DIRENT_SIZE]> = Vec::with_capacity(end + 1);
        rebuilt.push(ShortDirEntry::label(self.label, Local::now().naive_local()).to_bytes());
        for slot in region[..end * DIRENT_SIZE].chunks_exact(DIRENT_SIZE) {
            if slot[0x0B] & 0x0F == ATTR_VOLUME_ID {
                continue;
            }
            let mut raw = [0u8; DIRENT_SIZE];
            raw.copy_from_slice(slot);
            rebuilt.push(raw);
        }
        for (i, raw) in rebuilt.iter().enumerate() {
            region[i * DIRENT_SIZE..(i + 1) * DIRENT_SIZE].copy_from_slice(raw);
        }
        for i in rebuilt.len()..=end {
            region[i * DIRENT_SIZE..(i + 1) * DIRENT_SIZE].fill(0);
        }
        dir::write_region(&self.cache, &self.bpb, DirRef::Root, &region)
    }

    // ---- path resolution ------------------------------------------------

    fn normalize(path: &str) -> String {
        path.replace('\\', "/")
    }

    // (head, tail)
    fn split_head(path: &str) -> (&str, &str) {
        match path.find('/') {
            Some(i) => (&path[..i], &path[i + 1..]),
            None => (path, ""),
        }
    }

    // (parent part incl. trailing slash, last component)
    fn split_base(path: &str) -> (&str, &str) {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(i) => (&trimmed[..=i], &trimmed[i + 1..]),
            None => ("", trimmed),
        }
    }

    /// Walk a path down to a directory, maintaining the parent chain. A
    /// leading (or doubled) slash resets to the root; `.` and `..` resolve
    /// through the runtime chain because their on-disk cluster fields are 0.
    pub fn resolve_dir(&self, path: &str) -> Result<(DirRef, Vec<DirRef>), FsError> {
        let path = Self::normalize(path);
        let mut dir = self.cwd;
        let mut parents = self.parents.clone();
        let mut rest = path.as_str();
        while !rest.is_empty() {
            let (name, tail) = Self::split_head(rest);
            rest = tail;
            if name.is_empty() {
                dir = DirRef::Root;
                parents.clear();
                continue;
            }
            let found = dir::find(&self.cache, &self.bpb, &self.fat, dir, name)?;
            let Some((_, entry)) = found else {
                // the root has no dotfile slots, but `.` still names it
                if dir == DirRef::Root && name == "." {
                    continue;
                }
                return Err(FsError::NotFound);
            };
            if !entry.is_dir() {
                return Err(FsError::NotFound);
            }
            parents.push(dir);
            let cluster = entry.start_cluster();
            if cluster == 0 {
                if name == "." {
                    dir = parents.pop().unwrap_or(DirRef::Root);
                } else if name == ".." {
                    parents.pop();
                    dir = parents.pop().unwrap_or(DirRef::Root);
                } else {
                    return Err(FsError::NotFound);
                }
            } else {
                dir = DirRef::Cluster(cluster);
            }
        }
        Ok((dir, parents))
    }

    /// Resolve a path to `(containing directory, slot location, entry)`.
    pub(crate) fn resolve_path(
        &self,
        path: &str,
    ) -> Result<(DirRef, EntryLocation, ShortDirEntry), FsError> {
        let path = Self::normalize(path);
        let (dir_part, base) = Self::split_base(&path);
        if base.is_empty() {
            return Err(FsError::NotFound);
        }
        let (dir, _) = self.resolve_dir(dir_part)?;
        match dir::find(&self.cache, &self.bpb, &self.fat, dir, base)? {
            Some((loc, entry)) => Ok((dir, loc, entry)),
            None => Err(FsError::NotFound),
        }
    }

    // ---- cwd -------------------------------------------------------------

    pub fn chdir(&mut self, path: &str) -> Result<(), FsError> {
        let (dir, parents) = self.resolve_dir(path)?;
        self.cwd = dir;
        self.parents = parents;
        Ok(())
    }

    /// The path of the current directory, rebuilt from the parent chain.
    pub fn get_cwd(&self) -> Result<String, FsError> {
        let mut chain = self.parents.clone();
        chain.push(self.cwd);
        let mut names = Vec::new();
        for pair in chain.windows(2) {
            let DirRef::Cluster(cluster) = pair[1] else {
                continue;
            };
            match dir::find_subdir(&self.cache, &self.bpb, &self.fat, pair[0], cluster)? {
                Some((_, entry)) => names.push(entry.name()),
                None => return Err(FsError::NotFound),
            }
        }
        Ok(format!("/{}", names.join("/")))
    }

    // ---- listing and stat ------------------------------------------------

    fn file_info(&self, entry: &ShortDirEntry) -> FileInfo {
        let is_dir = entry.is_dir();
        FileInfo {
            name: entry.name(),
            attributes: entry.attributes(),
            modified: if is_dir { None } else { entry.modified() },
            starting_cluster: entry.start_cluster(),
            size: if is_dir { None } else { Some(entry.file_size()) },
        }
    }

    pub fn list_files(&self, path: &str, hidden: bool) -> Result<Vec<FileInfo>, FsError> {
        let (dir, _) = self.resolve_dir(path)?;
        let mut out = Vec::new();
        for (_, entry) in dir::entries(&self.cache, &self.bpb, &self.fat, dir)? {
            if !entry.is_enumerable() || entry.is_dir() {
                continue;
            }
            if !hidden && entry.is_hidden() {
                continue;
            }
            out.push(self.file_info(&entry));
        }
        Ok(out)
    }

    pub fn list_dirs(&self, path: &str, hidden: bool) -> Result<Vec<FileInfo>, FsError> {
        let (dir, _) = self.resolve_dir(path)?;
        let mut out = Vec::new();
        for (_, entry) in dir::entries(&self.cache, &self.bpb, &self.fat, dir)? {
            if !entry.is_enumerable() || !entry.is_dir() {
                continue;
            }
            if !hidden && entry.is_hidden() {
                continue;
            }
            out.push(self.file_info(&entry));
        }
        Ok(out)
    }

    pub fn stat(&self, path: &str) -> Result<FileInfo, FsError> {
        let (_, _, entry) = self.resolve_path(path)?;
        Ok(self.file_info(&entry))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).is_ok()
    }

    pub fn isfile(&self, path: &str) -> bool {
        matches!(self.resolve_path(path), Ok((_, _, entry)) if !entry.is_dir())
    }

    pub fn isdir(&self, path: &str) -> bool {
        self.resolve_dir(path).is_ok()
    }

    /// Whether two paths resolve to the same directory slot. `None` when
    /// either of them does not resolve.
    pub fn issamefile(&self, path_a: &str, path_b: &str) -> Option<bool> {
        let (_, loc_a, _) = self.resolve_path(path_a).ok()?;
        let (_, loc_b, _) = self.resolve_path(path_b).ok()?;
        Some(loc_a == loc_b)
    }

    // ---- file i/o ---------------------------------------------------------

    fn read_cluster(&self, cluster: u16) -> Result<Vec<u8>, FsError> {
        self.cache.read_range(
            self.bpb.cluster_sector(cluster),
            self.bpb.sectors_per_cluster as usize,
        )
    }

    fn write_cluster(&self, cluster: u16, data: &[u8]) -> Result<(), FsError> {
        self.cache
            .write_range(self.bpb.cluster_sector(cluster), data)
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let (_, _, entry) = self.resolve_path(path)?;
        self.read_entry_contents(&entry)
    }

    fn read_entry_contents(&self, entry: &ShortDirEntry) -> Result<Vec<u8>, FsError> {
        if entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        let size = entry.file_size() as usize;
        let mut data = Vec::with_capacity(size);
        if size == 0 || entry.start_cluster() == 0 {
            return Ok(data);
        }
        let cluster_size = self.bpb.cluster_size();
        for cluster in self.fat.chain(entry.start_cluster()) {
            if data.len() >= size {
                break;
            }
            let block = self.read_cluster(cluster)?;
            let take = cluster_size.min(size - data.len());
            data.extend_from_slice(&block[..take]);
        }
        Ok(data)
    }

    /// Write a file's contents whole. A missing file is created first; the
    /// read-only bit blocks the write unless `ignore_readonly` is set.
    pub fn write_file(
        &mut self,
        path: &str,
        contents: &[u8],
        ignore_readonly: bool,
    ) -> Result<(), FsError> {
        let loc = match self.resolve_path(path) {
            Ok((_, loc, _)) => loc,
            Err(FsError::NotFound) => self.create_file(path)?.1,
            Err(e) => return Err(e),
        };
        self.write_entry_contents(loc, contents, ignore_readonly)
    }

    fn write_entry_contents(
        &mut self,
        loc: EntryLocation,
        contents: &[u8],
        ignore_readonly: bool,
    ) -> Result<(), FsError> {
        let raw = dir::read_entry(&self.cache, &self.bpb, loc)?;
        let mut entry = ShortDirEntry::from_bytes(&raw);
        if entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        if entry.is_read_only() && !ignore_readonly {
            return Err(FsError::ReadOnly);
        }

        let cluster_size = self.bpb.cluster_size();
        let new_clusters = (contents.len() + cluster_size - 1) / cluster_size;

        let mut first = entry.start_cluster();
        if new_clusters == 0 {
            // writing nothing frees the whole chain
            if fat::is_data_cluster(first) {
                self.fat.free_chain(first);
            }
            first = 0;
        } else {
            if first == 0 {
                first = self.fat.alloc_cluster(None)?;
            }
            let have = self.fat.chain_len(first);
            if new_clusters > have {
                let tail = self.fat.chain_tail(first).unwrap_or(first);
                self.fat.extend_chain(tail, new_clusters - have)?;
            }

            let mut cluster = first;
            let mut written = 0;
            for _ in 0..new_clusters {
                let take = cluster_size.min(contents.len() - written);
                let mut block = vec![0u8; cluster_size];
                block[..take].copy_from_slice(&contents[written..written + take]);
                self.write_cluster(cluster, &block)?;
                written += take;
                cluster = self.fat.next(cluster);
            }

            if new_clusters < have {
                self.fat.truncate_chain(first, new_clusters);
            }
        }

        entry.set_start_cluster(first);
        entry.set_file_size(contents.len() as u32);
        entry.set_modified(Local::now().naive_local());
        dir::write_entry(&self.cache, &self.bpb, loc, &entry.to_bytes())?;
        self.commit()
    }

    /// Create an empty file entry: archive attribute, cluster 0, size 0.
    fn create_file(&mut self, path: &str) -> Result<(DirRef, EntryLocation), FsError> {
        let path = Self::normalize(path);
        let (dir_part, base) = Self::split_base(&path);
        if base.is_empty() || base == "." || base == ".." {
            return Err(FsError::InvalidName);
        }
        let (dir, _) = self.resolve_dir(dir_part)?;
        if dir::find(&self.cache, &self.bpb, &self.fat, dir, base)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let entry = ShortDirEntry::new(base, ATTR_ARCHIVE, None, 0, 0)?;
        let loc = dir::alloc_entry(&self.cache, &self.bpb, &mut self.fat, dir)?;
        dir::write_entry(&self.cache, &self.bpb, loc, &entry.to_bytes())?;
        Ok((dir, loc))
    }

    /// Delete a file: free its chain, mark the slot deleted.
    pub fn delete_file(&mut self, path: &str, ignore_readonly: bool) -> Result<(), FsError> {
        let (parent, loc, entry) = self.resolve_path(path)?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        if entry.is_dotfile() {
            return Err(FsError::InvalidName);
        }
        if entry.is_read_only() && !ignore_readonly {
            return Err(FsError::ReadOnly);
        }
        if fat::is_data_cluster(entry.start_cluster()) {
            self.fat.free_chain(entry.start_cluster());
        }
        dir::remove_entry(&self.cache, &self.bpb, &mut self.fat, loc, parent)?;
        self.commit()
    }

    // ---- directories ------------------------------------------------------

    /// Create an empty directory: a fresh zeroed cluster holding the `.`
    /// and `..` slots, and a directory entry for it in the parent.
    pub fn create_directory(&mut self, path: &str, chdir: bool) -> Result<(), FsError> {
        let path = Self::normalize(path);
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            // the root cannot be created
            return Err(FsError::InvalidName);
        }
        let (dir_part, base) = Self::split_base(path);
        if base.is_empty() || base == "." || base == ".." {
            return Err(FsError::InvalidName);
        }
        let (parent_dir, parent_chain) = self.resolve_dir(dir_part)?;
        if dir::find(&self.cache, &self.bpb, &self.fat, parent_dir, base)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        let fresh = self.fat.alloc_cluster(None)?;
        let entry = ShortDirEntry::new(base, ATTR_DIRECTORY, None, fresh, 0)?;
        let loc = dir::alloc_entry(&self.cache, &self.bpb, &mut self.fat, parent_dir)?;
        dir::write_entry(&self.cache, &self.bpb, loc, &entry.to_bytes())?;

        self.write_cluster(fresh, &vec![0u8; self.bpb.cluster_size()])?;
        let now = Local::now().naive_local();
        dir::write_entry(
            &self.cache,
            &self.bpb,
            EntryLocation {
                dir: DirRef::Cluster(fresh),
                offset: 0,
            },
            &ShortDirEntry::dotfile(b".", now).to_bytes(),
        )?;
        dir::write_entry(
            &self.cache,
            &self.bpb,
            EntryLocation {
                dir: DirRef::Cluster(fresh),
                offset: DIRENT_SIZE,
            },
            &ShortDirEntry::dotfile(b"..", now).to_bytes(),
        )?;

        if chdir {
            let mut parents = parent_chain;
            parents.push(parent_dir);
            self.cwd = DirRef::Cluster(fresh);
            self.parents = parents;
        }
        self.commit()
    }

    /// Remove an empty directory. Removing the cwd drops back to the root.
    pub fn remove_directory(&mut self, path: &str) -> Result<(), FsError> {
        let (parent, loc, entry) = self.resolve_path(path)?;
        if !entry.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if entry.is_dotfile() {
            return Err(FsError::InvalidName);
        }
        let first = entry.start_cluster();
        if !self.directory_is_empty(first)? {
            return Err(FsError::NotEmpty);
        }
        if self.cwd == DirRef::Cluster(first) {
            self.cwd = DirRef::Root;
            self.parents.clear();
        }
        if fat::is_data_cluster(first) {
            self.fat.free_chain(first);
        }
        dir::remove_entry(&self.cache, &self.bpb, &mut self.fat, loc, parent)?;
        self.commit()
    }

    /// A directory is empty iff, ignoring `.` and `..`, it has no entry
    /// before the end-of-directory sentinel.
    fn directory_is_empty(&self, first: u16) -> Result<bool, FsError> {
        if !fat::is_data_cluster(first) {
            return Ok(false);
        }
        for (_, entry) in dir::entries(&self.cache, &self.bpb, &self.fat, DirRef::Cluster(first))? {
            if !entry.is_enumerable() || entry.is_dotfile() {
                continue;
            }
            return Ok(false);
        }
        Ok(true)
    }

    // ---- entry edits ------------------------------------------------------

    /// Rename in place: the 8.3 name changes, everything else stays.
    pub fn rename(&mut self, path: &str, name: &str) -> Result<(), FsError> {
        let (_, loc, entry) = self.resolve_path(path)?;
        if entry.is_dotfile() {
            return Err(FsError::InvalidName);
        }
        let renamed = entry.with_name(name)?;
        dir::write_entry(&self.cache, &self.bpb, loc, &renamed.to_bytes())?;
        self.cache.sync_all()
    }

    /// Attribute edit: only the bits in 0x27 change; 0xD8, notably the
    /// directory bit, is preserved.
    pub fn set_attributes(&mut self, path: &str, attributes: u8) -> Result<(), FsError> {
        let (_, loc, entry) = self.resolve_path(path)?;
        if entry.is_dotfile() {
            return Err(FsError::InvalidName);
        }
        let mut entry = entry;
        entry.set_attributes(entry.attributes() & ATTR_KEEP_MASK | attributes & ATTR_EDIT_MASK);
        dir::write_entry(&self.cache, &self.bpb, loc, &entry.to_bytes())?;
        self.cache.sync_all()
    }

    /// Move an entry into another directory: the 32 entry bytes travel
    /// verbatim, the source slot is freed. Moving the cwd drops back to
    /// the root.
    pub fn move_entry(&mut self, path: &str, folder: &str) -> Result<(), FsError> {
        let (source_parent, source_loc, entry) = self.resolve_path(path)?;
        let (target, _) = self.resolve_dir(folder)?;
        if entry.is_dotfile() {
            return Err(FsError::InvalidName);
        }
        if source_parent == target {
            return Ok(());
        }
        if entry.is_dir() && target == DirRef::Cluster(entry.start_cluster()) {
            // a directory cannot move into itself
            return Err(FsError::InvalidArgument);
        }
        if entry.is_dir() && self.cwd == DirRef::Cluster(entry.start_cluster()) {
            self.cwd = DirRef::Root;
            self.parents.clear();
        }
        let raw = dir::read_entry(&self.cache, &self.bpb, source_loc)?;
        let loc = dir::alloc_entry(&self.cache, &self.bpb, &mut self.fat, target)?;
        dir::write_entry(&self.cache, &self.bpb, loc, &raw)?;
        dir::remove_entry(&self.cache, &self.bpb, &mut self.fat, source_loc, source_parent)?;
        self.commit()
    }

    /// Copy a file. An existing directory destination receives
    /// `destination/basename(source)`; a missing destination is created.
    /// The copy keeps the source attributes with the archive bit forced on
    /// and the system bit cleared, and gets a fresh mtime.
    pub fn copy(
        &mut self,
        source: &str,
        destination: &str,
        ignore_readonly: bool,
    ) -> Result<(), FsError> {
        let (_, source_loc, source_entry) = self.resolve_path(source)?;
        if source_entry.is_dir() {
            return Err(FsError::IsADirectory);
        }

        let dest = match self.resolve_path(destination) {
            Ok((_, loc, entry)) => Some((loc, entry)),
            Err(FsError::NotFound) => None,
            Err(e) => return Err(e),
        };
        let dest_loc = match dest {
            Some((loc, _)) if loc == source_loc => return Err(FsError::InvalidArgument),
            Some((_, entry)) if entry.is_dir() => {
                let inside = format!(
                    "{}/{}",
                    destination.trim_end_matches('/'),
                    source_entry.name()
                );
                self.create_file(&inside)?.1
            }
            Some((loc, entry)) => {
                if entry.is_read_only() && !ignore_readonly {
                    return Err(FsError::ReadOnly);
                }
                loc
            }
            None => self.create_file(destination)?.1,
        };

        let contents = self.read_entry_contents(&source_entry)?;
        let raw = dir::read_entry(&self.cache, &self.bpb, dest_loc)?;
        let mut dest_entry = ShortDirEntry::from_bytes(&raw);
        dest_entry.set_attributes((source_entry.attributes() | ATTR_ARCHIVE) & !ATTR_SYSTEM);
        dir::write_entry(&self.cache, &self.bpb, dest_loc, &dest_entry.to_bytes())?;
        self.write_entry_contents(dest_loc, &contents, true)
    }
}

/// 11-byte space-padded CP437 label form.
fn encode_label(label: &str) -> Result<[u8; 11], FsError> {
    let mut out = [SPACE; 11];
    let mut i = 0;
    for ch in label.chars() {
        if i == out.len() {
            return Err(FsError::NameTooLong);
        }
        out[i] = crate::entry::encode_cp437(ch).ok_or(FsError::InvalidName)?;
        i += 1;
    }
    Ok(out)
}
