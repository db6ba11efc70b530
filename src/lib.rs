//! A read/write FAT12 driver for IBM-PC-compatible 3.5" 1.44 MB floppy
//! images.
//!
//! The driver operates on a byte-addressable block image through the
//! [`device::BlockDevice`] trait; no kernel or host file system is involved.
//! [`volume::Volume`] exposes the POSIX-like surface: mount, format,
//! traverse, stat, read, write, create, delete, rename, move, copy,
//! attribute edit and label edit.
//!
//! On-disk layout of a freshly formatted 1.44 MB volume:
//!
//! | Region                       | Sectors   |
//! |------------------------------|-----------|
//! | Boot sector / BPB / EBPB     | 0         |
//! | FAT copy 1                   | 1..=9     |
//! | FAT copy 2                   | 10..=18   |
//! | Root directory (224 entries) | 19..=32   |
//! | Data (cluster 2 = sector 33) | 33..=2879 |

pub mod bpb;
pub mod cache;
pub mod device;
pub mod dir;
pub mod entry;
pub mod error;
pub mod fat;
pub mod volume;

pub use bpb::BiosParameterBlock;
pub use device::{BlockDevice, FloppyImage};
pub use dir::{DirRef, EntryLocation};
pub use entry::{DirEntry, ShortDirEntry};
pub use error::FsError;
pub use fat::Fat;
pub use volume::{FileInfo, Volume};

/// BPB Bytes Per Sector
pub const BLOCK_SIZE: usize = 512;
/// Size of a raw 1.44 MB floppy image in bytes.
pub const FLOPPY_CAPACITY: usize = 1_474_560;

pub const DIRENT_SIZE: usize = 32;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;

/// Entries with any of these bits set (volume label, device, and the two
/// reserved bits) never show up in file or directory enumeration.
pub const ATTR_ENUM_SKIP: u8 = 0xC8;
/// The attribute bits an attribute edit may change.
pub const ATTR_EDIT_MASK: u8 = 0x27;
/// The attribute bits an attribute edit must preserve, notably the
/// directory bit.
pub const ATTR_KEEP_MASK: u8 = 0xD8;

// FAT12 entry values. A chain terminator is any value in 0xFF8..=0xFFF;
// alloc always writes 0xFFF.
pub const FREE_CLUSTER: u16 = 0x000;
pub const BAD_CLUSTER: u16 = 0xFF7;
pub const END_OF_CHAIN: u16 = 0xFFF;
pub const FAT12_ENTRY_MASK: u16 = 0xFFF;

/// For Short Directory Entry Name[0]
///
/// Deleted
pub const DIR_ENTRY_UNUSED: u8 = 0xE5;
/// For Short Directory Entry Name[0]
///
/// No valid entries at or after this slot
pub const DIR_ENTRY_LAST_AND_UNUSED: u8 = 0x00;
/// Name[0] == 0x05 stands for a literal 0xE5 first character, which is a
/// valid KANJI lead byte in CP437-adjacent code pages.
pub const KANJI_LEAD: u8 = 0x05;

// Charactor
pub const SPACE: u8 = 0x20;
pub const DOT: u8 = 0x2E;

pub(crate) fn read_le_u16(input: &[u8]) -> u16 {
    let (int_bytes, _) = input.split_at(core::mem::size_of::<u16>());
    u16::from_le_bytes(int_bytes.try_into().unwrap())
}

pub(crate) fn read_le_u32(input: &[u8]) -> u32 {
    let (int_bytes, _) = input.split_at(core::mem::size_of::<u32>());
    u32::from_le_bytes(int_bytes.try_into().unwrap())
}

pub(crate) fn is_illegal(chs: &str) -> bool {
    let illegal_char = "\\/:*?\"<>|";
    for ch in illegal_char.chars() {
        if chs.contains(ch) {
            return true;
        }
    }
    false
}
