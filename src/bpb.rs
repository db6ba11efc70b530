//! BIOS Parameter Block (BPB) and Boot Sector
//!
//! The first important data structure on a FAT volume is the BPB, located
//! in the first sector of the volume. This sector is sometimes called the
//! "boot sector" or the "0th sector"; the important fact is simply that it
//! is the first sector of the volume.
//!
//! On FAT12 floppies the BPB proper occupies bytes 0x0B..0x26 and an
//! optional Extended BPB follows at 0x26 (signature byte 0x29, then the
//! volume serial, the label mirror and the file system type string). The
//! rest of sector 0 is boot code and is none of the file system's
//! business: serialization rewrites only the BPB/EBPB byte ranges.
//!
//! Derived layout, for the canonical 1.44 MB geometry:
//!
//! ```text
//! RootDirSector   = fat_start_sector + sectors_per_fat * fat_count
//! RootDirSectors  = root_entries / 16
//! FirstDataSector = RootDirSector + RootDirSectors
//! SectorOfCluster(N) = FirstDataSector + (N - 2) * sectors_per_cluster
//! ```
//!
//! Note that cluster numbering starts at 2; the first two FAT entries are
//! reserved for the media byte and the end-of-chain fill.

use crate::error::FsError;
use crate::{read_le_u16, read_le_u32, BLOCK_SIZE};

pub const EBPB_SIGNATURE: u8 = 0x29;

/// Extended BPB: present iff the byte at offset 0x26 is 0x29.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedBpb {
    /// Volume serial number, 4 raw bytes.
    pub serial: [u8; 4],
    /// Label mirror; the authoritative label lives in the root directory.
    pub label: [u8; 11],
    /// Must read "FAT     " or "FAT12   ".
    pub fs_type: [u8; 8],
}

/// *In-memory* form of the geometric header in sector 0.
///
/// Immutable after mount. All multi-byte fields are little-endian on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiosParameterBlock {
    /// Bytes per sector    Size: 2 bytes    Offset: 0x0B
    ///
    /// Must be 512 for supported media.
    pub bytes_per_sector: u16,
    /// Sectors per cluster    Size: 1 byte    Offset: 0x0D
    ///
    /// Must be 1 for supported media.
    pub sectors_per_cluster: u8,
    /// Reserved sector count    Size: 2 bytes    Offset: 0x0E
    ///
    /// The reserved region holds only the boot sector on a floppy, so this
    /// doubles as the sector index of the first FAT copy.
    pub fat_start_sector: u16,
    /// Number of FATs    Size: 1 byte    Offset: 0x10    Value: 1 or 2
    pub fat_count: u8,
    /// Root directory entry count    Size: 2 bytes    Offset: 0x11
    ///
    /// Must be a multiple of 16 so the root region is whole sectors.
    pub root_entries: u16,
    /// Total logical sectors    Size: 2 bytes    Offset: 0x13
    pub logical_sectors: u16,
    /// Media descriptor    Size: 1 byte    Offset: 0x15
    ///
    /// 0xF0 for removable media. Whatever value is put here must also be
    /// in the low byte of the FAT[0] entry.
    pub media_descriptor: u8,
    /// Sectors per FAT copy    Size: 2 bytes    Offset: 0x16
    pub sectors_per_fat: u16,
    /// Sectors per track for interrupt 0x13    Size: 2 bytes    Offset: 0x18
    pub sectors_per_track: u16,
    /// Number of heads for interrupt 0x13    Size: 2 bytes    Offset: 0x1A
    pub number_of_heads: u16,
    /// Hidden sectors preceding the partition    Size: 4 bytes    Offset: 0x1C
    pub hidden_sectors: u32,
    /// "Large" total logical sectors    Size: 4 bytes    Offset: 0x20
    ///
    /// Unused on floppies; kept verbatim.
    pub large_total_logical_sectors: u32,
    /// Drive number    Size: 1 byte    Offset: 0x24
    pub drive_number: u8,
    /// Unused EBPB flag byte    Size: 1 byte    Offset: 0x25
    pub ebpb_flags: u8,
    /// The extended block, when the 0x29 signature is present.
    pub ebpb: Option<ExtendedBpb>,
}

impl BiosParameterBlock {
    /// Parse sector 0.
    pub fn parse(sector: &[u8]) -> Result<Self, FsError> {
        if sector.len() < BLOCK_SIZE {
            return Err(FsError::InvalidBpb);
        }

        let bytes_per_sector = read_le_u16(&sector[0x0B..]);
        let sectors_per_cluster = sector[0x0D];
        let fat_start_sector = read_le_u16(&sector[0x0E..]);
        let fat_count = sector[0x10];
        let root_entries = read_le_u16(&sector[0x11..]);
        let logical_sectors = read_le_u16(&sector[0x13..]);
        let media_descriptor = sector[0x15];
        let sectors_per_fat = read_le_u16(&sector[0x16..]);

        if fat_count != 1 && fat_count != 2 {
            return Err(FsError::InvalidBpb);
        }
        if bytes_per_sector != BLOCK_SIZE as u16
            || sectors_per_cluster != 1
            || media_descriptor != 0xF0
            || root_entries % 16 != 0
        {
            return Err(FsError::UnsupportedGeometry);
        }

        let ebpb = if sector[0x26] == EBPB_SIGNATURE {
            let mut serial = [0u8; 4];
            serial.copy_from_slice(&sector[0x27..0x2B]);
            let mut label = [0u8; 11];
            label.copy_from_slice(&sector[0x2B..0x36]);
            let mut fs_type = [0u8; 8];
            fs_type.copy_from_slice(&sector[0x36..0x3E]);
            if &fs_type != b"FAT     " && &fs_type != b"FAT12   " {
                return Err(FsError::InvalidBpb);
            }
            Some(ExtendedBpb {
                serial,
                label,
                fs_type,
            })
        } else {
            None
        };

        let bpb = Self {
            bytes_per_sector,
            sectors_per_cluster,
            fat_start_sector,
            fat_count,
            root_entries,
            logical_sectors,
            media_descriptor,
            sectors_per_fat,
            sectors_per_track: read_le_u16(&sector[0x18..]),
            number_of_heads: read_le_u16(&sector[0x1A..]),
            hidden_sectors: read_le_u32(&sector[0x1C..]),
            large_total_logical_sectors: read_le_u32(&sector[0x20..]),
            drive_number: sector[0x24],
            ebpb_flags: sector[0x25],
            ebpb,
        };

        // the data region must actually exist
        if (bpb.logical_sectors as usize) <= bpb.first_data_sector() {
            return Err(FsError::InvalidBpb);
        }

        Ok(bpb)
    }

    /// Serialize into sector 0, touching only the BPB/EBPB byte ranges.
    /// The jump instruction, OEM name and boot code stay as they are.
    pub fn write_to(&self, sector: &mut [u8]) {
        sector[0x0B..0x0D].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        sector[0x0D] = self.sectors_per_cluster;
        sector[0x0E..0x10].copy_from_slice(&self.fat_start_sector.to_le_bytes());
        sector[0x10] = self.fat_count;
        sector[0x11..0x13].copy_from_slice(&self.root_entries.to_le_bytes());
        sector[0x13..0x15].copy_from_slice(&self.logical_sectors.to_le_bytes());
        sector[0x15] = self.media_descriptor;
        sector[0x16..0x18].copy_from_slice(&self.sectors_per_fat.to_le_bytes());
        sector[0x18..0x1A].copy_from_slice(&self.sectors_per_track.to_le_bytes());
        sector[0x1A..0x1C].copy_from_slice(&self.number_of_heads.to_le_bytes());
        sector[0x1C..0x20].copy_from_slice(&self.hidden_sectors.to_le_bytes());
        sector[0x20..0x24].copy_from_slice(&self.large_total_logical_sectors.to_le_bytes());
        sector[0x24] = self.drive_number;
        sector[0x25] = self.ebpb_flags;
        if let Some(ebpb) = &self.ebpb {
            sector[0x26] = EBPB_SIGNATURE;
            sector[0x27..0x2B].copy_from_slice(&ebpb.serial);
            sector[0x2B..0x36].copy_from_slice(&ebpb.label);
            sector[0x36..0x3E].copy_from_slice(&ebpb.fs_type);
        }
    }

    /// The canonical 3.5" 1.44 MB geometry: 80 cylinders, 2 heads, 18
    /// sectors per track, two 9-sector FAT copies, 224 root entries.
    pub fn floppy_1440(serial: [u8; 4], label: [u8; 11]) -> Self {
        Self {
            bytes_per_sector: BLOCK_SIZE as u16,
            sectors_per_cluster: 1,
            fat_start_sector: 1,
            fat_count: 2,
            root_entries: 224,
            logical_sectors: 2880,
            media_descriptor: 0xF0,
            sectors_per_fat: 9,
            sectors_per_track: 18,
            number_of_heads: 2,
            hidden_sectors: 0,
            large_total_logical_sectors: 0,
            drive_number: 0,
            ebpb_flags: 0,
            ebpb: Some(ExtendedBpb {
                serial,
                label,
                fs_type: *b"FAT12   ",
            }),
        }
    }

    /// First sector of the fixed root directory region.
    #[inline(always)]
    pub fn root_dir_sector(&self) -> usize {
        self.fat_start_sector as usize + self.sectors_per_fat as usize * self.fat_count as usize
    }

    /// Sectors occupied by the root directory (16 entries per sector).
    #[inline(always)]
    pub fn root_dir_sectors(&self) -> usize {
        self.root_entries as usize / 16
    }

    /// The first data sector beyond the root directory, i.e. the first
    /// sector of cluster 2.
    #[inline(always)]
    pub fn first_data_sector(&self) -> usize {
        self.root_dir_sector() + self.root_dir_sectors()
    }

    /// Sector of the first sector of a data cluster.
    #[inline(always)]
    pub fn cluster_sector(&self, cluster: u16) -> usize {
        debug_assert!(cluster >= 2);
        self.first_data_sector() + (cluster as usize - 2) * self.sectors_per_cluster as usize
    }

    #[inline(always)]
    pub fn cluster_size(&self) -> usize {
        self.sectors_per_cluster as usize * self.bytes_per_sector as usize
    }

    /// Total sectors of the data region.
    #[inline(always)]
    pub fn data_sectors(&self) -> usize {
        self.logical_sectors as usize - self.first_data_sector()
    }

    /// The count of data clusters, starting at cluster 2. Rounds down.
    #[inline(always)]
    pub fn data_clusters(&self) -> usize {
        self.data_sectors() / self.sectors_per_cluster as usize
    }

    /// Byte length of one FAT copy.
    #[inline(always)]
    pub fn fat_bytes(&self) -> usize {
        self.sectors_per_fat as usize * self.bytes_per_sector as usize
    }
}
