//! End-to-end scenarios against raw image bytes.

use std::sync::Arc;

use fat12::{FloppyImage, FsError, Volume, BLOCK_SIZE, DIRENT_SIZE};

const FAT1_SECTOR: usize = 1;
const FAT2_SECTOR: usize = 10;
const SECTORS_PER_FAT: usize = 9;
const ROOT_SECTOR: usize = 19;
const ROOT_SECTORS: usize = 14;

fn formatted(label: &str) -> (Arc<FloppyImage>, Volume) {
    let image = Arc::new(FloppyImage::new());
    let volume = Volume::format(image.clone(), label).unwrap();
    (image, volume)
}

/// Unpack the first on-disk FAT copy into 12-bit entries.
fn decode_fat(image: &FloppyImage) -> Vec<u16> {
    let bytes = image.read_sectors(FAT1_SECTOR, SECTORS_PER_FAT).unwrap();
    let mut entries = Vec::new();
    for triple in bytes.chunks(3) {
        let pair = triple[0] as u32 | (triple[1] as u32) << 8 | (triple[2] as u32) << 16;
        entries.push((pair & 0xFFF) as u16);
        entries.push((pair >> 12 & 0xFFF) as u16);
    }
    entries
}

fn fat_copies_equal(image: &FloppyImage) -> bool {
    image.read_sectors(FAT1_SECTOR, SECTORS_PER_FAT).unwrap()
        == image.read_sectors(FAT2_SECTOR, SECTORS_PER_FAT).unwrap()
}

/// Walk the decoded FAT from `start` the way a DOS driver would.
fn chain_of(fat: &[u16], start: u16) -> Vec<u16> {
    let mut chain = Vec::new();
    let mut cluster = start;
    while (2..0xFF0).contains(&cluster) {
        chain.push(cluster);
        cluster = fat[cluster as usize];
    }
    chain
}

/// Find the root slot whose 11 name bytes match, returning its byte offset
/// into the root region.
fn root_slot_offset(image: &FloppyImage, canonical: &[u8; 11]) -> Option<usize> {
    let region = image.read_sectors(ROOT_SECTOR, ROOT_SECTORS).unwrap();
    region
        .chunks_exact(DIRENT_SIZE)
        .position(|slot| &slot[..11] == canonical)
        .map(|i| i * DIRENT_SIZE)
}

#[test]
fn format_lays_out_a_mountable_volume() {
    let (image, volume) = formatted("TEST");

    // boot signature and the FAT preambles, straight off the image
    let boot = image.read_sectors(0, 1).unwrap();
    assert_eq!(&boot[0x1FE..0x200], &[0x55, 0xAA]);
    let fat1 = image.read_sectors(FAT1_SECTOR, 1).unwrap();
    assert_eq!(&fat1[..4], &[0xF0, 0xFF, 0xFF, 0x00]);
    let fat2 = image.read_sectors(FAT2_SECTOR, 1).unwrap();
    assert_eq!(&fat2[..4], &[0xF0, 0xFF, 0xFF, 0x00]);

    // the first root entry is the volume label
    let root = image.read_sectors(ROOT_SECTOR, 1).unwrap();
    assert_eq!(root[0x0B], 0x08);
    assert_eq!(&root[..11], b"TEST       ");

    assert_eq!(volume.label(), "TEST");
    assert!(volume.list_files("/", true).unwrap().is_empty());
    assert!(fat_copies_equal(&image));

    // and a second mount sees the same thing
    let reopened = Volume::open(image.clone()).unwrap();
    assert_eq!(reopened.label(), "TEST");
    assert!(reopened.list_files("/", true).unwrap().is_empty());
}

#[test]
fn format_rejects_bad_labels() {
    let image = Arc::new(FloppyImage::new());
    assert!(matches!(
        Volume::format(image.clone(), "TWELVECHARSX"),
        Err(FsError::NameTooLong)
    ));
    assert!(matches!(
        Volume::format(image.clone(), "日本語"),
        Err(FsError::InvalidName)
    ));
}

#[test]
fn small_file_round_trips_through_a_remount() {
    let (image, mut volume) = formatted("TEST");
    volume.write_file("/HELLO.TXT", b"hi", false).unwrap();
    drop(volume);

    let volume = Volume::open(image.clone()).unwrap();
    assert_eq!(volume.read_file("/HELLO.TXT").unwrap(), b"hi");

    let info = volume.stat("/HELLO.TXT").unwrap();
    assert_eq!(info.name, "HELLO.TXT");
    assert_eq!(info.size, Some(2));
    assert_eq!(info.starting_cluster, 2);
    assert!(info.modified.is_some());

    let fat = decode_fat(&image);
    assert_eq!(fat[0], 0xFF0);
    assert_eq!(fat[1], 0xFFF);
    assert!(fat[2] & 0xFF8 == 0xFF8, "FAT[2] = {:#05X}", fat[2]);
    assert!(fat_copies_equal(&image));
}

#[test]
fn a_ten_cluster_file_forms_a_monotonic_chain() {
    let (image, mut volume) = formatted("TEST");
    let payload: Vec<u8> = (0..5120u32).map(|i| (i % 251) as u8).collect();
    volume.write_file("/TEN.BIN", &payload, false).unwrap();

    let start = volume.stat("/TEN.BIN").unwrap().starting_cluster;
    let fat = decode_fat(&image);
    let chain = chain_of(&fat, start);
    assert_eq!(chain.len(), 10);
    assert!(chain.windows(2).all(|w| w[0] < w[1]));
    assert!(fat[chain[9] as usize] & 0xFF8 == 0xFF8);

    assert_eq!(volume.read_file("/TEN.BIN").unwrap(), payload);
}

#[test]
fn shrinking_a_file_frees_the_tail_clusters() {
    let (image, mut volume) = formatted("TEST");
    volume.write_file("/TEN.BIN", &[0x5A; 5120], false).unwrap();
    let start = volume.stat("/TEN.BIN").unwrap().starting_cluster;
    let before = chain_of(&decode_fat(&image), start);
    assert_eq!(before.len(), 10);

    volume.write_file("/TEN.BIN", &[0xA5; 256], false).unwrap();
    let info = volume.stat("/TEN.BIN").unwrap();
    assert_eq!(info.size, Some(256));
    assert_eq!(info.starting_cluster, start);

    let fat = decode_fat(&image);
    assert_eq!(chain_of(&fat, start), vec![start]);
    for cluster in &before[1..] {
        assert_eq!(fat[*cluster as usize], 0, "cluster {cluster} still in use");
    }

    assert_eq!(volume.read_file("/TEN.BIN").unwrap(), vec![0xA5u8; 256]);
}

#[test]
fn growing_a_file_reuses_and_extends_the_chain() {
    let (image, mut volume) = formatted("TEST");
    volume.write_file("/GROW.BIN", &[1; 100], false).unwrap();
    volume.write_file("/GROW.BIN", &[2; 2000], false).unwrap();

    let info = volume.stat("/GROW.BIN").unwrap();
    assert_eq!(info.size, Some(2000));
    let chain = chain_of(&decode_fat(&image), info.starting_cluster);
    assert_eq!(chain.len(), 4);
    assert_eq!(volume.read_file("/GROW.BIN").unwrap(), vec![2; 2000]);
    assert!(fat_copies_equal(&image));
}

#[test]
fn empty_files_carry_cluster_zero() {
    let (image, mut volume) = formatted("TEST");
    volume.write_file("/EMPTY.TXT", b"", false).unwrap();
    let info = volume.stat("/EMPTY.TXT").unwrap();
    assert_eq!(info.size, Some(0));
    assert_eq!(info.starting_cluster, 0);
    assert_eq!(volume.read_file("/EMPTY.TXT").unwrap(), b"");

    // grow it, then truncate it back to nothing
    volume.write_file("/EMPTY.TXT", &[7; 600], false).unwrap();
    let start = volume.stat("/EMPTY.TXT").unwrap().starting_cluster;
    assert!(start >= 2);
    volume.write_file("/EMPTY.TXT", b"", false).unwrap();
    let info = volume.stat("/EMPTY.TXT").unwrap();
    assert_eq!(info.size, Some(0));
    assert_eq!(info.starting_cluster, 0);
    let fat = decode_fat(&image);
    assert_eq!(fat[start as usize], 0);
    assert_eq!(fat[start as usize + 1], 0);
}

#[test]
fn subdirectory_files_move_to_the_root() {
    let (_, mut volume) = formatted("TEST");
    volume.create_directory("/SUB", false).unwrap();
    volume.write_file("/SUB/A.TXT", b"x", false).unwrap();
    assert!(volume.isfile("/SUB/A.TXT"));
    assert!(!volume.exists("/A.TXT"));

    volume.move_entry("/SUB/A.TXT", "/").unwrap();
    assert!(volume.isfile("/A.TXT"));
    assert!(!volume.exists("/SUB/A.TXT"));
    assert!(volume.list_files("/SUB", true).unwrap().is_empty());
    assert_eq!(volume.read_file("/A.TXT").unwrap(), b"x");
}

#[test]
fn moving_within_the_same_directory_is_a_no_op() {
    let (_, mut volume) = formatted("TEST");
    volume.write_file("/KEEP.TXT", b"k", false).unwrap();
    volume.move_entry("/KEEP.TXT", "/").unwrap();
    assert!(volume.isfile("/KEEP.TXT"));
    assert_eq!(volume.read_file("/KEEP.TXT").unwrap(), b"k");
}

#[test]
fn deleting_a_file_clears_slot_and_chain() {
    let (image, mut volume) = formatted("TEST");
    volume.write_file("/DOOMED.BIN", &[9; 1500], false).unwrap();
    let start = volume.stat("/DOOMED.BIN").unwrap().starting_cluster;
    let chain = chain_of(&decode_fat(&image), start);
    assert_eq!(chain.len(), 3);

    let offset = root_slot_offset(&image, b"DOOMED  BIN").unwrap();
    volume.delete_file("/DOOMED.BIN", false).unwrap();

    let region = image.read_sectors(ROOT_SECTOR, ROOT_SECTORS).unwrap();
    assert_eq!(region[offset], 0xE5);
    let fat = decode_fat(&image);
    for cluster in chain {
        assert_eq!(fat[cluster as usize], 0);
    }
    assert!(!volume.exists("/DOOMED.BIN"));
    assert!(fat_copies_equal(&image));
}

#[test]
fn directories_refuse_file_operations_and_vice_versa() {
    let (_, mut volume) = formatted("TEST");
    volume.create_directory("/SUB", false).unwrap();
    volume.write_file("/SUB/F.TXT", b"f", false).unwrap();

    assert!(matches!(
        volume.read_file("/SUB"),
        Err(FsError::IsADirectory)
    ));
    assert!(matches!(
        volume.delete_file("/SUB", false),
        Err(FsError::IsADirectory)
    ));
    assert!(matches!(
        volume.remove_directory("/SUB/F.TXT"),
        Err(FsError::NotADirectory)
    ));
    assert!(matches!(
        volume.remove_directory("/SUB"),
        Err(FsError::NotEmpty)
    ));

    volume.delete_file("/SUB/F.TXT", false).unwrap();
    volume.remove_directory("/SUB").unwrap();
    assert!(!volume.isdir("/SUB"));
}

#[test]
fn dotfiles_are_written_and_protected() {
    let (image, mut volume) = formatted("TEST");
    volume.create_directory("/SUB", false).unwrap();
    let start = volume.stat("/SUB").unwrap().starting_cluster;

    // cluster body starts with the two dotfile slots, cluster field 0
    let sector = 33 + (start as usize - 2);
    let body = image.read_sectors(sector, 1).unwrap();
    assert_eq!(&body[..11], b".          ");
    assert_eq!(body[0x0B], 0x10);
    assert_eq!(&body[0x1A..0x1C], &[0, 0]);
    assert_eq!(&body[32..32 + 11], b"..         ");
    assert_eq!(body[32 + 0x0B], 0x10);
    assert_eq!(&body[32 + 0x1A..32 + 0x1C], &[0, 0]);

    assert!(matches!(
        volume.delete_file("/SUB/.", false),
        Err(FsError::IsADirectory)
    ));
    assert!(matches!(
        volume.remove_directory("/SUB/.."),
        Err(FsError::InvalidName)
    ));
    assert!(matches!(
        volume.rename("/SUB/.", "DOT"),
        Err(FsError::InvalidName)
    ));
    assert!(matches!(
        volume.set_attributes("/SUB/..", 0x01),
        Err(FsError::InvalidName)
    ));
    assert!(matches!(
        volume.write_file("/SUB/..", b"no", false),
        Err(FsError::IsADirectory)
    ));
}

#[test]
fn cwd_navigation_follows_the_parent_chain() {
    let (_, mut volume) = formatted("TEST");
    volume.create_directory("/A", false).unwrap();
    volume.create_directory("/A/B", false).unwrap();

    assert_eq!(volume.get_cwd().unwrap(), "/");
    volume.chdir("/A/B").unwrap();
    assert_eq!(volume.get_cwd().unwrap(), "/A/B");

    // relative writes land in the cwd
    volume.write_file("REL.TXT", b"rel", false).unwrap();
    assert!(volume.isfile("/A/B/REL.TXT"));
    assert_eq!(volume.read_file("REL.TXT").unwrap(), b"rel");

    // the on-disk `..` carries cluster 0; the runtime chain resolves it
    volume.chdir("..").unwrap();
    assert_eq!(volume.get_cwd().unwrap(), "/A");
    volume.chdir(".").unwrap();
    assert_eq!(volume.get_cwd().unwrap(), "/A");
    volume.chdir("B/../..").unwrap();
    assert_eq!(volume.get_cwd().unwrap(), "/");

    // create-and-enter extends the chain correctly
    volume.create_directory("/A/C", true).unwrap();
    assert_eq!(volume.get_cwd().unwrap(), "/A/C");
    volume.chdir("..").unwrap();
    assert_eq!(volume.get_cwd().unwrap(), "/A");
}

#[test]
fn removing_or_moving_the_cwd_resets_to_root() {
    let (_, mut volume) = formatted("TEST");
    volume.create_directory("/A", false).unwrap();
    volume.create_directory("/A/B", true).unwrap();
    assert_eq!(volume.get_cwd().unwrap(), "/A/B");
    volume.remove_directory("/A/B").unwrap();
    assert_eq!(volume.get_cwd().unwrap(), "/");

    volume.create_directory("/C", false).unwrap();
    volume.create_directory("/D", false).unwrap();
    volume.chdir("/C").unwrap();
    volume.move_entry("/C", "/D").unwrap();
    assert_eq!(volume.get_cwd().unwrap(), "/");
    assert!(volume.isdir("/D/C"));
}

#[test]
fn attribute_edits_mask_and_preserve() {
    let (_, mut volume) = formatted("TEST");
    volume.create_directory("/SUB", false).unwrap();
    volume.write_file("/F.TXT", b"f", false).unwrap();

    volume.set_attributes("/SUB", 0x01).unwrap();
    let attrs = volume.stat("/SUB").unwrap().attributes;
    assert_eq!(attrs & 0x27, 0x01);
    assert_eq!(attrs & 0x10, 0x10, "directory bit must survive");

    // the 0x27 mask strips the label bit from the request
    volume.set_attributes("/F.TXT", 0x08 | 0x02).unwrap();
    let attrs = volume.stat("/F.TXT").unwrap().attributes;
    assert_eq!(attrs & 0x27, 0x02);
    assert_eq!(attrs & 0x08, 0);
}

#[test]
fn read_only_files_block_mutation_unless_overridden() {
    let (_, mut volume) = formatted("TEST");
    volume.write_file("/RO.TXT", b"locked", false).unwrap();
    volume.set_attributes("/RO.TXT", 0x01).unwrap();

    assert!(matches!(
        volume.write_file("/RO.TXT", b"new", false),
        Err(FsError::ReadOnly)
    ));
    assert!(matches!(
        volume.delete_file("/RO.TXT", false),
        Err(FsError::ReadOnly)
    ));
    assert_eq!(volume.read_file("/RO.TXT").unwrap(), b"locked");

    volume.write_file("/RO.TXT", b"new", true).unwrap();
    assert_eq!(volume.read_file("/RO.TXT").unwrap(), b"new");
    volume.delete_file("/RO.TXT", true).unwrap();
    assert!(!volume.exists("/RO.TXT"));
}

#[test]
fn hidden_entries_are_filtered_from_listings() {
    let (_, mut volume) = formatted("TEST");
    volume.write_file("/SHOWN.TXT", b"s", false).unwrap();
    volume.write_file("/HIDDEN.TXT", b"h", false).unwrap();
    volume.set_attributes("/HIDDEN.TXT", 0x02).unwrap();
    volume.create_directory("/HIDDIR", false).unwrap();
    volume.set_attributes("/HIDDIR", 0x02).unwrap();

    let names: Vec<String> = volume
        .list_files("/", false)
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert!(names.contains(&"SHOWN.TXT".to_string()));
    assert!(!names.contains(&"HIDDEN.TXT".to_string()));

    let names: Vec<String> = volume
        .list_files("/", true)
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert!(names.contains(&"HIDDEN.TXT".to_string()));

    let dirs: Vec<String> = volume
        .list_dirs("/", false)
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert!(!dirs.contains(&"HIDDIR".to_string()));
    let dirs: Vec<String> = volume
        .list_dirs("/", true)
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert!(dirs.contains(&"HIDDIR".to_string()));

    // the label entry never shows up anywhere
    let all: Vec<String> = volume
        .list_files("/", true)
        .unwrap()
        .into_iter()
        .chain(volume.list_dirs("/", true).unwrap())
        .map(|i| i.name)
        .collect();
    assert!(!all.iter().any(|n| n == "TEST"));
}

#[test]
fn rename_changes_only_the_name() {
    let (_, mut volume) = formatted("TEST");
    volume.write_file("/OLD.TXT", b"data", false).unwrap();
    let before = volume.stat("/OLD.TXT").unwrap();

    volume.rename("/OLD.TXT", "NEW.TXT").unwrap();
    assert!(!volume.exists("/OLD.TXT"));
    let after = volume.stat("/NEW.TXT").unwrap();
    assert_eq!(after.name, "NEW.TXT");
    assert_eq!(after.starting_cluster, before.starting_cluster);
    assert_eq!(after.size, before.size);
    assert_eq!(after.modified, before.modified);

    assert!(matches!(
        volume.rename("/NEW.TXT", "WAYTOOLONGNAME.TXT"),
        Err(FsError::NameTooLong)
    ));
}

#[test]
fn copy_into_files_and_directories() {
    let (_, mut volume) = formatted("TEST");
    volume.create_directory("/SUB", false).unwrap();
    volume.write_file("/SRC.TXT", b"payload", false).unwrap();

    // fresh destination
    volume.copy("/SRC.TXT", "/CPY.TXT", false).unwrap();
    assert_eq!(volume.read_file("/CPY.TXT").unwrap(), b"payload");

    // directory destination gets the source basename
    volume.copy("/SRC.TXT", "/SUB", false).unwrap();
    assert_eq!(volume.read_file("/SUB/SRC.TXT").unwrap(), b"payload");

    // archive forced on, system cleared
    volume.set_attributes("/SRC.TXT", 0x04).unwrap();
    volume.copy("/SRC.TXT", "/SYS.TXT", false).unwrap();
    let attrs = volume.stat("/SYS.TXT").unwrap().attributes;
    assert_eq!(attrs & 0x20, 0x20);
    assert_eq!(attrs & 0x04, 0);

    // a file cannot be copied onto itself
    assert!(matches!(
        volume.copy("/CPY.TXT", "/CPY.TXT", false),
        Err(FsError::InvalidArgument)
    ));

    // overwriting respects the read-only bit
    volume.set_attributes("/CPY.TXT", 0x01).unwrap();
    assert!(matches!(
        volume.copy("/SRC.TXT", "/CPY.TXT", false),
        Err(FsError::ReadOnly)
    ));
    volume.copy("/SRC.TXT", "/CPY.TXT", true).unwrap();
    assert_eq!(volume.read_file("/CPY.TXT").unwrap(), b"payload");
}

#[test]
fn issamefile_compares_resolved_slots() {
    let (_, mut volume) = formatted("TEST");
    volume.create_directory("/SUB", false).unwrap();
    volume.write_file("/SUB/X.TXT", b"x", false).unwrap();
    volume.chdir("/SUB").unwrap();

    assert_eq!(volume.issamefile("/SUB/X.TXT", "X.TXT"), Some(true));
    assert_eq!(volume.issamefile("/SUB/X.TXT", "./X.TXT"), Some(true));
    assert_eq!(volume.issamefile("/SUB/X.TXT", "../SUB/X.TXT"), Some(true));
    volume.write_file("/OTHER.TXT", b"o", false).unwrap();
    assert_eq!(volume.issamefile("/SUB/X.TXT", "/OTHER.TXT"), Some(false));
    assert_eq!(volume.issamefile("/SUB/X.TXT", "/MISSING.TXT"), None);
}

#[test]
fn backslashes_resolve_like_slashes() {
    let (_, mut volume) = formatted("TEST");
    volume.create_directory("\\WIN", false).unwrap();
    volume.write_file("\\WIN\\STYLE.TXT", b"dos", false).unwrap();
    assert!(volume.isfile("/WIN/STYLE.TXT"));
    assert_eq!(volume.read_file("/WIN/STYLE.TXT").unwrap(), b"dos");
}

#[test]
fn lookup_is_case_insensitive() {
    let (_, mut volume) = formatted("TEST");
    volume.write_file("/MiXeD.TxT", b"m", false).unwrap();
    assert_eq!(volume.stat("/mixed.txt").unwrap().name, "MIXED.TXT");
    assert_eq!(volume.read_file("/MIXED.TXT").unwrap(), b"m");
}

#[test]
fn duplicate_creation_is_refused() {
    let (_, mut volume) = formatted("TEST");
    volume.create_directory("/SUB", false).unwrap();
    assert!(matches!(
        volume.create_directory("/SUB", false),
        Err(FsError::AlreadyExists)
    ));
    volume.write_file("/F.TXT", b"1", false).unwrap();
    // overwriting through write_file is fine, the slot is reused
    volume.write_file("/F.TXT", b"22", false).unwrap();
    assert_eq!(volume.read_file("/F.TXT").unwrap(), b"22");
}

#[test]
fn missing_paths_surface_not_found() {
    let (_, mut volume) = formatted("TEST");
    assert!(matches!(
        volume.read_file("/NOPE.TXT"),
        Err(FsError::NotFound)
    ));
    assert!(matches!(
        volume.write_file("/NODIR/X.TXT", b"x", false),
        Err(FsError::NotFound)
    ));
    assert!(matches!(volume.chdir("/NODIR"), Err(FsError::NotFound)));
    assert!(matches!(volume.stat("/"), Err(FsError::NotFound)));
    assert!(!volume.exists("/NOPE.TXT"));
    assert!(volume.isdir("/"));
    assert!(!volume.isfile("/"));
}

#[test]
fn the_root_directory_cannot_grow() {
    let (_, mut volume) = formatted("TEST");
    // 224 root slots, one taken by the label entry
    for i in 0..223 {
        volume
            .write_file(&format!("/F{i}.TXT"), b"x", false)
            .unwrap();
    }
    assert!(matches!(
        volume.write_file("/ONEMORE.TXT", b"x", false),
        Err(FsError::RootFull)
    ));
    // a subdirectory simply grows a second cluster
    volume.delete_file("/F0.TXT", false).unwrap();
    volume.create_directory("/DEEP", false).unwrap();
    for i in 0..20 {
        volume
            .write_file(&format!("/DEEP/D{i}.TXT"), b"x", false)
            .unwrap();
    }
    assert_eq!(volume.list_files("/DEEP", true).unwrap().len(), 20);
}

#[test]
fn subdirectory_tail_clusters_are_compacted() {
    let (image, mut volume) = formatted("TEST");
    volume.create_directory("/SUB", false).unwrap();
    // 2 dotfiles + 20 files spill into a second directory cluster
    for i in 0..20 {
        volume
            .write_file(&format!("/SUB/D{i}.TXT"), b"x", false)
            .unwrap();
    }
    let start = volume.stat("/SUB").unwrap().starting_cluster;
    assert_eq!(chain_of(&decode_fat(&image), start).len(), 2);

    // emptying the tail cluster unlinks it
    for i in 14..20 {
        volume.delete_file(&format!("/SUB/D{i}.TXT"), false).unwrap();
    }
    assert_eq!(chain_of(&decode_fat(&image), start).len(), 1);
    assert_eq!(volume.list_files("/SUB", true).unwrap().len(), 14);
}

#[test]
fn volume_fills_up_to_no_space() {
    let (image, mut volume) = formatted("TEST");
    // 2847 data clusters in total; leave one free
    let big = vec![0xEE; 2846 * BLOCK_SIZE];
    volume.write_file("/BIG.BIN", &big, false).unwrap();
    assert!(matches!(
        volume.write_file("/TWO.BIN", &[1; 1024], false),
        Err(FsError::NoSpace)
    ));

    // a failed mutation leaves the in-memory state suspect; remount
    drop(volume);
    let mut volume = Volume::open(image.clone()).unwrap();
    assert_eq!(volume.read_file("/BIG.BIN").unwrap(), big);
    // a single-cluster file still fits
    volume.write_file("/ONE.BIN", &[1; 512], false).unwrap();
    assert_eq!(volume.read_file("/ONE.BIN").unwrap(), vec![1; 512]);
}

#[test]
fn labels_live_in_root_and_ebpb() {
    let (image, mut volume) = formatted("OLDLABEL");
    volume.write_file("/F.TXT", b"f", false).unwrap();
    volume.set_label("NEWLABEL").unwrap();
    assert_eq!(volume.label(), "NEWLABEL");

    // both stores hold the new label
    let boot = image.read_sectors(0, 1).unwrap();
    assert_eq!(&boot[0x2B..0x36], b"NEWLABEL   ");
    let root = image.read_sectors(ROOT_SECTOR, 1).unwrap();
    assert_eq!(&root[..11], b"NEWLABEL   ");
    assert_eq!(root[0x0B], 0x08);

    // and the file next to the label entry survived
    let reopened = Volume::open(image.clone()).unwrap();
    assert_eq!(reopened.label(), "NEWLABEL");
    assert_eq!(reopened.read_file("/F.TXT").unwrap(), b"f");
}

#[test]
fn fat_invariants_hold_after_a_mutation_storm() {
    let (image, mut volume) = formatted("TEST");
    volume.create_directory("/A", false).unwrap();
    volume.write_file("/A/ONE.BIN", &[1; 700], false).unwrap();
    volume.write_file("/TWO.BIN", &[2; 5000], false).unwrap();
    volume.copy("/TWO.BIN", "/A", false).unwrap();
    volume.write_file("/TWO.BIN", &[3; 100], false).unwrap();
    volume.rename("/A/TWO.BIN", "TRE.BIN").unwrap();
    volume.move_entry("/A/ONE.BIN", "/").unwrap();
    volume.delete_file("/TWO.BIN", false).unwrap();

    let fat = decode_fat(&image);
    assert_eq!(fat[0], 0xFF0);
    assert_eq!(fat[1], 0xFFF);
    assert!(fat_copies_equal(&image));

    assert_eq!(volume.read_file("/ONE.BIN").unwrap(), vec![1; 700]);
    assert_eq!(volume.read_file("/A/TRE.BIN").unwrap(), vec![2; 5000]);
}

#[test]
fn images_survive_a_save_and_open_cycle() {
    let (image, mut volume) = formatted("DISK");
    volume.create_directory("/DOCS", false).unwrap();
    volume
        .write_file("/DOCS/NOTE.TXT", b"remember the floppy", false)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("floppy.img");
    image.save(&path).unwrap();

    let reopened = Arc::new(FloppyImage::open(&path).unwrap());
    let volume = Volume::open(reopened.clone()).unwrap();
    assert_eq!(volume.label(), "DISK");
    assert_eq!(
        volume.read_file("/DOCS/NOTE.TXT").unwrap(),
        b"remember the floppy"
    );

    assert!(matches!(
        FloppyImage::open(dir.path().join("missing.img")),
        Err(FsError::Io(_))
    ));
}
