//! Crate error type.

use thiserror::Error;

/// Everything a volume operation can fail with. Errors surface to the
/// caller directly; there are no internal retries and no rollback. A
/// mutation that fails partway may leave the in-memory volume state out of
/// step with the image, in which case the caller should remount.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("image size or BPB geometry outside the supported 1.44 MB profile")]
    UnsupportedGeometry,
    #[error("invalid BIOS parameter block")]
    InvalidBpb,
    #[error("invalid file allocation table")]
    InvalidFat,
    #[error("no such file or directory")]
    NotFound,
    #[error("file already exists")]
    AlreadyExists,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory is not empty")]
    NotEmpty,
    #[error("file is read-only")]
    ReadOnly,
    #[error("name component too long for an 8.3 name")]
    NameTooLong,
    #[error("invalid or reserved name")]
    InvalidName,
    #[error("no free cluster left on the volume")]
    NoSpace,
    #[error("root directory is full")]
    RootFull,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
