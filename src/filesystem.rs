//! The filesystem the engine drives.
//!
//! The engine doesn't know anything about FAT, blocks or SPI. It only needs
//! the handful of operations in [`Filesystem`]. Typically these are
//! implemented on top of a FAT library talking to an SD card.

use heapless::String;

use crate::filename::MAX_FILENAME_LEN;

/// The different ways the engine opens a file.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum OpenMode {
    /// Open a file for reading, if it exists.
    ReadOnly,
    /// Create a new empty file, or truncate an existing one.
    ReadWriteCreateOrTruncate,
    /// Create a new empty file, or open an existing one for appending.
    ReadWriteCreateOrAppend,
}

#[doc(inline)]
pub use embedded_sdmmc::fat::FatType;

#[doc(inline)]
pub use embedded_sdmmc::sdcard::CardType;

/// Wire encoding of an optional card type. No card (or a card we couldn't
/// talk to) is zero.
pub fn card_type_code(card: Option<CardType>) -> u8 {
    match card {
        None => 0,
        Some(CardType::SD1) => 1,
        Some(CardType::SD2) => 2,
        Some(CardType::SDHC) => 3,
    }
}

/// Wire encoding of a FAT type: the width of a FAT entry in bits.
pub fn fat_type_code(fat_type: FatType) -> u8 {
    match fat_type {
        FatType::Fat16 => 16,
        FatType::Fat32 => 32,
    }
}

/// The parts of the volume geometry the controller can ask about.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    /// Which flavour of FAT the volume uses
    pub fat_type: FatType,
    /// Number of 512 byte blocks in each cluster
    pub blocks_per_cluster: u32,
    /// Number of data clusters on the volume
    pub cluster_count: u32,
}

#[cfg(feature = "defmt-log")]
impl defmt::Format for VolumeInfo {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "VolumeInfo(FAT{}, {} blocks/cluster, {} clusters)",
            fat_type_code(self.fat_type),
            self.blocks_per_cluster,
            self.cluster_count
        )
    }
}

/// One entry in a directory.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// The entry's name. May carry a path prefix, which the listing strips.
    pub name: String<MAX_FILENAME_LEN>,
    /// Size in bytes (directories report zero)
    pub size: u32,
    /// Is this a directory?
    pub is_dir: bool,
}

/// The operations the engine needs from a filesystem.
///
/// All paths are the raw filename the controller set with the `F` command.
/// Anything that creates or modifies a file is expected to stamp it using a
/// [`crate::TimeSource`] (usually a reference to the shared
/// [`crate::Clock`], which is also what `embedded-sdmmc` expects).
///
/// Calls are made from inside bus event handlers, so they should return as
/// quickly as the hardware allows.
pub trait Filesystem {
    /// The errors this filesystem can report.
    type Error: core::fmt::Debug;
    /// An open file.
    type File;
    /// An open directory being iterated.
    type Dir;

    /// Open a file.
    fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<Self::File, Self::Error>;

    /// Read the next byte from a file, or `None` at the end.
    fn read_byte(&mut self, file: &mut Self::File) -> Result<Option<u8>, Self::Error>;

    /// Write one byte at the file's current position.
    fn write_byte(&mut self, file: &mut Self::File, byte: u8) -> Result<(), Self::Error>;

    /// Size of the file in bytes.
    fn file_size(&mut self, file: &Self::File) -> Result<u32, Self::Error>;

    /// Close a file, flushing anything written to it.
    fn close_file(&mut self, file: Self::File) -> Result<(), Self::Error>;

    /// Does anything (file or directory) exist at this path?
    fn exists(&mut self, path: &str) -> bool;

    /// Create a directory.
    fn make_dir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Remove a directory. Only empty directories can be removed.
    fn remove_dir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Remove a file.
    fn remove_file(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Open a directory for iteration. Must fail if the path is not a
    /// directory.
    fn open_dir(&mut self, path: &str) -> Result<Self::Dir, Self::Error>;

    /// Fetch the next entry, or `None` once they have all been seen.
    fn next_entry(&mut self, dir: &mut Self::Dir) -> Result<Option<DirEntry>, Self::Error>;

    /// Close a directory.
    fn close_dir(&mut self, dir: Self::Dir) -> Result<(), Self::Error>;

    /// Talk to the card and find out what it is. `None` if there's no card
    /// or it won't answer.
    fn card_type(&mut self) -> Option<CardType>;

    /// Read the geometry of the mounted volume.
    fn volume_info(&mut self) -> Result<VolumeInfo, Self::Error>;
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
