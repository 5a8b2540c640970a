//! Bounded name buffers.
//!
//! Both buffers are fixed-capacity so the engine never allocates.

use heapless::Vec;

/// Longest filename (in bytes) the `F` command will store.
pub const MAX_FILENAME_LEN: usize = 63;

/// Longest entry name the directory listing sends. An 8.3 name is at most
/// twelve characters once the dot is put back in.
pub const MAX_ENTRY_NAME_LEN: usize = 12;

/// The filename all file and directory commands act on.
///
/// This outlives transactions: it only changes when the controller sends a
/// new `F` command. The length is tracked, so unlike a C string no
/// terminator is stored, but a zero byte sent by the controller still ends
/// the name the way a terminator would.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameBuffer {
    contents: Vec<u8, MAX_FILENAME_LEN>,
}

impl FilenameBuffer {
    /// Create an empty filename.
    pub const fn new() -> FilenameBuffer {
        FilenameBuffer {
            contents: Vec::new(),
        }
    }

    /// Forget the current name.
    pub fn clear(&mut self) {
        self.contents.clear();
    }

    /// Add a byte to the end of the name.
    ///
    /// If the buffer is full the byte is handed back and the name is left
    /// exactly as it was.
    pub fn push(&mut self, byte: u8) -> Result<(), u8> {
        self.contents.push(byte)
    }

    /// The name as given, up to (not including) any zero byte.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self
            .contents
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.contents.len());
        &self.contents[..end]
    }

    /// The name as a path, if it is valid UTF-8.
    pub fn as_path(&self) -> Result<&str, core::str::Utf8Error> {
        core::str::from_utf8(self.as_bytes())
    }

    /// How many bytes are stored (including any embedded zero).
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Is the buffer empty?
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Is there no more room?
    pub fn is_full(&self) -> bool {
        self.contents.is_full()
    }
}

/// The name of one directory entry, as sent by the listing.
///
/// Holds the last path component only, cut to [`MAX_ENTRY_NAME_LEN`] bytes.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryName {
    contents: Vec<u8, MAX_ENTRY_NAME_LEN>,
}

impl EntryName {
    /// Capture the base name of `name`, dropping any leading directories.
    pub fn capture(name: &str) -> EntryName {
        let base = name.rsplit('/').next().unwrap_or(name).as_bytes();
        let len = base.len().min(MAX_ENTRY_NAME_LEN);
        EntryName {
            contents: Vec::from_slice(&base[..len]).unwrap_or_default(),
        }
    }

    /// The byte at `offset`, if the name is that long.
    pub fn get(&self, offset: usize) -> Option<u8> {
        self.contents.get(offset).copied()
    }

    /// The captured name.
    pub fn as_bytes(&self) -> &[u8] {
        &self.contents
    }

    /// Length of the captured name.
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Is the name empty?
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
