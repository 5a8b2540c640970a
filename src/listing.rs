//! Streaming a directory listing over the bus.
//!
//! The `L` command answers with, for each entry:
//!
//! ```text
//! [type: 'D' or 'F'][name bytes...][0x00][size: u32 little-endian]
//! ```
//!
//! followed by a single `0xFF` after the last entry. An empty or missing
//! directory produces just the `0xFF`.
//!
//! Only one directory and one entry are ever held at a time, so the RAM
//! cost doesn't depend on how big the directory is.

use byteorder::{ByteOrder, LittleEndian};

use crate::filename::EntryName;
use crate::filesystem::{DirEntry, Filesystem};
use crate::{debug, trace};

/// Marks the end of a listing.
pub const LIST_END: u8 = 0xFF;

/// Type byte for a directory.
pub const TYPE_DIRECTORY: u8 = b'D';

/// Type byte for a file.
pub const TYPE_FILE: u8 = b'F';

/// The parts of a directory entry we send.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
struct Captured {
    name: EntryName,
    size: u32,
    is_dir: bool,
}

impl Captured {
    fn new(entry: &DirEntry) -> Captured {
        Captured {
            name: EntryName::capture(&entry.name),
            size: if entry.is_dir { 0 } else { entry.size },
            is_dir: entry.is_dir,
        }
    }

    fn type_byte(&self) -> u8 {
        if self.is_dir {
            TYPE_DIRECTORY
        } else {
            TYPE_FILE
        }
    }

    fn size_byte(&self, offset: usize) -> u8 {
        let mut data = [0u8; 4];
        LittleEndian::write_u32(&mut data, self.size);
        data[offset]
    }
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListState {
    Idle,
    SendingName { entry: Captured, offset: usize },
    SendingSize { entry: Captured, offset: usize },
    SendingNextType { entry: Captured },
    SendingEnd,
}

/// Drives the `L` reply, one byte per read request.
pub struct DirListing<FS>
where
    FS: Filesystem,
{
    state: ListState,
    dir: Option<FS::Dir>,
}

impl<FS> DirListing<FS>
where
    FS: Filesystem,
{
    /// Create an idle listing that holds nothing open.
    pub const fn new() -> DirListing<FS> {
        DirListing {
            state: ListState::Idle,
            dir: None,
        }
    }

    /// Is the listing idle (and so holding no handles)?
    pub fn is_idle(&self) -> bool {
        self.state == ListState::Idle && self.dir.is_none()
    }

    /// Produce the next byte of the listing for the directory at `path`.
    ///
    /// `path` is only looked at when a new listing starts. `None` means the
    /// controller's filename isn't usable as a path, which lists as empty.
    pub fn next_byte(&mut self, fs: &mut FS, path: Option<&str>) -> u8 {
        match core::mem::replace(&mut self.state, ListState::Idle) {
            ListState::Idle => self.start(fs, path),
            ListState::SendingName { entry, offset } => match entry.name.get(offset) {
                Some(b) => {
                    self.state = ListState::SendingName {
                        entry,
                        offset: offset + 1,
                    };
                    b
                }
                None => {
                    self.state = ListState::SendingSize { entry, offset: 0 };
                    0
                }
            },
            ListState::SendingSize { entry, offset } => {
                let b = entry.size_byte(offset);
                if offset + 1 < 4 {
                    self.state = ListState::SendingSize {
                        entry,
                        offset: offset + 1,
                    };
                } else {
                    self.state = match self.fetch_next(fs) {
                        Some(next) => ListState::SendingNextType { entry: next },
                        None => ListState::SendingEnd,
                    };
                }
                b
            }
            ListState::SendingNextType { entry } => {
                let b = entry.type_byte();
                self.state = ListState::SendingName { entry, offset: 0 };
                b
            }
            ListState::SendingEnd => {
                self.release(fs);
                LIST_END
            }
        }
    }

    /// Close anything we have open and go back to idle.
    ///
    /// Returns `true` if there was something to close.
    pub fn release(&mut self, fs: &mut FS) -> bool {
        let busy = !self.is_idle();
        self.state = ListState::Idle;
        if let Some(dir) = self.dir.take() {
            if fs.close_dir(dir).is_err() {
                debug!("Error closing listed directory");
            }
        }
        busy
    }

    fn start(&mut self, fs: &mut FS, path: Option<&str>) -> u8 {
        // Should already be closed, but don't leak it if it isn't
        self.release(fs);
        let Some(path) = path else {
            return LIST_END;
        };
        match fs.open_dir(path) {
            Ok(dir) => self.dir = Some(dir),
            Err(_) => {
                debug!("Can't list {}", path);
                return LIST_END;
            }
        }
        match self.fetch_next(fs) {
            Some(entry) => {
                trace!("Listing {}", path);
                let b = entry.type_byte();
                self.state = ListState::SendingName { entry, offset: 0 };
                b
            }
            None => {
                self.release(fs);
                LIST_END
            }
        }
    }

    /// Get the next entry worth sending. The `.` and `..` entries are
    /// skipped. A read error ends the listing early.
    fn fetch_next(&mut self, fs: &mut FS) -> Option<Captured> {
        let dir = self.dir.as_mut()?;
        loop {
            match fs.next_entry(dir) {
                Ok(Some(entry)) if entry.name == "." || entry.name == ".." => continue,
                Ok(Some(entry)) => return Some(Captured::new(&entry)),
                Ok(None) => return None,
                Err(_) => {
                    debug!("Error reading directory, ending listing early");
                    return None;
                }
            }
        }
    }
}

impl<FS> Default for DirListing<FS>
where
    FS: Filesystem,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<FS> core::fmt::Debug for DirListing<FS>
where
    FS: Filesystem,
{
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("DirListing")
            .field("state", &self.state)
            .field("dir_open", &self.dir.is_some())
            .finish()
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
