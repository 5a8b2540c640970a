//! Fixed-length multi-byte replies.
//!
//! The file-size and volume-info commands answer with a fixed number of
//! bytes, sent one per read request. Note the byte orders differ: file size
//! is big-endian, while volume info (like the directory listing) is
//! little-endian. Controllers depend on both.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::filesystem::{fat_type_code, VolumeInfo};

/// Length of the file-size reply.
pub const FILE_SIZE_LEN: usize = 4;

/// Length of the volume-info reply.
pub const VOLUME_INFO_LEN: usize = 10;

/// First byte of the volume-info reply when the volume could be read.
pub const VOLUME_INFO_OK: u8 = 1;

/// First byte of the volume-info reply when it couldn't.
pub const VOLUME_INFO_FAILED: u8 = 0xFF;

/// Produces a fixed-length reply one byte at a time.
///
/// The reply is built the first time a byte is asked for. Asking for bytes
/// past the end gives zero, forever.
#[derive(Debug, Clone)]
pub struct FixedResponse<const N: usize> {
    bytes: Option<[u8; N]>,
    cursor: usize,
}

impl<const N: usize> FixedResponse<N> {
    /// Create an empty reply.
    pub const fn new() -> FixedResponse<N> {
        FixedResponse {
            bytes: None,
            cursor: 0,
        }
    }

    /// Produce the next byte, building the reply with `build` if this is the
    /// first byte since it was created or [`reset`](Self::reset).
    pub fn next_byte<F>(&mut self, build: F) -> u8
    where
        F: FnOnce() -> [u8; N],
    {
        let bytes = self.bytes.get_or_insert_with(build);
        let byte = bytes.get(self.cursor).copied().unwrap_or(0);
        self.cursor = self.cursor.saturating_add(1);
        byte
    }

    /// Start again from the first byte, keeping the reply we built.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Start again from the first byte, and build the reply afresh.
    pub fn reset(&mut self) {
        self.bytes = None;
        self.cursor = 0;
    }

    /// How many bytes have been produced since the last rewind.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Has the reply been built yet?
    pub fn is_built(&self) -> bool {
        self.bytes.is_some()
    }
}

impl<const N: usize> Default for FixedResponse<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a file size, most significant byte first.
pub fn encode_file_size(size: u32) -> [u8; FILE_SIZE_LEN] {
    let mut data = [0u8; FILE_SIZE_LEN];
    BigEndian::write_u32(&mut data, size);
    data
}

/// Encode the volume-info reply.
///
/// `[status][fat type][blocks per cluster: 4 LE][cluster count: 4 LE]`. On
/// failure only the status byte means anything; the rest is zero.
pub fn encode_volume_info<E>(info: Result<VolumeInfo, E>) -> [u8; VOLUME_INFO_LEN] {
    let mut data = [0u8; VOLUME_INFO_LEN];
    match info {
        Ok(info) => {
            data[0] = VOLUME_INFO_OK;
            data[1] = fat_type_code(info.fat_type);
            LittleEndian::write_u32(&mut data[2..6], info.blocks_per_cluster);
            LittleEndian::write_u32(&mut data[6..10], info.cluster_count);
        }
        Err(_) => {
            data[0] = VOLUME_INFO_FAILED;
        }
    }
    data
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
