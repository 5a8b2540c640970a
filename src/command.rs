//! The single-byte commands a bus controller can send.

/// Every command the engine understands, plus a catch-all.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    /// `F`: the payload becomes the filename all other commands act on.
    SetFilename,
    /// `W`: create or truncate the file, then write the payload into it.
    Write,
    /// `A`: create the file if needed, then append the payload.
    Append,
    /// `R`: read the file back, one byte per read request.
    Read,
    /// `S`: the file's size, as a big-endian `u32`.
    FileSize,
    /// `E`: does the path exist?
    Exists,
    /// `K`: is the path a directory?
    IsDirectory,
    /// `L`: stream the contents of the directory.
    ListDirectory,
    /// `M`: create a directory.
    MakeDirectory,
    /// `D`: remove an empty directory.
    RemoveDirectory,
    /// `X`: remove a file.
    RemoveFile,
    /// `Q`: what sort of card is fitted?
    CardType,
    /// `V`: FAT type and geometry of the volume.
    VolumeInfo,
    /// `C`: set the clock from a six byte payload.
    SetClock,
    /// Anything else. It takes no payload and every read gives zero.
    Unknown(u8),
}

impl Command {
    /// Decode a command byte.
    pub const fn from_byte(byte: u8) -> Command {
        match byte {
            b'F' => Command::SetFilename,
            b'W' => Command::Write,
            b'A' => Command::Append,
            b'R' => Command::Read,
            b'S' => Command::FileSize,
            b'E' => Command::Exists,
            b'K' => Command::IsDirectory,
            b'L' => Command::ListDirectory,
            b'M' => Command::MakeDirectory,
            b'D' => Command::RemoveDirectory,
            b'X' => Command::RemoveFile,
            b'Q' => Command::CardType,
            b'V' => Command::VolumeInfo,
            b'C' => Command::SetClock,
            other => Command::Unknown(other),
        }
    }

    /// The byte that selects this command on the bus.
    pub const fn code(self) -> u8 {
        match self {
            Command::SetFilename => b'F',
            Command::Write => b'W',
            Command::Append => b'A',
            Command::Read => b'R',
            Command::FileSize => b'S',
            Command::Exists => b'E',
            Command::IsDirectory => b'K',
            Command::ListDirectory => b'L',
            Command::MakeDirectory => b'M',
            Command::RemoveDirectory => b'D',
            Command::RemoveFile => b'X',
            Command::CardType => b'Q',
            Command::VolumeInfo => b'V',
            Command::SetClock => b'C',
            Command::Unknown(other) => other,
        }
    }
}

impl From<u8> for Command {
    fn from(byte: u8) -> Command {
        Command::from_byte(byte)
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
