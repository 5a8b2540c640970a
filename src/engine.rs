//! The transaction state machine.
//!
//! A transaction runs from an address match to a stop condition. The first
//! byte written after the address match selects the [`Command`]; after that,
//! written bytes are payload for that command and read requests are answered
//! from whatever reply that command produces. A stop (or a fresh address
//! match for writing, which aborts whatever was going on) releases every
//! file and directory handle the transaction was holding.
//!
//! The filename set by `F` is the only thing that survives from one
//! transaction to the next (apart from the clock, which isn't ours).

use heapless::Vec;

use crate::clock::{decode_wire, Clock, CLOCK_SET_LEN};
use crate::command::Command;
use crate::filename::FilenameBuffer;
use crate::filesystem::{card_type_code, Filesystem, OpenMode};
use crate::indicator::{Status, StatusIndicator};
use crate::listing::DirListing;
use crate::response::{
    encode_file_size, encode_volume_info, FixedResponse, FILE_SIZE_LEN, VOLUME_INFO_LEN,
};
use crate::{debug, trace, warn, Error, DEFAULT_ADDRESS};

/// What the `R` command sends once the file is exhausted.
pub const READ_DONE: u8 = 0xFF;

/// Everything the bus can tell us about.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Our address was matched, and the controller is going to write.
    AddressWrite,
    /// Our address was matched, and the controller wants to read.
    AddressRead,
    /// The controller wrote a byte.
    Written(u8),
    /// The controller is clocking out a byte and we must supply it.
    ReadRequested,
    /// The controller NACKed the byte we just sent, so it wants no more.
    ReadNacked,
    /// Stop condition: the transaction is over.
    Stop,
}

/// How we answer a [`BusEvent`].
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Acknowledge.
    Ack,
    /// Refuse the byte just written.
    Nack,
    /// Send this byte to the controller.
    Byte(u8),
}

/// The one-shot operations that change the filesystem.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum OneShot {
    MakeDir,
    RemoveDir,
    RemoveFile,
}

/// The command in progress, and the state it needs.
enum Active<FS>
where
    FS: Filesystem,
{
    SetFilename { written: usize },
    Writing { command: Command, file: FS::File },
    Reading { file: Option<FS::File> },
    FileSize { file: FS::File, reply: FixedResponse<FILE_SIZE_LEN> },
    Exists,
    IsDirectory,
    ListDirectory(DirListing<FS>),
    OneShot { op: OneShot, result: Option<bool> },
    CardType,
    VolumeInfo { reply: FixedResponse<VOLUME_INFO_LEN> },
    SetClock { bytes: Vec<u8, CLOCK_SET_LEN> },
    Unknown(u8),
}

impl<FS> Active<FS>
where
    FS: Filesystem,
{
    fn command(&self) -> Command {
        match self {
            Active::SetFilename { .. } => Command::SetFilename,
            Active::Writing { command, .. } => *command,
            Active::Reading { .. } => Command::Read,
            Active::FileSize { .. } => Command::FileSize,
            Active::Exists => Command::Exists,
            Active::IsDirectory => Command::IsDirectory,
            Active::ListDirectory(_) => Command::ListDirectory,
            Active::OneShot {
                op: OneShot::MakeDir,
                ..
            } => Command::MakeDirectory,
            Active::OneShot {
                op: OneShot::RemoveDir,
                ..
            } => Command::RemoveDirectory,
            Active::OneShot {
                op: OneShot::RemoveFile,
                ..
            } => Command::RemoveFile,
            Active::CardType => Command::CardType,
            Active::VolumeInfo { .. } => Command::VolumeInfo,
            Active::SetClock { .. } => Command::SetClock,
            Active::Unknown(code) => Command::Unknown(*code),
        }
    }
}

/// Where we are in the current transaction.
enum Transaction<FS>
where
    FS: Filesystem,
{
    /// Between transactions.
    Idle,
    /// Address matched for writing; the next byte is a command.
    AwaitingCommand,
    /// A command is in progress.
    InCommand(Active<FS>),
}

/// Turns bus events into filesystem operations.
///
/// Construct one of these at start-up and hand every bus event to it, in
/// order. It holds at most one open file or one open directory at a time,
/// and never holds either across a transaction boundary.
pub struct ProtocolEngine<'c, FS, I>
where
    FS: Filesystem,
    I: StatusIndicator,
{
    fs: FS,
    clock: &'c Clock,
    indicator: I,
    address: u8,
    filename: FilenameBuffer,
    transaction: Transaction<FS>,
    last_read_nacked: bool,
}

impl<'c, FS, I> ProtocolEngine<'c, FS, I>
where
    FS: Filesystem,
    I: StatusIndicator,
{
    /// Create a new engine answering to [`DEFAULT_ADDRESS`].
    ///
    /// The clock is shared: the filesystem should read the same one when it
    /// stamps files.
    pub fn new(fs: FS, clock: &'c Clock, indicator: I) -> ProtocolEngine<'c, FS, I> {
        Self::new_with_address(fs, clock, indicator, DEFAULT_ADDRESS)
    }

    /// Create a new engine that answers to the given 7-bit address.
    ///
    /// The engine doesn't look at the address itself; it's kept so the bus
    /// set-up code has one place to get it from.
    pub fn new_with_address(
        fs: FS,
        clock: &'c Clock,
        mut indicator: I,
        address: u8,
    ) -> ProtocolEngine<'c, FS, I> {
        debug!("Creating new protocol engine at address {:#x}", address);
        indicator.show(Status::Idle);
        ProtocolEngine {
            fs,
            clock,
            indicator,
            address,
            filename: FilenameBuffer::new(),
            transaction: Transaction::Idle,
            last_read_nacked: false,
        }
    }

    /// The bus address we answer to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The filename the file commands currently act on.
    pub fn filename(&self) -> &FilenameBuffer {
        &self.filename
    }

    /// The clock this engine sets.
    pub fn clock(&self) -> &'c Clock {
        self.clock
    }

    /// Temporarily get access to the underlying filesystem.
    pub fn filesystem(&mut self) -> &mut FS {
        &mut self.fs
    }

    /// The command in progress, if any.
    pub fn active_command(&self) -> Option<Command> {
        match &self.transaction {
            Transaction::InCommand(active) => Some(active.command()),
            _ => None,
        }
    }

    /// Is the engine between transactions, holding no handles?
    pub fn is_idle(&self) -> bool {
        matches!(self.transaction, Transaction::Idle)
    }

    /// Close anything still open and give back the filesystem and indicator.
    pub fn free(mut self) -> (FS, I) {
        self.abort();
        (self.fs, self.indicator)
    }

    /// Handle one bus event.
    pub fn handle(&mut self, event: BusEvent) -> Reply {
        match event {
            BusEvent::AddressWrite => {
                self.on_address_matched_for_write();
                Reply::Ack
            }
            BusEvent::AddressRead => {
                self.on_address_matched_for_read();
                Reply::Ack
            }
            BusEvent::Written(byte) => {
                if self.on_byte_written(byte) {
                    Reply::Ack
                } else {
                    Reply::Nack
                }
            }
            BusEvent::ReadRequested => Reply::Byte(self.on_byte_read_requested()),
            BusEvent::ReadNacked => {
                self.on_read_nacked();
                Reply::Ack
            }
            BusEvent::Stop => {
                self.on_transaction_stop();
                Reply::Ack
            }
        }
    }

    /// The controller addressed us for writing: a new transaction starts.
    ///
    /// Anything left over from a transaction that never saw its stop is
    /// thrown away.
    pub fn on_address_matched_for_write(&mut self) {
        if self.abort() {
            debug!("Previous transaction interrupted; handles released");
        }
        self.transaction = Transaction::AwaitingCommand;
        self.last_read_nacked = false;
        self.indicator.show(Status::Idle);
    }

    /// The controller addressed us for reading.
    ///
    /// If this is a repeated start after writing a command, the reply picks
    /// up with that command. Fixed-length replies start again from their
    /// first byte.
    pub fn on_address_matched_for_read(&mut self) {
        self.last_read_nacked = false;
        match &mut self.transaction {
            Transaction::InCommand(Active::FileSize { reply, .. }) => reply.rewind(),
            Transaction::InCommand(Active::VolumeInfo { reply }) => reply.reset(),
            _ => {}
        }
    }

    /// The controller wrote a byte. Returns `true` to ACK it, `false` to
    /// NACK it.
    pub fn on_byte_written(&mut self, byte: u8) -> bool {
        let result = match self.transaction {
            Transaction::Idle | Transaction::AwaitingCommand => {
                self.begin_command(Command::from_byte(byte))
            }
            Transaction::InCommand(_) => self.accept_payload(byte),
        };
        match result {
            Ok(()) => true,
            Err(_e) => {
                warn!("Rejected byte {:#x}: {}", byte, _e.reason());
                false
            }
        }
    }

    /// The transport says the controller NACKed the byte we just sent.
    ///
    /// Some I2C peripherals ask for one more byte after this, which can never
    /// reach the controller. The next read request is answered without
    /// touching any cursor or the filesystem.
    pub fn on_read_nacked(&mut self) {
        self.last_read_nacked = true;
    }

    /// The controller wants a byte.
    pub fn on_byte_read_requested(&mut self) -> u8 {
        if self.last_read_nacked {
            self.last_read_nacked = false;
            trace!("Ignoring read request after NACK");
            return 0;
        }
        let active = match &mut self.transaction {
            Transaction::InCommand(active) => active,
            _ => return 0,
        };
        let path = self.filename.as_path().ok();
        match active {
            Active::Reading { file } => {
                let Some(f) = file.as_mut() else {
                    return READ_DONE;
                };
                match self.fs.read_byte(f) {
                    Ok(Some(b)) => return b,
                    Ok(None) => {
                        trace!("End of file");
                    }
                    Err(_) => {
                        warn!("Read failed, ending file early");
                    }
                }
                if let Some(f) = file.take() {
                    if self.fs.close_file(f).is_err() {
                        warn!("Error closing file after read");
                    }
                }
                READ_DONE
            }
            Active::FileSize { file, reply } => {
                let fs = &mut self.fs;
                reply.next_byte(|| {
                    let size = fs.file_size(file).unwrap_or_else(|_| {
                        warn!("Can't get file size");
                        0
                    });
                    encode_file_size(size)
                })
            }
            Active::Exists => match path {
                Some(path) => u8::from(self.fs.exists(path)),
                None => 0,
            },
            Active::IsDirectory => {
                let Some(path) = path else {
                    return 0;
                };
                match self.fs.open_dir(path) {
                    Ok(dir) => {
                        if self.fs.close_dir(dir).is_err() {
                            warn!("Error closing probed directory");
                        }
                        1
                    }
                    Err(_) => 0,
                }
            }
            Active::ListDirectory(listing) => listing.next_byte(&mut self.fs, path),
            Active::OneShot { op, result } => {
                if result.is_none() {
                    let op = *op;
                    self.indicator.show(Status::Busy);
                    let ok = match path {
                        Some(path) => {
                            let outcome = match op {
                                OneShot::MakeDir => self.fs.make_dir(path),
                                OneShot::RemoveDir => self.fs.remove_dir(path),
                                OneShot::RemoveFile => self.fs.remove_file(path),
                            };
                            outcome.is_ok()
                        }
                        None => false,
                    };
                    debug!("{:?} on {}: {}", op, path.unwrap_or(""), ok);
                    self.indicator
                        .show(if ok { Status::Success } else { Status::Error });
                    *result = Some(ok);
                }
                u8::from(result.unwrap_or(false))
            }
            Active::CardType => card_type_code(self.fs.card_type()),
            Active::VolumeInfo { reply } => {
                let fs = &mut self.fs;
                reply.next_byte(|| encode_volume_info(fs.volume_info()))
            }
            Active::SetFilename { .. } | Active::Writing { .. } | Active::SetClock { .. } => 0,
            Active::Unknown(_) => 0,
        }
    }

    /// Stop condition: commit what needs committing and release everything.
    ///
    /// The filename is kept.
    pub fn on_transaction_stop(&mut self) {
        let transaction = core::mem::replace(&mut self.transaction, Transaction::Idle);
        if let Transaction::InCommand(active) = transaction {
            self.finish(active);
        }
    }

    /// Start the command selected by the first written byte.
    fn begin_command(&mut self, command: Command) -> Result<(), Error<FS::Error>> {
        debug!("Command {:?}", command);
        // Until it has opened whatever it needs, nothing is in progress
        self.transaction = Transaction::AwaitingCommand;
        let active = match command {
            Command::SetFilename => Active::SetFilename { written: 0 },
            Command::Write => Active::Writing {
                command,
                file: self.open_file(OpenMode::ReadWriteCreateOrTruncate)?,
            },
            Command::Append => Active::Writing {
                command,
                file: self.open_file(OpenMode::ReadWriteCreateOrAppend)?,
            },
            Command::Read => Active::Reading {
                file: Some(self.open_file(OpenMode::ReadOnly)?),
            },
            Command::FileSize => Active::FileSize {
                file: self.open_file(OpenMode::ReadOnly)?,
                reply: FixedResponse::new(),
            },
            Command::Exists => Active::Exists,
            Command::IsDirectory => Active::IsDirectory,
            Command::ListDirectory => Active::ListDirectory(DirListing::new()),
            Command::MakeDirectory => Active::OneShot {
                op: OneShot::MakeDir,
                result: None,
            },
            Command::RemoveDirectory => Active::OneShot {
                op: OneShot::RemoveDir,
                result: None,
            },
            Command::RemoveFile => Active::OneShot {
                op: OneShot::RemoveFile,
                result: None,
            },
            Command::CardType => Active::CardType,
            Command::VolumeInfo => Active::VolumeInfo {
                reply: FixedResponse::new(),
            },
            Command::SetClock => Active::SetClock { bytes: Vec::new() },
            Command::Unknown(code) => {
                warn!("Unknown command {:#x}", code);
                Active::Unknown(code)
            }
        };
        self.transaction = Transaction::InCommand(active);
        Ok(())
    }

    /// Open the file named by the filename buffer.
    fn open_file(&mut self, mode: OpenMode) -> Result<FS::File, Error<FS::Error>> {
        let path = self
            .filename
            .as_path()
            .map_err(|_| Error::FilenameNotUtf8)?;
        match self.fs.open_file(path, mode) {
            Ok(file) => {
                self.indicator.show(Status::Success);
                Ok(file)
            }
            Err(e) => {
                self.indicator.show(Status::Error);
                Err(Error::Filesystem(e))
            }
        }
    }

    /// Route a payload byte to the active command.
    fn accept_payload(&mut self, byte: u8) -> Result<(), Error<FS::Error>> {
        let Transaction::InCommand(active) = &mut self.transaction else {
            return Err(Error::UnexpectedPayload);
        };
        match active {
            Active::SetFilename { written } => {
                if *written == 0 {
                    self.filename.clear();
                }
                self.filename
                    .push(byte)
                    .map_err(|_| Error::FilenameFull)?;
                *written += 1;
                Ok(())
            }
            Active::Writing { file, .. } => match self.fs.write_byte(file, byte) {
                Ok(()) => Ok(()),
                Err(e) => {
                    self.indicator.show(Status::Error);
                    Err(Error::Filesystem(e))
                }
            },
            Active::SetClock { bytes } => bytes.push(byte).map_err(|_| Error::ClockBufferFull),
            _ => Err(Error::UnexpectedPayload),
        }
    }

    /// End a command: commit a complete clock-set, close whatever is open.
    fn finish(&mut self, active: Active<FS>) {
        match active {
            Active::SetClock { bytes } => self.commit_clock(&bytes),
            Active::Writing { file, .. } | Active::FileSize { file, .. } => {
                if self.fs.close_file(file).is_err() {
                    warn!("Error closing file");
                    self.indicator.show(Status::Error);
                }
            }
            Active::Reading { file: Some(file) } => {
                if self.fs.close_file(file).is_err() {
                    warn!("Error closing file");
                }
            }
            Active::ListDirectory(mut listing) => {
                listing.release(&mut self.fs);
            }
            _ => {}
        }
    }

    /// Set the clock, if we got exactly the right number of good bytes.
    fn commit_clock(&mut self, bytes: &[u8]) {
        let Ok(bytes) = <&[u8; CLOCK_SET_LEN]>::try_from(bytes) else {
            debug!("Ignoring partial clock set ({} bytes)", bytes.len());
            return;
        };
        match decode_wire(bytes) {
            Ok(now) => {
                debug!("Clock set to {}", now);
                self.clock.set(now);
                self.indicator.show(Status::Success);
            }
            Err(_e) => {
                warn!("Clock not set: {}", _e);
                self.indicator.show(Status::Error);
            }
        }
    }

    /// Drop the current transaction, closing anything it had open.
    ///
    /// Returns `true` if something was in progress.
    fn abort(&mut self) -> bool {
        match core::mem::replace(&mut self.transaction, Transaction::Idle) {
            Transaction::InCommand(active) => {
                // A half-received clock is never committed on abort
                if !matches!(active, Active::SetClock { .. }) {
                    self.finish(active);
                }
                true
            }
            Transaction::AwaitingCommand => true,
            Transaction::Idle => false,
        }
    }
}

impl<'c, FS, I> core::fmt::Debug for ProtocolEngine<'c, FS, I>
where
    FS: Filesystem,
    I: StatusIndicator,
{
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("address", &self.address)
            .field("filename", &self.filename)
            .field("active_command", &self.active_command())
            .field("last_read_nacked", &self.last_read_nacked)
            .finish()
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
