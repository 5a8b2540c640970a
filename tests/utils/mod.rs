//! Useful library code for tests

use sdcard_i2c_bridge::{
    BusEvent, CardType, Clock, DirEntry, FatType, Filesystem, NoIndicator, OpenMode,
    ProtocolEngine, Reply, Status, StatusIndicator, TimeSource, Timestamp, VolumeInfo,
};

/// Things that can go wrong in the in-memory filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Error {
    /// That file or directory doesn't exist
    NotFound,
    /// Something already has that name
    AlreadyExists,
    /// Expected a directory
    NotADirectory,
    /// Expected a file
    IsADirectory,
    /// Can't remove a directory with things in it
    DirNotEmpty,
    /// Can't remove something that is open
    InUse,
    /// Out of directory handles
    TooManyOpenDirs,
    /// Out of file handles
    TooManyOpenFiles,
    /// Tried to write to a file opened for reading
    ReadOnly,
    /// Volume couldn't be read
    NoVolume,
    /// No room left for another byte
    DiskFull,
    /// The card didn't answer
    Io,
}

#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, mtime: Timestamp },
    Dir { mtime: Timestamp },
}

/// An open file in a [`MemFilesystem`].
#[derive(Debug)]
pub struct MemFile {
    path: String,
    offset: usize,
    writable: bool,
}

/// An open directory in a [`MemFilesystem`].
#[derive(Debug)]
pub struct MemDir {
    path: String,
    entries: Vec<DirEntry>,
    next: usize,
}

/// A filesystem held in RAM, that behaves roughly like a FAT library does.
///
/// Names are case-insensitive (stored upper-case), entries are listed in
/// the order they were created, directories list `.` and `..` (except the
/// root), and nothing can be removed while it is open.
pub struct MemFilesystem<T> {
    nodes: Vec<(String, Node)>,
    time_source: T,
    open_files: Vec<String>,
    open_dirs: Vec<String>,
    max_open_dirs: usize,
    pub card: Option<CardType>,
    pub card_probes: usize,
    pub volume: Result<VolumeInfo, Error>,
    pub volume_reads: usize,
    pub mutations: usize,
    /// Largest size any file may grow to
    pub capacity: Option<usize>,
    /// Make every `read_byte` fail
    pub fail_reads: bool,
    /// Make every `file_size` fail
    pub fail_sizes: bool,
}

fn normalise(path: &str) -> String {
    path.trim_matches('/').to_ascii_uppercase()
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

#[allow(dead_code)]
impl<T> MemFilesystem<T>
where
    T: TimeSource,
{
    /// Make an empty filesystem on an SDHC card with a FAT32 volume.
    pub fn new(time_source: T) -> MemFilesystem<T> {
        MemFilesystem {
            nodes: Vec::new(),
            time_source,
            open_files: Vec::new(),
            open_dirs: Vec::new(),
            max_open_dirs: 2,
            card: Some(CardType::SDHC),
            card_probes: 0,
            volume: Ok(VolumeInfo {
                fat_type: FatType::Fat32,
                blocks_per_cluster: 64,
                cluster_count: 242_304,
            }),
            volume_reads: 0,
            mutations: 0,
            capacity: None,
            fail_reads: false,
            fail_sizes: false,
        }
    }

    fn find(&self, path: &str) -> Option<&Node> {
        if path.is_empty() {
            return None;
        }
        self.nodes.iter().find(|(p, _)| p == path).map(|(_, n)| n)
    }

    fn find_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|(p, _)| p == path)
            .map(|(_, n)| n)
    }

    fn is_dir_path(&self, path: &str) -> bool {
        path.is_empty() || matches!(self.find(path), Some(Node::Dir { .. }))
    }

    fn check_parent(&self, path: &str) -> Result<(), Error> {
        if self.is_dir_path(parent_of(path)) {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    fn children(&self, dir: &str) -> impl Iterator<Item = &(String, Node)> + '_ {
        let dir = dir.to_owned();
        self.nodes
            .iter()
            .filter(move |(p, _)| parent_of(p) == dir)
    }

    /// Add a file with the given contents.
    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        let mtime = self.time_source.get_timestamp();
        self.nodes.push((
            normalise(path),
            Node::File {
                data: data.to_vec(),
                mtime,
            },
        ));
    }

    /// Add a directory.
    pub fn add_dir(&mut self, path: &str) {
        let mtime = self.time_source.get_timestamp();
        self.nodes.push((normalise(path), Node::Dir { mtime }));
    }

    /// Get the contents of a file.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.find(&normalise(path)) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Get the modification time of a file or directory.
    pub fn mtime(&self, path: &str) -> Option<Timestamp> {
        match self.find(&normalise(path)) {
            Some(Node::File { mtime, .. }) | Some(Node::Dir { mtime }) => Some(*mtime),
            None => None,
        }
    }

    /// How many files and directories are open right now.
    pub fn open_handles(&self) -> usize {
        self.open_files.len() + self.open_dirs.len()
    }
}

impl<T> Filesystem for MemFilesystem<T>
where
    T: TimeSource,
{
    type Error = Error;
    type File = MemFile;
    type Dir = MemDir;

    fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<MemFile, Error> {
        let path = normalise(path);
        if path.is_empty() {
            return Err(Error::IsADirectory);
        }
        if self.open_files.contains(&path) {
            return Err(Error::InUse);
        }
        if self.open_files.len() >= 2 {
            return Err(Error::TooManyOpenFiles);
        }
        let now = self.time_source.get_timestamp();
        let mut offset = 0;
        match (self.find_mut(&path), mode) {
            (Some(Node::Dir { .. }), _) => return Err(Error::IsADirectory),
            (None, OpenMode::ReadOnly) => return Err(Error::NotFound),
            (Some(Node::File { .. }), OpenMode::ReadOnly) => {}
            (Some(Node::File { data, mtime }), OpenMode::ReadWriteCreateOrTruncate) => {
                data.clear();
                *mtime = now;
                self.mutations += 1;
            }
            (Some(Node::File { data, .. }), OpenMode::ReadWriteCreateOrAppend) => {
                offset = data.len();
            }
            (None, _) => {
                self.check_parent(&path)?;
                self.nodes.push((
                    path.clone(),
                    Node::File {
                        data: Vec::new(),
                        mtime: now,
                    },
                ));
                self.mutations += 1;
            }
        }
        self.open_files.push(path.clone());
        Ok(MemFile {
            path,
            offset,
            writable: mode != OpenMode::ReadOnly,
        })
    }

    fn read_byte(&mut self, file: &mut MemFile) -> Result<Option<u8>, Error> {
        if self.fail_reads {
            return Err(Error::Io);
        }
        match self.find(&file.path) {
            Some(Node::File { data, .. }) => {
                let b = data.get(file.offset).copied();
                if b.is_some() {
                    file.offset += 1;
                }
                Ok(b)
            }
            _ => Err(Error::NotFound),
        }
    }

    fn write_byte(&mut self, file: &mut MemFile, byte: u8) -> Result<(), Error> {
        if !file.writable {
            return Err(Error::ReadOnly);
        }
        let now = self.time_source.get_timestamp();
        let capacity = self.capacity;
        match self.find_mut(&file.path) {
            Some(Node::File { data, mtime }) => {
                if capacity.map_or(false, |cap| file.offset >= cap) {
                    return Err(Error::DiskFull);
                }
                if file.offset < data.len() {
                    data[file.offset] = byte;
                } else {
                    data.push(byte);
                }
                file.offset += 1;
                *mtime = now;
                self.mutations += 1;
                Ok(())
            }
            _ => Err(Error::NotFound),
        }
    }

    fn file_size(&mut self, file: &MemFile) -> Result<u32, Error> {
        if self.fail_sizes {
            return Err(Error::Io);
        }
        match self.find(&file.path) {
            Some(Node::File { data, .. }) => Ok(data.len() as u32),
            _ => Err(Error::NotFound),
        }
    }

    fn close_file(&mut self, file: MemFile) -> Result<(), Error> {
        let idx = self
            .open_files
            .iter()
            .position(|p| *p == file.path)
            .ok_or(Error::NotFound)?;
        self.open_files.swap_remove(idx);
        Ok(())
    }

    fn exists(&mut self, path: &str) -> bool {
        let path = normalise(path);
        path.is_empty() || self.find(&path).is_some()
    }

    fn make_dir(&mut self, path: &str) -> Result<(), Error> {
        let path = normalise(path);
        // Creating a directory needs a directory handle, just like a real
        // FAT library.
        if self.open_dirs.len() >= self.max_open_dirs {
            return Err(Error::TooManyOpenDirs);
        }
        if path.is_empty() || self.find(&path).is_some() {
            return Err(Error::AlreadyExists);
        }
        self.check_parent(&path)?;
        self.add_dir(&path);
        self.mutations += 1;
        Ok(())
    }

    fn remove_dir(&mut self, path: &str) -> Result<(), Error> {
        let path = normalise(path);
        match self.find(&path) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => return Err(Error::NotADirectory),
            None => return Err(Error::NotFound),
        }
        if self.open_dirs.contains(&path) {
            return Err(Error::InUse);
        }
        if self.children(&path).next().is_some() {
            return Err(Error::DirNotEmpty);
        }
        self.nodes.retain(|(p, _)| *p != path);
        self.mutations += 1;
        Ok(())
    }

    fn remove_file(&mut self, path: &str) -> Result<(), Error> {
        let path = normalise(path);
        match self.find(&path) {
            Some(Node::File { .. }) => {}
            Some(Node::Dir { .. }) => return Err(Error::IsADirectory),
            None => return Err(Error::NotFound),
        }
        if self.open_files.contains(&path) {
            return Err(Error::InUse);
        }
        self.nodes.retain(|(p, _)| *p != path);
        self.mutations += 1;
        Ok(())
    }

    fn open_dir(&mut self, path: &str) -> Result<MemDir, Error> {
        let path = normalise(path);
        if !self.is_dir_path(&path) {
            return Err(if self.find(&path).is_some() {
                Error::NotADirectory
            } else {
                Error::NotFound
            });
        }
        if self.open_dirs.len() >= self.max_open_dirs {
            return Err(Error::TooManyOpenDirs);
        }
        let mut entries = Vec::new();
        if !path.is_empty() {
            for dot in [".", ".."] {
                entries.push(DirEntry {
                    name: heapless::String::try_from(dot).unwrap(),
                    size: 0,
                    is_dir: true,
                });
            }
        }
        for (p, node) in self.children(&path) {
            let name = p.rsplit('/').next().unwrap();
            entries.push(match node {
                Node::File { data, .. } => DirEntry {
                    name: heapless::String::try_from(name).unwrap(),
                    size: data.len() as u32,
                    is_dir: false,
                },
                Node::Dir { .. } => DirEntry {
                    name: heapless::String::try_from(name).unwrap(),
                    // FAT directories have a size on disk, but we don't send it
                    size: 4096,
                    is_dir: true,
                },
            });
        }
        self.open_dirs.push(path.clone());
        Ok(MemDir {
            path,
            entries,
            next: 0,
        })
    }

    fn next_entry(&mut self, dir: &mut MemDir) -> Result<Option<DirEntry>, Error> {
        let entry = dir.entries.get(dir.next).cloned();
        if entry.is_some() {
            dir.next += 1;
        }
        Ok(entry)
    }

    fn close_dir(&mut self, dir: MemDir) -> Result<(), Error> {
        let idx = self
            .open_dirs
            .iter()
            .position(|p| *p == dir.path)
            .ok_or(Error::NotFound)?;
        self.open_dirs.swap_remove(idx);
        Ok(())
    }

    fn card_type(&mut self) -> Option<CardType> {
        self.card_probes += 1;
        self.card
    }

    fn volume_info(&mut self) -> Result<VolumeInfo, Error> {
        self.volume_reads += 1;
        self.volume
    }
}

/// Remembers every status it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    pub shown: Vec<Status>,
}

impl StatusIndicator for RecordingIndicator {
    fn show(&mut self, status: Status) {
        self.shown.push(status);
    }
}

/// The engine type most tests use.
pub type TestEngine<'c, I = NoIndicator> = ProtocolEngine<'c, MemFilesystem<&'c Clock>, I>;

/// Make an engine over an empty in-memory filesystem.
pub fn make_engine(clock: &Clock) -> TestEngine<'_> {
    init_logging();
    ProtocolEngine::new(MemFilesystem::new(clock), clock, NoIndicator)
}

/// Make an engine that records what it shows on its indicator.
#[allow(dead_code)]
pub fn make_recording_engine(clock: &Clock) -> TestEngine<'_, RecordingIndicator> {
    init_logging();
    ProtocolEngine::new(
        MemFilesystem::new(clock),
        clock,
        RecordingIndicator::default(),
    )
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Plays the part of the bus controller.
pub struct Host<'a, 'c, I>
where
    I: StatusIndicator,
{
    pub engine: &'a mut TestEngine<'c, I>,
}

#[allow(dead_code)]
impl<'a, 'c, I> Host<'a, 'c, I>
where
    I: StatusIndicator,
{
    pub fn new(engine: &'a mut TestEngine<'c, I>) -> Self {
        Host { engine }
    }

    /// One write transaction: the command byte, then the payload, then
    /// stop. Returns whether each byte (command included) was ACKed.
    pub fn write(&mut self, command: u8, payload: &[u8]) -> Vec<bool> {
        assert_eq!(self.engine.handle(BusEvent::AddressWrite), Reply::Ack);
        let mut acks = Vec::new();
        for b in core::iter::once(&command).chain(payload) {
            acks.push(self.engine.handle(BusEvent::Written(*b)) == Reply::Ack);
        }
        self.engine.handle(BusEvent::Stop);
        acks
    }

    /// Set the filename, insisting every byte is accepted.
    pub fn set_filename(&mut self, name: &str) {
        let acks = self.write(b'F', name.as_bytes());
        assert!(acks.iter().all(|a| *a), "filename {:?} refused", name);
    }

    /// Write the command byte, switch to reading with a repeated start, read
    /// `count` bytes, then NACK the last one and stop.
    ///
    /// The transport raises a stray read request after the NACK, like some
    /// real I2C peripherals do. Returns `None` if the command byte itself
    /// was refused.
    pub fn query(&mut self, command: u8, count: usize) -> Option<Vec<u8>> {
        self.engine.handle(BusEvent::AddressWrite);
        if self.engine.handle(BusEvent::Written(command)) != Reply::Ack {
            self.engine.handle(BusEvent::Stop);
            return None;
        }
        self.engine.handle(BusEvent::AddressRead);
        let data = self.read_bytes(count);
        self.engine.handle(BusEvent::Stop);
        Some(data)
    }

    /// Read `count` bytes in the current transaction, NACKing the last.
    pub fn read_bytes(&mut self, count: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(count);
        for _ in 0..count {
            match self.engine.handle(BusEvent::ReadRequested) {
                Reply::Byte(b) => data.push(b),
                other => panic!("Expected a byte, got {:?}", other),
            }
        }
        self.engine.handle(BusEvent::ReadNacked);
        // The one that never makes it to the controller
        self.engine.handle(BusEvent::ReadRequested);
        data
    }

    /// Read one byte as a yes/no answer.
    pub fn ask(&mut self, command: u8) -> u8 {
        self.query(command, 1).expect("command refused")[0]
    }

    /// Read bytes until `sentinel` arrives (inclusive), giving up after
    /// `limit` bytes.
    pub fn query_until(&mut self, command: u8, sentinel: u8, limit: usize) -> Option<Vec<u8>> {
        self.engine.handle(BusEvent::AddressWrite);
        if self.engine.handle(BusEvent::Written(command)) != Reply::Ack {
            self.engine.handle(BusEvent::Stop);
            return None;
        }
        self.engine.handle(BusEvent::AddressRead);
        let mut data = Vec::new();
        while data.len() < limit {
            match self.engine.handle(BusEvent::ReadRequested) {
                Reply::Byte(b) => {
                    data.push(b);
                    if b == sentinel {
                        break;
                    }
                }
                other => panic!("Expected a byte, got {:?}", other),
            }
        }
        self.engine.handle(BusEvent::ReadNacked);
        self.engine.handle(BusEvent::ReadRequested);
        self.engine.handle(BusEvent::Stop);
        Some(data)
    }
}

/// A time that's easy to spot: 4 April 2003, at 13:30:04.
#[allow(dead_code)]
pub fn make_timestamp() -> Timestamp {
    Timestamp::from_calendar(2003, 4, 4, 13, 30, 4).unwrap()
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
