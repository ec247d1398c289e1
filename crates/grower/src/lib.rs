//! File creation and per-chunk growth strategies.
//!
//! The file is grown one chunk at a time, and each grown chunk is flushed
//! to stable storage before the next one starts, so disk-full and quota
//! errors surface at the chunk where they happen.

use std::{
    collections::TryReserveError,
    fs::{File, OpenOptions},
    io::{self, Seek, SeekFrom, Write},
    path::Path,
};

use zerofile_chunker::ByteSize;

/// Create the target file with exclusive-creation semantics.
///
/// Fails if a file already exists at `path`; never overwrites. The handle
/// is opened for write-only access.
pub fn create_exclusive(path: impl AsRef<Path>) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}

/// An error from a single chunk growth operation.
#[derive(Debug)]
pub enum GrowError {
    /// An explicit chunk write failed, or wrote less than a whole chunk.
    Write(io::Error),
    /// Repositioning the write cursor or committing the new end-of-file
    /// failed.
    Extend(io::Error),
}

impl std::fmt::Display for GrowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write(err) => write!(f, "could not write chunk: {err}"),
            Self::Extend(err) => write!(f, "could not extend file by chunk: {err}"),
        }
    }
}

impl std::error::Error for GrowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Write(err) | Self::Extend(err) => Some(err),
        }
    }
}

/// An error when preparing the template chunk buffer.
#[derive(Debug)]
pub enum BufferError {
    /// The chunk size does not fit the address space of this platform.
    Oversize(ByteSize),
    /// The allocation itself failed.
    Alloc(TryReserveError),
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oversize(size) => {
                write!(f, "chunk size of {size} bytes does not fit in memory")
            }
            Self::Alloc(err) => {
                write!(f, "could not allocate memory for template chunk: {err}")
            }
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Oversize(_) => None,
            Self::Alloc(err) => Some(err),
        }
    }
}

/// A strategy for growing a file by one chunk.
///
/// The chunk size is fixed at construction time; [`Grow::grow_by`] advances
/// the file by exactly that much from its current write position.
pub trait Grow {
    /// Grow the file by one chunk and return the number of bytes added.
    fn grow_by(&mut self, file: &mut File) -> Result<ByteSize, GrowError>;
}

impl<G: Grow + ?Sized> Grow for Box<G> {
    fn grow_by(&mut self, file: &mut File) -> Result<ByteSize, GrowError> {
        (**self).grow_by(file)
    }
}

/// Grow the file by writing explicit byte content from a template buffer.
///
/// The buffer is allocated once, at construction, and reused for every
/// chunk.
#[derive(Debug)]
pub struct ExplicitWrite {
    /// The template chunk written once per growth call.
    template: Vec<u8>,
}

impl ExplicitWrite {
    /// A template chunk of `chunk_size` zero bytes.
    pub fn zeroed(chunk_size: ByteSize) -> Result<Self, BufferError> {
        Self::filled(chunk_size, 0)
    }

    /// A template chunk of `chunk_size` bytes, each set to `fill`.
    pub fn filled(chunk_size: ByteSize, fill: u8) -> Result<Self, BufferError> {
        let len = usize::try_from(chunk_size).map_err(|_| BufferError::Oversize(chunk_size))?;
        let mut template = Vec::new();
        template.try_reserve_exact(len).map_err(BufferError::Alloc)?;
        template.resize(len, fill);
        Ok(Self { template })
    }
}

impl Grow for ExplicitWrite {
    fn grow_by(&mut self, file: &mut File) -> Result<ByteSize, GrowError> {
        // write_all turns a short write into an error, so a partially
        // written chunk can never pass silently.
        file.write_all(&self.template).map_err(GrowError::Write)?;
        let grown = self.template.len() as ByteSize;
        tracing::trace!(message = "wrote chunk", bytes = grown);
        Ok(grown)
    }
}

/// Grow the file by moving the write position forward and committing the
/// new end-of-file, leaving the added region's content to the OS (zero
/// bytes on common filesystems).
#[derive(Debug)]
pub struct ExtendBySeek {
    /// How far to push the end-of-file per growth call.
    chunk_size: ByteSize,
}

impl ExtendBySeek {
    /// Create the strategy for a given chunk size.
    pub fn new(chunk_size: ByteSize) -> Self {
        Self { chunk_size }
    }
}

impl Grow for ExtendBySeek {
    fn grow_by(&mut self, file: &mut File) -> Result<ByteSize, GrowError> {
        let offset = i64::try_from(self.chunk_size)
            .map_err(|err| GrowError::Extend(io::Error::new(io::ErrorKind::InvalidInput, err)))?;
        let end = file
            .seek(SeekFrom::Current(offset))
            .map_err(GrowError::Extend)?;
        file.set_len(end).map_err(GrowError::Extend)?;
        tracing::trace!(message = "extended file", new_end = end);
        Ok(self.chunk_size)
    }
}

/// The growth strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Extend the end-of-file marker without writing content.
    Extend,
    /// Write a template chunk of `fill` bytes explicitly.
    Write {
        /// The byte the template chunk is filled with.
        fill: u8,
    },
}

impl Mode {
    /// Build the growth strategy for this mode and chunk size.
    pub fn grower(self, chunk_size: ByteSize) -> Result<Box<dyn Grow>, BufferError> {
        Ok(match self {
            Self::Extend => Box::new(ExtendBySeek::new(chunk_size)),
            Self::Write { fill } => Box::new(ExplicitWrite::filled(chunk_size, fill)?),
        })
    }
}
