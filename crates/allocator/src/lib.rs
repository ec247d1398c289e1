//! The zerofile allocator implementation.
//!
//! Orchestrates a single allocation run: validate the request, compute the
//! chunk plan, create the file exclusively, grow it chunk by chunk with a
//! durability flush after every chunk, and report progress along the way.
//! Every failure is terminal for the run; a partially grown file is left
//! in place for the operator to inspect.

use std::{fs::File, io, path::PathBuf};

use zerofile_grower::{self as grower, Grow, GrowError};
use zerofile_progress::Reporter;

pub use zerofile_chunker::{ByteSize, ChunkIndex, ChunkPlan, MEBI};
pub use zerofile_grower::{BufferError, Mode};

/// The biggest file size we accept, in MiB.
pub const MAX_REQUEST_MIB: u64 = 1_000_000;

/// A validated request to allocate a file.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    /// Where to create the file.
    path: PathBuf,
    /// The requested size, in MiB.
    total_mib: u64,
}

impl AllocationRequest {
    /// Validate and capture an allocation request.
    ///
    /// Requests above [`MAX_REQUEST_MIB`] are rejected before any file
    /// operation takes place.
    pub fn new(path: impl Into<PathBuf>, total_mib: u64) -> Result<Self, Error> {
        if total_mib > MAX_REQUEST_MIB {
            return Err(Error::SizeLimit {
                requested_mib: total_mib,
            });
        }
        Ok(Self {
            path: path.into(),
            total_mib,
        })
    }

    /// The target path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// The requested size, in MiB.
    pub fn total_mib(&self) -> u64 {
        self.total_mib
    }

    /// The chunk plan for this request.
    pub fn plan(&self) -> ChunkPlan {
        ChunkPlan::compute(self.total_mib)
    }
}

/// How far an allocation run has come.
///
/// Updated once per completed chunk; carried inside mid-loop errors so the
/// caller can tell how much data made it to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// The number of chunks fully grown and flushed.
    pub chunks_written: ChunkIndex,
    /// The number of bytes fully grown and flushed.
    pub bytes_written: ByteSize,
}

/// An error from an allocation run.
#[derive(Debug)]
pub enum Error {
    /// The requested size exceeds [`MAX_REQUEST_MIB`].
    SizeLimit {
        /// The size that was asked for, in MiB.
        requested_mib: u64,
    },
    /// The target file could not be created.
    Create(io::Error),
    /// The template chunk buffer could not be allocated.
    Buffer(BufferError),
    /// A chunk growth operation failed mid-loop.
    Grow {
        /// How far the run came before the failure.
        progress: Progress,
        /// The underlying growth failure.
        source: GrowError,
    },
    /// The per-chunk durability flush failed mid-loop.
    Flush {
        /// How far the run came before the failure.
        progress: Progress,
        /// The underlying flush failure.
        source: io::Error,
    },
}

impl Error {
    /// The progress the run made before failing, if the failure happened
    /// inside the growth loop.
    pub fn progress(&self) -> Option<Progress> {
        match self {
            Self::Grow { progress, .. } | Self::Flush { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SizeLimit { requested_mib } => write!(
                f,
                "invalid file size of {requested_mib} MiB, the maximum is {MAX_REQUEST_MIB} MiB"
            ),
            Self::Create(err) => write!(f, "could not create file: {err}"),
            Self::Buffer(err) => write!(f, "{err}"),
            Self::Grow { source, .. } => write!(f, "could not enlarge file: {source}"),
            Self::Flush { source, .. } => {
                write!(f, "could not flush chunk to disk: {source}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SizeLimit { .. } => None,
            Self::Create(err) => Some(err),
            Self::Buffer(err) => Some(err),
            Self::Grow { source, .. } => Some(source),
            Self::Flush { source, .. } => Some(source),
        }
    }
}

/// A single allocation run.
pub struct Allocator<G, R> {
    /// The validated request.
    request: AllocationRequest,
    /// The plan derived from the request.
    plan: ChunkPlan,
    /// The growth strategy.
    grower: G,
    /// Where to report per-chunk progress.
    reporter: R,
}

impl<G, R> Allocator<G, R>
where
    G: Grow,
    R: Reporter,
{
    /// Build an allocation run from its parts.
    pub fn new(request: AllocationRequest, grower: G, reporter: R) -> Self {
        let plan = request.plan();
        Self {
            request,
            plan,
            grower,
            reporter,
        }
    }

    /// The plan this run will execute.
    pub fn plan(&self) -> ChunkPlan {
        self.plan
    }

    /// Run the allocation.
    ///
    /// On success the file holds exactly [`ChunkPlan::planned_bytes`]
    /// bytes, all flushed. On a mid-loop failure the file is left in
    /// place at whatever size the completed chunks reached.
    pub fn run(mut self) -> Result<Progress, Error> {
        let mut file = grower::create_exclusive(self.request.path()).map_err(Error::Create)?;
        tracing::debug!(
            message = "created file",
            path = %self.request.path().display(),
            chunk_count = self.plan.chunk_count,
            chunk_size = self.plan.chunk_size,
        );

        let mut progress = Progress::default();
        for chunk in self.plan.chunks() {
            let grown = self
                .grower
                .grow_by(&mut file)
                .map_err(|source| Error::Grow { progress, source })?;
            // Chunk i must be durable before chunk i + 1 starts.
            file.sync_all()
                .map_err(|source| Error::Flush { progress, source })?;
            progress.chunks_written = chunk.index + 1;
            progress.bytes_written += grown;
            self.reporter
                .report(progress.chunks_written, self.plan.chunk_count);
        }

        tracing::debug!(
            message = "allocation complete",
            bytes_written = progress.bytes_written,
        );
        // The handle is released on drop, success or not.
        Ok(progress)
    }
}

/// Run a whole allocation with the growth strategy picked by `mode`.
pub fn allocate(
    request: AllocationRequest,
    mode: Mode,
    reporter: impl Reporter,
) -> Result<Progress, Error> {
    let plan = request.plan();
    let grower = mode.grower(plan.chunk_size).map_err(Error::Buffer)?;
    Allocator::new(request, grower, reporter).run()
}
