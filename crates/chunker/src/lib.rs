//! A notion of chunks and the size-partitioning policy for zerofile.
//!
//! A requested file size is split into a bounded number of equally-sized
//! chunks, so the growth loop issues at most [`MAX_CHUNK_COUNT`] discrete
//! OS calls regardless of how big the request is.

/// The type we use for data size calculations.
pub type ByteSize = u64;

/// The type we use for chunk indexes and counts.
pub type ChunkIndex = u64;

/// One mebibyte, in bytes.
pub const MEBI: ByteSize = 1024 * 1024;

/// Requests above this many MiB switch to the larger chunk count.
pub const LARGE_REQUEST_MIB: u64 = 10_000;

/// The chunk count for requests of up to [`LARGE_REQUEST_MIB`] MiB.
pub const BASE_CHUNK_COUNT: ChunkIndex = 100;

/// The chunk count for requests above [`LARGE_REQUEST_MIB`] MiB.
pub const MAX_CHUNK_COUNT: ChunkIndex = 1000;

/// The chunk plan: how many chunks to grow the file by, and how big each
/// chunk is.
///
/// Derived deterministically from the requested size, computed once and
/// passed around by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// The number of chunks the growth loop will perform.
    pub chunk_count: ChunkIndex,
    /// The size of a single chunk, in bytes. A whole multiple of [`MEBI`].
    pub chunk_size: ByteSize,
}

impl ChunkPlan {
    /// Compute the plan for a request of `total_mib` MiB.
    ///
    /// Policy: 1000 chunks for requests above [`LARGE_REQUEST_MIB`] MiB,
    /// 100 chunks otherwise, with the chunk size found by truncating
    /// division. Requests smaller than [`BASE_CHUNK_COUNT`] MiB would
    /// truncate to zero-sized chunks, so they use one chunk per requested
    /// MiB instead and come out exact.
    pub fn compute(total_mib: u64) -> Self {
        let chunk_count = if total_mib > LARGE_REQUEST_MIB {
            MAX_CHUNK_COUNT
        } else if total_mib >= BASE_CHUNK_COUNT {
            BASE_CHUNK_COUNT
        } else {
            total_mib
        };
        let chunk_size = match chunk_count {
            0 => 0,
            count => (total_mib / count) * MEBI,
        };
        Self {
            chunk_count,
            chunk_size,
        }
    }

    /// The total number of bytes the plan will produce.
    ///
    /// Never exceeds the requested size in bytes; the remainder of the
    /// truncating division is dropped.
    pub fn planned_bytes(&self) -> ByteSize {
        self.chunk_count * self.chunk_size
    }

    /// True when the plan performs no growth at all.
    pub fn is_empty(&self) -> bool {
        self.chunk_count == 0 || self.chunk_size == 0
    }

    /// Iterate over the planned chunks, in file order.
    pub fn chunks(&self) -> Chunks {
        Chunks {
            plan: *self,
            index: 0,
        }
    }
}

/// A single planned chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedChunk {
    /// The index of the chunk.
    pub index: ChunkIndex,
    /// The first byte offset of this chunk.
    pub first_byte_offset: ByteSize,
    /// The offset right past the last byte of this chunk.
    pub end_offset: ByteSize,
}

/// Iterator over the chunks of a [`ChunkPlan`], from the start of the file
/// to the end.
#[derive(Debug)]
pub struct Chunks {
    /// The plan to enumerate.
    plan: ChunkPlan,
    /// The index of the next chunk to yield.
    index: ChunkIndex,
}

impl Iterator for Chunks {
    type Item = PlannedChunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.plan.chunk_count || self.plan.chunk_size == 0 {
            return None;
        }
        let index = self.index;
        self.index += 1;
        let first_byte_offset = index * self.plan.chunk_size;
        Some(PlannedChunk {
            index,
            first_byte_offset,
            end_offset: first_byte_offset + self.plan.chunk_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plan(total_mib: u64) -> ChunkPlan {
        ChunkPlan::compute(total_mib)
    }

    #[test]
    fn empty_request() {
        assert_eq!(
            plan(0),
            ChunkPlan {
                chunk_count: 0,
                chunk_size: 0,
            }
        );
        assert!(plan(0).is_empty());
    }

    #[test]
    fn small_requests_use_one_mebi_chunks() {
        assert_eq!(
            plan(5),
            ChunkPlan {
                chunk_count: 5,
                chunk_size: MEBI,
            }
        );
        assert_eq!(plan(5).planned_bytes(), 5 * MEBI);
    }

    #[test]
    fn smallest_base_count_request() {
        assert_eq!(
            plan(100),
            ChunkPlan {
                chunk_count: 100,
                chunk_size: MEBI,
            }
        );
    }

    #[test]
    fn base_chunk_count() {
        assert_eq!(
            plan(500),
            ChunkPlan {
                chunk_count: 100,
                chunk_size: 5 * MEBI,
            }
        );
        assert_eq!(plan(500).planned_bytes(), 500 * MEBI);
    }

    #[test]
    fn large_threshold_is_exclusive() {
        assert_eq!(
            plan(10_000),
            ChunkPlan {
                chunk_count: 100,
                chunk_size: 100 * MEBI,
            }
        );
        assert_eq!(
            plan(10_001),
            ChunkPlan {
                chunk_count: 1000,
                chunk_size: 10 * MEBI,
            }
        );
    }

    #[test]
    fn large_request_uses_max_count() {
        assert_eq!(
            plan(15_000),
            ChunkPlan {
                chunk_count: 1000,
                chunk_size: 15 * MEBI,
            }
        );
        assert_eq!(plan(15_000).planned_bytes(), 15_000 * MEBI);
    }

    #[test]
    fn truncation_drops_the_remainder() {
        // 150 / 100 truncates to 1 MiB chunks; the 50 MiB remainder is
        // dropped by the policy.
        assert_eq!(
            plan(150),
            ChunkPlan {
                chunk_count: 100,
                chunk_size: MEBI,
            }
        );
        assert_eq!(plan(150).planned_bytes(), 100 * MEBI);
    }

    #[test]
    fn planned_bytes_never_exceed_the_request() {
        let samples = [
            0, 1, 5, 99, 100, 101, 150, 500, 999, 10_000, 10_001, 15_000, 1_000_000,
        ];
        for total_mib in samples {
            let plan = plan(total_mib);
            assert!(plan.planned_bytes() <= total_mib * MEBI, "total_mib = {total_mib}");
            assert!(plan.chunk_count <= MAX_CHUNK_COUNT, "total_mib = {total_mib}");
        }
    }

    #[test]
    fn chunk_offsets_are_contiguous() {
        let actual: Vec<(u64, u64)> = plan(3)
            .chunks()
            .map(|chunk| (chunk.first_byte_offset, chunk.end_offset))
            .collect();
        let expected = vec![(0, MEBI), (MEBI, 2 * MEBI), (2 * MEBI, 3 * MEBI)];
        assert_eq!(actual, expected);
    }

    #[test]
    fn empty_plan_yields_no_chunks() {
        assert_eq!(plan(0).chunks().count(), 0);
    }
}
