//! End-to-end allocation behavior against a real filesystem.

use std::fs::File;

use pretty_assertions::assert_eq;
use zerofile_allocator::{
    allocate, AllocationRequest, Allocator, Error, Mode, Progress, MAX_REQUEST_MIB, MEBI,
};
use zerofile_grower::{ExtendBySeek, Grow, GrowError};
use zerofile_progress::{NoopReporter, Reporter};

fn request(dir: &tempfile::TempDir, name: &str, total_mib: u64) -> AllocationRequest {
    AllocationRequest::new(dir.path().join(name), total_mib).unwrap()
}

#[test]
fn five_mib_request_is_exact_in_extend_mode() {
    let dir = tempfile::tempdir().unwrap();
    let request = request(&dir, "out.bin", 5);
    let path = request.path().to_owned();

    let progress = allocate(request, Mode::Extend, NoopReporter).unwrap();

    assert_eq!(
        progress,
        Progress {
            chunks_written: 5,
            bytes_written: 5 * MEBI,
        }
    );
    assert_eq!(std::fs::metadata(path).unwrap().len(), 5 * MEBI);
}

#[test]
fn five_mib_request_is_exact_in_write_mode() {
    let dir = tempfile::tempdir().unwrap();
    let request = request(&dir, "out.bin", 5);
    let path = request.path().to_owned();

    allocate(request, Mode::Write { fill: 0 }, NoopReporter).unwrap();

    let contents = std::fs::read(path).unwrap();
    assert_eq!(contents.len() as u64, 5 * MEBI);
    assert!(contents.iter().all(|byte| *byte == 0));
}

#[test]
fn zero_size_request_produces_an_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let request = request(&dir, "out.bin", 0);
    let path = request.path().to_owned();

    let progress = allocate(request, Mode::Extend, NoopReporter).unwrap();

    assert_eq!(progress, Progress::default());
    assert_eq!(std::fs::metadata(path).unwrap().len(), 0);
}

#[test]
fn existing_path_fails_without_touching_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let request = request(&dir, "out.bin", 5);
    let path = request.path().to_owned();
    std::fs::write(&path, b"precious").unwrap();

    let err = allocate(request, Mode::Extend, NoopReporter).unwrap_err();

    assert!(matches!(err, Error::Create(_)), "got {err:?}");
    assert_eq!(std::fs::read(path).unwrap(), b"precious");
}

#[test]
fn oversize_request_is_rejected_before_any_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");

    let err = AllocationRequest::new(&path, MAX_REQUEST_MIB + 1).unwrap_err();

    assert!(
        matches!(
            err,
            Error::SizeLimit {
                requested_mib
            } if requested_mib == MAX_REQUEST_MIB + 1
        ),
        "got {err:?}"
    );
    assert!(!path.exists());
}

#[test]
fn requests_at_the_limit_are_accepted() {
    AllocationRequest::new("out.bin", MAX_REQUEST_MIB).unwrap();
}

/// Grows normally for a fixed number of chunks, then fails.
struct FailAfter {
    inner: ExtendBySeek,
    remaining: u64,
}

impl Grow for FailAfter {
    fn grow_by(&mut self, file: &mut File) -> Result<u64, GrowError> {
        if self.remaining == 0 {
            return Err(GrowError::Write(std::io::Error::other(
                "no space left on device",
            )));
        }
        self.remaining -= 1;
        self.inner.grow_by(file)
    }
}

#[test]
fn mid_loop_failure_reports_progress_and_leaves_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let request = request(&dir, "out.bin", 5);
    let path = request.path().to_owned();
    let grower = FailAfter {
        inner: ExtendBySeek::new(MEBI),
        remaining: 3,
    };

    let err = Allocator::new(request, grower, NoopReporter)
        .run()
        .unwrap_err();

    let progress = err.progress().unwrap();
    assert_eq!(
        progress,
        Progress {
            chunks_written: 3,
            bytes_written: 3 * MEBI,
        }
    );
    assert!(matches!(err, Error::Grow { .. }), "got {err:?}");
    // No rollback: the partial file stays in place.
    assert_eq!(std::fs::metadata(path).unwrap().len(), 3 * MEBI);
}

/// Records every report call.
#[derive(Default)]
struct RecordingReporter {
    calls: Vec<(u64, u64)>,
}

impl Reporter for RecordingReporter {
    fn report(&mut self, completed: u64, total: u64) {
        self.calls.push((completed, total));
    }
}

#[test]
fn progress_is_reported_once_per_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let request = request(&dir, "out.bin", 3);
    let mut reporter = RecordingReporter::default();

    allocate(request, Mode::Extend, &mut reporter).unwrap();

    assert_eq!(reporter.calls, vec![(1, 3), (2, 3), (3, 3)]);
}
