//! A simple CLI app that preallocates a zero-filled file of a given size,
//! so disk-full, quota and permission errors surface at creation time.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use zerofile_allocator::{allocate, AllocationRequest, Error, Mode, MEBI};
use zerofile_progress::{percent, ConsoleReporter};

/// Exit status for a wrong or unparsable invocation.
const EXIT_USAGE: u8 = 32;
/// Exit status for a request above the size limit.
const EXIT_SIZE_LIMIT: u8 = 33;
/// Exit status for a file creation failure.
const EXIT_CREATE: u8 = 64;
/// Exit status for a template buffer allocation failure.
const EXIT_NO_MEMORY: u8 = 65;
/// Exit status for a mid-loop write, extend or flush failure.
const EXIT_GROW: u8 = 127;

/// The visual width of the progress bar.
const BAR_WIDTH: usize = 80;

#[derive(Debug, Parser)]
#[command(name = "zerofile", version, about = "Create empty files, catching I/O errors early.")]
struct Cli {
    /// Path of the file to create; must not exist yet.
    path: PathBuf,
    /// Requested file size, in MiB.
    size_mib: u64,
    /// How to grow the file.
    #[arg(long, value_enum, default_value_t = GrowMode::Extend)]
    mode: GrowMode,
    /// Fill byte for the template chunk, in write mode.
    #[arg(long, default_value_t = 0, value_name = "BYTE")]
    fill: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum GrowMode {
    /// Push the end-of-file marker forward; the OS provides the content.
    Extend,
    /// Write every chunk's bytes explicitly.
    Write,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Help and version requests surface as errors from try_parse,
            // but they are successful invocations, not usage mistakes.
            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    let request = match AllocationRequest::new(cli.path, cli.size_mib) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(EXIT_SIZE_LIMIT);
        }
    };
    let plan = request.plan();
    let mode = match cli.mode {
        GrowMode::Extend => Mode::Extend,
        GrowMode::Write => Mode::Write { fill: cli.fill },
    };

    tracing::debug!(
        message = "starting allocation",
        mode = ?mode,
        chunk_count = plan.chunk_count,
        chunk_size = plan.chunk_size,
    );

    println!(
        "Creating file {}, size {} MiB.",
        request.path().display(),
        request.total_mib()
    );
    println!(
        "Using {} chunks of {} bytes size.",
        plan.chunk_count, plan.chunk_size
    );

    match allocate(request, mode, ConsoleReporter::new(BAR_WIDTH)) {
        Ok(progress) => {
            println!(
                "\nSuccessfully written {} MiB, closing file.",
                progress.bytes_written / MEBI
            );
            println!("Finished.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("\n{err}");
            if let Some(progress) = err.progress() {
                eprintln!(
                    "Written {} MiB, aborting at {} percent.",
                    progress.bytes_written / MEBI,
                    percent(progress.chunks_written, plan.chunk_count)
                );
            }
            eprintln!("Aborting.");
            ExitCode::from(exit_status(&err))
        }
    }
}

/// The error-specific exit status for a failed run.
fn exit_status(err: &Error) -> u8 {
    match err {
        Error::SizeLimit { .. } => EXIT_SIZE_LIMIT,
        Error::Create(_) => EXIT_CREATE,
        Error::Buffer(_) => EXIT_NO_MEMORY,
        Error::Grow { .. } | Error::Flush { .. } => EXIT_GROW,
    }
}
