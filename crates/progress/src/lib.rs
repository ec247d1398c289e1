//! Allocation progress reporting utilities.

use std::io::{self, Write};

/// The hard cap on the visual width of a progress bar, in segments.
pub const MAX_BAR_WIDTH: usize = 100;

/// A fixed-width textual progress bar.
///
/// The visual buffer is allocated once, at construction, and reused for
/// every render.
#[derive(Debug)]
pub struct Bar {
    /// The reusable render buffer.
    segments: String,
    /// The visual width, in segments.
    width: usize,
}

impl Bar {
    /// Create a bar of the given visual width, capped at [`MAX_BAR_WIDTH`].
    pub fn new(width: usize) -> Self {
        let width = width.min(MAX_BAR_WIDTH);
        Self {
            segments: String::with_capacity(width),
            width,
        }
    }

    /// The visual width of the bar, in segments.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Render the bar for `completed` steps out of `total`.
    ///
    /// The filled portion is proportional to `completed / total`; an empty
    /// total renders as full.
    pub fn render(&mut self, completed: u64, total: u64) -> &str {
        let filled = match total {
            0 => self.width,
            total => {
                let completed = completed.min(total);
                (completed as u128 * self.width as u128 / total as u128) as usize
            }
        };
        self.segments.clear();
        self.segments.extend(std::iter::repeat('=').take(filled));
        self.segments
            .extend(std::iter::repeat(' ').take(self.width - filled));
        &self.segments
    }
}

/// The integer percentage of `completed` steps out of `total`.
pub fn percent(completed: u64, total: u64) -> u64 {
    match total {
        0 => 100,
        total => (completed.min(total) as u128 * 100 / total as u128) as u64,
    }
}

/// Progress reporter.
pub trait Reporter {
    /// Report that `completed` steps out of `total` are done.
    fn report(&mut self, completed: u64, total: u64);
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, completed: u64, total: u64) {
        (**self).report(completed, total)
    }
}

/// A reporter that does nothing.
#[derive(Debug)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&mut self, _completed: u64, _total: u64) {}
}

/// A reporter that emits [`tracing`] trace-level events for progress
/// reporting.
#[derive(Debug)]
pub struct TracingReporter {
    /// The name of the progress reporter.
    pub name: std::borrow::Cow<'static, str>,
}

impl TracingReporter {
    /// Create a new [`TracingReporter`] with a static str name.
    pub const fn from_static(name: &'static str) -> Self {
        Self {
            name: std::borrow::Cow::Borrowed(name),
        }
    }
}

impl Reporter for TracingReporter {
    fn report(&mut self, completed: u64, total: u64) {
        tracing::trace!(message = "Progress", %completed, %total, reporter = %self.name);
    }
}

/// A reporter that redraws a progress bar line on stdout in place.
#[derive(Debug)]
pub struct ConsoleReporter {
    /// The bar renderer.
    bar: Bar,
}

impl ConsoleReporter {
    /// Create a console reporter with a bar of the given width.
    pub fn new(width: usize) -> Self {
        Self {
            bar: Bar::new(width),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&mut self, completed: u64, total: u64) {
        let pct = percent(completed, total);
        let bar = self.bar.render(completed, total);
        let mut stdout = io::stdout().lock();
        let result = write!(stdout, "\rProgress: |{bar}| {pct} %").and_then(|()| stdout.flush());
        if result.is_err() {
            // Losing a progress line is no reason to stop the run.
            tracing::debug!(message = "unable to write progress to stdout");
        }
    }
}
