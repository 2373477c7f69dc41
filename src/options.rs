//! Decode configuration.

/// How bit readers react when a payload ends before the image does.
///
/// Real-world files are often cut short, and a partially decoded frame is
/// still useful, so the default keeps going with zero bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncationPolicy {
    /// Pad missing bytes with zeros and mark the slice as truncated.
    #[default]
    Tolerant,
    /// Fail the slice with [`RawError::OutOfBounds`](crate::RawError::OutOfBounds).
    Strict,
}

impl TruncationPolicy {
    pub fn is_strict(self) -> bool {
        self == Self::Strict
    }
}

/// Options for one decode call.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Worker threads. `0` uses the host's available parallelism. The pool
    /// never grows past the number of slices.
    pub threads: usize,
    /// Behavior on truncated pixel payloads.
    pub truncation: TruncationPolicy,
    /// Record decoded zero samples as bad pixels where the format treats
    /// zero as a dead-pixel sentinel.
    pub zero_is_bad: bool,
    /// Row band height for formats whose slices can start at any row.
    /// `None` picks a band height from the image size.
    pub rows_per_slice: Option<usize>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            truncation: TruncationPolicy::Tolerant,
            zero_is_bad: true,
            rows_per_slice: None,
        }
    }
}

impl DecodeOptions {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_truncation(mut self, truncation: TruncationPolicy) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn with_zero_is_bad(mut self, zero_is_bad: bool) -> Self {
        self.zero_is_bad = zero_is_bad;
        self
    }

    pub fn with_rows_per_slice(mut self, rows: usize) -> Self {
        self.rows_per_slice = Some(rows);
        self
    }

    /// Worker count for `slices` units of work.
    pub(crate) fn worker_count(&self, slices: usize) -> usize {
        let wanted = if self.threads == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            self.threads
        };
        wanted.min(slices).max(1)
    }

    /// Band height used when the format leaves it free.
    pub(crate) fn band_rows(&self, height: usize) -> usize {
        match self.rows_per_slice {
            Some(rows) => rows.clamp(1, height.max(1)),
            // Aim for a few bands per core without going below 16 rows.
            None => (height / 64).max(16).min(height.max(1)),
        }
    }
}
