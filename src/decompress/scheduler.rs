//! Multi-threaded slice decoding into one shared output plane.
//!
//! An image is cut into [`Slice`]s whose destination rectangles never
//! overlap. Workers pull slices from a queue and write straight into their
//! own rectangle of the caller's [`OutputPlane`], so pixel writes need no
//! locking. The only shared mutable state is the bad-pixel list, which each
//! worker appends to once, after its last slice.
//!
//! ```text
//!  slices ──► queue ──► worker 0 ──► rows 0..16    ┐
//!                  ├──► worker 1 ──► rows 16..32   ├─► OutputPlane
//!                  └──► worker 2 ──► rows 32..48   ┘
//! ```
//!
//! A failing slice does not stop the others. The first failure reported is
//! returned after every worker has joined; slices that finished stay
//! written.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::cursor::checked_end;
use crate::error::{RawError, Result};
use crate::image::{BadPixel, BadPixelList, DecodeReport, OutputPlane};
use crate::options::{DecodeOptions, TruncationPolicy};

/// An independently decodable rectangle and the bytes that encode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub source_byte_offset: usize,
    pub source_byte_count: usize,
    pub dest_x: usize,
    pub dest_y: usize,
    pub width: usize,
    pub height: usize,
}

impl Slice {
    fn right(&self) -> usize {
        self.dest_x + self.width
    }

    fn bottom(&self) -> usize {
        self.dest_y + self.height
    }

    fn overlaps(&self, other: &Slice) -> bool {
        self.dest_x < other.right()
            && other.dest_x < self.right()
            && self.dest_y < other.bottom()
            && other.dest_y < self.bottom()
    }
}

/// Validated slice plan for one image.
#[derive(Debug, Clone)]
pub struct SliceScheduler {
    width: usize,
    height: usize,
    slices: Vec<Slice>,
}

impl SliceScheduler {
    /// Check that every slice is non-empty, inside a `width x height` plane
    /// and disjoint from every other slice.
    pub fn new(width: usize, height: usize, slices: Vec<Slice>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RawError::layout(format!(
                "empty output plane {}x{}",
                width, height
            )));
        }
        for (i, s) in slices.iter().enumerate() {
            if s.width == 0 || s.height == 0 {
                return Err(RawError::layout(format!("slice {} is empty", i)));
            }
            let inside = checked_end(s.dest_x, s.width, width).is_ok()
                && checked_end(s.dest_y, s.height, height).is_ok();
            if !inside {
                return Err(RawError::layout(format!(
                    "slice {} ({}x{} at {},{}) exceeds {}x{} plane",
                    i, s.width, s.height, s.dest_x, s.dest_y, width, height
                )));
            }
        }

        // Sweep in row order; only slices starting above another's bottom
        // edge can overlap it.
        let mut order: Vec<usize> = (0..slices.len()).collect();
        order.sort_by_key(|&i| (slices[i].dest_y, slices[i].dest_x));
        for (pos, &i) in order.iter().enumerate() {
            let a = &slices[i];
            for &j in &order[pos + 1..] {
                let b = &slices[j];
                if b.dest_y >= a.bottom() {
                    break;
                }
                if a.overlaps(b) {
                    return Err(RawError::layout(format!(
                        "slices {} and {} share destination pixels",
                        i.min(j),
                        i.max(j)
                    )));
                }
            }
        }

        Ok(Self {
            width,
            height,
            slices,
        })
    }

    /// Full-width row bands of `rows_per_band` rows. `source_range(start_row,
    /// rows)` gives each band's `(byte_offset, byte_count)`.
    pub fn horizontal_bands<F>(
        width: usize,
        height: usize,
        rows_per_band: usize,
        mut source_range: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, usize) -> (usize, usize),
    {
        let rows_per_band = rows_per_band.max(1);
        let slices = (0..height)
            .step_by(rows_per_band)
            .map(|start| {
                let rows = rows_per_band.min(height - start);
                let (offset, count) = source_range(start, rows);
                Slice {
                    source_byte_offset: offset,
                    source_byte_count: count,
                    dest_x: 0,
                    dest_y: start,
                    width,
                    height: rows,
                }
            })
            .collect();
        Self::new(width, height, slices)
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// Decode every slice of `source` into `plane`.
    ///
    /// `decode` runs once per slice, possibly on several threads at once.
    pub fn run<T, F>(
        &self,
        source: &[u8],
        plane: &mut OutputPlane<T>,
        options: &DecodeOptions,
        decode: F,
    ) -> Result<DecodeReport>
    where
        T: Copy + Send,
        F: Fn(&Slice, &mut SliceWindow<'_, T>, &mut SliceContext<'_>) -> Result<()> + Sync,
    {
        if plane.width() != self.width || plane.height() != self.height {
            return Err(RawError::layout(format!(
                "plane is {}x{}, slices were planned for {}x{}",
                plane.width(),
                plane.height(),
                self.width,
                self.height
            )));
        }

        let started = Instant::now();
        let workers = options.worker_count(self.slices.len());
        debug!(
            slices = self.slices.len(),
            workers,
            "decoding {}x{} plane",
            self.width,
            self.height
        );

        let state = RunState {
            source,
            plane: PlanePtr::new(plane),
            policy: options.truncation,
            decode: &decode,
            failure: Mutex::new(None),
            bad_pixels: Mutex::new(Vec::new()),
            decoded: AtomicUsize::new(0),
            truncated: AtomicUsize::new(0),
        };

        self.dispatch(&state, workers);

        let RunState {
            failure,
            bad_pixels,
            decoded,
            truncated,
            ..
        } = state;
        let truncated = truncated.into_inner();
        if truncated > 0 {
            warn!(truncated, "payload ended early, slices finished with zero bits");
        }
        debug!(
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "slice decode finished"
        );

        if let Some((slice, err)) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(RawError::SliceDecodeFailure {
                slice,
                source: Box::new(err),
            });
        }

        Ok(DecodeReport {
            slices: decoded.into_inner(),
            truncated_slices: truncated,
            bad_pixels: BadPixelList::from_vec(
                bad_pixels.into_inner().unwrap_or_else(PoisonError::into_inner),
            ),
        })
    }

    #[cfg(feature = "parallel")]
    fn dispatch<T, F>(&self, state: &RunState<'_, T, F>, workers: usize)
    where
        T: Copy + Send,
        F: Fn(&Slice, &mut SliceWindow<'_, T>, &mut SliceContext<'_>) -> Result<()> + Sync,
    {
        if workers <= 1 {
            state.drain(self.slices.iter().copied().enumerate());
            return;
        }

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("rawpump-slice-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!("worker pool unavailable ({}), decoding on caller thread", e);
                state.drain(self.slices.iter().copied().enumerate());
                return;
            }
        };

        let (tx, rx) = crossbeam_channel::unbounded();
        for job in self.slices.iter().copied().enumerate() {
            if tx.send(job).is_err() {
                break;
            }
        }
        drop(tx);

        pool.scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                scope.spawn(move |_| state.drain(rx.iter()));
            }
        });
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch<T, F>(&self, state: &RunState<'_, T, F>, _workers: usize)
    where
        T: Copy + Send,
        F: Fn(&Slice, &mut SliceWindow<'_, T>, &mut SliceContext<'_>) -> Result<()> + Sync,
    {
        state.drain(self.slices.iter().copied().enumerate());
    }
}

/// Shared state of one `run` call.
struct RunState<'r, T, F> {
    source: &'r [u8],
    plane: PlanePtr<'r, T>,
    policy: TruncationPolicy,
    decode: &'r F,
    failure: Mutex<Option<(usize, RawError)>>,
    bad_pixels: Mutex<Vec<BadPixel>>,
    decoded: AtomicUsize,
    truncated: AtomicUsize,
}

impl<T, F> RunState<'_, T, F>
where
    T: Copy + Send,
    F: Fn(&Slice, &mut SliceWindow<'_, T>, &mut SliceContext<'_>) -> Result<()> + Sync,
{
    /// Worker loop: decode slices until the queue is empty, then publish
    /// the bad pixels found.
    fn drain<I: Iterator<Item = (usize, Slice)>>(&self, jobs: I) {
        let mut local_bad = Vec::new();
        for (index, slice) in jobs {
            // SAFETY: the scheduler validated that slice rectangles are
            // in-bounds and pairwise disjoint, and every slice index is
            // handed to exactly one worker.
            let mut window = unsafe { self.plane.window(&slice) };
            let mut ctx = SliceContext {
                source: self.source,
                slice,
                policy: self.policy,
                truncated: false,
                bad_pixels: &mut local_bad,
            };
            match (self.decode)(&slice, &mut window, &mut ctx) {
                Ok(()) => {
                    self.decoded.fetch_add(1, Ordering::Relaxed);
                    if ctx.truncated {
                        self.truncated.fetch_add(1, Ordering::Relaxed);
                    }
                    trace!(index, truncated = ctx.truncated, "slice done");
                }
                Err(e) => {
                    debug!(index, error = %e, "slice failed");
                    let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
                    if failure.is_none() {
                        *failure = Some((index, e));
                    }
                }
            }
        }
        if !local_bad.is_empty() {
            self.bad_pixels
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .append(&mut local_bad);
        }
    }
}

/// Raw view of the output plane shared by all workers of one run.
struct PlanePtr<'p, T> {
    base: *mut T,
    stride: usize,
    _plane: PhantomData<&'p mut [T]>,
}

// SAFETY: workers only touch the plane through `SliceWindow`s over
// disjoint rectangles.
unsafe impl<T: Send> Send for PlanePtr<'_, T> {}
unsafe impl<T: Send> Sync for PlanePtr<'_, T> {}

impl<'p, T> PlanePtr<'p, T> {
    fn new(plane: &'p mut OutputPlane<T>) -> Self {
        let stride = plane.width();
        Self {
            base: plane.data_mut().as_mut_ptr(),
            stride,
            _plane: PhantomData,
        }
    }

    /// # Safety
    /// `slice` must lie inside the plane and no other live window may
    /// cover any of its pixels.
    unsafe fn window(&self, slice: &Slice) -> SliceWindow<'p, T> {
        SliceWindow {
            base: self.base,
            stride: self.stride,
            x: slice.dest_x,
            y: slice.dest_y,
            width: slice.width,
            height: slice.height,
            _plane: PhantomData,
        }
    }
}

/// Exclusive write access to one slice's destination rectangle.
pub struct SliceWindow<'p, T> {
    base: *mut T,
    stride: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    _plane: PhantomData<&'p mut [T]>,
}

impl<T> SliceWindow<'_, T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row `row` of the rectangle, `0 <= row < height`.
    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        assert!(row < self.height, "row {} outside slice of {} rows", row, self.height);
        // SAFETY: the rectangle lies inside the plane (checked by
        // `SliceScheduler::new`), is covered by no other window, and the
        // `&mut self` borrow keeps rows of this window from aliasing.
        unsafe {
            let start = self.base.add((self.y + row) * self.stride + self.x);
            std::slice::from_raw_parts_mut(start, self.width)
        }
    }
}

/// Per-slice services handed to the decode function.
pub struct SliceContext<'c> {
    source: &'c [u8],
    slice: Slice,
    policy: TruncationPolicy,
    truncated: bool,
    bad_pixels: &'c mut Vec<BadPixel>,
}

impl<'c> SliceContext<'c> {
    /// Bytes encoding this slice. Under the tolerant policy a range that
    /// runs past the buffer is cut short and the slice marked truncated.
    pub fn source(&mut self) -> Result<&'c [u8]> {
        let available = self.source.len();
        let start = self.slice.source_byte_offset;
        match checked_end(start, self.slice.source_byte_count, available) {
            Ok(end) => Ok(&self.source[start..end]),
            Err(e) if self.policy.is_strict() => Err(e),
            Err(_) => {
                self.truncated = true;
                Ok(&self.source[start.min(available)..])
            }
        }
    }

    /// The whole buffer the scheduler runs over, for formats whose slices
    /// are located by skipping from the stream start.
    pub fn stream(&self) -> &'c [u8] {
        self.source
    }

    pub fn policy(&self) -> TruncationPolicy {
        self.policy
    }

    /// Record that this slice was finished from padding bits.
    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    /// Flag the sample at plane coordinates `(x, y)`.
    pub fn report_bad_pixel(&mut self, x: usize, y: usize) {
        self.bad_pixels.push(BadPixel {
            x: x as u32,
            y: y as u32,
        });
    }
}
