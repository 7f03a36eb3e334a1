use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::debug;

use mandelpan_core::{shade_row, Viewport};

use crate::buffer::RasterBuffer;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Generation counter shared between whoever issues renders and the workers.
///
/// Each render runs under one generation. Advancing the counter supersedes
/// every run with a lower generation: workers compare their generation
/// against the current one between rows and stop once it has moved on.
#[derive(Debug, Default)]
pub struct RenderCancel {
    generation: AtomicU64,
}

impl RenderCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, cancelling any run under an older one.
    ///
    /// Returns the new generation.
    pub fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Cancel whatever is running without issuing a new render.
    pub fn cancel(&self) {
        self.advance();
    }

    /// Read the current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// `true` once a newer generation has been started.
    #[inline]
    pub fn is_stale(&self, generation: u64) -> bool {
        self.generation() != generation
    }
}

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// One unit of render work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub viewport: Viewport,
    pub raster_width: u32,
    pub raster_height: u32,
    pub generation: u64,
}

/// How a render run ended.
///
/// A cancelled run never exposes its partially written buffer.
#[derive(Debug)]
pub enum RenderOutcome {
    Completed {
        raster: RasterBuffer,
        elapsed: Duration,
    },
    Cancelled,
}

/// Marker used to short-circuit the parallel row loop.
struct Superseded;

// ---------------------------------------------------------------------------
// Full-frame render
// ---------------------------------------------------------------------------

/// Render a full frame, one row per work item on the current rayon pool.
///
/// Rows are disjoint `&mut` slices of the output buffer, so no two workers
/// ever touch the same bytes. Each worker checks `cancel` before starting a
/// row and stops taking rows once the request's generation is stale.
///
/// `on_progress` receives the cumulative number of finished rows after every
/// row. Calls may come from several workers at once and are not guaranteed to
/// arrive in increasing order. A worker stops reporting once it has seen the
/// generation go stale, but a cancel landing between that check and the call
/// can still let one last report through. The outcome is `Cancelled` either
/// way.
pub fn run<P>(request: &RenderRequest, cancel: &RenderCancel, on_progress: P) -> RenderOutcome
where
    P: Fn(u32) + Sync,
{
    let start = Instant::now();
    let RenderRequest {
        viewport,
        raster_width: width,
        raster_height: height,
        generation,
    } = *request;

    debug!(
        generation,
        width,
        height,
        max_iter = viewport.max_iterations,
        zoom = viewport.zoom,
        "Starting row-parallel render"
    );

    let mut raster = RasterBuffer::new(width, height);
    let stride = raster.stride();
    let rows_done = AtomicU32::new(0);

    if stride > 0 {
        let rows = raster.pixels.par_chunks_mut(stride).enumerate();
        let finished = rows.try_for_each(|(py, row)| {
            if cancel.is_stale(generation) {
                return Err(Superseded);
            }
            shade_row(row, py as u32, width, height, &viewport);
            let done = rows_done.fetch_add(1, Ordering::Relaxed) + 1;
            if cancel.is_stale(generation) {
                return Err(Superseded);
            }
            on_progress(done);
            Ok(())
        });
        if finished.is_err() {
            debug!(generation, "Render superseded");
            return RenderOutcome::Cancelled;
        }
    }

    // A cancel that lands after the last row still wins.
    if cancel.is_stale(generation) {
        debug!(generation, "Render superseded after final row");
        return RenderOutcome::Cancelled;
    }

    let elapsed = start.elapsed();
    debug!(
        generation,
        elapsed_ms = elapsed.as_millis(),
        rows = rows_done.load(Ordering::Relaxed),
        "Render complete"
    );
    RenderOutcome::Completed { raster, elapsed }
}
