//! Render scheduling: one slot, newest request wins.
//!
//! Every input source calls [`RenderScheduler::request`]. The call assigns a
//! generation, which immediately supersedes whatever is rendering, and hands
//! the request to a dedicated render thread. That thread is the render slot:
//! it runs one coordinator at a time, skips requests that went stale while
//! queued, and publishes a finished raster only if its generation is still
//! the newest when it completes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use mandelpan_core::Viewport;

use crate::buffer::RasterBuffer;
use crate::coordinator::{self, RenderCancel, RenderOutcome, RenderRequest};
use crate::error::RenderError;
use crate::history::{History, HistoryEntry};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// State of the render slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Running { generation: u64 },
}

/// Notifications for the presentation layer, in the order they happened.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A coordinator started on `generation`.
    Started { generation: u64, rows: u32 },
    /// `rows_done` of `rows_total` rows are finished.
    Progress {
        generation: u64,
        rows_done: u32,
        rows_total: u32,
    },
    /// A render completed while still current and was pushed to history.
    Published {
        generation: u64,
        entry: HistoryEntry,
        elapsed: Duration,
    },
    /// A render was cancelled or finished after being superseded.
    Discarded { generation: u64 },
    /// An undo brought back an earlier view.
    Restored { entry: HistoryEntry },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of history entries kept.
    pub history_limit: usize,
    /// Worker threads for the row pool; `0` lets rayon decide.
    pub threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            history_limit: History::DEFAULT_LIMIT,
            threads: 0,
        }
    }
}

/// What a published result does to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Record {
    Push,
    /// Collapse to the published entry.
    Reset,
    /// Swap out the top entry, e.g. an undone view re-rendered at a new size.
    ReplaceTop,
}

struct Job {
    request: RenderRequest,
    record: Record,
}

struct SlotState {
    phase: SchedulerPhase,
    history: History,
    latest: Option<HistoryEntry>,
    /// Highest generation the render thread is done with.
    settled: u64,
    /// Generation of a cancel/undo issued while a render was running.
    superseded_by: u64,
}

struct Shared {
    cancel: RenderCancel,
    state: Mutex<SlotState>,
    settled_cv: Condvar,
    rows_done: AtomicU32,
    rows_total: AtomicU32,
    events: mpsc::Sender<SchedulerEvent>,
}

impl Shared {
    // Nothing in `SlotState` is left half-updated across a panic, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SchedulerEvent) {
        // The presentation side may have gone away; rendering carries on.
        let _ = self.events.send(event);
    }

    /// Advance the generation on behalf of a cancel or undo.
    fn supersede(&self, state: &mut SlotState) -> u64 {
        let generation = self.cancel.advance();
        match state.phase {
            SchedulerPhase::Idle => state.settled = state.settled.max(generation),
            SchedulerPhase::Running { .. } => state.superseded_by = generation,
        }
        generation
    }

    /// Claim the slot for `request`, or settle it straight away if it went
    /// stale while queued. The check shares the state lock with `cancel`.
    fn begin(&self, request: &RenderRequest) -> bool {
        let generation = request.generation;
        let mut state = self.lock();
        if self.cancel.is_stale(generation) {
            debug!(generation, "Skipping superseded request");
            state.settled = state.settled.max(generation);
            drop(state);
            self.settled_cv.notify_all();
            return false;
        }
        state.phase = SchedulerPhase::Running { generation };
        drop(state);

        self.rows_done.store(0, Ordering::Relaxed);
        self.rows_total
            .store(request.raster_height, Ordering::Relaxed);
        self.emit(SchedulerEvent::Started {
            generation,
            rows: request.raster_height,
        });
        true
    }

    fn report_progress(&self, generation: u64, rows_done: u32) {
        self.rows_done.fetch_max(rows_done, Ordering::Relaxed);
        self.emit(SchedulerEvent::Progress {
            generation,
            rows_done,
            rows_total: self.rows_total.load(Ordering::Relaxed),
        });
    }

    /// Publish or discard the outcome, then free the slot.
    fn conclude(&self, job: Job, outcome: RenderOutcome) {
        let generation = job.request.generation;
        let mut state = self.lock();

        match outcome {
            RenderOutcome::Completed { raster, elapsed } if !self.cancel.is_stale(generation) => {
                let entry = HistoryEntry {
                    viewport: job.request.viewport,
                    raster: Arc::new(raster),
                };
                match job.record {
                    Record::Push => state.history.push(entry.clone()),
                    Record::Reset => state.history.reset(entry.clone()),
                    Record::ReplaceTop => state.history.replace_top(entry.clone()),
                }
                state.latest = Some(entry.clone());
                info!(
                    generation,
                    elapsed_ms = elapsed.as_millis(),
                    history = state.history.len(),
                    "Render published"
                );
                self.emit(SchedulerEvent::Published {
                    generation,
                    entry,
                    elapsed,
                });
            }
            _ => {
                debug!(generation, "Render discarded");
                self.emit(SchedulerEvent::Discarded { generation });
            }
        }

        state.phase = SchedulerPhase::Idle;
        state.settled = state.settled.max(generation).max(state.superseded_by);
        drop(state);
        self.settled_cv.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Serialises render requests onto a single render slot.
///
/// Dropping the scheduler cancels the in-flight render and joins the render
/// thread.
pub struct RenderScheduler {
    shared: Arc<Shared>,
    submit: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Option<JoinHandle<()>>,
}

impl RenderScheduler {
    /// Start the render thread and its row pool.
    ///
    /// Returns the scheduler and the receiving end of its event stream.
    pub fn spawn(
        config: SchedulerConfig,
    ) -> crate::Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("render-row-{i}"))
            .build()?;

        let (event_tx, event_rx) = mpsc::channel();
        let (job_tx, job_rx) = mpsc::channel::<Job>();

        let shared = Arc::new(Shared {
            cancel: RenderCancel::new(),
            state: Mutex::new(SlotState {
                phase: SchedulerPhase::Idle,
                history: History::new(config.history_limit),
                latest: None,
                settled: 0,
                superseded_by: 0,
            }),
            settled_cv: Condvar::new(),
            rows_done: AtomicU32::new(0),
            rows_total: AtomicU32::new(0),
            events: event_tx,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("render-slot".into())
            .spawn(move || render_loop(&worker_shared, &pool, &job_rx))?;

        debug!(threads = config.threads, "Render scheduler started");
        Ok((
            Self {
                shared,
                submit: Mutex::new(Some(job_tx)),
                worker: Some(worker),
            },
            event_rx,
        ))
    }

    /// Ask for `viewport` to be rendered at `width × height`.
    ///
    /// Supersedes any render in flight and returns the new generation
    /// without waiting for the render slot.
    pub fn request(&self, viewport: Viewport, width: u32, height: u32) -> crate::Result<u64> {
        self.submit(viewport, width, height, Record::Push)
    }

    /// Like [`request`](Self::request), but the published result replaces
    /// the whole history as its new base.
    pub fn request_reset(&self, viewport: Viewport, width: u32, height: u32) -> crate::Result<u64> {
        self.submit(viewport, width, height, Record::Reset)
    }

    /// Like [`request`](Self::request), but the published result takes the
    /// place of the current top of the history instead of stacking on it.
    pub fn request_replace(&self, viewport: Viewport, width: u32, height: u32) -> crate::Result<u64> {
        self.submit(viewport, width, height, Record::ReplaceTop)
    }

    fn submit(
        &self,
        viewport: Viewport,
        width: u32,
        height: u32,
        record: Record,
    ) -> crate::Result<u64> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }

        // Held across advance + send so the channel sees generations in order.
        let submit = self.submit.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = submit.as_ref().ok_or(RenderError::WorkerGone)?;

        let generation = self.shared.cancel.advance();
        debug!(
            generation,
            width,
            height,
            center_x = viewport.center_x,
            center_y = viewport.center_y,
            zoom = viewport.zoom,
            max_iter = viewport.max_iterations,
            ?record,
            "Requesting render"
        );

        let request = RenderRequest {
            viewport,
            raster_width: width,
            raster_height: height,
            generation,
        };
        tx.send(Job {
            request,
            record,
        })
        .map_err(|_| RenderError::WorkerGone)?;
        Ok(generation)
    }

    /// Stop the in-flight render, if any, without starting another.
    pub fn cancel(&self) {
        let mut state = self.shared.lock();
        if let SchedulerPhase::Running { generation } = state.phase {
            info!(generation, "Render cancelled by user");
        }
        self.shared.supersede(&mut state);
    }

    /// Step back to the previous view.
    ///
    /// Cancels any render in flight so it can't overwrite the restored view.
    /// With a single history entry this is a no-op.
    pub fn undo(&self) -> Option<HistoryEntry> {
        let mut state = self.shared.lock();
        if state.history.len() <= 1 {
            debug!("Nothing to undo");
            return None;
        }
        self.shared.supersede(&mut state);
        let entry = state.history.undo()?;
        state.latest = Some(entry.clone());
        info!(history = state.history.len(), "Restored previous view");
        self.shared
            .emit(SchedulerEvent::Restored {
                entry: entry.clone(),
            });
        Some(entry)
    }

    /// The view most recently published or restored.
    pub fn latest(&self) -> Option<HistoryEntry> {
        self.shared.lock().latest.clone()
    }

    /// Raster of the view most recently published or restored.
    pub fn latest_raster(&self) -> Option<Arc<RasterBuffer>> {
        self.shared.lock().latest.as_ref().map(|e| Arc::clone(&e.raster))
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.shared.lock().phase
    }

    pub fn history_len(&self) -> usize {
        self.shared.lock().history.len()
    }

    pub fn current_generation(&self) -> u64 {
        self.shared.cancel.generation()
    }

    /// Rows finished and total rows of the current (or last) run.
    pub fn progress(&self) -> (u32, u32) {
        (
            self.shared.rows_done.load(Ordering::Relaxed),
            self.shared.rows_total.load(Ordering::Relaxed),
        )
    }

    /// Block until the render thread is done with `generation` (or anything
    /// newer), or until `timeout` elapses. Returns `false` on timeout.
    pub fn wait_until_settled(&self, generation: u64, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let (state, _) = self
            .shared
            .settled_cv
            .wait_timeout_while(state, timeout, |s| s.settled < generation)
            .unwrap_or_else(PoisonError::into_inner);
        state.settled >= generation
    }

    /// [`wait_until_settled`](Self::wait_until_settled) for the newest generation.
    pub fn wait_until_current_settled(&self, timeout: Duration) -> bool {
        self.wait_until_settled(self.current_generation(), timeout)
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        self.submit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Render thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Render thread
// ---------------------------------------------------------------------------

/// Keep only the newest queued job.
fn drain_latest(initial: Job, rx: &mpsc::Receiver<Job>) -> Job {
    let mut job = initial;
    while let Ok(newer) = rx.try_recv() {
        job = newer;
    }
    job
}

fn render_loop(shared: &Shared, pool: &rayon::ThreadPool, rx: &mpsc::Receiver<Job>) {
    debug!("Render thread started");
    while let Ok(initial) = rx.recv() {
        let job = drain_latest(initial, rx);
        let generation = job.request.generation;
        if !shared.begin(&job.request) {
            continue;
        }

        let outcome = pool.install(|| {
            coordinator::run(&job.request, &shared.cancel, |rows_done| {
                shared.report_progress(generation, rows_done)
            })
        });
        shared.conclude(job, outcome);
    }
    debug!("Render thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(30);

    fn scheduler() -> (RenderScheduler, mpsc::Receiver<SchedulerEvent>) {
        RenderScheduler::spawn(SchedulerConfig {
            history_limit: 8,
            threads: 2,
        })
        .unwrap()
    }

    fn zoomed(zoom: f64) -> Viewport {
        Viewport::new(-0.5, 0.0, zoom, 200).unwrap()
    }

    #[test]
    fn single_request_publishes() {
        let (sched, events) = scheduler();
        let gen = sched.request(Viewport::default(), 64, 48).unwrap();
        assert!(sched.wait_until_settled(gen, WAIT));

        assert_eq!(sched.phase(), SchedulerPhase::Idle);
        assert_eq!(sched.history_len(), 1);
        assert_eq!(sched.progress(), (48, 48));
        let latest = sched.latest().expect("published");
        assert_eq!(latest.viewport, Viewport::default());
        assert_eq!(latest.raster.width, 64);

        let published: Vec<u64> = events
            .try_iter()
            .filter_map(|e| match e {
                SchedulerEvent::Published { generation, .. } => Some(generation),
                _ => None,
            })
            .collect();
        assert_eq!(published, vec![gen]);
    }

    #[test]
    fn zero_dimensions_rejected() {
        let (sched, _events) = scheduler();
        assert!(matches!(
            sched.request(Viewport::default(), 0, 10),
            Err(RenderError::InvalidDimensions { .. })
        ));
        assert_eq!(sched.current_generation(), 0);
    }

    #[test]
    fn undo_restores_previous_view() {
        let (sched, events) = scheduler();
        let a = sched.request(zoomed(1.0), 32, 32).unwrap();
        assert!(sched.wait_until_settled(a, WAIT));
        assert!(sched.undo().is_none(), "single entry: no-op");

        let b = sched.request(zoomed(2.0), 32, 32).unwrap();
        assert!(sched.wait_until_settled(b, WAIT));
        assert_eq!(sched.history_len(), 2);

        let restored = sched.undo().expect("previous view");
        assert_eq!(restored.viewport, zoomed(1.0));
        assert_eq!(sched.history_len(), 1);
        assert_eq!(sched.latest().map(|e| e.viewport), Some(zoomed(1.0)));
        assert!(events
            .try_iter()
            .any(|e| matches!(e, SchedulerEvent::Restored { .. })));
    }

    #[test]
    fn reset_request_replaces_history() {
        let (sched, _events) = scheduler();
        for z in [1.0, 2.0, 4.0] {
            let g = sched.request(zoomed(z), 16, 16).unwrap();
            assert!(sched.wait_until_settled(g, WAIT));
        }
        assert_eq!(sched.history_len(), 3);

        let g = sched.request_reset(Viewport::default(), 16, 16).unwrap();
        assert!(sched.wait_until_settled(g, WAIT));
        assert_eq!(sched.history_len(), 1);
        assert!(sched.undo().is_none());
    }

    #[test]
    fn cancel_returns_to_idle_without_publishing() {
        let (sched, _events) = scheduler();
        // Mostly inside a period-3 bulb: every pixel runs the full bound.
        let heavy = Viewport::new(-0.12, 0.75, 8.0, 10_000).unwrap();
        let g = sched.request(heavy, 1024, 1024).unwrap();
        sched.cancel();
        assert!(sched.wait_until_current_settled(WAIT));
        assert!(sched.wait_until_settled(g, WAIT));
        assert_eq!(sched.phase(), SchedulerPhase::Idle);
        assert!(sched.latest().is_none());

        // Still usable afterwards.
        let g2 = sched.request(Viewport::default(), 16, 16).unwrap();
        assert!(sched.wait_until_settled(g2, WAIT));
        assert!(sched.latest().is_some());
    }

    #[test]
    fn replace_request_swaps_top_entry() {
        let (sched, _events) = scheduler();
        for z in [1.0, 2.0] {
            let g = sched.request(zoomed(z), 16, 16).unwrap();
            assert!(sched.wait_until_settled(g, WAIT));
        }

        let g = sched.request_replace(zoomed(2.0), 24, 24).unwrap();
        assert!(sched.wait_until_settled(g, WAIT));
        assert_eq!(sched.history_len(), 2);
        assert_eq!(sched.latest_raster().map(|r| r.width), Some(24));

        let restored = sched.undo().expect("base view");
        assert_eq!(restored.viewport, zoomed(1.0));
        assert_eq!(sched.history_len(), 1);
    }

    #[test]
    fn progress_stays_within_new_run() {
        let (sched, _events) = scheduler();
        let g = sched.request(Viewport::default(), 16, 64).unwrap();
        assert!(sched.wait_until_settled(g, WAIT));
        assert_eq!(sched.progress(), (64, 64));

        let g = sched.request(Viewport::default(), 16, 8).unwrap();
        assert!(sched.wait_until_settled(g, WAIT));
        let (done, total) = sched.progress();
        assert_eq!(total, 8);
        assert!(done <= total);
    }
}
