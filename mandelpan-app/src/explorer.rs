//! The control surface every input source goes through.
//!
//! Each gesture turns into a new [`Viewport`] and a single call to
//! [`RenderScheduler::request`]; cancelling the previous render and ordering
//! results is the scheduler's job.

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use tracing::{debug, info};

use mandelpan_core::{parse_max_iterations, Complex, Viewport};
use mandelpan_render::{export_entry, RenderError, RenderScheduler, SchedulerEvent};

use crate::error::Result;
use crate::preferences::AppPreferences;

pub struct Explorer {
    viewport: Viewport,
    width: u32,
    height: u32,
    zoom_step: f64,
    export_dir: PathBuf,
    scheduler: RenderScheduler,
}

impl Explorer {
    /// Start the scheduler and request the base view.
    pub fn new(prefs: &AppPreferences) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        let (scheduler, events) = RenderScheduler::spawn(prefs.scheduler_config())?;
        let viewport = Viewport::home(prefs.default_max_iterations)?;
        let explorer = Self {
            viewport,
            width: prefs.raster_width,
            height: prefs.raster_height,
            zoom_step: prefs.zoom_step,
            export_dir: prefs.export_directory(),
            scheduler,
        };
        explorer
            .scheduler
            .request_reset(viewport, explorer.width, explorer.height)?;
        Ok((explorer, events))
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    /// Adopt `viewport` and ask for it to be rendered.
    fn commit(&mut self, viewport: Viewport) -> Result<u64> {
        let generation = self.scheduler.request(viewport, self.width, self.height)?;
        self.viewport = viewport;
        Ok(generation)
    }

    /// Drag by a pixel delta.
    pub fn pan(&mut self, dx: f64, dy: f64) -> Result<u64> {
        let next = self.viewport.panned(dx, dy, self.width, self.height)?;
        debug!(dx, dy, "Pan");
        self.commit(next)
    }

    /// Magnify by `factor` around the pixel under the cursor.
    pub fn zoom_at(&mut self, px: f64, py: f64, factor: f64) -> Result<u64> {
        let next = self
            .viewport
            .zoomed_at(px, py, self.width, self.height, factor)?;
        debug!(px, py, factor, zoom = next.zoom, "Zoom");
        self.commit(next)
    }

    /// Wheel input: each positive tick zooms in by the configured step,
    /// each negative tick zooms out.
    pub fn wheel(&mut self, px: f64, py: f64, ticks: i32) -> Result<u64> {
        self.zoom_at(px, py, self.zoom_step.powi(ticks))
    }

    /// Apply user-entered max-iterations text. On rejection nothing is
    /// rendered and the current raster stays up.
    pub fn set_max_iterations(&mut self, text: &str) -> Result<u64> {
        let max_iterations = parse_max_iterations(text)?;
        let next = self.viewport.with_max_iterations(max_iterations)?;
        self.commit(next)
    }

    /// Track the raster size. Zero or unchanged sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<Option<u64>> {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return Ok(None);
        }
        self.width = width;
        self.height = height;
        debug!(width, height, "Resize");
        self.commit(self.viewport).map(Some)
    }

    /// Back to the base view, keeping the iteration bound. The history
    /// collapses to this view once it is rendered.
    pub fn reset(&mut self) -> Result<u64> {
        let home = Viewport::home(self.viewport.max_iterations)?;
        let generation = self.scheduler.request_reset(home, self.width, self.height)?;
        self.viewport = home;
        info!(generation, "Reset view");
        Ok(generation)
    }

    /// Step back to the previous view. Returns the restored viewport.
    ///
    /// If the restored raster was made for a different size it is
    /// re-rendered at the current one, taking the restored entry's place in
    /// the history.
    pub fn undo(&mut self) -> Result<Option<Viewport>> {
        let Some(entry) = self.scheduler.undo() else {
            return Ok(None);
        };
        self.viewport = entry.viewport;
        if (entry.raster.width, entry.raster.height) != (self.width, self.height) {
            self.scheduler
                .request_replace(entry.viewport, self.width, self.height)?;
        }
        Ok(Some(entry.viewport))
    }

    pub fn cancel(&self) {
        self.scheduler.cancel();
    }

    /// Re-issue the current view.
    pub fn refresh(&mut self) -> Result<u64> {
        self.commit(self.viewport)
    }

    /// The point of the plane under a cursor position.
    pub fn cursor_position(&self, px: f64, py: f64) -> Complex {
        self.viewport
            .point_to_complex(px, py, self.width, self.height)
    }

    /// Write the most recently published raster to `<export dir>/<name>.png`.
    pub fn export(&self, name: &str) -> Result<PathBuf> {
        let entry = self.scheduler.latest().ok_or(RenderError::NothingToExport)?;
        Ok(export_entry(&self.export_dir, name, &entry)?)
    }

    /// Block until the newest request has been handled.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.scheduler.wait_until_current_settled(timeout)
    }
}
