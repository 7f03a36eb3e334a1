//! Headless front end: reads navigation commands from a script file (or
//! stdin) and reports what the render scheduler does with them.

mod error;
mod explorer;
mod preferences;
mod script;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process::ExitCode;
use std::sync::mpsc;

use tracing::{debug, error, info, warn};

use mandelpan_render::SchedulerEvent;

use crate::explorer::Explorer;
use crate::preferences::AppPreferences;
use crate::script::{parse_line, Command, WAIT_TIMEOUT};

/// Turns scheduler events into log lines, the way a status bar would show them.
#[derive(Default)]
struct Presenter {
    last_decile: Option<(u64, u32)>,
}

impl Presenter {
    fn drain(&mut self, events: &mpsc::Receiver<SchedulerEvent>) {
        for event in events.try_iter() {
            self.show(event);
        }
    }

    fn show(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::Started { generation, rows } => {
                debug!(generation, rows, "Rendering");
                self.last_decile = Some((generation, 0));
            }
            SchedulerEvent::Progress {
                generation,
                rows_done,
                rows_total,
            } => {
                let decile = rows_done.saturating_mul(10) / rows_total.max(1);
                let seen = match self.last_decile {
                    Some((g, d)) if g == generation => d,
                    _ => 0,
                };
                if decile > seen {
                    self.last_decile = Some((generation, decile));
                    info!(generation, "Progress {}%", decile * 10);
                }
            }
            SchedulerEvent::Published {
                generation,
                entry,
                elapsed,
            } => {
                let seconds = (elapsed.as_secs_f64() * 1000.0).round() / 1000.0;
                info!(
                    generation,
                    center_x = entry.viewport.center_x,
                    center_y = entry.viewport.center_y,
                    zoom = entry.viewport.zoom,
                    max_iterations = entry.viewport.max_iterations,
                    "Rendered {}x{} in {seconds} s",
                    entry.raster.width,
                    entry.raster.height,
                );
            }
            SchedulerEvent::Discarded { generation } => {
                debug!(generation, "Render discarded");
            }
            SchedulerEvent::Restored { entry } => {
                info!(
                    center_x = entry.viewport.center_x,
                    center_y = entry.viewport.center_y,
                    zoom = entry.viewport.zoom,
                    "Restored previous view"
                );
            }
        }
    }
}

fn open_script() -> io::Result<Box<dyn BufRead>> {
    match std::env::args().nth(1) {
        Some(path) if path != "-" => {
            info!("Reading commands from {path}");
            Ok(Box::new(BufReader::new(File::open(path)?)))
        }
        _ => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let prefs = AppPreferences::load();
    prefs.save();

    let (mut explorer, events) = match Explorer::new(&prefs) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to start renderer: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (width, height) = explorer.dimensions();
    info!(width, height, "Explorer ready");

    let input = match open_script() {
        Ok(input) => input,
        Err(e) => {
            error!("Failed to open script: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut presenter = Presenter::default();
    for (idx, line) in input.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read input: {e}");
                return ExitCode::FAILURE;
            }
        };
        let command = match parse_line(&line, idx + 1) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("{e}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = command.apply(&mut explorer) {
            warn!("line {}: {e}", idx + 1);
        }
        presenter.drain(&events);
    }

    if !explorer.wait(WAIT_TIMEOUT) {
        warn!("Timed out waiting for the last render");
    }
    presenter.drain(&events);
    ExitCode::SUCCESS
}
