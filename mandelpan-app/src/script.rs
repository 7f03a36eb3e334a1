//! Line-oriented command language for driving an [`Explorer`] without a
//! window. One command per line; `#` starts a comment.

use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::explorer::Explorer;

/// How long `wait` blocks before giving up.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pan { dx: f64, dy: f64 },
    Zoom { px: f64, py: f64, factor: f64 },
    Wheel { px: f64, py: f64, ticks: i32 },
    /// Raw text, validated by the explorer like a text field would be.
    Iterations(String),
    Resize { width: u32, height: u32 },
    Reset,
    Undo,
    Cancel,
    Refresh,
    Wait,
    Where { px: f64, py: f64 },
    Save(String),
    Quit,
}

/// Parse one script line. Blank lines and comments yield `Ok(None)`.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<Command>> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(None);
    }

    let mut words = content.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let rest: Vec<&str> = words.collect();
    let mut args = Args {
        verb: &verb,
        args: &rest,
        next: 0,
        line_no,
    };

    let command = match verb.as_str() {
        "pan" => Command::Pan {
            dx: args.number("dx")?,
            dy: args.number("dy")?,
        },
        "zoom" => Command::Zoom {
            px: args.number("x")?,
            py: args.number("y")?,
            factor: args.number("factor")?,
        },
        "wheel" => Command::Wheel {
            px: args.number("x")?,
            py: args.number("y")?,
            ticks: args.number("ticks")?,
        },
        "iterations" | "iter" => Command::Iterations(args.word("value")?.to_string()),
        "resize" => Command::Resize {
            width: args.number("width")?,
            height: args.number("height")?,
        },
        "reset" => Command::Reset,
        "undo" => Command::Undo,
        "cancel" => Command::Cancel,
        "refresh" => Command::Refresh,
        "wait" => Command::Wait,
        "where" => Command::Where {
            px: args.number("x")?,
            py: args.number("y")?,
        },
        // File names may contain spaces; keep the rest of the line verbatim.
        "save" => {
            let name = content[verb.len()..].trim();
            if name.is_empty() {
                return Err(args.error("save needs a file name".into()));
            }
            return Ok(Some(Command::Save(name.to_string())));
        }
        "quit" | "exit" => Command::Quit,
        other => return Err(args.error(format!("unknown command {other:?}"))),
    };

    args.finish()?;
    Ok(Some(command))
}

struct Args<'a> {
    verb: &'a str,
    args: &'a [&'a str],
    next: usize,
    line_no: usize,
}

impl<'a> Args<'a> {
    fn error(&self, reason: String) -> AppError {
        AppError::Script {
            line: self.line_no,
            reason,
        }
    }

    fn word(&mut self, name: &str) -> Result<&'a str> {
        let word = self
            .args
            .get(self.next)
            .copied()
            .ok_or_else(|| self.error(format!("{} is missing <{name}>", self.verb)))?;
        self.next += 1;
        Ok(word)
    }

    fn number<T: FromStr>(&mut self, name: &str) -> Result<T> {
        let word = self.word(name)?;
        word.parse()
            .map_err(|_| self.error(format!("<{name}> is not a valid number: {word:?}")))
    }

    fn finish(&self) -> Result<()> {
        if self.next < self.args.len() {
            return Err(self.error(format!(
                "unexpected arguments after {}: {}",
                self.verb,
                self.args[self.next..].join(" ")
            )));
        }
        Ok(())
    }
}

impl Command {
    /// Run the command against the explorer.
    pub fn apply(self, explorer: &mut Explorer) -> Result<()> {
        match self {
            Self::Pan { dx, dy } => {
                explorer.pan(dx, dy)?;
            }
            Self::Zoom { px, py, factor } => {
                explorer.zoom_at(px, py, factor)?;
            }
            Self::Wheel { px, py, ticks } => {
                explorer.wheel(px, py, ticks)?;
            }
            Self::Iterations(text) => {
                explorer.set_max_iterations(&text)?;
            }
            Self::Resize { width, height } => {
                explorer.resize(width, height)?;
            }
            Self::Reset => {
                explorer.reset()?;
            }
            Self::Undo => match explorer.undo()? {
                Some(vp) => info!(
                    center_x = vp.center_x,
                    center_y = vp.center_y,
                    zoom = vp.zoom,
                    "Undo"
                ),
                None => info!("Nothing to undo"),
            },
            Self::Cancel => explorer.cancel(),
            Self::Refresh => {
                explorer.refresh()?;
            }
            Self::Wait => {
                if !explorer.wait(WAIT_TIMEOUT) {
                    warn!("Timed out waiting for render");
                }
            }
            Self::Where { px, py } => {
                let c = explorer.cursor_position(px, py);
                info!(px, py, re = c.re, im = c.im, "Cursor");
            }
            Self::Save(name) => {
                explorer.export(&name)?;
            }
            Self::Quit => {}
        }
        Ok(())
    }
}
