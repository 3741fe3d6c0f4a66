//! Terminal logging.
//!
//! - `log!("phase"; ...)` prints a line under a colored `[phase]` prefix
//! - `debug!` does the same, only with `--verbose`
//! - [`ProgressLine`] redraws per-bucket download counters in place
//!
//! ```ignore
//! log!("capture"; "rendering {} routes", count);
//!
//! let progress = ProgressLine::new("assets", &[("fonts", 4), ("images", 37)]);
//! progress.done("images");
//! progress.failed("fonts");
//! progress.finish();
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{StdoutLock, Write, stdout},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set while a [`ProgressLine`] owns the current terminal row.
static PROGRESS_ACTIVE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Log a message under a colored phase prefix.
///
/// ```ignore
/// log!("assets"; "downloaded {} files", n);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like [`log!`], but only with `--verbose`.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let mut stdout = stdout().lock();

    // Print above an active progress line; its next redraw restores it
    if PROGRESS_ACTIVE.load(Ordering::SeqCst) {
        clear_row(&mut stdout);
    } else {
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    }

    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

fn colorize_prefix(module: &str) -> String {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" | "parity" => prefix.bright_blue().bold().to_string(),
        "done" => prefix.bright_green().bold().to_string(),
        "error" | "fatal" => prefix.bright_red().bold().to_string(),
        "warning" => prefix.bright_magenta().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

fn clear_row(stdout: &mut StdoutLock) {
    execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
}

/// Single-line download progress, one counter per bucket.
///
/// Renders as `[assets] fonts(2/4) images(31/37, 1 failed)`. Updates use
/// `try_lock`, so a busy redraw is skipped instead of stalling a download.
pub struct ProgressLine {
    module: &'static str,
    counters: Vec<Counter>,
    lock: Mutex<()>,
}

struct Counter {
    name: &'static str,
    total: usize,
    done: AtomicUsize,
    failed: AtomicUsize,
}

impl Counter {
    fn render(&self) -> String {
        let done = self.done.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let finished = done + failed;
        match failed {
            0 => format!("{}({finished}/{})", self.name, self.total),
            n => format!("{}({finished}/{}, {n} failed)", self.name, self.total),
        }
    }
}

impl ProgressLine {
    /// Counters with a zero total are left out.
    pub fn new(module: &'static str, items: &[(&'static str, usize)]) -> Self {
        let counters = items
            .iter()
            .filter(|(_, total)| *total > 0)
            .map(|&(name, total)| Counter {
                name,
                total,
                done: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
            })
            .collect();

        PROGRESS_ACTIVE.store(true, Ordering::SeqCst);
        let progress = Self {
            module,
            counters,
            lock: Mutex::new(()),
        };
        progress.redraw();
        progress
    }

    pub fn done(&self, name: &str) {
        self.bump(name, |c| &c.done);
    }

    pub fn failed(&self, name: &str) {
        self.bump(name, |c| &c.failed);
    }

    fn bump(&self, name: &str, field: impl Fn(&Counter) -> &AtomicUsize) {
        let Some(counter) = self.counters.iter().find(|c| c.name == name) else {
            return;
        };
        field(counter).fetch_add(1, Ordering::Relaxed);
        if self.lock.try_lock().is_some() {
            self.redraw();
        }
    }

    fn render(&self) -> String {
        let parts: Vec<String> = self.counters.iter().map(Counter::render).collect();
        format!("{} {}", colorize_prefix(self.module), parts.join(" "))
    }

    fn redraw(&self) {
        let line = self.render();
        let mut stdout = stdout().lock();
        clear_row(&mut stdout);
        write!(stdout, "{line}").ok();
        stdout.flush().ok();
    }

    /// Keep the final counts on screen and release the row.
    pub fn finish(self) {
        PROGRESS_ACTIVE.store(false, Ordering::SeqCst);
        {
            let _guard = self.lock.lock();
            let line = self.render();
            let mut stdout = stdout().lock();
            clear_row(&mut stdout);
            writeln!(stdout, "{line}").ok();
            stdout.flush().ok();
        }
        std::mem::forget(self);
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        PROGRESS_ACTIVE.store(false, Ordering::SeqCst);
        let mut stdout = stdout().lock();
        clear_row(&mut stdout);
        stdout.flush().ok();
    }
}
