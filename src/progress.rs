use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Timestamped progress lines on stderr; stdout stays free for the translation.
pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    pub fn silent() -> Self {
        Self::new(false)
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.line(msg.as_ref());
    }

    /// Counter for one pipeline stage. Safe to tick from worker threads.
    pub fn stage(&self, label: impl Into<String>, total: usize) -> StageProgress<'_> {
        StageProgress {
            parent: self,
            label: label.into(),
            total: total.max(1),
            done: AtomicUsize::new(0),
        }
    }

    fn line(&self, msg: &str) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {msg}");
    }
}

pub struct StageProgress<'a> {
    parent: &'a ConsoleProgress,
    label: String,
    total: usize,
    done: AtomicUsize,
}

impl StageProgress<'_> {
    pub fn tick(&self) {
        let current = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        self.parent.line(&stage_line(&self.label, current, self.total));
    }
}

fn stage_line(label: &str, current: usize, total: usize) -> String {
    let current = current.min(total);
    let pct = (current as f64 / total.max(1) as f64) * 100.0;
    format!("{label} {current}/{total} ({pct:5.1}%)")
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_elapsed_time() {
        assert_eq!(fmt_elapsed(5.4), "00:05");
        assert_eq!(fmt_elapsed(125.0), "02:05");
        assert_eq!(fmt_elapsed(3723.0), "01:02:03");
    }

    #[test]
    fn stage_lines_show_count_and_percent() {
        assert_eq!(stage_line("initial", 1, 4), "initial 1/4 ( 25.0%)");
        assert_eq!(stage_line("improve", 3, 3), "improve 3/3 (100.0%)");
        // Extra ticks never report more than the total.
        assert_eq!(stage_line("reflect", 5, 2), "reflect 2/2 (100.0%)");
    }
}
