/// Console progress output. Informational only, not meant to be parsed.
use std::io::{self, Write};

const BAR_LEN: usize = 20;

/// `[#####---------------] 25.0%` style bar for `done` out of `total` units.
pub fn render_bar(label: &str, done: u64, total: u64) -> String {
    let fraction = if total == 0 {
        1.0
    } else {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    };
    let filled = (fraction * BAR_LEN as f64) as usize;
    format!(
        "{} [{}{}] {:.1}%",
        label,
        "#".repeat(filled),
        "-".repeat(BAR_LEN - filled),
        fraction * 100.0
    )
}

/// A single console line rewritten in place with `\r`.
pub struct ProgressLine<W: Write> {
    out: W,
    label: String,
    total: usize,
}

impl ProgressLine<io::Stdout> {
    pub fn stdout(label: impl Into<String>, total: usize) -> Self {
        ProgressLine::new(io::stdout(), label, total)
    }
}

impl<W: Write> ProgressLine<W> {
    pub fn new(out: W, label: impl Into<String>, total: usize) -> Self {
        ProgressLine {
            out,
            label: label.into(),
            total,
        }
    }

    /// Shows `position/total`, with `position` counted from 1.
    pub fn update(&mut self, position: usize) {
        let _ = write!(self.out, "\r{} {}/{}", self.label, position, self.total);
        let _ = self.out.flush();
    }

    pub fn bar(&mut self, done: u64, total: u64) {
        let _ = write!(self.out, "\r{}", render_bar(&self.label, done, total));
        let _ = self.out.flush();
    }

    pub fn finish(mut self) -> W {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
        self.out
    }
}
