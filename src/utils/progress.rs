//! Progress reporting for uploads and downloads.

/// Progress of a single transfer.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Bytes transferred so far
    pub done: u64,
    /// Total bytes, 0 when the server did not announce a length
    pub total: u64,
    pub filename: String,
}

impl TransferProgress {
    pub fn new(done: u64, total: u64, filename: impl Into<String>) -> Self {
        Self {
            done,
            total,
            filename: filename.into(),
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done as f64 / self.total as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done >= self.total
    }
}

/// Progress callback. Returning `false` cancels the transfer.
pub type ProgressCallback = Box<dyn FnMut(&TransferProgress) -> bool + Send>;

/// Callback drawing a single-line bar on stderr.
pub fn make_progress_bar() -> ProgressCallback {
    Box::new(|progress: &TransferProgress| {
        use std::io::Write;

        eprint!("\r{}", render_bar(progress));
        if progress.is_complete() {
            eprintln!();
        }
        let _ = std::io::stderr().flush();

        true
    })
}

const BAR_WIDTH: usize = 40;

/// 總長未知時只顯示已傳輸的位元組數
fn render_bar(progress: &TransferProgress) -> String {
    if progress.total == 0 {
        return format!("{} - {} bytes", progress.filename, progress.done);
    }

    let percent = progress.percent();
    let filled = (((percent / 100.0) * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    format!(
        "[{}{}] {:5.1}% {} - {}/{} bytes",
        "=".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        percent,
        progress.filename,
        progress.done,
        progress.total
    )
}
