use gamescan_fetch::DownloadProgress;
use gamescan_repair::{GameFileInfo, RepairObserver, RepairProgress, ScanProgress};
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};

const BYTES_STYLE: &str =
    "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

const RUN_STYLE: &str = "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {percent:>3}% {msg}";

const FILE_STYLE: &str = "  {wide_bar:.green/blue} {percent:>3}% {msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

/// Bar positions per percent.
const SCALE: u64 = 100;

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars(TICK)
        .progress_chars(PB_CHARS)
}

fn scaled(percent: f64) -> u64 { (percent.clamp(0.0, 100.0) * SCALE as f64) as u64 }

/// Two bars for a scan or repair run: the whole run and the current file.
#[derive(Clone)]
pub struct RunTracker {
    run:  ProgressBar,
    file: ProgressBar,
}

impl RunTracker {
    pub fn new(with_file_bar: bool) -> Self {
        let multi = MultiProgress::new();
        let run = multi.add(ProgressBar::new(100 * SCALE));
        run.set_style(style(RUN_STYLE));
        let file = if with_file_bar {
            let file = multi.add(ProgressBar::new(100 * SCALE));
            file.set_style(style(FILE_STYLE));
            file
        } else {
            ProgressBar::hidden()
        };
        Self { run, file }
    }

    pub fn finish(&self, msg: impl Into<String>) {
        self.file.finish_and_clear();
        self.run.finish_with_message(msg.into());
    }
}

impl RepairObserver for RunTracker {
    fn on_scan_progress(&self, progress: &ScanProgress) {
        self.run.set_position(scaled(progress.percent));
        self.run
            .set_message(format!("[{}/{}] {}", progress.index, progress.total, progress.file_name));
    }

    fn on_repair_progress(&self, progress: &RepairProgress) {
        self.file.set_position(scaled(progress.overall()));
        let msg = match &progress.download {
            Some(d) => format!(
                "{} {}/{} ({}/s)",
                progress.step,
                HumanBytes(d.bytes_completed),
                HumanBytes(d.total_bytes),
                HumanBytes(d.speed_bps as u64)
            ),
            None => progress.step.to_string(),
        };
        self.file.set_message(msg);
    }

    fn on_file_repaired(&self, file: &GameFileInfo) { self.run.println(format!("repaired {}", file.file_name)); }
}

/// Byte bar for a single download.
#[derive(Clone)]
pub struct DownloadTracker {
    pb: ProgressBar,
}

impl Default for DownloadTracker {
    fn default() -> Self { Self::new() }
}

impl DownloadTracker {
    pub fn new() -> Self {
        let pb = ProgressBar::no_length();
        pb.set_style(style(BYTES_STYLE));
        Self { pb }
    }

    pub fn update(&self, progress: &DownloadProgress) {
        self.pb.set_length(progress.total_bytes);
        self.pb.set_position(progress.bytes_completed);
    }

    pub fn finish(&self, msg: Option<String>) {
        match msg {
            Some(msg) => self.pb.finish_with_message(msg),
            None => self.pb.finish(),
        }
    }
}
