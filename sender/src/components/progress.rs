use std::time::Duration;

use tokio::time::Instant;

/// Highest value reported before the receiver confirms completion.
const CEILING: f64 = 1.0 - f64::EPSILON;

/// Fraction of the transfer covered once `sent` chunks (1-based) of the
/// chapter at `chapter` have gone out.
pub fn fraction(chapter: usize, sent: usize, chunks: usize, chapters: usize) -> f64 {
    if chapters == 0 || chunks == 0 {
        return 0.0;
    }
    (chapter as f64 + sent as f64 / chunks as f64) / chapters as f64
}

/// Characters per second over `elapsed`, or `None` when nothing elapsed.
pub fn throughput(size: usize, elapsed: Duration) -> Option<f64> {
    let seconds = elapsed.as_secs_f64();
    (seconds > 0.0).then(|| size as f64 / seconds)
}

pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", value, UNITS[unit])
}

pub fn chunk_status(name: &str, sent: usize, total: usize, speed: Option<f64>) -> String {
    match speed {
        Some(speed) => format!("{} ({}/{}) {}/s", name, sent, total, format_bytes(speed)),
        None => format!("{} ({}/{})", name, sent, total),
    }
}

/// Keeps reported progress monotonic and below 1.0 until completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressTracker {
    reported: f64,
}

impl ProgressTracker {
    pub fn advance(&mut self, value: f64) -> f64 {
        self.reported = self.reported.max(value.min(CEILING));
        self.reported
    }

    pub fn complete(&mut self) -> f64 {
        self.reported = 1.0;
        self.reported
    }

    pub fn reported(&self) -> f64 {
        self.reported
    }
}

/// Rate limiter for status output.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub const UI_INTERVAL: Duration = Duration::from_millis(200);

    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    pub fn ready_at(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) <= self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(Self::UI_INTERVAL)
    }
}
