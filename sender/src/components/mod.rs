mod chapter;
mod chunk;
mod progress;
mod session;

pub use chapter::{segment, title_from_path, Chapter};
pub use chunk::{split, ChunkCursor};
pub use progress::{chunk_status, format_bytes, fraction, throughput, ProgressTracker, Throttle};
pub use session::{Report, TransferPhase, TransferSession};
