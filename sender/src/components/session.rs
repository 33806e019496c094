use bitvec::vec::BitVec;
use log::{debug, trace};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use super::{Chapter, ChunkCursor, ProgressTracker};

/// Output of a transfer, delivered in order on the stream returned by
/// `TransferEngine::start_transfer`.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Progress { progress: f64, status: String },
    Success { message: String, count: u32 },
    Error { message: String, count: u32 },
}

impl Report {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Report::Progress { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Reading and segmenting the document.
    Preparing,
    /// `startTransfer` sent, waiting for the receiver to check its storage.
    AwaitingReady,
    /// Streaming chunks of the current chapter on demand.
    SendingChapter,
    /// `chapter_complete` sent, waiting for the receiver to persist it.
    AwaitingChapterSave,
    /// `transfer_complete` sent, waiting for the receiver's final word.
    Finishing,
}

#[derive(Debug)]
pub struct TransferSession {
    pub filename: String,
    pub phase: TransferPhase,
    pub chapters: Vec<Chapter>,
    pub chapter_index: usize,
    pub chunks: ChunkCursor,
    pub last_chunk_at: Option<Instant>,
    pub saved: BitVec,
    pub progress: ProgressTracker,
    reports: UnboundedSender<Report>,
}

impl TransferSession {
    pub fn new(filename: impl Into<String>, reports: UnboundedSender<Report>) -> Self {
        Self {
            filename: filename.into(),
            phase: TransferPhase::Preparing,
            chapters: Vec::new(),
            chapter_index: 0,
            chunks: ChunkCursor::default(),
            last_chunk_at: None,
            saved: BitVec::new(),
            progress: ProgressTracker::default(),
            reports,
        }
    }

    pub fn load(&mut self, chapters: Vec<Chapter>) {
        self.saved = BitVec::repeat(false, chapters.len());
        self.chapters = chapters;
    }

    pub fn chapter(&self) -> Option<&Chapter> {
        self.chapters.get(self.chapter_index)
    }

    pub fn is_last_chapter(&self) -> bool {
        self.chapter_index + 1 >= self.chapters.len()
    }

    pub fn total_words(&self) -> u64 {
        self.chapters.iter().map(|chapter| chapter.word_count as u64).sum()
    }

    pub fn transition(&mut self, phase: TransferPhase) {
        trace!("Transfer {:?} phase {:?} -> {:?}", self.filename, self.phase, phase);
        self.phase = phase;
    }

    pub fn mark_saved(&mut self, index: usize) {
        if index < self.saved.len() {
            self.saved.set(index, true);
        }
    }

    pub fn report_progress(&mut self, value: f64, status: impl Into<String>) {
        let progress = self.progress.advance(value);
        self.emit(Report::Progress {
            progress,
            status: status.into(),
        });
    }

    pub fn report_complete(&mut self, status: impl Into<String>) {
        let progress = self.progress.complete();
        self.emit(Report::Progress {
            progress,
            status: status.into(),
        });
    }

    pub fn report_success(&self, message: impl Into<String>, count: u32) {
        self.emit(Report::Success {
            message: message.into(),
            count,
        });
    }

    pub fn report_error(&self, message: impl Into<String>, count: u32) {
        self.emit(Report::Error {
            message: message.into(),
            count,
        });
    }

    fn emit(&self, report: Report) {
        if self.reports.send(report).is_err() {
            debug!("Report stream for {:?} already closed", self.filename);
        }
    }
}
