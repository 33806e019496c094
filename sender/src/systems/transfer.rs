use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use protocol::{ChapterChunk, Config, Event, Message};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{FileSource, Inbound, Transport, TransportError};
use crate::components::*;
use crate::Error;

/// Stream of reports for one transfer. Ends when the transfer does.
pub type Reports = UnboundedReceiverStream<Report>;

#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Book title announced to the receiver, also the fallback chapter name.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Number of characters to read, or the whole file.
    pub text_len: Option<usize>,
}

impl TransferRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: title_from_path(&path),
            path,
            size: 0,
            text_len: None,
        }
    }

    /// Describes the file at `path`, picking up its size from disk.
    pub async fn from_path(path: impl Into<PathBuf>, text_len: Option<usize>) -> Result<Self, Error> {
        let request = Self::new(path);
        let size = tokio::fs::metadata(&request.path).await.map_err(Error::Read)?.len();

        Ok(Self {
            size,
            text_len,
            ..request
        })
    }
}

/// Drives a single chapter-by-chapter transfer at the pace the receiver asks
/// for. At most one transfer is active at a time.
pub struct TransferEngine<T: Transport, F: FileSource> {
    transport: T,
    files: F,
    channel: Arc<str>,
    chunk_size: usize,
    storage_limit: u64,
    session: Option<TransferSession>,
}

impl<T: Transport, F: FileSource> TransferEngine<T, F> {
    pub fn new(transport: T, files: F, config: &Config) -> Self {
        Self {
            transport,
            files,
            channel: config.channel.clone(),
            chunk_size: config.chunk_size.max(1),
            storage_limit: config.storage_limit,
            session: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_some()
    }

    pub fn phase(&self) -> Option<TransferPhase> {
        self.session.as_ref().map(|session| session.phase)
    }

    pub fn session(&self) -> Option<&TransferSession> {
        self.session.as_ref()
    }

    /// Reads and segments the document, then announces it to the receiver.
    ///
    /// Fails with [`Error::Busy`] without touching the active transfer if one
    /// is running. Any later failure is delivered on the returned stream.
    pub async fn start_transfer(&mut self, request: TransferRequest) -> Result<Reports, Error> {
        if let Some(session) = &self.session {
            warn!("Rejecting transfer of {:?}, {:?} is still active", request.name, session.filename);
            return Err(Error::Busy);
        }

        let (reports, receiver) = mpsc::unbounded_channel();
        self.session = Some(TransferSession::new(request.name.clone(), reports));

        if let Err(e) = self.prepare(&request).await {
            self.abort(e);
        }

        Ok(UnboundedReceiverStream::new(receiver))
    }

    /// Abandons the active transfer. The receiver is told on a best-effort
    /// basis; the engine is idle again when this returns.
    pub fn cancel(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        info!(
            "Cancelling transfer {:?} at {:.1}%",
            session.filename,
            session.progress.reported() * 100.0
        );
        let send = self.transport.send(&self.channel, &Message::Cancel);
        tokio::spawn(async move {
            if let Err(e) = send.await {
                warn!("Failed to notify receiver of cancellation: {}", e);
            }
        });
    }

    /// Reacts to one message from the receiver. Ignored while idle.
    pub async fn handle_inbound(&mut self, inbound: Inbound) {
        if self.session.is_none() {
            match inbound {
                Ok(event) => debug!("Ignoring {} while idle", event.kind()),
                Err(e) => debug!("Ignoring inbound failure while idle: {}", e),
            }
            return;
        }

        let result = match inbound {
            Ok(event) => self.handle_event(event).await,
            Err(TransportError::Protocol(e)) => Err(Error::Processing { reason: e.to_string() }),
            Err(e) => Err(Error::Transport(e)),
        };

        if let Err(e) = result {
            self.abort(e);
        }
    }

    async fn prepare(&mut self, request: &TransferRequest) -> Result<(), Error> {
        let Self {
            transport,
            files,
            channel,
            session,
            ..
        } = self;
        let session = session.as_mut().ok_or(Error::Idle)?;

        session.report_progress(0.0, "reading file...");
        info!("Reading {:?} ({})", request.path, format_bytes(request.size as f64));

        let content = files
            .read_text(&request.path, request.text_len)
            .await
            .map_err(Error::Read)?;

        let chapters = segment(&content, &request.name);
        if chapters.is_empty() {
            return Err(Error::NoChapters);
        }
        session.load(chapters);

        let total = session.chapters.len();
        session.report_progress(0.0, format!("preparing to send {} chapters...", total));

        let message = Self::start_message(session, 0);
        session.transition(TransferPhase::AwaitingReady);
        transport
            .send(channel, &message)
            .await
            .map_err(|source| Error::Send { what: "start", source })?;

        info!("Announced {:?}: {} chapters, {} characters", session.filename, total, session.total_words());
        Ok(())
    }

    fn start_message(session: &TransferSession, start_from: usize) -> Message {
        let total = session.chapters.len() as u32;

        Message::StartTransfer {
            filename: session.filename.clone(),
            total,
            word_count: session.total_words(),
            start_from: start_from as u32,
            chapter_indices: (start_from as u32..total).collect(),
            has_cover: false,
        }
    }

    async fn handle_event(&mut self, event: Event) -> Result<(), Error> {
        let Self {
            transport,
            channel,
            chunk_size,
            storage_limit,
            session: slot,
            ..
        } = self;
        let session = slot.as_mut().ok_or(Error::Idle)?;

        debug!("Received {} while {:?}", event.kind(), session.phase);

        match (session.phase, event) {
            (_, Event::Error { message, count }) => {
                warn!("Receiver reported error for {:?}: {} ({})", session.filename, message, count);
                session.report_error(message, clamp_count(count));
                *slot = None;
            }
            (_, Event::Success { message, count }) => {
                info!("Receiver confirmed {:?}: {}", session.filename, message);
                session.report_complete("transfer complete");
                session.report_success(message, clamp_count(count));
                *slot = None;
            }
            (_, Event::TransferFinished) => {
                let count = session.chapters.len() as u32;
                info!("Transfer of {:?} finished, {} chapters", session.filename, count);
                session.report_complete("transfer complete");
                session.report_success("transfer complete", count);
                *slot = None;
            }
            (_, Event::Cancel) => {
                info!("Receiver cancelled {:?}", session.filename);
                session.report_success("transfer cancelled", 0);
                *slot = None;
            }
            (TransferPhase::AwaitingReady, Event::Ready { usage, .. }) => {
                if usage > *storage_limit as f64 {
                    return Err(Error::InsufficientStorage { usage });
                }
                info!("Receiver ready, storage usage {}", format_bytes(usage));
                Self::begin_chapter(transport, channel, *chunk_size, session, 0).await?;
            }
            (_, Event::Next { count, .. }) => {
                info!("Receiver requested chapter {}", count);
                Self::begin_chapter(transport, channel, *chunk_size, session, count).await?;
            }
            (TransferPhase::SendingChapter, Event::NextChunk) => match session.chunks.advance() {
                Some(true) => Self::send_current_chunk(transport, channel, session).await?,
                Some(false) => debug!("Chapter {} has no chunks left", session.chapter_index),
                None => {
                    return Err(Error::Processing {
                        reason: format!("next_chunk past the end of chapter {}", session.chapter_index),
                    })
                }
            },
            (TransferPhase::SendingChapter, Event::ChapterChunkComplete) => {
                let count = session.chapter_index as u32;
                session.transition(TransferPhase::AwaitingChapterSave);
                transport
                    .send(channel, &Message::ChapterComplete { count })
                    .await
                    .map_err(|source| Error::Send { what: "chapter complete", source })?;
            }
            (TransferPhase::AwaitingChapterSave, Event::ChapterSaved { synced_count, total_count, .. }) => {
                session.mark_saved(session.chapter_index);
                debug!(
                    "Chapter {} saved, receiver synced {}/{}",
                    session.chapter_index, synced_count, total_count
                );

                if session.is_last_chapter() {
                    session.transition(TransferPhase::Finishing);
                    transport
                        .send(channel, &Message::TransferComplete)
                        .await
                        .map_err(|source| Error::Send { what: "transfer complete", source })?;
                } else {
                    let next = session.chapter_index as i64 + 1;
                    Self::begin_chapter(transport, channel, *chunk_size, session, next).await?;
                }
            }
            (phase, event) => {
                return Err(Error::Processing {
                    reason: format!("unexpected {} while {:?}", event.kind(), phase),
                })
            }
        }

        Ok(())
    }

    async fn begin_chapter(
        transport: &T,
        channel: &str,
        chunk_size: usize,
        session: &mut TransferSession,
        index: i64,
    ) -> Result<(), Error> {
        let chapter = usize::try_from(index)
            .ok()
            .and_then(|index| session.chapters.get(index))
            .ok_or(Error::InvalidChapter(index))?;

        session.chunks = ChunkCursor::new(split(&chapter.content, chunk_size));
        session.chapter_index = index as usize;
        session.transition(TransferPhase::SendingChapter);

        Self::send_current_chunk(transport, channel, session).await
    }

    async fn send_current_chunk(transport: &T, channel: &str, session: &mut TransferSession) -> Result<(), Error> {
        let index = session.chapter_index;
        let content = session.chunks.take_current().ok_or_else(|| Error::Processing {
            reason: format!("no chunk loaded at {} of chapter {}", session.chunks.index(), index),
        })?;
        let chapter = session.chapter().ok_or(Error::InvalidChapter(index as i64))?;

        let chunk_num = session.chunks.index();
        let total_chunks = session.chunks.total();
        let size = content.chars().count();
        let payload = ChapterChunk {
            index: index as u32,
            name: chapter.name.clone(),
            content,
            word_count: chapter.word_count as u64,
            chunk_num: chunk_num as u32,
            total_chunks: total_chunks as u32,
        };
        let data = payload.encode().map_err(|e| Error::Processing { reason: e.to_string() })?;

        let sent_at = Instant::now();
        let send = transport.send(channel, &Message::DataChunk { count: index as u32, data });
        session.chunks.prefetch();
        send.await.map_err(|source| Error::Send { what: "chunk", source })?;

        debug!("Sent chunk {}/{} of chapter {}", chunk_num + 1, total_chunks, index);

        let speed = session
            .last_chunk_at
            .and_then(|last| throughput(size, sent_at.duration_since(last)));
        session.last_chunk_at = Some(sent_at);

        let progress = fraction(index, chunk_num + 1, total_chunks, session.chapters.len());
        let status = chunk_status(&payload.name, chunk_num + 1, total_chunks, speed);
        session.report_progress(progress, status);

        Ok(())
    }

    fn abort(&mut self, error: Error) {
        let Some(session) = self.session.take() else {
            return;
        };

        let count = match &error {
            Error::InvalidChapter(index) => clamp_count(*index),
            Error::Send { .. } => session.chapter_index as u32,
            _ => 0,
        };

        match &error {
            Error::Processing { reason } => {
                error!("Transfer {:?} failed to process message: {}", session.filename, reason)
            }
            _ => error!("Transfer {:?} aborted: {}", session.filename, error),
        }

        session.report_error(error.to_string(), count);
    }
}

/// Receiver counts are JS numbers; anything negative reads as zero.
fn clamp_count(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}
