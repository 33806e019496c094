mod components;
mod systems;

pub mod inspector;

use std::future::{self, Future};
use std::io;

use futures::StreamExt;
use log::{error, info, warn};
use protocol::Config;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;

pub use self::components::*;
pub use self::inspector::StatusBoard;
pub use self::systems::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transfer in progress")]
    Busy,
    #[error("no transfer in progress")]
    Idle,
    #[error("file read failed: {0}")]
    Read(#[source] io::Error),
    #[error("no chapters found")]
    NoChapters,
    #[error("insufficient storage")]
    InsufficientStorage { usage: f64 },
    #[error("invalid chapter index: {0}")]
    InvalidChapter(i64),
    #[error("{what} send failed: {source}")]
    Send {
        what: &'static str,
        source: TransportError,
    },
    #[error("failed to process message")]
    Processing { reason: String },
    #[error("receiver app {0} not installed")]
    ReceiverMissing(String),
    #[error("receiver launch failed: {0}")]
    Launch(#[source] io::Error),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// How a transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { message: String, count: u32 },
    Failed { message: String, count: u32 },
    Cancelled,
}

/// Connects to the receiver and runs one transfer to its end. Ctrl-C cancels.
pub async fn run<L>(
    config: &Config,
    launcher: &L,
    request: TransferRequest,
    board: Option<StatusBoard>,
) -> Result<Outcome, Error>
where
    L: Launcher + ?Sized,
{
    let addr = format!("{}:{}", config.host, config.port);
    let stream = TcpStream::connect(&addr).await?;
    info!("Connected to receiver at {}", addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl-C: {}", e);
            future::pending::<()>().await;
        }
    };

    transfer(stream, launcher, config, request, board, shutdown).await
}

/// Runs one transfer over an already established stream.
///
/// The receiver app is launched first. Resolving `shutdown` cancels the
/// transfer.
pub async fn transfer<S, L>(
    stream: S,
    launcher: &L,
    config: &Config,
    request: TransferRequest,
    board: Option<StatusBoard>,
    shutdown: impl Future<Output = ()>,
) -> Result<Outcome, Error>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    L: Launcher + ?Sized,
{
    let connection = Connection::open(stream);
    let inbound = connection.add_listener(&config.channel);

    LifecycleSystem::prepare_receiver(launcher, &config.receiver).await?;

    let mut engine = TransferEngine::new(connection, DiskFiles, config);
    let reports = engine.start_transfer(request).await?;

    drive(&mut engine, reports, inbound, board, shutdown).await
}

async fn drive<T, F>(
    engine: &mut TransferEngine<T, F>,
    mut reports: Reports,
    mut inbound: UnboundedReceiver<Inbound>,
    board: Option<StatusBoard>,
    shutdown: impl Future<Output = ()>,
) -> Result<Outcome, Error>
where
    T: Transport,
    F: FileSource,
{
    tokio::pin!(shutdown);
    let mut throttle = Throttle::default();
    let mut cancelled = false;

    loop {
        tokio::select! {
            biased;

            report = reports.next() => {
                let Some(report) = report else {
                    info!("Transfer cancelled");
                    if let Some(board) = &board {
                        board.cancelled().await;
                    }
                    return Ok(Outcome::Cancelled);
                };

                if let Some(board) = &board {
                    board.update(&report).await;
                }

                match report {
                    Report::Progress { progress, status } => {
                        if throttle.ready() {
                            info!("[{:>5.1}%] {}", progress * 100.0, status);
                        }
                    }
                    Report::Success { message, count } => {
                        info!("{} ({})", message, count);
                        return Ok(Outcome::Succeeded { message, count });
                    }
                    Report::Error { message, count } => {
                        error!("{} ({})", message, count);
                        return Ok(Outcome::Failed { message, count });
                    }
                }
            }
            event = inbound.recv(), if engine.is_busy() => {
                let event = event.ok_or(TransportError::Closed).and_then(|event| event);

                // A send stuck on a stalled receiver must not hold off shutdown.
                let interrupted = tokio::select! {
                    _ = engine.handle_inbound(event) => false,
                    _ = &mut shutdown, if !cancelled => true,
                };
                if interrupted {
                    cancelled = true;
                    engine.cancel();
                }
            }
            _ = &mut shutdown, if !cancelled => {
                cancelled = true;
                engine.cancel();
            }
        }
    }
}
