mod common;

use std::future;
use std::path::PathBuf;
use std::time::Duration;

use common::{init_logger, StaticLauncher, TestReceiver};
use protocol::{Config, Event, Message};
use sender::*;
use tempfile::TempDir;
use tokio::io::{duplex, DuplexStream};
use tokio::sync::oneshot;

const PACKAGE: &str = "Watch.BC.Reader";

fn config() -> Config {
    let mut config = Config::default();
    config.chunk_size = 8;
    config.receiver.launch_delay = Duration::from_millis(10);
    config
}

async fn book(text: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("三体.txt");
    tokio::fs::write(&path, text).await.unwrap();
    (dir, path)
}

/// Plays the reader app through a whole transfer and returns the chapters
/// it reassembled.
async fn run_receiver(stream: DuplexStream) -> Vec<String> {
    let mut receiver = TestReceiver::new(stream);

    let Message::StartTransfer {
        filename,
        total,
        chapter_indices,
        ..
    } = receiver.receive().await.unwrap()
    else {
        panic!("Fail to get start message");
    };
    assert_eq!(filename, "三体");
    assert_eq!(chapter_indices, (0..total).collect::<Vec<_>>());

    receiver.send(&Event::Ready { usage: 4096.0, count: 0 }).await.unwrap();

    let mut chapters = Vec::new();
    for index in 0..total {
        let mut chunk = receiver.receive_chunk().await.unwrap();
        assert_eq!(chunk.index, index);
        let mut content = chunk.content.clone();

        while chunk.chunk_num + 1 < chunk.total_chunks {
            receiver.send(&Event::NextChunk).await.unwrap();
            chunk = receiver.receive_chunk().await.unwrap();
            content.push_str(&chunk.content);
        }
        receiver.send(&Event::NextChunk).await.unwrap();
        receiver.send(&Event::ChapterChunkComplete).await.unwrap();

        assert_eq!(receiver.receive().await.unwrap(), Message::ChapterComplete { count: index });
        chapters.push(content);

        receiver
            .send(&Event::ChapterSaved {
                count: index,
                synced_count: index + 1,
                total_count: total,
                progress: (index + 1) as f64 / total as f64,
            })
            .await
            .unwrap();
    }

    assert_eq!(receiver.receive().await.unwrap(), Message::TransferComplete);
    receiver.send(&Event::TransferFinished).await.unwrap();

    chapters
}

#[tokio::test]
async fn test_full_transfer() {
    init_logger();
    let (_dir, path) = book("\u{feff}第一章 风起\n山雨欲来。\n第二章 云涌\n满楼风声，一夜未停。\n").await;
    let request = TransferRequest::from_path(&path, None).await.unwrap();
    assert_eq!(request.name, "三体");
    assert!(request.size > 0);

    let (local, remote) = duplex(4096);
    let launcher = StaticLauncher::new(&["Other.App", PACKAGE]);
    let board = StatusBoard::default();
    let config = config();

    let (outcome, chapters) = tokio::join!(
        sender::transfer(local, &launcher, &config, request, Some(board.clone()), future::pending()),
        run_receiver(remote),
    );

    assert_eq!(
        outcome.unwrap(),
        Outcome::Succeeded {
            message: "transfer complete".into(),
            count: 2,
        }
    );
    assert_eq!(chapters, vec!["第一章 风起\n山雨欲来。", "第二章 云涌\n满楼风声，一夜未停。"]);
    assert_eq!(*launcher.launched.lock().unwrap(), vec![PACKAGE.to_string()]);

    let status = board.snapshot().await;
    assert_eq!(status.state, inspector::TransferState::Succeeded);
    assert_eq!(status.progress, 1.0);
    assert_eq!(status.count, Some(2));
}

#[tokio::test]
async fn test_receiver_not_installed() {
    init_logger();
    let (_dir, path) = book("第一章 风起").await;
    let request = TransferRequest::from_path(&path, None).await.unwrap();

    let (local, _remote) = duplex(4096);
    let launcher = StaticLauncher::new(&["Other.App"]);

    let result = sender::transfer(local, &launcher, &config(), request, None, future::pending()).await;

    assert!(matches!(result, Err(Error::ReceiverMissing(package)) if package == PACKAGE));
    assert!(launcher.launched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_transfer() {
    init_logger();
    let (_dir, path) = book("第一章 风起\n山雨欲来，风满楼。").await;
    let request = TransferRequest::from_path(&path, None).await.unwrap();

    let (local, remote) = duplex(4096);
    let launcher = StaticLauncher::new(&[PACKAGE]);
    let (trigger, shutdown) = oneshot::channel::<()>();
    let board = StatusBoard::default();
    let config = config();

    let receiver = async move {
        let mut receiver = TestReceiver::new(remote);
        assert!(matches!(receiver.receive().await.unwrap(), Message::StartTransfer { .. }));
        receiver.send(&Event::Ready { usage: 0.0, count: 0 }).await.unwrap();
        assert_eq!(receiver.receive_chunk().await.unwrap().chunk_num, 0);

        trigger.send(()).unwrap();
        receiver.receive().await.unwrap()
    };

    let (outcome, last) = tokio::join!(
        sender::transfer(local, &launcher, &config, request, Some(board.clone()), async {
            shutdown.await.ok();
        }),
        receiver,
    );

    assert_eq!(outcome.unwrap(), Outcome::Cancelled);
    assert_eq!(last, Message::Cancel);
    assert_eq!(board.snapshot().await.state, inspector::TransferState::Cancelled);
}

#[tokio::test]
async fn test_shutdown_while_send_is_stalled() {
    init_logger();
    let (_dir, path) = book(&format!("第一章 {}", "风".repeat(2000))).await;
    let request = TransferRequest::from_path(&path, None).await.unwrap();

    // Far smaller than one chunk frame, so the chunk write blocks once the
    // receiver stops reading.
    let (local, remote) = duplex(256);
    let launcher = StaticLauncher::new(&[PACKAGE]);
    let config = Config {
        chunk_size: Config::CHUNK_SIZE,
        ..config()
    };

    let receiver = async move {
        let mut receiver = TestReceiver::new(remote);
        assert!(matches!(receiver.receive().await.unwrap(), Message::StartTransfer { .. }));
        receiver.send(&Event::Ready { usage: 0.0, count: 0 }).await.unwrap();
        receiver
    };

    let (outcome, _receiver) = tokio::join!(
        tokio::time::timeout(
            Duration::from_secs(2),
            sender::transfer(local, &launcher, &config, request, None, tokio::time::sleep(Duration::from_millis(100))),
        ),
        receiver,
    );

    assert_eq!(outcome.unwrap().unwrap(), Outcome::Cancelled);
}

#[tokio::test]
async fn test_connection_lost_mid_transfer() {
    init_logger();
    let (_dir, path) = book("第一章 风起").await;
    let request = TransferRequest::from_path(&path, None).await.unwrap();

    let (local, remote) = duplex(4096);
    let launcher = StaticLauncher::new(&[PACKAGE]);
    let config = config();

    let receiver = async move {
        let mut receiver = TestReceiver::new(remote);
        assert!(matches!(receiver.receive().await.unwrap(), Message::StartTransfer { .. }));
    };

    let (outcome, ()) = tokio::join!(
        sender::transfer(local, &launcher, &config, request, None, future::pending()),
        receiver,
    );

    assert_eq!(
        outcome.unwrap(),
        Outcome::Failed {
            message: "transport error: connection closed".into(),
            count: 0,
        }
    );
}

#[tokio::test]
async fn test_missing_file() {
    let result = TransferRequest::from_path("/nonexistent/三体.txt", None).await;
    assert!(matches!(result, Err(Error::Read(_))));
}
