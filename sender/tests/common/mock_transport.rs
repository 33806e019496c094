use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use protocol::{ChapterChunk, Message};
use sender::*;

/// Transport that records every message handed to it.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Message>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Chapter payloads of the recorded data chunks, in send order.
    pub fn chunks(&self) -> Vec<ChapterChunk> {
        self.sent()
            .iter()
            .filter_map(|message| match message {
                Message::DataChunk { data, .. } => Some(ChapterChunk::decode(data).unwrap()),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, _channel: &str, message: &Message) -> BoxFuture<'static, Result<(), TransportError>> {
        if self.failing.load(Ordering::SeqCst) {
            return future::ready(Err(TransportError::Closed)).boxed();
        }

        self.sent.lock().unwrap().push(message.clone());
        future::ready(Ok(())).boxed()
    }
}

#[derive(Clone, Default)]
pub struct MemoryFiles {
    files: HashMap<PathBuf, String>,
}

impl MemoryFiles {
    pub fn with(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let mut files = HashMap::new();
        files.insert(path.into(), text.into());
        Self { files }
    }
}

impl FileSource for MemoryFiles {
    fn read_text(&self, path: &Path, len: Option<usize>) -> BoxFuture<'static, io::Result<String>> {
        let result = match self.files.get(path) {
            Some(text) => Ok(match len {
                Some(len) => text.chars().take(len).collect(),
                None => text.clone(),
            }),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        };

        future::ready(result).boxed()
    }
}

/// Launcher reporting a fixed set of installed apps.
pub struct StaticLauncher {
    pub apps: Vec<String>,
    pub launched: Arc<Mutex<Vec<String>>>,
}

impl StaticLauncher {
    pub fn new(apps: &[&str]) -> Self {
        Self {
            apps: apps.iter().map(|app| app.to_string()).collect(),
            launched: Arc::default(),
        }
    }
}

impl Launcher for StaticLauncher {
    fn installed_apps(&self) -> BoxFuture<'static, io::Result<Vec<String>>> {
        future::ready(Ok(self.apps.clone())).boxed()
    }

    fn launch(&self, package: &str) -> BoxFuture<'static, io::Result<()>> {
        self.launched.lock().unwrap().push(package.to_owned());
        future::ready(Ok(())).boxed()
    }
}
