use std::io;
use std::path::Path;

use futures::future::BoxFuture;
use futures::FutureExt;

/// Source of document text.
pub trait FileSource: Send + Sync {
    /// Reads `path` as UTF-8 text, keeping only the first `len` characters
    /// when a length is given.
    fn read_text(&self, path: &Path, len: Option<usize>) -> BoxFuture<'static, io::Result<String>>;
}

pub struct DiskFiles;

impl FileSource for DiskFiles {
    fn read_text(&self, path: &Path, len: Option<usize>) -> BoxFuture<'static, io::Result<String>> {
        let path = path.to_owned();

        async move {
            let bytes = tokio::fs::read(&path).await?;
            let text = String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let text = text.strip_prefix('\u{feff}').map(str::to_owned).unwrap_or(text);

            Ok(match len {
                Some(len) => text.chars().take(len).collect(),
                None => text,
            })
        }
        .boxed()
    }
}
